use anchor_lang::prelude::*;

use crate::{constants::FEE_VAULT_SEED, controller, events::EpochSettled, state::FeeVault};

#[derive(Accounts)]
pub struct SettleEpoch<'info> {
    pub authority: Signer<'info>,

    #[account(
        mut,
        seeds = [FEE_VAULT_SEED, fee_vault.token_mint.as_ref()],
        bump = fee_vault.bump,
    )]
    pub fee_vault: Account<'info, FeeVault>,
}

/// Close the vault and advance the epoch. Terminal.
pub fn handler(ctx: Context<SettleEpoch>) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    let epoch_id = controller::settle_epoch(&mut ctx.accounts.fee_vault, &authority)?;

    emit!(EpochSettled {
        vault: ctx.accounts.fee_vault.key(),
        epoch_id,
    });

    msg!("Vault {} settled epoch {}", ctx.accounts.fee_vault.key(), epoch_id);

    Ok(())
}

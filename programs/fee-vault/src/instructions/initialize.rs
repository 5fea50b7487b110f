use anchor_lang::prelude::*;

use crate::{
    constants::{FEE_VAULT_SEED, TOKEN_LEDGER_PROGRAM_ID},
    controller::{self, InitializeParams},
    error::FeeVaultError,
    events::VaultInitialized,
    state::{FeeVault, LedgerAccount},
};

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub authority: Signer<'info>,

    /// CHECK: Confidential mint; only its key is recorded
    #[account(owner = TOKEN_LEDGER_PROGRAM_ID @ FeeVaultError::InvalidMint)]
    pub token_mint: UncheckedAccount<'info>,

    /// CHECK: Ledger token account, decoded and validated in the handler
    pub vault_token_account: UncheckedAccount<'info>,

    // An existing vault still reaches the handler and fails AlreadyInitialized
    #[account(
        init_if_needed,
        payer = authority,
        space = FeeVault::LEN,
        seeds = [FEE_VAULT_SEED, token_mint.key().as_ref()],
        bump
    )]
    pub fee_vault: Account<'info, FeeVault>,

    pub system_program: Program<'info, System>,
}

/// Create the fee vault for `token_mint` with zero accumulators.
///
/// The vault token account must already exist on the ledger, hold the same
/// mint, and be owned by the fee vault PDA.
pub fn handler(ctx: Context<Initialize>) -> Result<()> {
    // Validated by the controller after the AlreadyInitialized check
    let vault_token_state =
        LedgerAccount::try_from_account_info(&ctx.accounts.vault_token_account).ok();
    let vault_address = ctx.accounts.fee_vault.key();

    controller::initialize(
        &mut ctx.accounts.fee_vault,
        InitializeParams {
            authority: ctx.accounts.authority.key(),
            token_mint: ctx.accounts.token_mint.key(),
            vault_address,
            bump: ctx.bumps.fee_vault,
            vault_token_account: ctx.accounts.vault_token_account.key(),
            vault_token_state,
        },
    )?;

    let vault = &ctx.accounts.fee_vault;
    emit!(VaultInitialized {
        vault: vault_address,
        authority: vault.authority,
        token_mint: vault.token_mint,
        vault_token_account: vault.vault_token_account,
    });

    msg!("Fee vault {} initialized for mint {}", vault_address, vault.token_mint);

    Ok(())
}

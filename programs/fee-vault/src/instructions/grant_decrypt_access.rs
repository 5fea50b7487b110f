use anchor_lang::prelude::*;

use crate::{
    constants::{COPROCESSOR_PROGRAM_ID, FEE_VAULT_SEED},
    controller,
    events::DecryptAccessGranted,
    handle::EncryptedHandle,
    host::CpiHost,
    state::FeeVault,
};

#[derive(Accounts)]
pub struct GrantDecryptAccess<'info> {
    #[account(mut)]
    pub authority: Signer<'info>,

    #[account(
        seeds = [FEE_VAULT_SEED, fee_vault.token_mint.as_ref()],
        bump = fee_vault.bump,
    )]
    pub fee_vault: Account<'info, FeeVault>,

    /// CHECK: Allowance PDA in the coprocessor's address space, matched
    /// against (handle, grantee) before the CPI
    #[account(mut)]
    pub allowance_account: UncheckedAccount<'info>,

    /// CHECK: Identity receiving decrypt access
    pub grantee: UncheckedAccount<'info>,

    /// CHECK: Homomorphic coprocessor
    #[account(address = COPROCESSOR_PROGRAM_ID)]
    pub coprocessor_program: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Allow `grantee` to decrypt the pending distribution handle
///
/// # Arguments
/// * `handle` - Current `pending_distribution_handle`, read by the caller beforehand
pub fn handler(ctx: Context<GrantDecryptAccess>, handle: u128) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    let grantee = ctx.accounts.grantee.key();
    let handle = EncryptedHandle::from_raw(handle);

    let mut host = CpiHost::new(
        ctx.accounts.authority.to_account_info(),
        ctx.accounts.coprocessor_program.to_account_info(),
        ctx.accounts.system_program.to_account_info(),
    )
    .with_accounts(vec![
        ctx.accounts.allowance_account.to_account_info(),
        ctx.accounts.grantee.to_account_info(),
    ]);

    let allowance = controller::grant_decrypt_access(
        &ctx.accounts.fee_vault,
        &mut host,
        &authority,
        handle,
        &grantee,
    )?;

    emit!(DecryptAccessGranted {
        vault: ctx.accounts.fee_vault.key(),
        handle: handle.to_raw(),
        grantee,
        allowance,
    });

    msg!("Granted decrypt access to {} via {}", grantee, allowance);

    Ok(())
}

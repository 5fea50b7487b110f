use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::set_return_data;

use crate::state::FeeVault;

#[derive(Accounts)]
pub struct VaultView<'info> {
    pub fee_vault: Account<'info, FeeVault>,
}

/// Current encrypted fee total (16 bytes, little-endian)
pub fn total_fees_handle(ctx: Context<VaultView>) -> Result<()> {
    set_return_data(&ctx.accounts.fee_vault.total_fees_handle.to_le_bytes());
    Ok(())
}

/// Most recent distribution (16 bytes, little-endian)
pub fn pending_distribution_handle(ctx: Context<VaultView>) -> Result<()> {
    set_return_data(&ctx.accounts.fee_vault.pending_distribution_handle.to_le_bytes());
    Ok(())
}

/// Closed flag followed by the epoch id
pub fn vault_status(ctx: Context<VaultView>) -> Result<()> {
    set_return_data(&status_bytes(&ctx.accounts.fee_vault));
    Ok(())
}

fn status_bytes(vault: &FeeVault) -> [u8; 9] {
    let mut status = [0u8; 9];
    status[0] = vault.is_closed as u8;
    status[1..].copy_from_slice(&vault.epoch_id.to_le_bytes());
    status
}

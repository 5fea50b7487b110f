use anchor_lang::prelude::*;

pub mod constants;
pub mod controller;
pub mod error;
pub mod events;
pub mod handle;
pub mod host;
pub mod instructions;
pub mod interfaces;
#[cfg(any(test, feature = "host-sim"))]
pub mod sim;
pub mod state;

use instructions::*;

declare_id!("MTEXkxhfcwDkx1dKNDmmvx22kLDe561hwCjYjkyNYin");

#[program]
pub mod confidential_fee_vault {
    use super::*;

    /// Create the fee vault for a confidential mint
    /// The vault token account must be owned by the fee vault PDA
    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        instructions::initialize::handler(ctx)
    }

    /// Collect an encrypted fee from the payer's token account
    /// Adds the fee to the encrypted running total
    pub fn collect_fee(
        ctx: Context<CollectFee>,
        encrypted_amount: Vec<u8>,
        decimals: u8,
    ) -> Result<()> {
        instructions::collect_fee::handler(ctx, encrypted_amount, decimals)
    }

    /// Release an encrypted amount to a recipient (authority only)
    /// Subtracts it from the total and records it as the pending distribution
    pub fn distribute(
        ctx: Context<Distribute>,
        encrypted_amount: Vec<u8>,
        decimals: u8,
    ) -> Result<()> {
        instructions::distribute::handler(ctx, encrypted_amount, decimals)
    }

    /// Allow an identity to decrypt the pending distribution (authority only)
    ///
    /// # Arguments
    /// * `handle` - Must equal the vault's current pending distribution handle
    pub fn grant_decrypt_access(ctx: Context<GrantDecryptAccess>, handle: u128) -> Result<()> {
        instructions::grant_decrypt_access::handler(ctx, handle)
    }

    /// Close the vault and advance the epoch (authority only, one-shot)
    pub fn settle_epoch(ctx: Context<SettleEpoch>) -> Result<()> {
        instructions::settle_epoch::handler(ctx)
    }

    // ============ View Functions (CPI composable) ============

    /// Encrypted fee total handle
    pub fn total_fees_handle(ctx: Context<VaultView>) -> Result<()> {
        instructions::view::total_fees_handle(ctx)
    }

    /// Encrypted pending distribution handle
    pub fn pending_distribution_handle(ctx: Context<VaultView>) -> Result<()> {
        instructions::view::pending_distribution_handle(ctx)
    }

    /// Closed flag and epoch id
    pub fn vault_status(ctx: Context<VaultView>) -> Result<()> {
        instructions::view::vault_status(ctx)
    }
}

use anchor_lang::prelude::*;

use crate::{
    constants::{COPROCESSOR_PROGRAM_ID, FEE_VAULT_SEED, TOKEN_LEDGER_PROGRAM_ID},
    controller,
    error::FeeVaultError,
    events::FeeCollected,
    host::CpiHost,
    state::FeeVault,
};

#[derive(Accounts)]
pub struct CollectFee<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,

    #[account(
        mut,
        seeds = [FEE_VAULT_SEED, fee_vault.token_mint.as_ref()],
        bump = fee_vault.bump,
    )]
    pub fee_vault: Account<'info, FeeVault>,

    /// CHECK: Payer's ledger token account; ownership and balance are enforced by the ledger
    #[account(mut, owner = TOKEN_LEDGER_PROGRAM_ID)]
    pub payer_token_account: UncheckedAccount<'info>,

    /// CHECK: Must be the account recorded at initialization
    #[account(
        mut,
        address = fee_vault.vault_token_account @ FeeVaultError::InvalidVaultTokenAccount,
    )]
    pub vault_token_account: UncheckedAccount<'info>,

    /// CHECK: Must be the vault mint
    #[account(address = fee_vault.token_mint @ FeeVaultError::InvalidMint)]
    pub token_mint: UncheckedAccount<'info>,

    /// CHECK: Confidential token ledger
    #[account(address = TOKEN_LEDGER_PROGRAM_ID)]
    pub token_ledger_program: UncheckedAccount<'info>,

    /// CHECK: Homomorphic coprocessor
    #[account(address = COPROCESSOR_PROGRAM_ID)]
    pub coprocessor_program: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Collect an encrypted fee from the payer
///
/// # Arguments
/// * `encrypted_amount` - Client-encrypted fee ciphertext
/// * `decimals` - Mint decimals, checked by the ledger
pub fn handler(ctx: Context<CollectFee>, encrypted_amount: Vec<u8>, decimals: u8) -> Result<()> {
    let payer = ctx.accounts.payer.key();
    let payer_token_account = ctx.accounts.payer_token_account.key();

    let mut host = CpiHost::new(
        ctx.accounts.payer.to_account_info(),
        ctx.accounts.coprocessor_program.to_account_info(),
        ctx.accounts.system_program.to_account_info(),
    )
    .with_ledger(
        ctx.accounts.token_ledger_program.to_account_info(),
        ctx.accounts.token_mint.to_account_info(),
    )
    .with_accounts(vec![
        ctx.accounts.payer_token_account.to_account_info(),
        ctx.accounts.vault_token_account.to_account_info(),
    ]);

    let fee = controller::collect_fee(
        &mut ctx.accounts.fee_vault,
        &mut host,
        &payer,
        &payer_token_account,
        &encrypted_amount,
        decimals,
    )?;

    let vault = &ctx.accounts.fee_vault;
    emit!(FeeCollected {
        vault: vault.key(),
        payer,
        fee_handle: fee.to_raw(),
        total_fees_handle: vault.total_fees_handle.to_raw(),
    });

    msg!("Fee collected from {} into vault {}", payer, vault.key());

    Ok(())
}

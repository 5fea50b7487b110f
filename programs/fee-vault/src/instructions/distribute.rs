use anchor_lang::prelude::*;

use crate::{
    constants::{COPROCESSOR_PROGRAM_ID, FEE_VAULT_SEED, TOKEN_LEDGER_PROGRAM_ID},
    controller,
    error::FeeVaultError,
    events::Distributed,
    host::CpiHost,
    state::FeeVault,
};

#[derive(Accounts)]
pub struct Distribute<'info> {
    #[account(mut)]
    pub authority: Signer<'info>,

    #[account(
        mut,
        seeds = [FEE_VAULT_SEED, fee_vault.token_mint.as_ref()],
        bump = fee_vault.bump,
    )]
    pub fee_vault: Account<'info, FeeVault>,

    /// CHECK: Must be the account recorded at initialization
    #[account(
        mut,
        address = fee_vault.vault_token_account @ FeeVaultError::InvalidVaultTokenAccount,
    )]
    pub vault_token_account: UncheckedAccount<'info>,

    /// CHECK: Recipient's ledger token account; mint is enforced by the ledger
    #[account(mut, owner = TOKEN_LEDGER_PROGRAM_ID)]
    pub recipient_token_account: UncheckedAccount<'info>,

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

/// Release an encrypted amount from the vault to a recipient
///
/// The vault PDA signs the ledger transfer out of the vault token account.
/// The requested amount becomes the new pending distribution.
///
/// # Arguments
/// * `encrypted_amount` - Client-encrypted ciphertext of the amount to release
/// * `decimals` - Mint decimals, checked by the ledger
pub fn handler(ctx: Context<Distribute>, encrypted_amount: Vec<u8>, decimals: u8) -> Result<()> {
    let authority = ctx.accounts.authority.key();
    let vault_address = ctx.accounts.fee_vault.key();
    let recipient_token_account = ctx.accounts.recipient_token_account.key();

    let token_mint = ctx.accounts.fee_vault.token_mint;
    let vault_seeds = vec![
        FEE_VAULT_SEED.to_vec(),
        token_mint.to_bytes().to_vec(),
        vec![ctx.accounts.fee_vault.bump],
    ];

    let mut host = CpiHost::new(
        ctx.accounts.authority.to_account_info(),
        ctx.accounts.coprocessor_program.to_account_info(),
        ctx.accounts.system_program.to_account_info(),
    )
    .with_ledger(
        ctx.accounts.token_ledger_program.to_account_info(),
        ctx.accounts.token_mint.to_account_info(),
    )
    .with_vault_signer(ctx.accounts.fee_vault.to_account_info(), vault_seeds)
    .with_accounts(vec![
        ctx.accounts.vault_token_account.to_account_info(),
        ctx.accounts.recipient_token_account.to_account_info(),
    ]);

    let amount = controller::distribute(
        &mut ctx.accounts.fee_vault,
        &mut host,
        &authority,
        &vault_address,
        &recipient_token_account,
        &encrypted_amount,
        decimals,
    )?;

    emit!(Distributed {
        vault: vault_address,
        recipient_token_account,
        pending_distribution_handle: amount.to_raw(),
        total_fees_handle: ctx.accounts.fee_vault.total_fees_handle.to_raw(),
    });

    msg!("Distributed from vault {} to {}", vault_address, recipient_token_account);

    Ok(())
}

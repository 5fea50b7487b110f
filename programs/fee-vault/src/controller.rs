//! Vault state machine.
//!
//! Every operation checks its signer first, then runs its sub-calls inside a
//! unit of work against a staged copy of the vault. The staged copy is only
//! written back once every sub-call has succeeded, so a rejected transfer or
//! combine leaves both the vault and the host untouched.

use anchor_lang::error::Error;
use anchor_lang::prelude::*;

use crate::{
    error::FeeVaultError,
    handle::{CombineOp, EncryptedHandle},
    interfaces::{Coprocessor, ConfidentialLedger, ConfidentialTransfer, UnitOfWork, VaultHost},
    state::{FeeVault, LedgerAccount},
};

pub struct InitializeParams {
    pub authority: Pubkey,
    pub token_mint: Pubkey,
    /// PDA the vault lives at
    pub vault_address: Pubkey,
    pub bump: u8,
    pub vault_token_account: Pubkey,
    /// Decoded vault token account; `None` when it is not a ledger account
    pub vault_token_state: Option<LedgerAccount>,
}

pub fn initialize(vault: &mut FeeVault, params: InitializeParams) -> Result<()> {
    require!(!vault.is_initialized(), FeeVaultError::AlreadyInitialized);
    let vault_token_state = params
        .vault_token_state
        .ok_or(FeeVaultError::InvalidVaultTokenAccount)?;
    require_keys_eq!(
        vault_token_state.mint,
        params.token_mint,
        FeeVaultError::InvalidMint
    );
    require_keys_eq!(
        vault_token_state.owner,
        params.vault_address,
        FeeVaultError::InvalidVaultTokenAccount
    );

    *vault = FeeVault {
        authority: params.authority,
        token_mint: params.token_mint,
        vault_token_account: params.vault_token_account,
        total_fees_handle: EncryptedHandle::ZERO,
        pending_distribution_handle: EncryptedHandle::ZERO,
        is_closed: false,
        epoch_id: 0,
        bump: params.bump,
        _reserved: [0u8; 32],
    };

    Ok(())
}

/// Move an encrypted fee from the payer into the vault and add it to the
/// running total. Returns the handle of the collected fee.
pub fn collect_fee<H: VaultHost>(
    vault: &mut FeeVault,
    host: &mut H,
    payer: &Pubkey,
    payer_token_account: &Pubkey,
    ciphertext: &[u8],
    decimals: u8,
) -> Result<EncryptedHandle> {
    vault.ensure_open()?;
    require!(!ciphertext.is_empty(), FeeVaultError::InvalidCiphertext);

    atomically(vault, host, |vault, host| {
        let fee = submit(host, ciphertext)?;

        transfer(
            host,
            &ConfidentialTransfer {
                source: *payer_token_account,
                destination: vault.vault_token_account,
                authority: *payer,
                ciphertext,
                decimals,
            },
        )?;

        vault.total_fees_handle = combine(host, vault.total_fees_handle, fee, CombineOp::Add)?;

        Ok(fee)
    })
}

/// Release an encrypted amount from the vault to a recipient. The amount
/// becomes the pending distribution. Whether the vault actually holds enough
/// is decided by the ledger, never here.
pub fn distribute<H: VaultHost>(
    vault: &mut FeeVault,
    host: &mut H,
    signer: &Pubkey,
    vault_address: &Pubkey,
    recipient_token_account: &Pubkey,
    ciphertext: &[u8],
    decimals: u8,
) -> Result<EncryptedHandle> {
    vault.ensure_authority(signer)?;
    vault.ensure_open()?;
    require!(!ciphertext.is_empty(), FeeVaultError::InvalidCiphertext);
    require_keys_neq!(
        *recipient_token_account,
        vault.vault_token_account,
        FeeVaultError::InvalidRecipient
    );

    atomically(vault, host, |vault, host| {
        let amount = submit(host, ciphertext)?;

        vault.total_fees_handle = combine(host, vault.total_fees_handle, amount, CombineOp::Sub)?;
        vault.pending_distribution_handle = amount;

        transfer(
            host,
            &ConfidentialTransfer {
                source: vault.vault_token_account,
                destination: *recipient_token_account,
                authority: *vault_address,
                ciphertext,
                decimals,
            },
        )?;

        Ok(amount)
    })
}

/// Let `grantee` decrypt the pending distribution. Returns the allowance
/// address. Only the authority can grant; recipients cannot grant themselves.
pub fn grant_decrypt_access<H: VaultHost>(
    vault: &FeeVault,
    host: &mut H,
    signer: &Pubkey,
    handle: EncryptedHandle,
    grantee: &Pubkey,
) -> Result<Pubkey> {
    vault.ensure_authority(signer)?;
    require!(
        !vault.pending_distribution_handle.is_zero(),
        FeeVaultError::NoPendingDistribution
    );
    require!(
        handle == vault.pending_distribution_handle,
        FeeVaultError::HandleMismatch
    );
    require!(
        !host.allowance_exists(handle, grantee)?,
        FeeVaultError::AllowanceExists
    );

    transact(host, |host| {
        host.grant_allowance(handle, grantee)
            .map_err(|err| rejected("grant allowance", err, FeeVaultError::AllowanceRejected))
    })
}

/// Close the vault for good and advance the epoch counter. Returns the new
/// epoch id.
pub fn settle_epoch(vault: &mut FeeVault, signer: &Pubkey) -> Result<u64> {
    vault.ensure_authority(signer)?;
    require!(!vault.is_closed, FeeVaultError::AlreadyClosed);

    let epoch_id = vault
        .epoch_id
        .checked_add(1)
        .ok_or(FeeVaultError::MathOverflow)?;

    vault.is_closed = true;
    vault.epoch_id = epoch_id;

    Ok(epoch_id)
}

/// Run `op` inside a unit of work on `host`.
pub fn transact<H, T, F>(host: &mut H, op: F) -> Result<T>
where
    H: UnitOfWork,
    F: FnOnce(&mut H) -> Result<T>,
{
    host.begin();
    match op(host) {
        Ok(out) => {
            host.commit();
            Ok(out)
        }
        Err(err) => {
            host.rollback();
            Err(err)
        }
    }
}

/// Like [`transact`], but `op` works on a staged copy of the vault that
/// replaces `vault` only on success.
pub fn atomically<H, T, F>(vault: &mut FeeVault, host: &mut H, op: F) -> Result<T>
where
    H: UnitOfWork,
    F: FnOnce(&mut FeeVault, &mut H) -> Result<T>,
{
    let mut staged = vault.clone();
    let out = transact(host, |host| op(&mut staged, host))?;
    *vault = staged;
    Ok(out)
}

fn submit<H: Coprocessor>(host: &mut H, ciphertext: &[u8]) -> Result<EncryptedHandle> {
    host.submit_ciphertext(ciphertext)
        .map_err(|err| rejected("submit ciphertext", err, FeeVaultError::CiphertextRejected))
}

fn combine<H: Coprocessor>(
    host: &mut H,
    lhs: EncryptedHandle,
    rhs: EncryptedHandle,
    op: CombineOp,
) -> Result<EncryptedHandle> {
    host.combine(lhs, rhs, op)
        .map_err(|err| rejected(op.instruction_name(), err, FeeVaultError::CombineRejected))
}

fn transfer<H: ConfidentialLedger>(host: &mut H, request: &ConfidentialTransfer<'_>) -> Result<()> {
    host.confidential_transfer(request)
        .map_err(|err| rejected("confidential transfer", err, FeeVaultError::TransferRejected))
}

// Only reached when the host returns the failure; a failed on-chain CPI aborts inside `invoke`.
fn rejected(call: &str, source: Error, named: FeeVaultError) -> Error {
    msg!("{} rejected: {}", call, source);
    Error::from(named)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CIPHERTEXT_INPUT_TYPE;
    use crate::sim::{reveal_proof, RevealError, SimHost, SimProgram};
    use crate::state::AllowanceRecord;

    const DECIMALS: u8 = 6;

    struct Fixture {
        program: SimProgram,
        authority: Pubkey,
        alice: Pubkey,
        alice_account: Pubkey,
        bob: Pubkey,
        bob_account: Pubkey,
        mint: Pubkey,
        vault_token_account: Pubkey,
        vault: Pubkey,
    }

    fn setup(alice_funds: u128) -> Fixture {
        let mut program = SimProgram::new();
        let authority = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let alice_account = Pubkey::new_unique();
        let bob_account = Pubkey::new_unique();
        let vault_token_account = Pubkey::new_unique();

        let mint = program.host.create_mint(DECIMALS, &authority, Some(authority));
        let (vault_address, _) = FeeVault::derive_address(&mint);
        program
            .host
            .create_account(&vault_token_account, &mint, &vault_address)
            .unwrap();
        program.host.create_account(&alice_account, &mint, &alice).unwrap();
        program.host.create_account(&bob_account, &mint, &bob).unwrap();

        let funding = program.host.encrypt(alice_funds);
        program
            .host
            .mint_to(&mint, &alice_account, &authority, &funding, CIPHERTEXT_INPUT_TYPE, DECIMALS)
            .unwrap();

        let vault = program
            .initialize(&authority, &mint, &vault_token_account)
            .unwrap();
        assert_eq!(vault, vault_address);

        Fixture {
            program,
            authority,
            alice,
            alice_account,
            bob,
            bob_account,
            mint,
            vault_token_account,
            vault,
        }
    }

    impl Fixture {
        fn collect(&mut self, amount: u128) -> Result<EncryptedHandle> {
            let ciphertext = self.program.host.encrypt(amount);
            self.program.collect_fee(
                &self.vault,
                &self.alice,
                &self.alice_account,
                &ciphertext,
                DECIMALS,
            )
        }

        fn distribute(&mut self, amount: u128) -> Result<EncryptedHandle> {
            let ciphertext = self.program.host.encrypt(amount);
            self.program.distribute(
                &self.vault,
                &self.authority,
                &self.bob_account,
                &ciphertext,
                DECIMALS,
            )
        }

        fn state(&self) -> FeeVault {
            self.program.vault(&self.vault).cloned().unwrap()
        }

        fn total(&self) -> u128 {
            self.program
                .host
                .plaintext(self.state().total_fees_handle)
                .unwrap()
        }

        fn pending(&self) -> u128 {
            self.program
                .host
                .plaintext(self.state().pending_distribution_handle)
                .unwrap()
        }

        fn balance(&self, account: &Pubkey) -> u128 {
            self.program.host.balance(account).unwrap()
        }
    }

    fn assert_vault_error<T: std::fmt::Debug>(result: Result<T>, expected: FeeVaultError) {
        match result {
            Err(Error::AnchorError(err)) => {
                assert_eq!(err.error_code_number, u32::from(expected), "{}", err)
            }
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_initialize_starts_at_zero() {
        let fx = setup(100);
        let vault = fx.state();

        assert_eq!(vault.authority, fx.authority);
        assert_eq!(vault.token_mint, fx.mint);
        assert_eq!(vault.vault_token_account, fx.vault_token_account);
        assert!(vault.total_fees_handle.is_zero());
        assert!(vault.pending_distribution_handle.is_zero());
        assert!(!vault.is_closed);
        assert_eq!(vault.epoch_id, 0);
        assert_eq!(fx.total(), 0);
    }

    #[test]
    fn test_initialize_once_per_mint() {
        let mut fx = setup(100);
        let intruder = Pubkey::new_unique();

        let result = fx
            .program
            .initialize(&intruder, &fx.mint, &fx.vault_token_account);

        assert_vault_error(result, FeeVaultError::AlreadyInitialized);
        assert_eq!(fx.state().authority, fx.authority);
    }

    #[test]
    fn test_initialize_twice_with_unknown_token_account() {
        let mut fx = setup(100);
        let unregistered = Pubkey::new_unique();

        let result = fx
            .program
            .initialize(&fx.authority, &fx.mint, &unregistered);

        assert_vault_error(result, FeeVaultError::AlreadyInitialized);
        assert_eq!(fx.state().vault_token_account, fx.vault_token_account);
    }

    #[test]
    fn test_initialize_rejects_unknown_token_account() {
        let mut program = SimProgram::new();
        let authority = Pubkey::new_unique();
        let mint = program.host.create_mint(DECIMALS, &authority, None);

        let result = program.initialize(&authority, &mint, &Pubkey::new_unique());

        assert_vault_error(result, FeeVaultError::InvalidVaultTokenAccount);
        assert!(program.vault(&FeeVault::derive_address(&mint).0).is_none());
    }

    #[test]
    fn test_initialize_rejects_mint_mismatch() {
        let mut program = SimProgram::new();
        let authority = Pubkey::new_unique();
        let mint = program.host.create_mint(DECIMALS, &authority, None);
        let other_mint = program.host.create_mint(DECIMALS, &authority, None);
        let (vault_address, _) = FeeVault::derive_address(&mint);
        let vault_token_account = Pubkey::new_unique();
        program
            .host
            .create_account(&vault_token_account, &other_mint, &vault_address)
            .unwrap();

        let result = program.initialize(&authority, &mint, &vault_token_account);

        assert_vault_error(result, FeeVaultError::InvalidMint);
        assert!(program.vault(&vault_address).is_none());
    }

    #[test]
    fn test_initialize_requires_vault_custody() {
        let mut program = SimProgram::new();
        let authority = Pubkey::new_unique();
        let mint = program.host.create_mint(DECIMALS, &authority, None);
        let vault_token_account = Pubkey::new_unique();
        program
            .host
            .create_account(&vault_token_account, &mint, &authority)
            .unwrap();

        let result = program.initialize(&authority, &mint, &vault_token_account);

        assert_vault_error(result, FeeVaultError::InvalidVaultTokenAccount);
    }

    #[test]
    fn test_collect_fee_accumulates() {
        let mut fx = setup(100);

        fx.collect(40).unwrap();
        assert_eq!(fx.total(), 40);

        fx.collect(15).unwrap();
        fx.collect(5).unwrap();
        assert_eq!(fx.total(), 60);
        assert_eq!(fx.balance(&fx.alice_account), 40);
        assert_eq!(fx.balance(&fx.vault_token_account), 60);
        // Collection never touches the pending distribution
        assert!(fx.state().pending_distribution_handle.is_zero());
    }

    #[test]
    fn test_collect_fee_returns_fresh_handles() {
        let mut fx = setup(100);

        let first = fx.collect(10).unwrap();
        let total_after_first = fx.state().total_fees_handle;
        let second = fx.collect(10).unwrap();

        assert_ne!(first, second);
        assert_ne!(fx.state().total_fees_handle, total_after_first);
        assert_eq!(fx.program.host.plaintext(total_after_first), Some(10));
    }

    #[test]
    fn test_collect_fee_insufficient_balance() {
        let mut fx = setup(30);
        let before = fx.state();

        let result = fx.collect(31);

        assert_vault_error(result, FeeVaultError::TransferRejected);
        assert_eq!(fx.state(), before);
        assert_eq!(fx.balance(&fx.alice_account), 30);
        assert_eq!(fx.balance(&fx.vault_token_account), 0);
    }

    #[test]
    fn test_collect_fee_decimals_mismatch() {
        let mut fx = setup(100);
        let ciphertext = fx.program.host.encrypt(10);

        let result = fx.program.collect_fee(
            &fx.vault,
            &fx.alice,
            &fx.alice_account,
            &ciphertext,
            DECIMALS + 1,
        );

        assert_vault_error(result, FeeVaultError::TransferRejected);
        assert_eq!(fx.total(), 0);
    }

    #[test]
    fn test_collect_fee_from_foreign_account() {
        let mut fx = setup(100);
        let ciphertext = fx.program.host.encrypt(10);

        // Bob signs but spends from Alice's account
        let result = fx.program.collect_fee(
            &fx.vault,
            &fx.bob,
            &fx.alice_account,
            &ciphertext,
            DECIMALS,
        );

        assert_vault_error(result, FeeVaultError::TransferRejected);
        assert_eq!(fx.balance(&fx.alice_account), 100);
    }

    #[test]
    fn test_collect_fee_ciphertext_validation() {
        let mut fx = setup(100);

        let empty = fx
            .program
            .collect_fee(&fx.vault, &fx.alice, &fx.alice_account, &[], DECIMALS);
        assert_vault_error(empty, FeeVaultError::InvalidCiphertext);

        let garbage = fx.program.collect_fee(
            &fx.vault,
            &fx.alice,
            &fx.alice_account,
            &[7u8; 5],
            DECIMALS,
        );
        assert_vault_error(garbage, FeeVaultError::CiphertextRejected);
    }

    #[test]
    fn test_distribute_moves_funds() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();

        let handle = fx.distribute(30).unwrap();

        assert_eq!(fx.state().pending_distribution_handle, handle);
        assert_eq!(fx.total(), 10);
        assert_eq!(fx.pending(), 30);
        assert_eq!(fx.balance(&fx.vault_token_account), 10);
        assert_eq!(fx.balance(&fx.bob_account), 30);
    }

    #[test]
    fn test_pending_distribution_is_overwritten() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();

        fx.distribute(10).unwrap();
        fx.distribute(5).unwrap();

        assert_eq!(fx.pending(), 5);
        assert_eq!(fx.total(), 25);
        assert_eq!(fx.balance(&fx.bob_account), 15);
    }

    #[test]
    fn test_distribute_exceeding_balance() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let before = fx.state();

        let result = fx.distribute(41);

        assert_vault_error(result, FeeVaultError::TransferRejected);
        assert_eq!(fx.state(), before);
        assert_eq!(fx.total(), 40);
        assert_eq!(fx.balance(&fx.vault_token_account), 40);
        assert_eq!(fx.balance(&fx.bob_account), 0);
    }

    #[test]
    fn test_distribute_requires_authority() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let ciphertext = fx.program.host.encrypt(10);

        let result = fx.program.distribute(
            &fx.vault,
            &fx.bob,
            &fx.bob_account,
            &ciphertext,
            DECIMALS,
        );

        assert_vault_error(result, FeeVaultError::Unauthorized);
        assert_eq!(fx.total(), 40);
        assert_eq!(fx.balance(&fx.bob_account), 0);
    }

    #[test]
    fn test_distribute_to_vault_account_rejected() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let ciphertext = fx.program.host.encrypt(10);

        let result = fx.program.distribute(
            &fx.vault,
            &fx.authority,
            &fx.vault_token_account,
            &ciphertext,
            DECIMALS,
        );

        assert_vault_error(result, FeeVaultError::InvalidRecipient);
        assert_eq!(fx.total(), 40);
    }

    #[test]
    fn test_grant_requires_authority() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let handle = fx.distribute(30).unwrap();

        // Recipient tries to grant itself
        let result = fx
            .program
            .grant_decrypt_access(&fx.vault, &fx.bob, handle, &fx.bob);

        assert_vault_error(result, FeeVaultError::Unauthorized);
        assert_eq!(fx.program.host.allowance_count(), 0);
    }

    #[test]
    fn test_only_grantee_can_reveal() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let handle = fx.distribute(30).unwrap();
        let eve = Pubkey::new_unique();

        let allowance = fx
            .program
            .grant_decrypt_access(&fx.vault, &fx.authority, handle, &fx.bob)
            .unwrap();

        assert_eq!(allowance, AllowanceRecord::derive_address(handle, &fx.bob).0);
        let host: &SimHost = &fx.program.host;
        assert_eq!(host.reveal(handle, &fx.bob, &reveal_proof(handle, &fx.bob)), Ok(30));
        assert_eq!(
            host.reveal(handle, &eve, &reveal_proof(handle, &eve)),
            Err(RevealError::NotAllowed {
                handle: handle.to_raw(),
                requester: eve
            })
        );
        assert!(host
            .reveal(handle, &fx.authority, &reveal_proof(handle, &fx.authority))
            .is_err());
    }

    #[test]
    fn test_grant_twice_fails() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let handle = fx.distribute(30).unwrap();

        fx.program
            .grant_decrypt_access(&fx.vault, &fx.authority, handle, &fx.bob)
            .unwrap();
        let result = fx
            .program
            .grant_decrypt_access(&fx.vault, &fx.authority, handle, &fx.bob);

        assert_vault_error(result, FeeVaultError::AllowanceExists);
        assert_eq!(fx.program.host.allowance_count(), 1);
    }

    #[test]
    fn test_grant_only_current_pending_handle() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();

        let nothing_yet = fx.program.grant_decrypt_access(
            &fx.vault,
            &fx.authority,
            EncryptedHandle::ZERO,
            &fx.bob,
        );
        assert_vault_error(nothing_yet, FeeVaultError::NoPendingDistribution);

        let stale = fx.distribute(10).unwrap();
        fx.distribute(5).unwrap();

        let result = fx
            .program
            .grant_decrypt_access(&fx.vault, &fx.authority, stale, &fx.bob);
        assert_vault_error(result, FeeVaultError::HandleMismatch);

        let total = fx.state().total_fees_handle;
        let result = fx
            .program
            .grant_decrypt_access(&fx.vault, &fx.authority, total, &fx.bob);
        assert_vault_error(result, FeeVaultError::HandleMismatch);
        assert_eq!(fx.program.host.allowance_count(), 0);
    }

    #[test]
    fn test_settle_epoch_closes_vault() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        fx.distribute(30).unwrap();

        let epoch = fx.program.settle_epoch(&fx.vault, &fx.authority).unwrap();
        let settled = fx.state();

        assert_eq!(epoch, 1);
        assert!(settled.is_closed);
        assert_eq!(settled.epoch_id, 1);

        assert_vault_error(fx.collect(5), FeeVaultError::VaultClosed);
        assert_vault_error(fx.distribute(5), FeeVaultError::VaultClosed);
        assert_eq!(fx.state(), settled);
        assert_eq!(fx.total(), 10);
        assert_eq!(fx.pending(), 30);
        assert_eq!(fx.balance(&fx.alice_account), 60);
    }

    #[test]
    fn test_settle_epoch_twice_fails() {
        let mut fx = setup(100);

        fx.program.settle_epoch(&fx.vault, &fx.authority).unwrap();
        let result = fx.program.settle_epoch(&fx.vault, &fx.authority);

        assert_vault_error(result, FeeVaultError::AlreadyClosed);
        assert_eq!(fx.state().epoch_id, 1);
    }

    #[test]
    fn test_settle_epoch_requires_authority() {
        let mut fx = setup(100);

        let result = fx.program.settle_epoch(&fx.vault, &fx.alice);

        assert_vault_error(result, FeeVaultError::Unauthorized);
        assert!(!fx.state().is_closed);
    }

    #[test]
    fn test_settle_epoch_counter_overflow() {
        let authority = Pubkey::new_unique();
        let mut vault = FeeVault {
            authority,
            epoch_id: u64::MAX,
            ..FeeVault::default()
        };

        assert_vault_error(settle_epoch(&mut vault, &authority), FeeVaultError::MathOverflow);
        assert!(!vault.is_closed);
    }

    #[test]
    fn test_grant_after_settlement() {
        let mut fx = setup(100);
        fx.collect(40).unwrap();
        let handle = fx.distribute(30).unwrap();
        fx.program.settle_epoch(&fx.vault, &fx.authority).unwrap();

        fx.program
            .grant_decrypt_access(&fx.vault, &fx.authority, handle, &fx.bob)
            .unwrap();

        assert_eq!(
            fx.program
                .host
                .reveal(handle, &fx.bob, &reveal_proof(handle, &fx.bob)),
            Ok(30)
        );
    }

    #[test]
    fn test_atomically_discards_staged_changes() {
        let mut host = SimHost::new();
        let mut vault = FeeVault::default();
        let ciphertext = host.encrypt(9);

        let result: Result<()> = atomically(&mut vault, &mut host, |vault, host| {
            vault.total_fees_handle = host.submit_ciphertext(&ciphertext)?;
            vault.is_closed = true;
            Err(FeeVaultError::TransferRejected.into())
        });

        assert!(result.is_err());
        assert_eq!(vault, FeeVault::default());
    }
}

//! Seams between the vault controller and the systems it orchestrates.
//!
//! On-chain these are served by cross-program invocations
//! ([`crate::host::CpiHost`]); tests and fuzzing run the same controller
//! against the in-memory host in `sim`.

use anchor_lang::prelude::*;

use crate::handle::{CombineOp, EncryptedHandle};

/// Homomorphic coprocessor: ciphertext registration, combine and the
/// decryption allowance registry.
pub trait Coprocessor {
    /// Register a client ciphertext and return a fresh handle for it.
    fn submit_ciphertext(&mut self, ciphertext: &[u8]) -> Result<EncryptedHandle>;

    /// Combine two handles into a new one. Neither input is modified.
    fn combine(
        &mut self,
        lhs: EncryptedHandle,
        rhs: EncryptedHandle,
        op: CombineOp,
    ) -> Result<EncryptedHandle>;

    /// Whether an allowance for `(handle, grantee)` is already recorded.
    fn allowance_exists(&self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<bool>;

    /// Record that `grantee` may request decryption of `handle`. Returns the
    /// allowance address.
    fn grant_allowance(&mut self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<Pubkey>;
}

/// A confidential transfer request. The amount travels as ciphertext and is
/// never interpreted by the vault.
#[derive(Clone, Copy, Debug)]
pub struct ConfidentialTransfer<'a> {
    pub source: Pubkey,
    pub destination: Pubkey,
    /// Ledger owner of `source`; must sign (directly or via PDA seeds).
    pub authority: Pubkey,
    pub ciphertext: &'a [u8],
    pub decimals: u8,
}

/// Confidential token ledger.
pub trait ConfidentialLedger {
    fn confidential_transfer(&mut self, transfer: &ConfidentialTransfer<'_>) -> Result<()>;
}

/// Groups the sub-calls of one vault operation so they take effect together
/// or not at all.
pub trait UnitOfWork {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// Everything a vault operation needs from its environment.
pub trait VaultHost: Coprocessor + ConfidentialLedger + UnitOfWork {}

impl<T: Coprocessor + ConfidentialLedger + UnitOfWork> VaultHost for T {}

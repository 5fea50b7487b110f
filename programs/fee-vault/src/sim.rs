//! In-memory stand-ins for the confidential token ledger and the
//! homomorphic coprocessor, plus a harness that stores vaults at their PDAs
//! and dispatches the vault operations the way the program entrypoint does.
//!
//! Ciphertexts here are a keyed stream over the plaintext. They only need to
//! be opaque to the vault, not secure.

use std::collections::HashMap;

use anchor_lang::error::ErrorCode;
use anchor_lang::prelude::*;
use anchor_lang::solana_program::program_error::ProgramError;
use constant_time_eq::constant_time_eq_32;
use ::thiserror::Error;

use crate::{
    constants::CIPHERTEXT_INPUT_TYPE,
    controller::{self, InitializeParams},
    handle::{CombineOp, EncryptedHandle},
    interfaces::{Coprocessor, ConfidentialLedger, ConfidentialTransfer, UnitOfWork},
    state::{AllowanceRecord, FeeVault, LedgerAccount},
};

const CIPHER_KEY: [u8; 32] = [0x5a; 32];
const PROOF_KEY: [u8; 32] = [0xa5; 32];
const NONCE_LEN: usize = 16;

pub const CIPHERTEXT_LEN: usize = NONCE_LEN + 16;

/// Why an off-chain reveal was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("unknown handle {0:#x}")]
    UnknownHandle(u128),

    #[error("{requester} holds no allowance for handle {handle:#x}")]
    NotAllowed { handle: u128, requester: Pubkey },

    #[error("reveal proof does not match the requester")]
    InvalidProof,
}

#[derive(Clone, Debug)]
struct SimMint {
    decimals: u8,
    mint_authority: Pubkey,
    freeze_authority: Option<Pubkey>,
}

#[derive(Clone, Debug)]
struct SimTokenAccount {
    mint: Pubkey,
    owner: Pubkey,
    balance: u128,
}

#[derive(Clone, Debug, Default)]
struct HostState {
    mints: HashMap<Pubkey, SimMint>,
    accounts: HashMap<Pubkey, SimTokenAccount>,
    plaintexts: HashMap<EncryptedHandle, u128>,
    allowances: HashMap<Pubkey, AllowanceRecord>,
    handle_nonce: u64,
}

/// Ledger and coprocessor sharing one snapshot-based unit of work.
#[derive(Default)]
pub struct SimHost {
    state: HostState,
    checkpoint: Option<HostState>,
    cipher_nonce: u64,
}

impl SimHost {
    pub fn new() -> Self {
        Self::default()
    }

    // ============ Client side ============

    /// Encrypt `value` the way a client SDK would before submitting it.
    pub fn encrypt(&mut self, value: u128) -> Vec<u8> {
        self.cipher_nonce += 1;
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..8].copy_from_slice(&self.cipher_nonce.to_le_bytes());

        let mut ciphertext = nonce.to_vec();
        ciphertext.extend(
            value
                .to_le_bytes()
                .iter()
                .zip(keystream(&nonce).iter())
                .map(|(byte, key)| byte ^ key),
        );
        ciphertext
    }

    // ============ Ledger ============

    pub fn create_mint(
        &mut self,
        decimals: u8,
        mint_authority: &Pubkey,
        freeze_authority: Option<Pubkey>,
    ) -> Pubkey {
        let mint = Pubkey::new_unique();
        self.state.mints.insert(
            mint,
            SimMint {
                decimals,
                mint_authority: *mint_authority,
                freeze_authority,
            },
        );
        mint
    }

    pub fn create_account(
        &mut self,
        account: &Pubkey,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<()> {
        if !self.state.mints.contains_key(mint) {
            return Err(ProgramError::UninitializedAccount.into());
        }
        if self.state.accounts.contains_key(account) {
            return Err(ProgramError::AccountAlreadyInitialized.into());
        }
        self.state.accounts.insert(
            *account,
            SimTokenAccount {
                mint: *mint,
                owner: *owner,
                balance: 0,
            },
        );
        Ok(())
    }

    pub fn mint_to(
        &mut self,
        mint: &Pubkey,
        account: &Pubkey,
        authority: &Pubkey,
        ciphertext: &[u8],
        input_type: u8,
        decimals: u8,
    ) -> Result<()> {
        if input_type != CIPHERTEXT_INPUT_TYPE {
            return Err(ProgramError::InvalidInstructionData.into());
        }
        let amount = decrypt(ciphertext).ok_or(ProgramError::InvalidInstructionData)?;
        let mint_state = self
            .state
            .mints
            .get(mint)
            .ok_or(ProgramError::UninitializedAccount)?;
        if mint_state.mint_authority != *authority {
            return Err(ProgramError::MissingRequiredSignature.into());
        }
        if mint_state.decimals != decimals {
            return Err(ProgramError::InvalidArgument.into());
        }

        let target = self
            .state
            .accounts
            .get_mut(account)
            .ok_or(ProgramError::UninitializedAccount)?;
        if target.mint != *mint {
            return Err(ProgramError::InvalidAccountData.into());
        }
        target.balance = target
            .balance
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn freeze_authority(&self, mint: &Pubkey) -> Option<Pubkey> {
        self.state
            .mints
            .get(mint)
            .and_then(|mint| mint.freeze_authority)
    }

    pub fn ledger_account(&self, account: &Pubkey) -> Option<LedgerAccount> {
        self.state.accounts.get(account).map(|state| LedgerAccount {
            mint: state.mint,
            owner: state.owner,
        })
    }

    /// Ground-truth plaintext balance, for assertions only.
    pub fn balance(&self, account: &Pubkey) -> Option<u128> {
        self.state.accounts.get(account).map(|state| state.balance)
    }

    // ============ Coprocessor ============

    /// Ground-truth plaintext behind a handle, for assertions only. Real
    /// callers go through [`SimHost::reveal`].
    pub fn plaintext(&self, handle: EncryptedHandle) -> Option<u128> {
        if handle.is_zero() {
            return Some(0);
        }
        self.state.plaintexts.get(&handle).copied()
    }

    pub fn allowance(&self, address: &Pubkey) -> Option<&AllowanceRecord> {
        self.state.allowances.get(address)
    }

    pub fn allowance_count(&self) -> usize {
        self.state.allowances.len()
    }

    /// Off-chain decryption. Succeeds only for a requester holding an
    /// allowance on `handle` and presenting a matching proof.
    pub fn reveal(
        &self,
        handle: EncryptedHandle,
        requester: &Pubkey,
        proof: &[u8; 32],
    ) -> std::result::Result<u128, RevealError> {
        let plaintext = self
            .plaintext(handle)
            .ok_or(RevealError::UnknownHandle(handle.to_raw()))?;

        let (address, _) = AllowanceRecord::derive_address(handle, requester);
        match self.state.allowances.get(&address) {
            Some(record) if record.handle == handle && record.grantee == *requester => {}
            _ => {
                return Err(RevealError::NotAllowed {
                    handle: handle.to_raw(),
                    requester: *requester,
                })
            }
        }

        if !constant_time_eq_32(&reveal_proof(handle, requester), proof) {
            return Err(RevealError::InvalidProof);
        }

        Ok(plaintext)
    }

    fn issue_handle(&mut self, plaintext: u128) -> EncryptedHandle {
        loop {
            self.state.handle_nonce += 1;
            let mut hasher = blake3::Hasher::new();
            hasher.update(b"sim-handle");
            hasher.update(&self.state.handle_nonce.to_le_bytes());
            let digest = hasher.finalize();

            let mut raw = [0u8; 16];
            raw.copy_from_slice(&digest.as_bytes()[..16]);
            let handle = EncryptedHandle::from_raw(u128::from_le_bytes(raw));

            if !handle.is_zero() && !self.state.plaintexts.contains_key(&handle) {
                self.state.plaintexts.insert(handle, plaintext);
                return handle;
            }
        }
    }
}

impl Coprocessor for SimHost {
    fn submit_ciphertext(&mut self, ciphertext: &[u8]) -> Result<EncryptedHandle> {
        let plaintext = decrypt(ciphertext).ok_or(ProgramError::InvalidInstructionData)?;
        Ok(self.issue_handle(plaintext))
    }

    fn combine(
        &mut self,
        lhs: EncryptedHandle,
        rhs: EncryptedHandle,
        op: CombineOp,
    ) -> Result<EncryptedHandle> {
        let lhs = self.plaintext(lhs).ok_or(ProgramError::InvalidArgument)?;
        let rhs = self.plaintext(rhs).ok_or(ProgramError::InvalidArgument)?;
        // Ciphertext arithmetic wraps; bounds are the ledger's business.
        let combined = match op {
            CombineOp::Add => lhs.wrapping_add(rhs),
            CombineOp::Sub => lhs.wrapping_sub(rhs),
        };
        Ok(self.issue_handle(combined))
    }

    fn allowance_exists(&self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<bool> {
        let (address, _) = AllowanceRecord::derive_address(handle, grantee);
        Ok(self.state.allowances.contains_key(&address))
    }

    fn grant_allowance(&mut self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<Pubkey> {
        if self.plaintext(handle).is_none() {
            return Err(ProgramError::InvalidArgument.into());
        }
        let (address, _) = AllowanceRecord::derive_address(handle, grantee);
        if self.state.allowances.contains_key(&address) {
            return Err(ProgramError::AccountAlreadyInitialized.into());
        }
        self.state.allowances.insert(
            address,
            AllowanceRecord {
                handle,
                grantee: *grantee,
            },
        );
        Ok(address)
    }
}

impl ConfidentialLedger for SimHost {
    fn confidential_transfer(&mut self, transfer: &ConfidentialTransfer<'_>) -> Result<()> {
        let amount = decrypt(transfer.ciphertext).ok_or(ProgramError::InvalidInstructionData)?;

        let source = self
            .state
            .accounts
            .get(&transfer.source)
            .ok_or(ProgramError::UninitializedAccount)?;
        let destination = self
            .state
            .accounts
            .get(&transfer.destination)
            .ok_or(ProgramError::UninitializedAccount)?;

        if source.owner != transfer.authority {
            return Err(ProgramError::MissingRequiredSignature.into());
        }
        if source.mint != destination.mint {
            return Err(ProgramError::InvalidAccountData.into());
        }
        let decimals = self
            .state
            .mints
            .get(&source.mint)
            .map(|mint| mint.decimals)
            .ok_or(ProgramError::UninitializedAccount)?;
        if decimals != transfer.decimals {
            return Err(ProgramError::InvalidArgument.into());
        }
        if source.balance < amount {
            return Err(ProgramError::InsufficientFunds.into());
        }

        if let Some(source) = self.state.accounts.get_mut(&transfer.source) {
            source.balance -= amount;
        }
        if let Some(destination) = self.state.accounts.get_mut(&transfer.destination) {
            destination.balance = destination
                .balance
                .checked_add(amount)
                .ok_or(ProgramError::ArithmeticOverflow)?;
        }
        Ok(())
    }
}

impl UnitOfWork for SimHost {
    fn begin(&mut self) {
        self.checkpoint = Some(self.state.clone());
    }

    fn commit(&mut self) {
        self.checkpoint = None;
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.checkpoint.take() {
            self.state = snapshot;
        }
    }
}

/// Proof a requester attaches to a reveal. Stands in for a wallet signature
/// over `(handle, requester)`.
pub fn reveal_proof(handle: EncryptedHandle, requester: &Pubkey) -> [u8; 32] {
    let mut message = handle.to_le_bytes().to_vec();
    message.extend_from_slice(requester.as_ref());
    *blake3::keyed_hash(&PROOF_KEY, &message).as_bytes()
}

fn keystream(nonce: &[u8; NONCE_LEN]) -> [u8; 16] {
    let digest = blake3::keyed_hash(&CIPHER_KEY, nonce);
    let mut stream = [0u8; 16];
    stream.copy_from_slice(&digest.as_bytes()[..16]);
    stream
}

fn decrypt(ciphertext: &[u8]) -> Option<u128> {
    if ciphertext.len() != CIPHERTEXT_LEN {
        return None;
    }
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&ciphertext[..NONCE_LEN]);

    let mut plaintext = [0u8; 16];
    for ((out, byte), key) in plaintext
        .iter_mut()
        .zip(&ciphertext[NONCE_LEN..])
        .zip(keystream(&nonce).iter())
    {
        *out = byte ^ key;
    }
    Some(u128::from_le_bytes(plaintext))
}

/// Program harness: vault accounts keyed by PDA plus the simulated host.
#[derive(Default)]
pub struct SimProgram {
    pub host: SimHost,
    vaults: HashMap<Pubkey, FeeVault>,
}

impl SimProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vault(&self, address: &Pubkey) -> Option<&FeeVault> {
        self.vaults.get(address)
    }

    pub fn initialize(
        &mut self,
        authority: &Pubkey,
        token_mint: &Pubkey,
        vault_token_account: &Pubkey,
    ) -> Result<Pubkey> {
        let (address, bump) = FeeVault::derive_address(token_mint);
        let vault_token_state = self.host.ledger_account(vault_token_account);

        let mut vault = self.vaults.get(&address).cloned().unwrap_or_default();
        controller::initialize(
            &mut vault,
            InitializeParams {
                authority: *authority,
                token_mint: *token_mint,
                vault_address: address,
                bump,
                vault_token_account: *vault_token_account,
                vault_token_state,
            },
        )?;
        self.vaults.insert(address, vault);

        Ok(address)
    }

    pub fn collect_fee(
        &mut self,
        vault: &Pubkey,
        payer: &Pubkey,
        payer_token_account: &Pubkey,
        ciphertext: &[u8],
        decimals: u8,
    ) -> Result<EncryptedHandle> {
        let state = self
            .vaults
            .get_mut(vault)
            .ok_or_else(|| error!(ErrorCode::AccountNotInitialized))?;
        controller::collect_fee(
            state,
            &mut self.host,
            payer,
            payer_token_account,
            ciphertext,
            decimals,
        )
    }

    pub fn distribute(
        &mut self,
        vault: &Pubkey,
        signer: &Pubkey,
        recipient_token_account: &Pubkey,
        ciphertext: &[u8],
        decimals: u8,
    ) -> Result<EncryptedHandle> {
        let state = self
            .vaults
            .get_mut(vault)
            .ok_or_else(|| error!(ErrorCode::AccountNotInitialized))?;
        controller::distribute(
            state,
            &mut self.host,
            signer,
            vault,
            recipient_token_account,
            ciphertext,
            decimals,
        )
    }

    pub fn grant_decrypt_access(
        &mut self,
        vault: &Pubkey,
        signer: &Pubkey,
        handle: EncryptedHandle,
        grantee: &Pubkey,
    ) -> Result<Pubkey> {
        let state = self
            .vaults
            .get(vault)
            .ok_or_else(|| error!(ErrorCode::AccountNotInitialized))?;
        controller::grant_decrypt_access(state, &mut self.host, signer, handle, grantee)
    }

    pub fn settle_epoch(&mut self, vault: &Pubkey, signer: &Pubkey) -> Result<u64> {
        let state = self
            .vaults
            .get_mut(vault)
            .ok_or_else(|| error!(ErrorCode::AccountNotInitialized))?;
        controller::settle_epoch(state, signer)
    }
}

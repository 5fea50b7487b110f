use anchor_lang::prelude::*;
use bytemuck::{try_from_bytes, Pod, Zeroable};

use crate::{
    constants::{
        COPROCESSOR_PROGRAM_ID, FEE_VAULT_SEED, LEDGER_ACCOUNT_HEADER_LEN, TOKEN_LEDGER_PROGRAM_ID,
    },
    error::FeeVaultError,
    handle::EncryptedHandle,
};

#[account]
#[derive(Default, Debug, PartialEq, Eq)]
pub struct FeeVault {
    /// Admin allowed to distribute, grant decrypt access and settle
    pub authority: Pubkey,
    /// Confidential mint this vault collects fees in (one vault per mint)
    pub token_mint: Pubkey,
    /// Ledger token account holding collected fees, owned by the vault PDA
    pub vault_token_account: Pubkey,
    /// Running encrypted total of collected minus distributed fees
    pub total_fees_handle: EncryptedHandle,
    /// Amount sent by the most recent distribution
    pub pending_distribution_handle: EncryptedHandle,
    /// Set by settle_epoch; terminal
    pub is_closed: bool,
    /// Number of settled epochs
    pub epoch_id: u64,
    /// PDA bump seed
    pub bump: u8,
    /// Reserved for future upgrades
    pub _reserved: [u8; 32],
}

impl FeeVault {
    pub const LEN: usize = 8 +  // discriminator
        32 +  // authority
        32 +  // token_mint
        32 +  // vault_token_account
        16 +  // total_fees_handle
        16 +  // pending_distribution_handle
        1 +   // is_closed
        8 +   // epoch_id
        1 +   // bump
        32; // _reserved

    pub const SEED_PREFIX: &'static [u8] = FEE_VAULT_SEED;

    /// Address of the vault for `token_mint`.
    pub fn derive_address(token_mint: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[FEE_VAULT_SEED, token_mint.as_ref()], &crate::ID)
    }

    pub fn is_initialized(&self) -> bool {
        self.token_mint != Pubkey::default()
    }

    pub fn ensure_open(&self) -> Result<()> {
        require!(!self.is_closed, FeeVaultError::VaultClosed);
        Ok(())
    }

    pub fn ensure_authority(&self, signer: &Pubkey) -> Result<()> {
        require_keys_eq!(*signer, self.authority, FeeVaultError::Unauthorized);
        Ok(())
    }
}

/// Decryption grant stored by the coprocessor. The vault only derives its
/// address and requests its creation.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllowanceRecord {
    pub handle: EncryptedHandle,
    pub grantee: Pubkey,
}

impl AllowanceRecord {
    pub fn derive_address(handle: EncryptedHandle, grantee: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[&handle.to_le_bytes(), grantee.as_ref()],
            &COPROCESSOR_PROGRAM_ID,
        )
    }
}

/// The fields of a ledger token account the vault cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct LedgerAccountHeader {
    _discriminator: [u8; 8],
    mint: [u8; 32],
    owner: [u8; 32],
}

impl LedgerAccount {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let header = data.get(..LEDGER_ACCOUNT_HEADER_LEN)?;
        let header = try_from_bytes::<LedgerAccountHeader>(header).ok()?;
        Some(Self {
            mint: Pubkey::new_from_array(header.mint),
            owner: Pubkey::new_from_array(header.owner),
        })
    }

    pub fn try_from_account_info(info: &AccountInfo) -> Result<Self> {
        require_keys_eq!(
            *info.owner,
            TOKEN_LEDGER_PROGRAM_ID,
            FeeVaultError::InvalidVaultTokenAccount
        );
        let data = info.try_borrow_data()?;
        Self::from_bytes(&data).ok_or_else(|| error!(FeeVaultError::InvalidVaultTokenAccount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_matches_serialized_size() {
        let mut data = Vec::new();
        FeeVault::default().serialize(&mut data).unwrap();
        assert_eq!(8 + data.len(), FeeVault::LEN);
    }

    #[test]
    fn test_one_vault_address_per_mint() {
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        assert_eq!(FeeVault::derive_address(&mint_a), FeeVault::derive_address(&mint_a));
        assert_ne!(FeeVault::derive_address(&mint_a).0, FeeVault::derive_address(&mint_b).0);
    }

    #[test]
    fn test_allowance_address_binds_handle_and_grantee() {
        let bob = Pubkey::new_unique();
        let eve = Pubkey::new_unique();
        let handle = EncryptedHandle::from_raw(99);
        let (bob_allowance, _) = AllowanceRecord::derive_address(handle, &bob);
        assert_ne!(bob_allowance, AllowanceRecord::derive_address(handle, &eve).0);
        assert_ne!(
            bob_allowance,
            AllowanceRecord::derive_address(EncryptedHandle::from_raw(100), &bob).0
        );
    }

    #[test]
    fn test_uninitialized_vault() {
        let vault = FeeVault::default();
        assert!(!vault.is_initialized());
        assert!(vault.total_fees_handle.is_zero());
    }

    #[test]
    fn test_authority_check() {
        let authority = Pubkey::new_unique();
        let vault = FeeVault {
            authority,
            ..FeeVault::default()
        };
        assert!(vault.ensure_authority(&authority).is_ok());
        assert!(vault.ensure_authority(&Pubkey::new_unique()).is_err());
    }

    #[test]
    fn test_ledger_account_layout() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mut data = vec![0u8; 8];
        data.extend_from_slice(mint.as_ref());
        data.extend_from_slice(owner.as_ref());
        data.extend_from_slice(&[0u8; 16]);

        assert_eq!(LedgerAccount::from_bytes(&data), Some(LedgerAccount { mint, owner }));
        assert_eq!(LedgerAccount::from_bytes(&data[..60]), None);
        assert_eq!(
            std::mem::size_of::<LedgerAccountHeader>(),
            LEDGER_ACCOUNT_HEADER_LEN
        );
    }
}

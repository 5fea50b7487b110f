//! On-chain host: serves the controller's seams with cross-program
//! invocations into the coprocessor and the confidential token ledger.
//!
//! Coprocessor calls go through the `inco_lightning` CPI client. The ledger
//! publishes no client crate, so `transfer_checked` is encoded here in the
//! Anchor wire layout: an 8-byte `sha256("global:<name>")` discriminator
//! followed by Borsh arguments.

use anchor_lang::error::ErrorCode;
use anchor_lang::prelude::*;
use anchor_lang::solana_program::{
    hash::hash,
    instruction::{AccountMeta, Instruction},
    program::{invoke, invoke_signed},
};
use inco_lightning::cpi::accounts::{Allow, Operation};
use inco_lightning::cpi::{allow, e_add, e_sub, new_euint128};

use crate::{
    constants::{CIPHERTEXT_INPUT_TYPE, COPROCESSOR_PROGRAM_ID, ENCRYPTED_OPERANDS},
    error::FeeVaultError,
    handle::{CombineOp, EncryptedHandle},
    interfaces::{Coprocessor, ConfidentialLedger, ConfidentialTransfer, UnitOfWork},
    state::AllowanceRecord,
};

/// Ledger program and the mint every transfer is checked against.
pub struct LedgerAccounts<'info> {
    pub program: AccountInfo<'info>,
    pub mint: AccountInfo<'info>,
}

/// The vault PDA, able to sign for the vault token account.
pub struct VaultSigner<'info> {
    pub vault: AccountInfo<'info>,
    pub seeds: Vec<Vec<u8>>,
}

pub struct CpiHost<'info> {
    signer: AccountInfo<'info>,
    coprocessor_program: AccountInfo<'info>,
    system_program: AccountInfo<'info>,
    ledger: Option<LedgerAccounts<'info>>,
    vault_signer: Option<VaultSigner<'info>>,
    accounts: Vec<AccountInfo<'info>>,
}

impl<'info> CpiHost<'info> {
    /// `signer` authorizes coprocessor operations and pays for allowances.
    pub fn new(
        signer: AccountInfo<'info>,
        coprocessor_program: AccountInfo<'info>,
        system_program: AccountInfo<'info>,
    ) -> Self {
        Self {
            signer,
            coprocessor_program,
            system_program,
            ledger: None,
            vault_signer: None,
            accounts: Vec::new(),
        }
    }

    pub fn with_ledger(mut self, program: AccountInfo<'info>, mint: AccountInfo<'info>) -> Self {
        self.ledger = Some(LedgerAccounts { program, mint });
        self
    }

    pub fn with_vault_signer(mut self, vault: AccountInfo<'info>, seeds: Vec<Vec<u8>>) -> Self {
        self.vault_signer = Some(VaultSigner { vault, seeds });
        self
    }

    /// Accounts sub-calls may reference by key (token accounts, grantees,
    /// allowance accounts).
    pub fn with_accounts(mut self, accounts: Vec<AccountInfo<'info>>) -> Self {
        self.accounts.extend(accounts);
        self
    }

    fn account(&self, key: &Pubkey) -> Result<AccountInfo<'info>> {
        std::iter::once(&self.signer)
            .chain(self.vault_signer.as_ref().map(|signer| &signer.vault))
            .chain(self.accounts.iter())
            .find(|info| info.key == key)
            .cloned()
            .ok_or_else(|| error!(ErrorCode::AccountNotEnoughKeys))
    }

    /// Coprocessor operation context signed by `signer`.
    fn operation(&self) -> CpiContext<'_, '_, '_, 'info, Operation<'info>> {
        CpiContext::new(
            self.coprocessor_program.clone(),
            Operation {
                signer: self.signer.clone(),
            },
        )
    }
}

impl<'info> Coprocessor for CpiHost<'info> {
    fn submit_ciphertext(&mut self, ciphertext: &[u8]) -> Result<EncryptedHandle> {
        let handle = new_euint128(self.operation(), ciphertext.to_vec(), CIPHERTEXT_INPUT_TYPE)?;
        Ok(handle.into())
    }

    fn combine(
        &mut self,
        lhs: EncryptedHandle,
        rhs: EncryptedHandle,
        op: CombineOp,
    ) -> Result<EncryptedHandle> {
        let cpi_ctx = self.operation();
        let combined = match op {
            CombineOp::Add => e_add(cpi_ctx, lhs.into(), rhs.into(), ENCRYPTED_OPERANDS)?,
            CombineOp::Sub => e_sub(cpi_ctx, lhs.into(), rhs.into(), ENCRYPTED_OPERANDS)?,
        };
        Ok(combined.into())
    }

    fn allowance_exists(&self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<bool> {
        let (address, _) = AllowanceRecord::derive_address(handle, grantee);
        let allowance = self
            .account(&address)
            .map_err(|_| error!(FeeVaultError::InvalidAllowanceAccount))?;
        Ok(!allowance.data_is_empty() || allowance.lamports() > 0)
    }

    fn grant_allowance(&mut self, handle: EncryptedHandle, grantee: &Pubkey) -> Result<Pubkey> {
        let (address, _) = AllowanceRecord::derive_address(handle, grantee);
        let cpi_ctx = CpiContext::new(
            self.coprocessor_program.clone(),
            Allow {
                allowance_account: self.account(&address)?,
                signer: self.signer.clone(),
                allowed_address: self.account(grantee)?,
                system_program: self.system_program.clone(),
            },
        );
        allow(cpi_ctx, handle.to_raw(), true, *grantee)?;

        Ok(address)
    }
}

impl<'info> ConfidentialLedger for CpiHost<'info> {
    fn confidential_transfer(&mut self, transfer: &ConfidentialTransfer<'_>) -> Result<()> {
        let ledger = self
            .ledger
            .as_ref()
            .ok_or_else(|| error!(ErrorCode::AccountNotEnoughKeys))?;
        let source = self.account(&transfer.source)?;
        let destination = self.account(&transfer.destination)?;
        let authority = self.account(&transfer.authority)?;

        let ix = Instruction {
            program_id: *ledger.program.key,
            accounts: vec![
                AccountMeta::new(transfer.source, false),
                AccountMeta::new_readonly(*ledger.mint.key, false),
                AccountMeta::new(transfer.destination, false),
                AccountMeta::new_readonly(transfer.authority, true),
                AccountMeta::new_readonly(COPROCESSOR_PROGRAM_ID, false),
                AccountMeta::new_readonly(*self.system_program.key, false),
            ],
            data: instruction_data(
                "transfer_checked",
                &(transfer.ciphertext.to_vec(), CIPHERTEXT_INPUT_TYPE, transfer.decimals),
            )?,
        };
        let infos = [
            source,
            ledger.mint.clone(),
            destination,
            authority,
            self.coprocessor_program.clone(),
            self.system_program.clone(),
            ledger.program.clone(),
        ];

        match &self.vault_signer {
            Some(signer) if *signer.vault.key == transfer.authority => {
                let seeds: Vec<&[u8]> = signer.seeds.iter().map(Vec::as_slice).collect();
                invoke_signed(&ix, &infos, &[seeds.as_slice()])?;
            }
            _ => invoke(&ix, &infos)?,
        }

        Ok(())
    }
}

// The runtime discards every effect of a failed transaction, CPIs included,
// so there is nothing to stage here.
impl<'info> UnitOfWork for CpiHost<'info> {
    fn begin(&mut self) {}

    fn commit(&mut self) {}

    fn rollback(&mut self) {}
}

fn sighash(name: &str) -> [u8; 8] {
    let preimage = format!("global:{}", name);
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash(preimage.as_bytes()).to_bytes()[..8]);
    discriminator
}

fn instruction_data<T: AnchorSerialize>(name: &str, args: &T) -> Result<Vec<u8>> {
    let mut data = sighash(name).to_vec();
    args.serialize(&mut data)
        .map_err(|_| error!(ErrorCode::InstructionDidNotSerialize))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sighash_is_stable_and_distinct() {
        assert_eq!(sighash("e_add"), sighash("e_add"));
        assert_ne!(sighash("e_add"), sighash("e_sub"));
        assert_ne!(sighash("allow"), sighash("transfer_checked"));
    }

    #[test]
    fn test_transfer_instruction_layout() {
        let ciphertext = vec![9u8; 32];

        let data =
            instruction_data("transfer_checked", &(ciphertext.clone(), CIPHERTEXT_INPUT_TYPE, 6u8))
                .unwrap();

        assert_eq!(&data[8..12], &32u32.to_le_bytes());
        assert_eq!(&data[12..44], ciphertext.as_slice());
        assert_eq!(data[44], CIPHERTEXT_INPUT_TYPE);
        assert_eq!(data[45], 6);
    }
}

use anchor_lang::prelude::*;

pub const FEE_VAULT_SEED: &[u8] = b"fee_vault";

/// Confidential token ledger holding the encrypted balances.
pub const TOKEN_LEDGER_PROGRAM_ID: Pubkey = pubkey!("9y5V6sxRGNGCEWETbfuZFjpZPFn7CRCSrcn5rgZbCvSn");

/// Homomorphic coprocessor owning ciphertext handles and allowance records.
pub const COPROCESSOR_PROGRAM_ID: Pubkey = inco_lightning::ID;

/// Input type tag for client-encrypted ciphertext payloads.
pub const CIPHERTEXT_INPUT_TYPE: u8 = 0;

/// Scalar byte passed to combine: both operands are encrypted.
pub const ENCRYPTED_OPERANDS: u8 = 0;

/// Ledger token account prefix: discriminator | mint | owner
pub const LEDGER_ACCOUNT_HEADER_LEN: usize = 8 + 32 + 32;

use anchor_lang::prelude::*;

#[error_code]
pub enum FeeVaultError {
    #[msg("Fee vault already initialized for this mint")]
    AlreadyInitialized,

    #[msg("Vault token account mint does not match the vault mint")]
    InvalidMint,

    #[msg("Vault token account is not a ledger account held by the fee vault")]
    InvalidVaultTokenAccount,

    #[msg("Vault is closed")]
    VaultClosed,

    #[msg("Vault epoch already settled")]
    AlreadyClosed,

    #[msg("Unauthorized - caller is not vault authority")]
    Unauthorized,

    #[msg("Token ledger rejected the confidential transfer")]
    TransferRejected,

    #[msg("Coprocessor rejected the submitted ciphertext")]
    CiphertextRejected,

    #[msg("Coprocessor rejected the combine request")]
    CombineRejected,

    #[msg("Coprocessor rejected the allowance request")]
    AllowanceRejected,

    #[msg("Decryption allowance already exists for this handle and grantee")]
    AllowanceExists,

    #[msg("Allowance account does not match the derived address")]
    InvalidAllowanceAccount,

    #[msg("Handle is not the current pending distribution")]
    HandleMismatch,

    #[msg("No distribution has been made yet")]
    NoPendingDistribution,

    #[msg("Recipient cannot be the vault token account")]
    InvalidRecipient,

    #[msg("Invalid ciphertext format")]
    InvalidCiphertext,

    #[msg("Arithmetic overflow")]
    MathOverflow,
}

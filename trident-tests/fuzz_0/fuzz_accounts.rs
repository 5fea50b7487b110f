use trident_fuzz::fuzzing::*;

/// Storage for all account addresses used in fuzz testing.
///
/// Docs: https://ackee.xyz/trident/docs/latest/trident-api-macro/trident-types/fuzz-accounts/
#[derive(Default)]
pub struct AccountAddresses {
    pub fee_vault: AddressStorage,

    pub authority: AddressStorage,

    pub payer: AddressStorage,

    pub token_mint: AddressStorage,

    pub payer_token_account: AddressStorage,

    pub vault_token_account: AddressStorage,

    pub recipient_token_account: AddressStorage,

    pub allowance_account: AddressStorage,

    pub grantee: AddressStorage,

    pub token_ledger_program: AddressStorage,

    pub coprocessor_program: AddressStorage,

    pub system_program: AddressStorage,
}

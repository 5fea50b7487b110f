use anchor_lang::prelude::*;

#[event]
pub struct VaultInitialized {
    pub vault: Pubkey,
    pub authority: Pubkey,
    pub token_mint: Pubkey,
    pub vault_token_account: Pubkey,
}

#[event]
pub struct FeeCollected {
    pub vault: Pubkey,
    pub payer: Pubkey,
    pub fee_handle: u128,
    pub total_fees_handle: u128,
}

#[event]
pub struct Distributed {
    pub vault: Pubkey,
    pub recipient_token_account: Pubkey,
    pub pending_distribution_handle: u128,
    pub total_fees_handle: u128,
}

#[event]
pub struct DecryptAccessGranted {
    pub vault: Pubkey,
    pub handle: u128,
    pub grantee: Pubkey,
    pub allowance: Pubkey,
}

#[event]
pub struct EpochSettled {
    pub vault: Pubkey,
    pub epoch_id: u64,
}

use anchor_lang::prelude::Pubkey;
use confidential_fee_vault::{
    constants::CIPHERTEXT_INPUT_TYPE,
    handle::EncryptedHandle,
    sim::{reveal_proof, SimProgram},
    state::FeeVault,
};
use fuzz_accounts::*;
use trident_fuzz::fuzzing::*;
mod fuzz_accounts;

const DECIMALS: u8 = 6;

/// Plaintext model of the vault, checked against the simulated coprocessor
#[derive(Default, Clone)]
struct VaultTracker {
    vault: Pubkey,
    authority: Pubkey,
    payer: Pubkey,
    payer_token_account: Pubkey,
    vault_token_account: Pubkey,
    recipient_token_account: Pubkey,
    payer_funds: u128,
    total_fees: u128,
    distributed: u128,
    pending: u128,
    epoch_id: u64,
    closed: bool,
}

#[derive(FuzzTestMethods)]
struct FuzzTest {
    trident: Trident,
    fuzz_accounts: AccountAddresses,
    program: SimProgram,
    vault_tracker: VaultTracker,
}

#[flow_executor]
impl FuzzTest {
    fn new() -> Self {
        Self {
            trident: Trident::default(),
            fuzz_accounts: AccountAddresses::default(),
            program: SimProgram::new(),
            vault_tracker: VaultTracker::default(),
        }
    }

    /// Fresh ledger, funded payer and an initialized vault per iteration
    #[init]
    fn start(&mut self) {
        self.program = SimProgram::new();

        let authority = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let mint_authority = Pubkey::new_unique();
        let host = &mut self.program.host;

        let mint = host.create_mint(DECIMALS, &mint_authority, None);
        let (vault_address, _) = FeeVault::derive_address(&mint);

        let vault_token_account = Pubkey::new_unique();
        let payer_token_account = Pubkey::new_unique();
        let recipient_token_account = Pubkey::new_unique();
        host.create_account(&vault_token_account, &mint, &vault_address).unwrap();
        host.create_account(&payer_token_account, &mint, &payer).unwrap();
        host.create_account(&recipient_token_account, &mint, &Pubkey::new_unique()).unwrap();

        let payer_funds = rand::random::<u128>() % 1_000_000_000_000;
        let funding = host.encrypt(payer_funds);
        host.mint_to(
            &mint,
            &payer_token_account,
            &mint_authority,
            &funding,
            CIPHERTEXT_INPUT_TYPE,
            DECIMALS,
        )
        .unwrap();

        let vault = self
            .program
            .initialize(&authority, &mint, &vault_token_account)
            .unwrap();
        assert_eq!(vault, vault_address);

        self.vault_tracker = VaultTracker {
            vault,
            authority,
            payer,
            payer_token_account,
            vault_token_account,
            recipient_token_account,
            payer_funds,
            ..VaultTracker::default()
        };
    }

    /// Collect a random fee, sometimes more than the payer holds
    #[flow]
    fn flow_collect_fee(&mut self) {
        let tracker = &self.vault_tracker;
        let amount = rand::random::<u128>() % (tracker.payer_funds / 4 + 2);
        let ciphertext = self.program.host.encrypt(amount);

        let result = self.program.collect_fee(
            &tracker.vault,
            &tracker.payer,
            &tracker.payer_token_account,
            &ciphertext,
            DECIMALS,
        );

        let payer_balance = tracker.payer_funds - tracker.total_fees;
        if tracker.closed || amount > payer_balance {
            assert!(result.is_err(), "Invariant: rejected fee must fail");
        } else {
            let fee = result.unwrap();
            assert_eq!(self.program.host.plaintext(fee), Some(amount));
            self.vault_tracker.total_fees += amount;
        }
    }

    /// Distribute a random amount, sometimes more than the vault holds
    #[flow]
    fn flow_distribute(&mut self) {
        let tracker = &self.vault_tracker;
        let held = tracker.total_fees - tracker.distributed;
        let amount = rand::random::<u128>() % (held + 2);
        let ciphertext = self.program.host.encrypt(amount);

        let result = self.program.distribute(
            &tracker.vault,
            &tracker.authority,
            &tracker.recipient_token_account,
            &ciphertext,
            DECIMALS,
        );

        if tracker.closed || amount > held {
            assert!(result.is_err(), "Invariant: rejected distribution must fail");
        } else {
            let pending = result.unwrap();
            assert_eq!(self.program.host.plaintext(pending), Some(amount));
            self.vault_tracker.distributed += amount;
            self.vault_tracker.pending = amount;
        }
    }

    /// Non-authority signers never move funds
    #[flow]
    fn flow_distribute_unauthorized(&mut self) {
        let tracker = &self.vault_tracker;
        let intruder = Pubkey::new_unique();
        let ciphertext = self.program.host.encrypt(1);

        let result = self.program.distribute(
            &tracker.vault,
            &intruder,
            &tracker.recipient_token_account,
            &ciphertext,
            DECIMALS,
        );
        assert!(result.is_err(), "Invariant: only the authority distributes");
    }

    /// Grant access to the pending distribution and decrypt it
    #[flow]
    fn flow_grant_decrypt_access(&mut self) {
        let tracker = &self.vault_tracker;
        let Some(vault) = self.program.vault(&tracker.vault) else {
            return;
        };
        let handle = vault.pending_distribution_handle;
        let grantee = Pubkey::new_unique();

        let result =
            self.program
                .grant_decrypt_access(&tracker.vault, &tracker.authority, handle, &grantee);

        if handle == EncryptedHandle::ZERO {
            assert!(result.is_err(), "Invariant: nothing to grant before a distribution");
            return;
        }
        result.unwrap();

        let revealed = self
            .program
            .host
            .reveal(handle, &grantee, &reveal_proof(handle, &grantee))
            .unwrap();
        assert_eq!(revealed, tracker.pending);

        let outsider = Pubkey::new_unique();
        assert!(self
            .program
            .host
            .reveal(handle, &outsider, &reveal_proof(handle, &outsider))
            .is_err());
    }

    /// Settle rarely so most iterations exercise an open vault
    #[flow]
    fn flow_settle_epoch(&mut self) {
        if rand::random::<u8>() % 8 != 0 {
            return;
        }
        let tracker = &self.vault_tracker;
        let result = self.program.settle_epoch(&tracker.vault, &tracker.authority);

        if tracker.closed {
            assert!(result.is_err(), "Invariant: settlement is one-shot");
        } else {
            self.vault_tracker.epoch_id = result.unwrap();
            self.vault_tracker.closed = true;
        }
    }

    #[end]
    fn end(&mut self) {
        let tracker = &self.vault_tracker;
        let vault = self.program.vault(&tracker.vault).unwrap();
        let host = &self.program.host;

        // Invariant: the encrypted total matches what the vault custodies
        let held = tracker.total_fees - tracker.distributed;
        assert_eq!(host.plaintext(vault.total_fees_handle), Some(held));
        assert_eq!(host.balance(&tracker.vault_token_account), Some(held));

        // Invariant: value is conserved across payer, vault and recipient
        assert_eq!(
            host.balance(&tracker.payer_token_account),
            Some(tracker.payer_funds - tracker.total_fees)
        );
        assert_eq!(
            host.balance(&tracker.recipient_token_account),
            Some(tracker.distributed)
        );

        // Invariant: pending reflects only the latest distribution
        assert_eq!(
            host.plaintext(vault.pending_distribution_handle),
            Some(tracker.pending)
        );

        assert_eq!(vault.is_closed, tracker.closed);
        assert_eq!(vault.epoch_id, tracker.epoch_id);
    }
}

fn main() {
    // Run 1000 iterations with up to 100 flows per iteration
    FuzzTest::fuzz(1000, 100);
}

pub mod collect_fee;
pub mod distribute;
pub mod grant_decrypt_access;
pub mod initialize;
pub mod settle_epoch;
pub mod view;

#[allow(ambiguous_glob_reexports)]
pub use collect_fee::*;
#[allow(ambiguous_glob_reexports)]
pub use distribute::*;
#[allow(ambiguous_glob_reexports)]
pub use grant_decrypt_access::*;
#[allow(ambiguous_glob_reexports)]
pub use initialize::*;
#[allow(ambiguous_glob_reexports)]
pub use settle_epoch::*;
#[allow(ambiguous_glob_reexports)]
pub use view::*;

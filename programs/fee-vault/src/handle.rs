use anchor_lang::prelude::*;
use inco_lightning::types::Euint128;

/// Opaque reference to a ciphertext owned by the coprocessor.
///
/// A handle says nothing about the plaintext behind it and exposes no
/// arithmetic. New handles only come out of the coprocessor, either by
/// submitting a ciphertext or by combining two existing handles.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EncryptedHandle(u128);

impl EncryptedHandle {
    /// Well-known handle of an encrypted zero.
    pub const ZERO: Self = Self(0);

    pub const LEN: usize = 16;

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Little-endian bytes, as used in allowance seeds and return data.
    pub fn to_le_bytes(self) -> [u8; Self::LEN] {
        self.0.to_le_bytes()
    }
}

impl From<Euint128> for EncryptedHandle {
    fn from(value: Euint128) -> Self {
        Self(value.0)
    }
}

impl From<EncryptedHandle> for Euint128 {
    fn from(handle: EncryptedHandle) -> Self {
        Euint128(handle.0)
    }
}

/// Homomorphic operation requested from the coprocessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineOp {
    Add,
    Sub,
}

impl CombineOp {
    /// Coprocessor instruction implementing this operation.
    pub fn instruction_name(self) -> &'static str {
        match self {
            CombineOp::Add => "e_add",
            CombineOp::Sub => "e_sub",
        }
    }
}

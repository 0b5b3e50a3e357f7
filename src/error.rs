//! Error types for staking output construction, signing and witness assembly
//!
//! Errors are grouped by the phase that raises them:
//! - [`ConfigurationError`] at build time (keys, thresholds, lock parameters)
//! - [`CryptographicError`] at sign time (sighash, BIP-340 signing)
//! - [`WitnessAssemblyError`] at witness build time (slot counts, spend path)
//!
//! An interpreter rejecting a witness is not an error of this crate.

use thiserror::Error;

use crate::descriptor::SpendPath;
use crate::keys::KeyRole;

/// Build-time errors. Never recoverable by retrying with the same inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("invalid covenant threshold {threshold}: must be between 1 and {keys}")]
    InvalidThreshold { threshold: u32, keys: usize },

    #[error("{role} key list is empty")]
    EmptyKeySet { role: KeyRole },

    #[error("{role} key at index {index} is not a valid x-only public key: {reason}")]
    KeySerialization {
        role: KeyRole,
        index: usize,
        reason: String,
    },

    #[error("timelock must be at least one block")]
    InvalidTimelock,

    #[error("invalid staking amount: {0} sats")]
    InvalidAmount(u64),

    #[error("failed to build taproot tree: {0}")]
    TaprootBuild(String),
}

/// Sign-time errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptographicError {
    #[error("sighash computation failed: {0}")]
    SighashComputation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature does not verify for key {0}")]
    InvalidSignature(String),
}

/// Witness build errors. The caller must fix the supplied signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WitnessAssemblyError {
    #[error("{role} signature count mismatch: expected {expected} slots, got {actual}")]
    SignatureCountMismatch {
        role: KeyRole,
        expected: usize,
        actual: usize,
    },

    #[error("spend info is for the {found} path, expected {expected}")]
    WrongSpendPath { expected: SpendPath, found: SpendPath },

    #[error("signature supplied for {role} key {key} which is not committed in the script")]
    UnknownSigner { role: KeyRole, key: String },
}

/// Root error type for the staking core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("cryptographic error: {0}")]
    Cryptographic(#[from] CryptographicError),

    #[error("witness assembly error: {0}")]
    WitnessAssembly(#[from] WitnessAssemblyError),
}

impl StakingError {
    /// Get a stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            StakingError::Configuration(ConfigurationError::InvalidThreshold { .. }) => {
                "INVALID_THRESHOLD"
            }
            StakingError::Configuration(ConfigurationError::EmptyKeySet { .. }) => "EMPTY_KEY_SET",
            StakingError::Configuration(ConfigurationError::KeySerialization { .. }) => {
                "KEY_SERIALIZATION_ERROR"
            }
            StakingError::Configuration(_) => "CONFIGURATION_ERROR",
            StakingError::Cryptographic(CryptographicError::SighashComputation(_)) => {
                "SIGHASH_COMPUTATION_ERROR"
            }
            StakingError::Cryptographic(CryptographicError::Signing(_)) => "SIGNING_ERROR",
            StakingError::Cryptographic(CryptographicError::InvalidSignature(_)) => {
                "INVALID_SIGNATURE"
            }
            StakingError::WitnessAssembly(WitnessAssemblyError::SignatureCountMismatch {
                ..
            }) => "SIGNATURE_COUNT_MISMATCH",
            StakingError::WitnessAssembly(WitnessAssemblyError::WrongSpendPath { .. }) => {
                "WRONG_SPEND_PATH"
            }
            StakingError::WitnessAssembly(WitnessAssemblyError::UnknownSigner { .. }) => {
                "UNKNOWN_SIGNER"
            }
        }
    }

    /// Check if retrying the same call could succeed
    ///
    /// Every operation is a pure function of its inputs, so this is always false.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias using StakingError
pub type Result<T> = std::result::Result<T, StakingError>;

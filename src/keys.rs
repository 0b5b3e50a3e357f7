//! Key & threshold model
//!
//! Validates the staker key, the restaked validator keys, the covenant
//! committee and its signature threshold, and owns the single ordering rule
//! shared by script compilation and witness assembly.

use std::fmt;

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Amount, Network, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Role a public key plays in the staking contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Staker,
    Validator,
    Covenant,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Staker => write!(f, "staker"),
            KeyRole::Validator => write!(f, "validator"),
            KeyRole::Covenant => write!(f, "covenant"),
        }
    }
}

/// Order keys the way their signatures appear in a witness.
///
/// Keys are sorted by descending byte-lexicographic order of their 32-byte
/// serialization. Scripts push the same keys in reverse, so the first key a
/// script checks consumes the top-most witness element. Duplicates are kept.
pub fn witness_order(keys: &[XOnlyPublicKey]) -> Vec<XOnlyPublicKey> {
    let mut sorted = keys.to_vec();
    sorted.sort_by(|a, b| b.serialize().cmp(&a.serialize()));
    sorted
}

/// Normalize a serialized public key to x-only form.
///
/// Accepts 32-byte BIP-340 x-only keys and 33-byte compressed SEC1 keys.
pub fn normalize_key(
    bytes: &[u8],
    role: KeyRole,
    index: usize,
) -> Result<XOnlyPublicKey, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::KeySerialization {
        role,
        index,
        reason,
    };

    match bytes.len() {
        32 => XOnlyPublicKey::from_slice(bytes).map_err(|e| invalid(e.to_string())),
        33 => PublicKey::from_slice(bytes)
            .map(|pk| pk.x_only_public_key().0)
            .map_err(|e| invalid(e.to_string())),
        len => Err(invalid(format!("expected 32 or 33 bytes, got {}", len))),
    }
}

/// Keys committed into the staking output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    staker: XOnlyPublicKey,
    validators: Vec<XOnlyPublicKey>,
    covenant: Vec<XOnlyPublicKey>,
    covenant_threshold: u32,
}

impl KeySet {
    /// Create a validated key set
    pub fn new(
        staker: XOnlyPublicKey,
        validators: Vec<XOnlyPublicKey>,
        covenant: Vec<XOnlyPublicKey>,
        covenant_threshold: u32,
    ) -> Result<Self, ConfigurationError> {
        if validators.is_empty() {
            return Err(ConfigurationError::EmptyKeySet {
                role: KeyRole::Validator,
            });
        }
        if covenant.is_empty() {
            return Err(ConfigurationError::EmptyKeySet {
                role: KeyRole::Covenant,
            });
        }
        if covenant_threshold == 0 || covenant_threshold as usize > covenant.len() {
            return Err(ConfigurationError::InvalidThreshold {
                threshold: covenant_threshold,
                keys: covenant.len(),
            });
        }

        Ok(Self {
            staker,
            validators,
            covenant,
            covenant_threshold,
        })
    }

    /// Create a key set from serialized keys (32-byte x-only or 33-byte compressed)
    pub fn from_slices<S: AsRef<[u8]>>(
        staker: &[u8],
        validators: &[S],
        covenant: &[S],
        covenant_threshold: u32,
    ) -> Result<Self, ConfigurationError> {
        let staker = normalize_key(staker, KeyRole::Staker, 0)?;
        let validators = validators
            .iter()
            .enumerate()
            .map(|(i, k)| normalize_key(k.as_ref(), KeyRole::Validator, i))
            .collect::<Result<Vec<_>, _>>()?;
        let covenant = covenant
            .iter()
            .enumerate()
            .map(|(i, k)| normalize_key(k.as_ref(), KeyRole::Covenant, i))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(staker, validators, covenant, covenant_threshold)
    }

    pub fn staker(&self) -> &XOnlyPublicKey {
        &self.staker
    }

    /// Validator keys in caller order
    pub fn validators(&self) -> &[XOnlyPublicKey] {
        &self.validators
    }

    /// Covenant keys in caller order
    pub fn covenant(&self) -> &[XOnlyPublicKey] {
        &self.covenant
    }

    pub fn covenant_threshold(&self) -> u32 {
        self.covenant_threshold
    }
}

/// Amount, relative timelock and network of a staking output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockParams {
    staking_amount: Amount,
    timelock_blocks: u16,
    network: Network,
}

impl LockParams {
    /// Create validated lock parameters
    pub fn new(
        staking_amount: Amount,
        timelock_blocks: u16,
        network: Network,
    ) -> Result<Self, ConfigurationError> {
        if staking_amount == Amount::ZERO || staking_amount > Amount::MAX_MONEY {
            return Err(ConfigurationError::InvalidAmount(staking_amount.to_sat()));
        }
        if timelock_blocks == 0 {
            return Err(ConfigurationError::InvalidTimelock);
        }

        Ok(Self {
            staking_amount,
            timelock_blocks,
            network,
        })
    }

    pub fn staking_amount(&self) -> Amount {
        self.staking_amount
    }

    pub fn timelock_blocks(&self) -> u16 {
        self.timelock_blocks
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

//! Script template builder
//!
//! Compiles the three staking leaf scripts:
//!
//! ```text
//! timelock:  <staker> OP_CHECKSIGVERIFY <blocks> OP_CHECKSEQUENCEVERIFY
//! unbonding: <staker> OP_CHECKSIGVERIFY <covenant k-of-n>
//! slashing:  <staker> OP_CHECKSIGVERIFY <validator 1-of-m> OP_VERIFY <covenant k-of-n>
//! ```
//!
//! A k-of-n check accumulates one signature per key and compares the count:
//!
//! ```text
//! <pk_1> OP_CHECKSIG <pk_2> OP_CHECKSIGADD ... <pk_n> OP_CHECKSIGADD <k> OP_GREATERTHANOREQUAL
//! ```
//!
//! Keys are pushed in reverse [`witness_order`], so the witness lists
//! signatures in descending key order.

use bitcoin::opcodes::all::*;
use bitcoin::script::Builder as ScriptBuilder;
use bitcoin::taproot::LeafVersion;
use bitcoin::{ScriptBuf, XOnlyPublicKey};

use crate::error::ConfigurationError;
use crate::keys::{witness_order, KeyRole, KeySet, LockParams};

/// Threshold required from the validator set on the slashing path
pub const VALIDATOR_SLASHING_THRESHOLD: u32 = 1;

/// Build a standalone threshold-over-key-list script
///
/// With `verify` set, the script leaves nothing on the stack and fails unless
/// at least `threshold` signatures are valid.
pub fn threshold_script(
    keys: &[XOnlyPublicKey],
    threshold: u32,
    role: KeyRole,
    verify: bool,
) -> Result<ScriptBuf, ConfigurationError> {
    if keys.is_empty() {
        return Err(ConfigurationError::EmptyKeySet { role });
    }
    if threshold == 0 || threshold as usize > keys.len() {
        return Err(ConfigurationError::InvalidThreshold {
            threshold,
            keys: keys.len(),
        });
    }

    Ok(push_threshold_check(ScriptBuilder::new(), keys, threshold, verify).into_script())
}

fn push_threshold_check(
    builder: ScriptBuilder,
    keys: &[XOnlyPublicKey],
    threshold: u32,
    verify: bool,
) -> ScriptBuilder {
    let ordered = witness_order(keys);

    if ordered.len() == 1 && threshold == 1 {
        let op = if verify { OP_CHECKSIGVERIFY } else { OP_CHECKSIG };
        return builder.push_x_only_key(&ordered[0]).push_opcode(op);
    }

    let mut builder = builder;
    for (i, key) in ordered.iter().rev().enumerate() {
        let op = if i == 0 { OP_CHECKSIG } else { OP_CHECKSIGADD };
        builder = builder.push_x_only_key(key).push_opcode(op);
    }

    builder = builder
        .push_int(threshold as i64)
        .push_opcode(OP_GREATERTHANOREQUAL);

    if verify {
        builder.push_opcode(OP_VERIFY)
    } else {
        builder
    }
}

fn push_staker_check(builder: ScriptBuilder, staker: &XOnlyPublicKey) -> ScriptBuilder {
    builder
        .push_x_only_key(staker)
        .push_opcode(OP_CHECKSIGVERIFY)
}

/// Build the staker-only timelock script
pub fn build_timelock_script(staker: &XOnlyPublicKey, timelock_blocks: u16) -> ScriptBuf {
    push_staker_check(ScriptBuilder::new(), staker)
        .push_int(timelock_blocks as i64)
        .push_opcode(OP_CSV)
        .into_script()
}

/// Build the covenant-approved early unbonding script
pub fn build_unbonding_script(keys: &KeySet) -> ScriptBuf {
    let builder = push_staker_check(ScriptBuilder::new(), keys.staker());
    push_threshold_check(builder, keys.covenant(), keys.covenant_threshold(), false).into_script()
}

/// Build the slashing script
pub fn build_slashing_script(keys: &KeySet) -> ScriptBuf {
    let builder = push_staker_check(ScriptBuilder::new(), keys.staker());
    let builder = push_threshold_check(
        builder,
        keys.validators(),
        VALIDATOR_SLASHING_THRESHOLD,
        true,
    );
    push_threshold_check(builder, keys.covenant(), keys.covenant_threshold(), false).into_script()
}

/// The three compiled leaf scripts of a staking output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafScripts {
    pub timelock: ScriptBuf,
    pub unbonding: ScriptBuf,
    pub slashing: ScriptBuf,
}

impl LeafScripts {
    /// Compile all leaves. Deterministic for identical inputs.
    pub fn new(keys: &KeySet, params: &LockParams) -> Self {
        let scripts = Self {
            timelock: build_timelock_script(keys.staker(), params.timelock_blocks()),
            unbonding: build_unbonding_script(keys),
            slashing: build_slashing_script(keys),
        };

        tracing::debug!(
            validators = keys.validators().len(),
            covenant = keys.covenant().len(),
            threshold = keys.covenant_threshold(),
            timelock_blocks = params.timelock_blocks(),
            "Compiled staking leaf scripts"
        );

        scripts
    }

    /// Leaf version shared by every staking leaf
    pub fn leaf_version() -> LeafVersion {
        LeafVersion::TapScript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Keypair, Secp256k1};
    use bitcoin::{Amount, Network};

    fn key(seed: u8) -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        Keypair::from_seckey_slice(&secp, &[seed; 32])
            .unwrap()
            .x_only_public_key()
            .0
    }

    fn key_set(validators: u8, covenant: u8, threshold: u32) -> KeySet {
        KeySet::new(
            key(1),
            (0..validators).map(|i| key(10 + i)).collect(),
            (0..covenant).map(|i| key(40 + i)).collect(),
            threshold,
        )
        .unwrap()
    }

    #[test]
    fn test_timelock_script_layout() {
        let script = build_timelock_script(&key(1), 150);
        let asm = script.to_asm_string();

        assert!(asm.starts_with("OP_PUSHBYTES_32"));
        assert!(asm.contains("OP_CHECKSIGVERIFY"));
        assert!(asm.ends_with("OP_CSV"));
    }

    #[test]
    fn test_threshold_script_pushes_keys_ascending() {
        let keys: Vec<_> = (40..45).map(key).collect();
        let script = threshold_script(&keys, 3, KeyRole::Covenant, false).unwrap();

        let pushed: Vec<[u8; 32]> = script
            .instructions()
            .filter_map(|ins| match ins.unwrap() {
                bitcoin::script::Instruction::PushBytes(bytes) if bytes.len() == 32 => {
                    Some(bytes.as_bytes().try_into().unwrap())
                }
                _ => None,
            })
            .collect();

        assert_eq!(pushed.len(), 5);
        for pair in pushed.windows(2) {
            assert!(pair[0] <= pair[1]);
        }

        let asm = script.to_asm_string();
        assert_eq!(asm.matches("OP_CHECKSIGADD").count(), 4);
        assert!(asm.ends_with("OP_PUSHNUM_3 OP_GREATERTHANOREQUAL"));
    }

    #[test]
    fn test_threshold_script_verify_suffix() {
        let keys: Vec<_> = (10..12).map(key).collect();
        let script = threshold_script(&keys, 1, KeyRole::Validator, true).unwrap();
        assert!(script.to_asm_string().ends_with("OP_GREATERTHANOREQUAL OP_VERIFY"));
    }

    #[test]
    fn test_single_key_threshold_is_plain_checksig() {
        let script = threshold_script(&[key(3)], 1, KeyRole::Covenant, false).unwrap();
        let asm = script.to_asm_string();
        assert!(asm.ends_with("OP_CHECKSIG"));
        assert!(!asm.contains("OP_CHECKSIGADD"));

        let script = threshold_script(&[key(3)], 1, KeyRole::Validator, true).unwrap();
        assert!(script.to_asm_string().ends_with("OP_CHECKSIGVERIFY"));
    }

    #[test]
    fn test_threshold_script_rejects_bad_threshold() {
        let keys = vec![key(1), key(2)];
        assert!(matches!(
            threshold_script(&keys, 3, KeyRole::Covenant, false),
            Err(ConfigurationError::InvalidThreshold { threshold: 3, keys: 2 })
        ));
        assert!(matches!(
            threshold_script(&[], 1, KeyRole::Validator, false),
            Err(ConfigurationError::EmptyKeySet {
                role: KeyRole::Validator
            })
        ));
    }

    #[test]
    fn test_script_size_grows_linearly() {
        let small = build_unbonding_script(&key_set(1, 4, 2));
        let large = build_unbonding_script(&key_set(1, 8, 2));
        // each key adds a 32-byte push plus OP_CHECKSIGADD
        assert_eq!(large.len() - small.len(), 4 * 34);
    }

    #[test]
    fn test_slashing_contains_both_checks() {
        let keys = key_set(2, 5, 3);
        let asm = build_slashing_script(&keys).to_asm_string();

        assert_eq!(asm.matches("OP_GREATERTHANOREQUAL").count(), 2);
        assert_eq!(asm.matches("OP_VERIFY").count(), 1);
        assert!(asm.ends_with("OP_PUSHNUM_3 OP_GREATERTHANOREQUAL"));
    }

    #[test]
    fn test_caller_order_does_not_change_scripts() {
        let params = LockParams::new(Amount::from_sat(50_000), 10, Network::Regtest).unwrap();
        let covenant: Vec<_> = (40..45).map(key).collect();
        let mut shuffled = covenant.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        let a = KeySet::new(key(1), vec![key(10)], covenant, 3).unwrap();
        let b = KeySet::new(key(1), vec![key(10)], shuffled, 3).unwrap();

        assert_eq!(LeafScripts::new(&a, &params), LeafScripts::new(&b, &params));
    }
}

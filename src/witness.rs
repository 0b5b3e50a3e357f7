//! Witness assembly for the three spend paths
//!
//! Stacks are laid out bottom to top as
//!
//! ```text
//! [covenant slots..., validator slots..., staker_sig, leaf_script, control_block]
//! ```
//!
//! Slots follow [`witness_order`](crate::keys::witness_order). A missing
//! signature is pushed as an empty element so every key keeps its position.
//! Whether enough signatures are present is left to the interpreter.

use std::collections::BTreeMap;

use bitcoin::secp256k1::schnorr;
use bitcoin::sighash::TapSighashType;
use bitcoin::{taproot, Witness, XOnlyPublicKey};

use crate::descriptor::{SpendInfo, SpendPath};
use crate::error::WitnessAssemblyError;
use crate::keys::KeyRole;

/// One position in a threshold check: a signature, or nothing
pub type SignatureSlot = Option<schnorr::Signature>;

fn signature_bytes(signature: &schnorr::Signature) -> Vec<u8> {
    taproot::Signature {
        signature: *signature,
        sighash_type: TapSighashType::Default,
    }
    .to_vec()
}

fn expect_path(info: &SpendInfo, expected: SpendPath) -> Result<(), WitnessAssemblyError> {
    if info.path() != expected {
        return Err(WitnessAssemblyError::WrongSpendPath {
            expected,
            found: info.path(),
        });
    }
    Ok(())
}

fn expect_slots(
    slots: &[SignatureSlot],
    order: &[XOnlyPublicKey],
    role: KeyRole,
) -> Result<(), WitnessAssemblyError> {
    if slots.len() != order.len() {
        return Err(WitnessAssemblyError::SignatureCountMismatch {
            role,
            expected: order.len(),
            actual: slots.len(),
        });
    }
    Ok(())
}

fn push_slots(witness: &mut Witness, slots: &[SignatureSlot]) {
    for slot in slots {
        match slot {
            Some(signature) => witness.push(signature_bytes(signature)),
            None => witness.push(Vec::<u8>::new()),
        }
    }
}

fn finish(
    mut witness: Witness,
    info: &SpendInfo,
    staker_sig: &schnorr::Signature,
) -> Witness {
    witness.push(signature_bytes(staker_sig));
    witness.push(info.leaf_script().as_bytes());
    witness.push(info.control_block_bytes());

    tracing::debug!(
        path = %info.path(),
        elements = witness.len(),
        "Assembled staking witness"
    );

    witness
}

/// Witness for the staker-only timelock path
///
/// The spending input's sequence must encode at least the lock's block count.
pub fn timelock_witness(
    info: &SpendInfo,
    staker_sig: &schnorr::Signature,
) -> Result<Witness, WitnessAssemblyError> {
    expect_path(info, SpendPath::TimeLock)?;
    Ok(finish(Witness::new(), info, staker_sig))
}

/// Witness for the covenant-approved unbonding path
///
/// `covenant_slots` must have one entry per covenant key in witness order.
pub fn unbonding_witness(
    info: &SpendInfo,
    covenant_slots: &[SignatureSlot],
    staker_sig: &schnorr::Signature,
) -> Result<Witness, WitnessAssemblyError> {
    expect_path(info, SpendPath::Unbonding)?;
    expect_slots(covenant_slots, info.covenant_order(), KeyRole::Covenant)?;

    let mut witness = Witness::new();
    push_slots(&mut witness, covenant_slots);
    Ok(finish(witness, info, staker_sig))
}

/// Witness for the slashing path
pub fn slashing_witness(
    info: &SpendInfo,
    covenant_slots: &[SignatureSlot],
    validator_slots: &[SignatureSlot],
    staker_sig: &schnorr::Signature,
) -> Result<Witness, WitnessAssemblyError> {
    expect_path(info, SpendPath::Slashing)?;
    expect_slots(covenant_slots, info.covenant_order(), KeyRole::Covenant)?;
    expect_slots(validator_slots, info.validator_order(), KeyRole::Validator)?;

    let mut witness = Witness::new();
    push_slots(&mut witness, covenant_slots);
    push_slots(&mut witness, validator_slots);
    Ok(finish(witness, info, staker_sig))
}

/// Place keyed signatures into positional slots
///
/// `order` is a witness order as returned by
/// [`SpendInfo::covenant_order`] or [`SpendInfo::validator_order`]. Keys
/// without a signature get an empty slot. A signature for a key that is not
/// in `order` is an error.
pub fn slots_by_key(
    order: &[XOnlyPublicKey],
    signatures: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
    role: KeyRole,
) -> Result<Vec<SignatureSlot>, WitnessAssemblyError> {
    if let Some(unknown) = signatures.keys().find(|k| !order.contains(k)) {
        return Err(WitnessAssemblyError::UnknownSigner {
            role,
            key: unknown.to_string(),
        });
    }

    Ok(order.iter().map(|k| signatures.get(k).copied()).collect())
}

//! Script-path sighash and BIP-340 signing
//!
//! Every staking signature commits to the full transaction, all spent
//! outputs and the tapleaf being executed (`SIGHASH_DEFAULT`).

use std::collections::{BTreeMap, HashMap};

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{schnorr, Keypair, Message};
use bitcoin::sighash::{Prevouts, SighashCache, TapSighash, TapSighashType};
use bitcoin::taproot::{LeafVersion, TapLeafHash};
use bitcoin::{OutPoint, Script, Transaction, TxOut, XOnlyPublicKey};
use secp256k1::SECP256K1;

use crate::error::CryptographicError;

/// Looks up the output spent by a transaction input
pub trait PrevoutResolver {
    fn resolve(&self, outpoint: &OutPoint) -> Option<TxOut>;
}

impl PrevoutResolver for HashMap<OutPoint, TxOut> {
    fn resolve(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.get(outpoint).cloned()
    }
}

impl PrevoutResolver for BTreeMap<OutPoint, TxOut> {
    fn resolve(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.get(outpoint).cloned()
    }
}

impl<R: PrevoutResolver + ?Sized> PrevoutResolver for &R {
    fn resolve(&self, outpoint: &OutPoint) -> Option<TxOut> {
        (**self).resolve(outpoint)
    }
}

/// Compute the BIP-341 script-path sighash of input `input_index`
///
/// `prevouts` must hold one output per transaction input, in input order.
pub fn script_spend_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    leaf_script: &Script,
) -> Result<TapSighash, CryptographicError> {
    if prevouts.len() != tx.input.len() {
        return Err(CryptographicError::SighashComputation(format!(
            "expected {} prevouts, got {}",
            tx.input.len(),
            prevouts.len()
        )));
    }

    let leaf_hash = TapLeafHash::from_script(leaf_script, LeafVersion::TapScript);
    SighashCache::new(tx)
        .taproot_script_spend_signature_hash(
            input_index,
            &Prevouts::All(prevouts),
            leaf_hash,
            TapSighashType::Default,
        )
        .map_err(|e| CryptographicError::SighashComputation(e.to_string()))
}

fn sign_sighash(
    sighash: TapSighash,
    keypair: &Keypair,
) -> Result<schnorr::Signature, CryptographicError> {
    let msg = Message::from_digest(sighash.to_byte_array());
    let signature = SECP256K1.sign_schnorr(&msg, keypair);

    let (pubkey, _) = keypair.x_only_public_key();
    SECP256K1
        .verify_schnorr(&signature, &msg, &pubkey)
        .map_err(|e| CryptographicError::Signing(e.to_string()))?;

    Ok(signature)
}

/// Sign the only input of `tx`, which spends `prevout` through `leaf_script`
pub fn sign_single_input(
    tx: &Transaction,
    prevout: &TxOut,
    leaf_script: &Script,
    keypair: &Keypair,
) -> Result<schnorr::Signature, CryptographicError> {
    if tx.input.len() != 1 {
        return Err(CryptographicError::SighashComputation(format!(
            "single-input signing requires exactly one input, transaction has {}",
            tx.input.len()
        )));
    }

    let sighash = script_spend_sighash(tx, 0, std::slice::from_ref(prevout), leaf_script)?;
    let signature = sign_sighash(sighash, keypair)?;

    tracing::debug!(
        txid = %tx.compute_txid(),
        signer = %keypair.x_only_public_key().0,
        "Signed staking script spend"
    );

    Ok(signature)
}

/// Sign input `input_index` of a multi-input transaction
///
/// Every input is resolved through `resolver`. The output resolved for
/// `input_index` must equal `expected`.
pub fn sign_input<R: PrevoutResolver>(
    tx: &Transaction,
    input_index: usize,
    resolver: &R,
    expected: &TxOut,
    leaf_script: &Script,
    keypair: &Keypair,
) -> Result<schnorr::Signature, CryptographicError> {
    let prevouts = resolve_prevouts(tx, input_index, resolver, expected)?;
    let sighash = script_spend_sighash(tx, input_index, &prevouts, leaf_script)?;
    let signature = sign_sighash(sighash, keypair)?;

    tracing::debug!(
        txid = %tx.compute_txid(),
        input_index,
        signer = %keypair.x_only_public_key().0,
        "Signed staking script spend"
    );

    Ok(signature)
}

fn resolve_prevouts<R: PrevoutResolver>(
    tx: &Transaction,
    input_index: usize,
    resolver: &R,
    expected: &TxOut,
) -> Result<Vec<TxOut>, CryptographicError> {
    if input_index >= tx.input.len() {
        return Err(CryptographicError::SighashComputation(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.input.len()
        )));
    }

    let prevouts = tx
        .input
        .iter()
        .map(|input| {
            resolver.resolve(&input.previous_output).ok_or_else(|| {
                CryptographicError::SighashComputation(format!(
                    "cannot resolve prevout {}",
                    input.previous_output
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if prevouts[input_index] != *expected {
        return Err(CryptographicError::SighashComputation(format!(
            "input {} does not spend the staking output",
            input_index
        )));
    }

    Ok(prevouts)
}

/// Check a signature over the only input of `tx`
pub fn verify_signature(
    tx: &Transaction,
    prevout: &TxOut,
    leaf_script: &Script,
    pubkey: &XOnlyPublicKey,
    signature: &schnorr::Signature,
) -> Result<(), CryptographicError> {
    verify_input_signature(tx, 0, std::slice::from_ref(prevout), leaf_script, pubkey, signature)
}

/// Check a signature over input `input_index` given all spent outputs
pub fn verify_input_signature(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    leaf_script: &Script,
    pubkey: &XOnlyPublicKey,
    signature: &schnorr::Signature,
) -> Result<(), CryptographicError> {
    let sighash = script_spend_sighash(tx, input_index, prevouts, leaf_script)?;
    let msg = Message::from_digest(sighash.to_byte_array());

    SECP256K1
        .verify_schnorr(signature, &msg, pubkey)
        .map_err(|_| CryptographicError::InvalidSignature(pubkey.to_string()))
}

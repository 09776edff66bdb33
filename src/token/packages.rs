// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Bearer package formats and their hashes.
//!
//! Binary fields travel as lowercase hex strings. The transfer package
//! hashes by binary concatenation; every other package kind hashes the
//! UTF-8 bytes of its canonical JSON core: the fields below in
//! declaration order, compact separators, absent optionals omitted.
//! Existing stored attestations depend on these exact byte streams.

use crate::clients::witness::Attestation;
use crate::crypto::hashing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Package encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageError {
    /// Canonical serialization failed.
    #[error("package encode")]
    Encode,
}

fn canonical_hash<T: Serialize>(core: &T) -> Result<String, PackageError> {
    let json = serde_json::to_string(core).map_err(|_| PackageError::Encode)?;
    Ok(hex::encode(hashing::sha256(json.as_bytes())))
}

/// Attestation view embedded in hashed cores: `raw` is a gateway-local
/// artifact and stays out of protocol bytes.
#[derive(Serialize)]
struct AttestationCore<'a> {
    hash: &'a str,
    timestamp: u64,
    signatures: &'a [String],
    witness_ids: &'a [String],
}

impl<'a> From<&'a Attestation> for AttestationCore<'a> {
    fn from(att: &'a Attestation) -> Self {
        Self {
            hash: &att.hash,
            timestamp: att.timestamp,
            signatures: &att.signatures,
            witness_ids: &att.witness_ids,
        }
    }
}

/// One-to-one transfer package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferPackage {
    /// Spent token id (hex).
    pub token_id: String,
    /// Token amount.
    pub amount: u64,
    /// Blinded recipient commitment (33 hex bytes; 32 for the degraded
    /// hash fallback).
    pub commitment: String,
    /// Spend nullifier (32 hex bytes).
    pub nullifier: String,
    /// Witness attestation over the package hash.
    pub proof: Attestation,
    /// 98-byte Schnorr ownership proof, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proof: Option<String>,
}

impl TransferPackage {
    /// Binary-concatenation package hash (the one format that predates
    /// canonical JSON hashing).
    pub fn package_hash(&self) -> String {
        hashing::transfer_package_digest(
            &self.token_id,
            self.amount,
            &self.commitment,
            &self.nullifier,
        )
    }
}

/// One split output slot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplitOutput {
    /// Fresh token id for this slot.
    pub token_id: String,
    /// Slot amount.
    pub amount: u64,
    /// Blinded recipient commitment.
    pub commitment: String,
}

/// One-to-many split package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplitPackage {
    /// Spent source token id.
    pub source_token_id: String,
    /// Source amount (equals the sum of the splits).
    pub source_amount: u64,
    /// Output slots.
    pub splits: Vec<SplitOutput>,
    /// Source nullifier; one per split operation.
    pub nullifier: String,
    /// Witness attestation over the package hash.
    pub proof: Attestation,
    /// Ownership proof bound to the nullifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proof: Option<String>,
}

/// Canonical split core hash.
pub fn split_package_hash(
    source_token_id: &str,
    source_amount: u64,
    splits: &[SplitOutput],
    nullifier: &str,
) -> Result<String, PackageError> {
    #[derive(Serialize)]
    struct Core<'a> {
        source_token_id: &'a str,
        source_amount: u64,
        splits: &'a [SplitOutput],
        nullifier: &'a str,
    }
    canonical_hash(&Core {
        source_token_id,
        source_amount,
        splits,
        nullifier,
    })
}

impl SplitPackage {
    /// Recompute this package's canonical hash.
    pub fn package_hash(&self) -> Result<String, PackageError> {
        split_package_hash(
            &self.source_token_id,
            self.source_amount,
            &self.splits,
            &self.nullifier,
        )
    }
}

/// One merge input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MergeSource {
    /// Input token id.
    pub token_id: String,
    /// Input amount.
    pub amount: u64,
    /// Input nullifier.
    pub nullifier: String,
}

/// Many-to-one merge package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MergePackage {
    /// Fresh target token id.
    pub target_token_id: String,
    /// Sum of the input amounts.
    pub target_amount: u64,
    /// Blinded recipient commitment.
    pub commitment: String,
    /// Spent inputs.
    pub sources: Vec<MergeSource>,
    /// Witness attestation over the package hash.
    pub proof: Attestation,
    /// Per-source ownership proofs, index-aligned with `sources`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proofs: Option<Vec<String>>,
}

/// Canonical merge core hash.
pub fn merge_package_hash(
    target_token_id: &str,
    target_amount: u64,
    commitment: &str,
    sources: &[MergeSource],
) -> Result<String, PackageError> {
    #[derive(Serialize)]
    struct Core<'a> {
        target_token_id: &'a str,
        target_amount: u64,
        commitment: &'a str,
        sources: &'a [MergeSource],
    }
    canonical_hash(&Core {
        target_token_id,
        target_amount,
        commitment,
        sources,
    })
}

impl MergePackage {
    /// Recompute this package's canonical hash.
    pub fn package_hash(&self) -> Result<String, PackageError> {
        merge_package_hash(
            &self.target_token_id,
            self.target_amount,
            &self.commitment,
            &self.sources,
        )
    }
}

/// One recipient slot in a multi-party transfer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MultiPartyRecipient {
    /// Recipient public key fingerprint (hex); lets the receiver find
    /// its slot.
    pub public_key: String,
    /// Slot amount.
    pub amount: u64,
    /// Blinded recipient commitment.
    pub commitment: String,
    /// Fresh token id for this slot.
    pub token_id: String,
}

/// One-to-many transfer bound into a single package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MultiPartyPackage {
    /// Spent source token id.
    pub source_token_id: String,
    /// Source amount.
    pub source_amount: u64,
    /// Recipient slots.
    pub recipients: Vec<MultiPartyRecipient>,
    /// Source nullifier.
    pub nullifier: String,
    /// Witness attestation over the package hash.
    pub proof: Attestation,
    /// Ownership proof bound to the nullifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proof: Option<String>,
}

/// Canonical multi-party core hash.
pub fn multi_party_package_hash(
    source_token_id: &str,
    source_amount: u64,
    recipients: &[MultiPartyRecipient],
    nullifier: &str,
) -> Result<String, PackageError> {
    #[derive(Serialize)]
    struct Core<'a> {
        source_token_id: &'a str,
        source_amount: u64,
        recipients: &'a [MultiPartyRecipient],
        nullifier: &'a str,
    }
    canonical_hash(&Core {
        source_token_id,
        source_amount,
        recipients,
        nullifier,
    })
}

impl MultiPartyPackage {
    /// Recompute this package's canonical hash.
    pub fn package_hash(&self) -> Result<String, PackageError> {
        multi_party_package_hash(
            &self.source_token_id,
            self.source_amount,
            &self.recipients,
            &self.nullifier,
        )
    }
}

/// HTLC spend condition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HtlcCondition {
    /// Claimable with the hashlock preimage; optionally bounded in time.
    Hash {
        /// `SHA-256(UTF-8(hex(preimage)))`, hex.
        hashlock: String,
        /// Claim deadline in milliseconds, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timelock: Option<u64>,
    },
    /// Claimable before the deadline, refundable after.
    Time {
        /// Deadline in milliseconds since the UNIX epoch.
        timelock: u64,
    },
}

/// Hash/time-locked transfer package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HtlcPackage {
    /// Spent token id.
    pub token_id: String,
    /// Token amount.
    pub amount: u64,
    /// Blinded recipient commitment.
    pub commitment: String,
    /// Spend nullifier.
    pub nullifier: String,
    /// Spend condition.
    pub condition: HtlcCondition,
    /// Refund key fingerprint (hex); required for time conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_public_key: Option<String>,
    /// Witness attestation over the package hash.
    pub proof: Attestation,
    /// Ownership proof bound to the nullifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proof: Option<String>,
}

/// Canonical HTLC core hash.
pub fn htlc_package_hash(
    token_id: &str,
    amount: u64,
    commitment: &str,
    nullifier: &str,
    condition: &HtlcCondition,
    refund_public_key: Option<&str>,
) -> Result<String, PackageError> {
    #[derive(Serialize)]
    struct Core<'a> {
        token_id: &'a str,
        amount: u64,
        commitment: &'a str,
        nullifier: &'a str,
        condition: &'a HtlcCondition,
        #[serde(skip_serializing_if = "Option::is_none")]
        refund_public_key: Option<&'a str>,
    }
    canonical_hash(&Core {
        token_id,
        amount,
        commitment,
        nullifier,
        condition,
        refund_public_key,
    })
}

impl HtlcPackage {
    /// Recompute this package's canonical hash.
    pub fn package_hash(&self) -> Result<String, PackageError> {
        htlc_package_hash(
            &self.token_id,
            self.amount,
            &self.commitment,
            &self.nullifier,
            &self.condition,
            self.refund_public_key.as_deref(),
        )
    }
}

/// Cross-federation bridge package (lock in source, mint in target).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BridgePackage {
    /// Locked source token id.
    pub source_token_id: String,
    /// Federation the token was locked in.
    pub source_federation: String,
    /// Federation the token mints into.
    pub target_federation: String,
    /// Token amount.
    pub amount: u64,
    /// Blinded recipient commitment (source-federation VOPRF).
    pub commitment: String,
    /// Source-side spend nullifier.
    pub nullifier: String,
    /// Source witness attestation over the lock package.
    pub source_proof: Attestation,
    /// Target witness attestation over the mint package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_proof: Option<Attestation>,
    /// Ownership proof bound to the nullifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_proof: Option<String>,
}

#[derive(Serialize)]
struct BridgeLockCore<'a> {
    source_token_id: &'a str,
    source_federation: &'a str,
    target_federation: &'a str,
    amount: u64,
    commitment: &'a str,
    nullifier: &'a str,
}

/// Canonical lock-package hash (phase one, timestamped in the source
/// federation).
pub fn bridge_lock_hash(
    source_token_id: &str,
    source_federation: &str,
    target_federation: &str,
    amount: u64,
    commitment: &str,
    nullifier: &str,
) -> Result<String, PackageError> {
    canonical_hash(&BridgeLockCore {
        source_token_id,
        source_federation,
        target_federation,
        amount,
        commitment,
        nullifier,
    })
}

/// Canonical mint-package hash (phase two: the lock core plus the source
/// attestation, timestamped in the target federation).
pub fn bridge_mint_hash(
    source_token_id: &str,
    source_federation: &str,
    target_federation: &str,
    amount: u64,
    commitment: &str,
    nullifier: &str,
    source_proof: &Attestation,
) -> Result<String, PackageError> {
    #[derive(Serialize)]
    struct Core<'a> {
        source_token_id: &'a str,
        source_federation: &'a str,
        target_federation: &'a str,
        amount: u64,
        commitment: &'a str,
        nullifier: &'a str,
        source_proof: AttestationCore<'a>,
    }
    canonical_hash(&Core {
        source_token_id,
        source_federation,
        target_federation,
        amount,
        commitment,
        nullifier,
        source_proof: source_proof.into(),
    })
}

impl BridgePackage {
    /// Recompute the lock-phase hash.
    pub fn lock_hash(&self) -> Result<String, PackageError> {
        bridge_lock_hash(
            &self.source_token_id,
            &self.source_federation,
            &self.target_federation,
            self.amount,
            &self.commitment,
            &self.nullifier,
        )
    }

    /// Recompute the mint-phase hash.
    pub fn mint_hash(&self) -> Result<String, PackageError> {
        bridge_mint_hash(
            &self.source_token_id,
            &self.source_federation,
            &self.target_federation,
            self.amount,
            &self.commitment,
            &self.nullifier,
            &self.source_proof,
        )
    }
}

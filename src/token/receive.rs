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

//! Recipient-side package handling.
//!
//! Every receive path verifies the witness attestation, requires the
//! attested hash to equal the recomputed package hash (a valid
//! attestation over different bytes proves nothing), verifies the
//! ownership proof when present, and only then builds the local token.

use crate::clients::api::WitnessApi;
use crate::clients::witness::Attestation;
use crate::crypto::{hashing, schnorr};
use crate::token::packages::{
    MergePackage, MultiPartyPackage, SplitPackage, TransferPackage,
};
use crate::token::{Services, Token, TokenError};
use std::sync::Arc;

/// Verify an attestation and its binding to the expected package hash.
pub(crate) async fn require_attested(
    witness: &Arc<dyn WitnessApi>,
    expected_hash: &str,
    proof: &Attestation,
) -> Result<(), TokenError> {
    if proof.hash != expected_hash {
        return Err(TokenError::InvalidProof);
    }
    if !witness.verify(proof).await? {
        return Err(TokenError::InvalidProof);
    }
    Ok(())
}

/// Verify an optional hex ownership proof against a hex nullifier.
pub(crate) fn require_ownership(
    ownership_proof: Option<&str>,
    nullifier_hex: &str,
) -> Result<(), TokenError> {
    let Some(proof_hex) = ownership_proof else {
        return Ok(());
    };
    let proof = hex::decode(proof_hex).map_err(|_| TokenError::InvalidProof)?;
    let binding = hex::decode(nullifier_hex).map_err(|_| TokenError::InvalidProof)?;
    if !schnorr::verify_ownership_proof(&proof, &binding) {
        return Err(TokenError::InvalidProof);
    }
    Ok(())
}

/// Accept a one-to-one transfer: the new token takes the package's id
/// and amount and the recipient's secret.
pub async fn receive_transfer(
    package: &TransferPackage,
    recipient_secret: [u8; 32],
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    require_attested(&services.witness, &package.package_hash(), &package.proof).await?;
    require_ownership(package.ownership_proof.as_deref(), &package.nullifier)?;
    Ok(Token::from_parts(
        package.token_id.clone(),
        package.amount,
        recipient_secret,
        services,
    ))
}

/// Accept one slot of a split package.
pub async fn receive_split(
    package: &SplitPackage,
    index: usize,
    recipient_secret: [u8; 32],
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    require_attested(&services.witness, &package.package_hash()?, &package.proof).await?;
    require_ownership(package.ownership_proof.as_deref(), &package.nullifier)?;
    let slot = package.splits.get(index).ok_or(TokenError::InvalidIndex)?;
    Ok(Token::from_parts(
        slot.token_id.clone(),
        slot.amount,
        recipient_secret,
        services,
    ))
}

/// Accept a multi-party transfer: the slot is located by the public key
/// fingerprint of the receiving secret.
pub async fn receive_multi(
    package: &MultiPartyPackage,
    recipient_secret: [u8; 32],
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    require_attested(&services.witness, &package.package_hash()?, &package.proof).await?;
    require_ownership(package.ownership_proof.as_deref(), &package.nullifier)?;
    let own_key = hex::encode(hashing::derive_public_key(&recipient_secret));
    let slot = package
        .recipients
        .iter()
        .find(|r| r.public_key == own_key)
        .ok_or(TokenError::RecipientNotFound)?;
    Ok(Token::from_parts(
        slot.token_id.clone(),
        slot.amount,
        recipient_secret,
        services,
    ))
}

/// Accept a merge package as the recipient of the aggregated target.
///
/// When per-source ownership proofs are present, each must verify
/// against its own source nullifier.
pub async fn receive_merge(
    package: &MergePackage,
    recipient_secret: [u8; 32],
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    require_attested(&services.witness, &package.package_hash()?, &package.proof).await?;
    if let Some(proofs) = &package.ownership_proofs {
        if proofs.len() != package.sources.len() {
            return Err(TokenError::InvalidProof);
        }
        for (proof, source) in proofs.iter().zip(&package.sources) {
            require_ownership(Some(proof), &source.nullifier)?;
        }
    }
    Ok(Token::from_parts(
        package.target_token_id.clone(),
        package.target_amount,
        recipient_secret,
        services,
    ))
}

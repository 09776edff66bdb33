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

//! The bearer-token state machine.
//!
//! A token is an unforgeable, holder-controlled obligation: 32 secret
//! bytes, a random hex id, an amount, and a spent flag. Every
//! spend-causing operation checks and sets the flag from the holder's
//! perspective; the published nullifier is what makes a second spend
//! detectable by everyone else.

pub mod bridge;
pub mod htlc;
pub mod packages;
pub mod receive;

use crate::clients::api::{FreebirdApi, GossipApi, WitnessApi};
use crate::clients::freebird::FreebirdError;
use crate::clients::witness::WitnessError;
use crate::crypto::{hashing, schnorr, CryptoError};
use crate::gossip::engine::GossipError;
use self::packages::{
    MergePackage, MergeSource, MultiPartyPackage, MultiPartyRecipient, PackageError,
    SplitOutput, SplitPackage, TransferPackage,
};
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Token state machine errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Spend attempted on an already-spent token.
    #[error("token already spent")]
    AlreadySpent,
    /// Split/multi amounts are empty, zero, mismatched, or do not sum to
    /// the source amount.
    #[error("invalid split")]
    InvalidSplit,
    /// Operation given no recipients.
    #[error("no recipients")]
    EmptyRecipients,
    /// Merge inputs do not share one service container.
    #[error("tokens do not share a service container")]
    MixedServices,
    /// Amount arithmetic overflowed.
    #[error("amount overflow")]
    AmountOverflow,
    /// HTLC condition failed validation.
    #[error("invalid condition: {0}")]
    InvalidCondition(&'static str),
    /// HTLC preimage missing or wrong.
    #[error("invalid preimage")]
    InvalidPreimage,
    /// Refund attempted before the timelock.
    #[error("timelock has not expired")]
    TimelockNotExpired,
    /// Claim attempted at or after the timelock.
    #[error("timelock expired")]
    TimelockExpired,
    /// Time condition without a refund key.
    #[error("refund public key missing")]
    MissingRefundKey,
    /// Refund secret does not derive the package's refund key.
    #[error("refund secret does not match")]
    RefundKeyMismatch,
    /// Witness attestation or ownership proof failed verification.
    #[error("invalid proof")]
    InvalidProof,
    /// No recipient slot matches the receiving secret.
    #[error("recipient slot not found")]
    RecipientNotFound,
    /// Split slot index out of range.
    #[error("split index out of range")]
    InvalidIndex,
    /// Bridge package targets a different federation.
    #[error("federation mismatch")]
    FederationMismatch,
    /// Crypto primitive failure.
    #[error("crypto")]
    Crypto(#[from] CryptoError),
    /// Package canonical encoding failure.
    #[error("package encode")]
    Package(#[from] PackageError),
    /// Freebird client failure.
    #[error("freebird")]
    Freebird(#[from] FreebirdError),
    /// Witness client failure.
    #[error("witness")]
    Witness(#[from] WitnessError),
    /// Gossip engine failure (a local double-spend surfaces here).
    #[error("gossip")]
    Gossip(#[from] GossipError),
}

/// The three service handles every token operation runs against.
///
/// Clients are owned by this container and outlive the tokens holding it;
/// tokens carry a reference-counted handle rather than borrowed clients.
pub struct Services {
    /// Freebird issuance client.
    pub freebird: Arc<dyn FreebirdApi>,
    /// Witness federation client.
    pub witness: Arc<dyn WitnessApi>,
    /// Nullifier gossip engine.
    pub gossip: Arc<dyn GossipApi>,
}

/// Secret bytes, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct SecretBytes([u8; 32]);

/// A held bearer token.
pub struct Token {
    id: String,
    amount: u64,
    secret: SecretBytes,
    spent: bool,
    services: Arc<Services>,
}

impl Token {
    /// Mint a fresh token: 32 random id bytes (hex) and a random secret.
    ///
    /// The id randomness is what makes nullifier collisions negligible.
    pub fn mint(amount: u64, services: Arc<Services>) -> Result<Self, TokenError> {
        let id = hex::encode(hashing::random_bytes32()?);
        let secret = hashing::random_bytes32()?;
        Ok(Self::from_parts(id, amount, secret, services))
    }

    /// Rebuild a token from stored or received parts.
    pub fn from_parts(
        id: String,
        amount: u64,
        secret: [u8; 32],
        services: Arc<Services>,
    ) -> Self {
        Self {
            id,
            amount,
            secret: SecretBytes(secret),
            spent: false,
            services,
        }
    }

    /// Token id (hex).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token amount.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Whether a spend operation has consumed this instance.
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// The holder secret (external stores persist this).
    pub fn secret(&self) -> &[u8; 32] {
        &self.secret.0
    }

    /// Public key fingerprint of this token's secret.
    pub fn public_key(&self) -> [u8; 32] {
        hashing::derive_public_key(&self.secret.0)
    }

    /// This token's nullifier bytes.
    pub fn nullifier(&self) -> [u8; 32] {
        hashing::nullifier(&self.secret.0, &self.id)
    }

    /// This token's nullifier, hex.
    pub fn nullifier_hex(&self) -> String {
        hex::encode(self.nullifier())
    }

    pub(crate) fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub(crate) fn ensure_unspent(&self) -> Result<(), TokenError> {
        if self.spent {
            return Err(TokenError::AlreadySpent);
        }
        Ok(())
    }

    pub(crate) fn mark_spent(&mut self) {
        self.spent = true;
    }

    /// Transfer the whole token to `recipient_public_key`.
    ///
    /// Publishes the nullifier and marks this instance spent; the
    /// returned package travels to the recipient out-of-band.
    pub async fn transfer(
        &mut self,
        recipient_public_key: &[u8; 32],
    ) -> Result<TransferPackage, TokenError> {
        self.ensure_unspent()?;
        let nullifier = self.nullifier();
        let nullifier_hex = hex::encode(nullifier);
        let commitment = self.services.freebird.blind(recipient_public_key).await?;
        let commitment_hex = hex::encode(&commitment);
        // Binding the proof to the nullifier stops replay across contexts.
        let ownership = schnorr::create_ownership_proof(&self.secret.0, &nullifier)?;

        let package_hash = hashing::transfer_package_digest(
            &self.id,
            self.amount,
            &commitment_hex,
            &nullifier_hex,
        );
        let proof = self.services.witness.timestamp(&package_hash).await?;
        self.services
            .gossip
            .publish(&nullifier_hex, proof.clone(), Some(ownership.to_vec()))
            .await?;
        self.spent = true;

        Ok(TransferPackage {
            token_id: self.id.clone(),
            amount: self.amount,
            commitment: commitment_hex,
            nullifier: nullifier_hex,
            proof,
            ownership_proof: Some(hex::encode(ownership)),
        })
    }

    fn check_split_shape(&self, amounts: &[u64], recipients: usize) -> Result<(), TokenError> {
        if amounts.is_empty() || recipients == 0 {
            return Err(TokenError::EmptyRecipients);
        }
        if amounts.len() != recipients || amounts.iter().any(|a| *a == 0) {
            return Err(TokenError::InvalidSplit);
        }
        let total = amounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(*a))
            .ok_or(TokenError::AmountOverflow)?;
        if total != self.amount {
            return Err(TokenError::InvalidSplit);
        }
        Ok(())
    }

    /// Split this token into `amounts[i]` for `recipients[i]`.
    ///
    /// One nullifier and one ownership proof bind the whole operation.
    pub async fn split(
        &mut self,
        amounts: &[u64],
        recipients: &[[u8; 32]],
    ) -> Result<SplitPackage, TokenError> {
        self.ensure_unspent()?;
        self.check_split_shape(amounts, recipients.len())?;

        let nullifier = self.nullifier();
        let nullifier_hex = hex::encode(nullifier);
        let mut splits = Vec::with_capacity(amounts.len());
        for (amount, recipient) in amounts.iter().zip(recipients) {
            let commitment = self.services.freebird.blind(recipient).await?;
            splits.push(SplitOutput {
                token_id: hex::encode(hashing::random_bytes32()?),
                amount: *amount,
                commitment: hex::encode(commitment),
            });
        }
        let ownership = schnorr::create_ownership_proof(&self.secret.0, &nullifier)?;

        let package_hash =
            packages::split_package_hash(&self.id, self.amount, &splits, &nullifier_hex)?;
        let proof = self.services.witness.timestamp(&package_hash).await?;
        self.services
            .gossip
            .publish(&nullifier_hex, proof.clone(), Some(ownership.to_vec()))
            .await?;
        self.spent = true;

        Ok(SplitPackage {
            source_token_id: self.id.clone(),
            source_amount: self.amount,
            splits,
            nullifier: nullifier_hex,
            proof,
            ownership_proof: Some(hex::encode(ownership)),
        })
    }

    /// Multi-party transfer: a split whose slots carry the recipient
    /// public keys so each receiver can find its own entry.
    pub async fn transfer_multi(
        &mut self,
        amounts: &[u64],
        recipients: &[[u8; 32]],
    ) -> Result<MultiPartyPackage, TokenError> {
        self.ensure_unspent()?;
        self.check_split_shape(amounts, recipients.len())?;

        let nullifier = self.nullifier();
        let nullifier_hex = hex::encode(nullifier);
        let mut slots = Vec::with_capacity(amounts.len());
        for (amount, recipient) in amounts.iter().zip(recipients) {
            let commitment = self.services.freebird.blind(recipient).await?;
            slots.push(MultiPartyRecipient {
                public_key: hex::encode(recipient),
                amount: *amount,
                commitment: hex::encode(commitment),
                token_id: hex::encode(hashing::random_bytes32()?),
            });
        }
        let ownership = schnorr::create_ownership_proof(&self.secret.0, &nullifier)?;

        let package_hash =
            packages::multi_party_package_hash(&self.id, self.amount, &slots, &nullifier_hex)?;
        let proof = self.services.witness.timestamp(&package_hash).await?;
        self.services
            .gossip
            .publish(&nullifier_hex, proof.clone(), Some(ownership.to_vec()))
            .await?;
        self.spent = true;

        Ok(MultiPartyPackage {
            source_token_id: self.id.clone(),
            source_amount: self.amount,
            recipients: slots,
            nullifier: nullifier_hex,
            proof,
            ownership_proof: Some(hex::encode(ownership)),
        })
    }

    /// Merge several tokens into one target for `recipient_public_key`.
    ///
    /// All inputs must be unspent and share one service container. Every
    /// source nullifier is published; each carries its own ownership
    /// proof.
    pub async fn merge(
        tokens: &mut [Token],
        recipient_public_key: &[u8; 32],
    ) -> Result<MergePackage, TokenError> {
        let Some(first) = tokens.first() else {
            return Err(TokenError::EmptyRecipients);
        };
        let services = Arc::clone(&first.services);
        if !tokens
            .iter()
            .all(|t| Arc::ptr_eq(&t.services, &services))
        {
            return Err(TokenError::MixedServices);
        }
        for token in tokens.iter() {
            token.ensure_unspent()?;
        }
        let target_amount = tokens
            .iter()
            .try_fold(0u64, |acc, t| acc.checked_add(t.amount))
            .ok_or(TokenError::AmountOverflow)?;

        let commitment = services.freebird.blind(recipient_public_key).await?;
        let target_token_id = hex::encode(hashing::random_bytes32()?);

        let mut sources = Vec::with_capacity(tokens.len());
        let mut ownership_proofs = Vec::with_capacity(tokens.len());
        for token in tokens.iter() {
            let nullifier = token.nullifier();
            sources.push(MergeSource {
                token_id: token.id.clone(),
                amount: token.amount,
                nullifier: hex::encode(nullifier),
            });
            let proof = schnorr::create_ownership_proof(&token.secret.0, &nullifier)?;
            ownership_proofs.push(proof);
        }

        let package_hash = packages::merge_package_hash(
            &target_token_id,
            target_amount,
            &hex::encode(&commitment),
            &sources,
        )?;
        let proof = services.witness.timestamp(&package_hash).await?;

        for (source, ownership) in sources.iter().zip(&ownership_proofs) {
            services
                .gossip
                .publish(&source.nullifier, proof.clone(), Some(ownership.to_vec()))
                .await?;
        }
        for token in tokens.iter_mut() {
            token.spent = true;
        }

        Ok(MergePackage {
            target_token_id,
            target_amount,
            commitment: hex::encode(commitment),
            sources,
            proof,
            ownership_proofs: Some(
                ownership_proofs.iter().map(hex::encode).collect(),
            ),
        })
    }
}

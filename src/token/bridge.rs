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

//! Cross-federation bridge: lock in the source federation, mint in the
//! target.
//!
//! Phase one locks the token: the source nullifier is published and
//! timestamped by the source witness. Phase two timestamps the lock plus
//! its attestation in the target witness. No nullifier is published in
//! the target; the bridged token publishes one when it is eventually
//! spent, under an id derived to avoid cross-federation collisions:
//! `target_id = hex(SHA-256(source_id || target_federation || "bridge-v1"))`.

use crate::crypto::{hashing, schnorr};
use crate::token::packages::{self, BridgePackage};
use crate::token::receive::{require_attested, require_ownership};
use crate::token::{Services, Token, TokenError};
use std::sync::Arc;
use tracing::debug;

const TARGET_ID_DOMAIN: &str = "bridge-v1";

/// Derive the deterministic target-federation token id.
pub fn bridged_token_id(source_token_id: &str, target_federation: &str) -> String {
    let digest = hashing::Digest::new()
        .str(source_token_id)
        .str(target_federation)
        .str(TARGET_ID_DOMAIN)
        .finish();
    hex::encode(digest)
}

/// A configured lane between two federations.
pub struct FederationBridge {
    source_federation: String,
    target_federation: String,
    source: Arc<Services>,
    target: Arc<Services>,
}

impl FederationBridge {
    /// Build a bridge between two federations' service containers.
    pub fn new(
        source_federation: impl Into<String>,
        source: Arc<Services>,
        target_federation: impl Into<String>,
        target: Arc<Services>,
    ) -> Self {
        Self {
            source_federation: source_federation.into(),
            target_federation: target_federation.into(),
            source,
            target,
        }
    }

    /// The federation this bridge mints into.
    pub fn target_federation(&self) -> &str {
        &self.target_federation
    }

    /// Lock `token` in the source federation and prepare the mint half.
    pub async fn bridge_token(
        &self,
        token: &mut Token,
        recipient_public_key: &[u8; 32],
    ) -> Result<BridgePackage, TokenError> {
        token.ensure_unspent()?;
        if !Arc::ptr_eq(token.services(), &self.source) {
            return Err(TokenError::MixedServices);
        }

        let nullifier = token.nullifier();
        let nullifier_hex = hex::encode(nullifier);
        let commitment = self.source.freebird.blind(recipient_public_key).await?;
        let commitment_hex = hex::encode(&commitment);
        let ownership = schnorr::create_ownership_proof(token.secret(), &nullifier)?;

        // Phase one: lock in the source federation.
        let lock_hash = packages::bridge_lock_hash(
            token.id(),
            &self.source_federation,
            &self.target_federation,
            token.amount(),
            &commitment_hex,
            &nullifier_hex,
        )?;
        let source_proof = self.source.witness.timestamp(&lock_hash).await?;
        self.source
            .gossip
            .publish(&nullifier_hex, source_proof.clone(), Some(ownership.to_vec()))
            .await?;
        token.mark_spent();
        debug!(token = %token.id(), federation = %self.source_federation, "token locked");

        // Phase two: attest the lock in the target federation. The target
        // nullifier only appears when the bridged token is spent.
        let mint_hash = packages::bridge_mint_hash(
            token.id(),
            &self.source_federation,
            &self.target_federation,
            token.amount(),
            &commitment_hex,
            &nullifier_hex,
            &source_proof,
        )?;
        let target_proof = self.target.witness.timestamp(&mint_hash).await?;

        Ok(BridgePackage {
            source_token_id: token.id().to_string(),
            source_federation: self.source_federation.clone(),
            target_federation: self.target_federation.clone(),
            amount: token.amount(),
            commitment: commitment_hex,
            nullifier: nullifier_hex,
            source_proof,
            target_proof: Some(target_proof),
            ownership_proof: Some(hex::encode(ownership)),
        })
    }

    /// Accept a bridged package and construct the target-federation token.
    pub async fn receive_bridged(
        &self,
        package: &BridgePackage,
        recipient_secret: [u8; 32],
    ) -> Result<Token, TokenError> {
        if package.target_federation != self.target_federation {
            return Err(TokenError::FederationMismatch);
        }
        require_attested(
            &self.source.witness,
            &package.lock_hash()?,
            &package.source_proof,
        )
        .await?;
        if let Some(target_proof) = &package.target_proof {
            require_attested(&self.target.witness, &package.mint_hash()?, target_proof).await?;
        }
        require_ownership(package.ownership_proof.as_deref(), &package.nullifier)?;

        let target_id = bridged_token_id(&package.source_token_id, &self.target_federation);
        Ok(Token::from_parts(
            target_id,
            package.amount,
            recipient_secret,
            Arc::clone(&self.target),
        ))
    }

    /// Check both halves of a bridge without constructing anything: the
    /// source-side lock must be observable (gossip or witness) and every
    /// attestation present must verify.
    pub async fn verify_bridge(&self, package: &BridgePackage) -> Result<bool, TokenError> {
        let lock_observable = self.source.gossip.check_nullifier(&package.nullifier) > 0.0
            || self
                .source
                .witness
                .check_nullifier(&package.nullifier)
                .await?
                > 0.0;
        if !lock_observable {
            return Ok(false);
        }
        if package.source_proof.hash != package.lock_hash()?
            || !self.source.witness.verify(&package.source_proof).await?
        {
            return Ok(false);
        }
        if let Some(target_proof) = &package.target_proof {
            if target_proof.hash != package.mint_hash()?
                || !self.target.witness.verify(target_proof).await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

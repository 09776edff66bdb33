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

//! Hash/time-locked transfers: create, claim, refund.
//!
//! The hashlock commits to `SHA-256(UTF-8(hex(preimage)))`. Timelocks
//! are strict: a claim must happen strictly before the deadline, a
//! refund at or after it. Time-gated entry points take an explicit
//! clock (`*_at`) with system-clock wrappers on top.

use crate::crypto::{hashing, schnorr};
use crate::token::packages::{HtlcCondition, HtlcPackage};
use crate::token::receive::{require_attested, require_ownership};
use crate::token::{Services, Token, TokenError};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Compute a hashlock for a preimage: `SHA-256(UTF-8(hex(preimage)))`.
pub fn hashlock_for(preimage: &[u8]) -> String {
    hex::encode(hashing::sha256(hex::encode(preimage).as_bytes()))
}

fn validate_condition(
    condition: &HtlcCondition,
    refund_public_key: Option<&[u8; 32]>,
    now: u64,
) -> Result<(), TokenError> {
    match condition {
        HtlcCondition::Hash { hashlock, timelock } => {
            if hashlock.is_empty() {
                return Err(TokenError::InvalidCondition("empty hashlock"));
            }
            if let Some(deadline) = timelock {
                if *deadline <= now {
                    return Err(TokenError::InvalidCondition("timelock not in the future"));
                }
            }
        }
        HtlcCondition::Time { timelock } => {
            if *timelock <= now {
                return Err(TokenError::InvalidCondition("timelock not in the future"));
            }
            if refund_public_key.is_none() {
                return Err(TokenError::MissingRefundKey);
            }
        }
    }
    Ok(())
}

impl Token {
    /// Transfer under a hash or time condition.
    pub async fn transfer_htlc(
        &mut self,
        recipient_public_key: &[u8; 32],
        condition: HtlcCondition,
        refund_public_key: Option<[u8; 32]>,
    ) -> Result<HtlcPackage, TokenError> {
        self.ensure_unspent()?;
        validate_condition(&condition, refund_public_key.as_ref(), now_ms())?;

        let nullifier = self.nullifier();
        let nullifier_hex = hex::encode(nullifier);
        let commitment = self
            .services()
            .freebird
            .blind(recipient_public_key)
            .await?;
        let commitment_hex = hex::encode(&commitment);
        let ownership = schnorr::create_ownership_proof(self.secret(), &nullifier)?;
        let refund_hex = refund_public_key.map(hex::encode);

        let package_hash = crate::token::packages::htlc_package_hash(
            self.id(),
            self.amount(),
            &commitment_hex,
            &nullifier_hex,
            &condition,
            refund_hex.as_deref(),
        )?;
        let proof = self.services().witness.timestamp(&package_hash).await?;
        self.services()
            .gossip
            .publish(&nullifier_hex, proof.clone(), Some(ownership.to_vec()))
            .await?;
        self.mark_spent();

        Ok(HtlcPackage {
            token_id: self.id().to_string(),
            amount: self.amount(),
            commitment: commitment_hex,
            nullifier: nullifier_hex,
            condition,
            refund_public_key: refund_hex,
            proof,
            ownership_proof: Some(hex::encode(ownership)),
        })
    }
}

/// Claim an HTLC at an explicit clock.
///
/// Hash conditions demand the correct preimage; time-bounded conditions
/// demand `now < timelock` (at or past the deadline the claim window is
/// over and the refund path applies).
pub async fn receive_htlc_at(
    package: &HtlcPackage,
    recipient_secret: [u8; 32],
    preimage: Option<&[u8]>,
    services: Arc<Services>,
    now: u64,
) -> Result<Token, TokenError> {
    require_attested(&services.witness, &package.package_hash()?, &package.proof).await?;
    require_ownership(package.ownership_proof.as_deref(), &package.nullifier)?;

    match &package.condition {
        HtlcCondition::Hash { hashlock, timelock } => {
            let Some(preimage) = preimage else {
                return Err(TokenError::InvalidPreimage);
            };
            let expected = hex::decode(hashlock).map_err(|_| TokenError::InvalidPreimage)?;
            let actual = hashing::sha256(hex::encode(preimage).as_bytes());
            if !hashing::constant_time_eq(&actual, &expected) {
                return Err(TokenError::InvalidPreimage);
            }
            if let Some(deadline) = timelock {
                if now >= *deadline {
                    return Err(TokenError::TimelockExpired);
                }
            }
        }
        HtlcCondition::Time { timelock } => {
            if now >= *timelock {
                return Err(TokenError::TimelockExpired);
            }
        }
    }

    Ok(Token::from_parts(
        package.token_id.clone(),
        package.amount,
        recipient_secret,
        services,
    ))
}

/// Claim an HTLC with the system clock.
pub async fn receive_htlc(
    package: &HtlcPackage,
    recipient_secret: [u8; 32],
    preimage: Option<&[u8]>,
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    receive_htlc_at(package, recipient_secret, preimage, services, now_ms()).await
}

/// Refund an expired time-locked HTLC at an explicit clock.
///
/// Only time conditions are refundable; the refund secret must derive
/// the package's refund key (compared in constant time) and the deadline
/// must have passed.
pub async fn refund_htlc_at(
    package: &HtlcPackage,
    refund_secret: [u8; 32],
    services: Arc<Services>,
    now: u64,
) -> Result<Token, TokenError> {
    let HtlcCondition::Time { timelock } = &package.condition else {
        return Err(TokenError::InvalidCondition("only time conditions refund"));
    };
    if now < *timelock {
        return Err(TokenError::TimelockNotExpired);
    }
    let Some(refund_key_hex) = &package.refund_public_key else {
        return Err(TokenError::MissingRefundKey);
    };
    let expected = hex::decode(refund_key_hex).map_err(|_| TokenError::RefundKeyMismatch)?;
    let derived = hashing::derive_public_key(&refund_secret);
    if !hashing::constant_time_eq(&derived, &expected) {
        return Err(TokenError::RefundKeyMismatch);
    }

    require_attested(&services.witness, &package.package_hash()?, &package.proof).await?;

    Ok(Token::from_parts(
        package.token_id.clone(),
        package.amount,
        refund_secret,
        services,
    ))
}

/// Refund an expired time-locked HTLC with the system clock.
pub async fn refund_htlc(
    package: &HtlcPackage,
    refund_secret: [u8; 32],
    services: Arc<Services>,
) -> Result<Token, TokenError> {
    refund_htlc_at(package, refund_secret, services, now_ms()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashlock_matches_manual_derivation() {
        let preimage = [0xab_u8; 32];
        let expected = hex::encode(hashing::sha256(hex::encode(preimage).as_bytes()));
        assert_eq!(hashlock_for(&preimage), expected);
    }

    #[test]
    fn condition_validation() {
        // Time condition needs a future deadline and a refund key.
        let cond = HtlcCondition::Time { timelock: 1_000 };
        assert!(matches!(
            validate_condition(&cond, Some(&[0u8; 32]), 1_000),
            Err(TokenError::InvalidCondition(_))
        ));
        assert!(matches!(
            validate_condition(&cond, None, 500),
            Err(TokenError::MissingRefundKey)
        ));
        assert!(validate_condition(&cond, Some(&[0u8; 32]), 500).is_ok());

        let empty = HtlcCondition::Hash {
            hashlock: String::new(),
            timelock: None,
        };
        assert!(matches!(
            validate_condition(&empty, None, 0),
            Err(TokenError::InvalidCondition(_))
        ));
    }
}

//! Payment verification
//!
//! The payment gateway is an external collaborator. After authorizing a
//! charge it hands the client a [`PaymentProof`]; the server checks that the
//! proof was signed by the provider before accepting an online-prepaid
//! order. The signed message covers the authorized amount, so a proof cannot
//! be stretched over a larger order; reuse across orders is rejected by
//! `OrdersManager::create_order` against the ledger.

use async_trait::async_trait;
use ring::hmac;
use rust_decimal::Decimal;
use shared::order::PaymentProof;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Signature does not match
    #[error("invalid payment signature for {0}")]
    InvalidSignature(String),

    /// Provider could not be reached / no key configured
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies provider-signed payment proofs
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, proof: &PaymentProof) -> Result<(), PaymentError>;
}

/// `provider_order_id|payment_id|amount`, amount rendered with two decimals
fn signed_message(provider_order_id: &str, payment_id: &str, amount: Decimal) -> String {
    format!("{}|{}|{:.2}", provider_order_id, payment_id, amount)
}

/// HMAC-SHA256 over [`signed_message`], hex-encoded
pub struct HmacPaymentVerifier {
    key: Option<hmac::Key>,
}

impl HmacPaymentVerifier {
    /// An empty secret leaves the verifier unconfigured, every check fails
    /// with [`PaymentError::Unavailable`].
    pub fn new(secret: &str) -> Self {
        let key = (!secret.is_empty()).then(|| hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()));
        if key.is_none() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, online payments will be rejected");
        }
        Self { key }
    }

    /// Sign a proof (used by tests and local tooling)
    pub fn sign(&self, provider_order_id: &str, payment_id: &str, amount: Decimal) -> Option<String> {
        let key = self.key.as_ref()?;
        let msg = signed_message(provider_order_id, payment_id, amount);
        Some(hex::encode(hmac::sign(key, msg.as_bytes()).as_ref()))
    }
}

#[async_trait]
impl PaymentVerifier for HmacPaymentVerifier {
    async fn verify(&self, proof: &PaymentProof) -> Result<(), PaymentError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| PaymentError::Unavailable("no signing key configured".to_string()))?;

        let signature = hex::decode(&proof.signature)
            .map_err(|_| PaymentError::InvalidSignature(proof.payment_id.clone()))?;

        // constant-time comparison
        let msg = signed_message(&proof.provider_order_id, &proof.payment_id, proof.amount);
        hmac::verify(key, msg.as_bytes(), &signature)
            .map_err(|_| PaymentError::InvalidSignature(proof.payment_id.clone()))
    }
}

//! Deposits, payment history and spending

use gpuniq_core::{Client, Query, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::params::invalid_argument;

/// Payment provider for deposits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSystem {
    #[default]
    Yookassa,
    Stripe,
}

/// Payments API
#[derive(Debug, Clone, Copy)]
pub struct Payments<'a> {
    client: &'a Client,
}

impl<'a> Payments<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Create a top-up request; the response carries a confirmation URL
    pub async fn deposit(&self, amount: u64, payment_system: PaymentSystem) -> Result<Value> {
        if amount == 0 {
            return Err(invalid_argument("Deposit amount must be greater than zero"));
        }
        self.client
            .post_json(
                "/payments/deposit",
                &json!({ "amount": amount, "payment_system": payment_system }),
            )
            .await
    }

    /// Deposit history
    pub async fn history(&self) -> Result<Value> {
        self.client.get("/payments/history", Query::new()).await
    }

    /// Spending grouped by task
    pub async fn spending_history(&self) -> Result<Value> {
        self.client
            .get("/payments/spending-history", Query::new())
            .await
    }

    pub async fn create_stripe_intent(&self, amount: u64) -> Result<Value> {
        self.client
            .post_json(
                "/payments/stripe/create-payment-intent",
                &json!({ "amount": amount, "payment_system": PaymentSystem::Stripe }),
            )
            .await
    }

    pub async fn check_stripe_payment(&self, payment_id: &str) -> Result<Value> {
        self.client
            .post(&format!("/payments/stripe/check-payment/{}", payment_id))
            .await
    }

    /// Stripe publishable key
    pub async fn stripe_public_key(&self) -> Result<Value> {
        self.client
            .get("/payments/stripe/public-key", Query::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_system_wire_names() {
        assert_eq!(serde_json::to_value(PaymentSystem::default()).unwrap(), json!("yookassa"));
        assert_eq!(serde_json::to_value(PaymentSystem::Stripe).unwrap(), json!("stripe"));
    }
}

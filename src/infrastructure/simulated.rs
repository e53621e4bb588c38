use crate::domain::payment::PaymentReference;
use crate::domain::ports::{
    CheckoutRequest, GatewayAck, GatewayStatus, GatewayStatusKind, PaymentGateway,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Deterministic in-process gateway: acknowledges every initiate and reports
/// a transaction successful after a fixed number of verify polls. Used by the
/// smoke CLI and tests; no network involved.
pub struct SimulatedGateway {
    polls_until_success: u32,
    transactions: Arc<Mutex<HashMap<PaymentReference, u32>>>,
}

impl SimulatedGateway {
    pub fn new(polls_until_success: u32) -> Self {
        Self {
            polls_until_success,
            transactions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initiate(
        &self,
        request: &CheckoutRequest,
    ) -> Result<GatewayAck, GatewayError> {
        let mut transactions = self.transactions.lock().await;
        transactions.entry(request.reference).or_insert(0);

        let checkout_handle =
            format!("https://checkout.simulated.local/{}", request.reference);
        Ok(GatewayAck {
            checkout_handle: checkout_handle.clone(),
            transaction_id: Some(format!("SIM-{}", request.reference.as_uuid().simple())),
            raw: json!({
                "checkout_url": checkout_handle,
                "amount": request.amount.to_string(),
                "currency": request.currency,
            }),
        })
    }

    async fn verify(
        &self,
        reference: &PaymentReference,
    ) -> Result<GatewayStatus, GatewayError> {
        let mut transactions = self.transactions.lock().await;
        let polls = transactions
            .get_mut(reference)
            .ok_or_else(|| GatewayError::Rejected("unknown transaction".to_owned()))?;
        *polls += 1;

        let kind = if *polls >= self.polls_until_success {
            GatewayStatusKind::Success
        } else {
            GatewayStatusKind::Pending
        };
        Ok(GatewayStatus {
            kind,
            transaction_id: Some(format!("SIM-{}", reference.as_uuid().simple())),
            raw: json!({ "status": kind.as_str(), "tx_ref": reference.to_string() }),
        })
    }
}

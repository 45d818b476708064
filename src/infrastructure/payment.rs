use crate::domain::ports::{ChargeOutcome, PaymentGateway, PaymentRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// Stand-in for a real payment provider.
///
/// Approves every charge after an optional artificial latency, except for payment
/// methods registered as declined.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    latency: Duration,
    declined_methods: HashSet<String>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn declining(mut self, method: impl Into<String>) -> Self {
        self.declined_methods.insert(method.into());
        self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &PaymentRequest) -> Result<ChargeOutcome> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.declined_methods.contains(&request.method) {
            return Ok(ChargeOutcome::Declined {
                reason: format!("{} payments are not accepted", request.method),
            });
        }
        Ok(ChargeOutcome::Approved {
            reference: format!("PAY-{}", request.order_code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::UserId;
    use crate::domain::money::Money;
    use crate::domain::order::OrderCode;

    fn request(method: &str) -> PaymentRequest {
        PaymentRequest {
            order_code: OrderCode::from("ORD-ABCDEFGH-1".to_string()),
            user_id: UserId(1),
            amount: Money::ZERO,
            method: method.to_string(),
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_outcomes() {
        let gateway = SimulatedGateway::new().declining("momo");
        assert_eq!(
            gateway.charge(&request("credit_card")).await.unwrap(),
            ChargeOutcome::Approved {
                reference: "PAY-ORD-ABCDEFGH-1".to_string()
            }
        );
        assert!(matches!(
            gateway.charge(&request("momo")).await.unwrap(),
            ChargeOutcome::Declined { .. }
        ));
    }
}

//! HTTP client for the inventory service.

use std::time::Duration;

use async_trait::async_trait;
use domain::ProductId;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::inventory::{Availability, InventoryError, InventoryGateway};

/// Path of the availability endpoint, relative to the base URL.
pub const CHECK_PATH: &str = "/inventory/check";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `POST /inventory/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInventoryRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Body of a 200 or 400 answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInventoryResponse {
    #[serde(default)]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Inventory gateway speaking JSON over HTTP.
///
/// Status mapping: 200 carries the availability payload, 400 is a permanent
/// rejection, 500/503 are transient, anything else is unexpected.
#[derive(Debug, Clone)]
pub struct HttpInventoryGateway {
    check_url: String,
    client: reqwest::Client,
}

impl HttpInventoryGateway {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            check_url: format!("{}{CHECK_PATH}", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn check_url(&self) -> &str {
        &self.check_url
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    #[tracing::instrument(skip(self), fields(url = %self.check_url))]
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Availability, InventoryError> {
        let response = self
            .client
            .post(&self.check_url)
            .json(&CheckInventoryRequest {
                product_id,
                quantity,
            })
            .send()
            .await
            .map_err(|e| {
                metrics::counter!("inventory_checks_total", "outcome" => "transport_error")
                    .increment(1);
                InventoryError::Transport(e.to_string())
            })?;

        let status = response.status();
        let outcome = match status {
            StatusCode::OK => match response.json::<CheckInventoryResponse>().await {
                Ok(body) => Ok(Availability {
                    available: body.available,
                    message: body.message,
                }),
                Err(e) => Err(InventoryError::Decode(e.to_string())),
            },
            StatusCode::BAD_REQUEST => {
                let message = response
                    .json::<CheckInventoryResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.message)
                    .unwrap_or_else(|| "invalid request".to_string());
                Err(InventoryError::InvalidRequest(message))
            }
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                Err(InventoryError::Unavailable {
                    status: status.as_u16(),
                })
            }
            other => Err(InventoryError::UnexpectedStatus(other.as_u16())),
        };

        let label = match &outcome {
            Ok(a) if a.available => "available",
            Ok(_) => "unavailable",
            Err(e) if e.is_retryable() => "retryable_error",
            Err(_) => "rejected",
        };
        metrics::counter!("inventory_checks_total", "outcome" => label).increment(1);
        tracing::debug!(%product_id, quantity, status = status.as_u16(), outcome = label, "inventory checked");

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_url_joins_base() {
        let gateway = HttpInventoryGateway::new("http://inventory.local:8080/").unwrap();
        assert_eq!(gateway.check_url(), "http://inventory.local:8080/inventory/check");

        let gateway = HttpInventoryGateway::new("http://inventory.local/api").unwrap();
        assert_eq!(gateway.check_url(), "http://inventory.local/api/inventory/check");
    }

    #[test]
    fn test_request_wire_format() {
        let product_id: ProductId = uuid_product("ba320a5d-62ed-46d0-b491-084514598721");
        let json = serde_json::to_value(CheckInventoryRequest {
            product_id,
            quantity: 2,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "product_id": "ba320a5d-62ed-46d0-b491-084514598721",
                "quantity": 2
            })
        );
    }

    #[test]
    fn test_response_message_is_optional() {
        let body: CheckInventoryResponse =
            serde_json::from_str(r#"{"available": true}"#).unwrap();
        assert!(body.available);
        assert_eq!(body.message, None);
    }

    fn uuid_product(s: &str) -> ProductId {
        serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap()
    }
}

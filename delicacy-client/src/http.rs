//! HTTP client for the order REST collaborators

use crate::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::order::{KitchenStats, StatusUpdateRequest};
use shared::{Order, OrderStatus};

/// HTTP client for the backend REST API
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    ///
    /// Error bodies carry their reason under `detail` (or `message`).
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    ["detail", "message", "error"]
                        .iter()
                        .find_map(|key| body.get(key).and_then(Value::as_str).map(str::to_string))
                })
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
            return match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(ClientError::Validation(message))
                }
                _ => Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                }),
            };
        }

        serde_json::from_str(&text).map_err(Into::into)
    }

    // ========== Orders API ==========

    /// Kitchen queue (`GET /api/kitchen/orders`)
    pub async fn kitchen_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        let body: Value = self.get(&with_status("/api/kitchen/orders", status)).await?;
        decode_order_list(body)
    }

    /// Order list (`GET /api/orders`)
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        let body: Value = self.get(&with_status("/api/orders", status)).await?;
        decode_order_list(body)
    }

    /// Single order by id
    pub async fn get_order(&self, id: i64) -> ClientResult<Order> {
        let body: Value = self.get(&format!("/api/orders/{id}")).await?;
        decode_order(body)
    }

    /// Customer tracking lookup
    pub async fn track_order(&self, order_number: &str) -> ClientResult<Order> {
        let body: Value = self
            .get(&format!("/api/order/track/{}", order_number.trim()))
            .await?;
        decode_order(body)
    }

    /// Update order status
    ///
    /// Returns the updated order when the backend echoes it back, `None`
    /// when it only acknowledges (`{message, status}`).
    pub async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> ClientResult<Option<Order>> {
        let body: Value = self
            .put(&format!("/api/orders/{id}/status"), &StatusUpdateRequest { status })
            .await?;
        if body.get("order").is_none() && body.get("id").is_none() {
            return Ok(None);
        }
        // The update went through; a short echo is not a failure
        match decode_order(body) {
            Ok(order) => Ok(Some(order)),
            Err(e) => {
                tracing::debug!(order_id = id, "Status update echo not a full order: {e}");
                Ok(None)
            }
        }
    }

    // ========== Stats / Health API ==========

    /// Aggregate kitchen counters
    pub async fn kitchen_stats(&self) -> ClientResult<KitchenStats> {
        self.get("/api/kitchen/stats").await
    }

    /// Health probe (`GET /api/health`), any 2xx counts
    pub async fn health(&self) -> ClientResult<()> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}

fn with_status(path: &str, status: Option<OrderStatus>) -> String {
    match status {
        Some(status) => format!("{path}?status={status}"),
        None => path.to_string(),
    }
}

/// `[Order]` or `{orders: [Order]}`
///
/// Rows that fail to decode are logged and skipped, the rest of the listing
/// is kept.
fn decode_order_list(body: Value) -> ClientResult<Vec<Order>> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("orders") {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(ClientError::InvalidResponse(
                    "expected an order list".to_string(),
                ));
            }
        },
        _ => {
            return Err(ClientError::InvalidResponse(
                "expected an order list".to_string(),
            ));
        }
    };

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<Order>(row) {
            Ok(order) => orders.push(order),
            Err(e) => tracing::warn!("Skipping undecodable order row: {e}"),
        }
    }
    Ok(orders)
}

/// `Order` or `{order: Order}`
fn decode_order(mut body: Value) -> ClientResult<Order> {
    let order = match body.get_mut("order").map(Value::take) {
        Some(inner) => inner,
        None => body,
    };
    Ok(serde_json::from_value(order)?)
}

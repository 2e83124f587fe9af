//! REST client for the Dhan trading API.
//!
//! Every call carries the user's `access-token` and `client-id` headers
//! and is bounded by a per-call timeout. Responses are parsed leniently
//! by `crate::parse`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use riskctl_core::{BrokerCredentials, FundSnapshot, OrderSnapshot, PositionSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{BoxFuture, BrokerGateway, OrderRequest, OrderResult};
use crate::parse;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhanClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.dhan.co/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for DhanClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Broker gateway backed by the Dhan REST API.
pub struct DhanClient {
    client: Client,
    base_url: String,
}

impl DhanClient {
    pub fn new(config: &DhanClientConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, creds: &BrokerCredentials) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("access-token", creds.access_token.as_str())
            .header("client-id", creds.client_id.as_str())
            .header("Accept", "application/json")
    }

    /// Send and return `(status, body)`. Transport failures map to errors;
    /// HTTP status is left to the caller.
    async fn send(&self, builder: RequestBuilder) -> BrokerResult<(StatusCode, Value)> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) if status.is_success() => return Err(BrokerError::Json(e)),
                // Keep non-JSON error bodies for the rejection message.
                Err(_) => Value::String(text),
            }
        };
        Ok((status, body))
    }

    async fn get_json(&self, path: &str, creds: &BrokerCredentials) -> BrokerResult<Value> {
        let (status, body) = self.send(self.request(Method::GET, path, creds)).await?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        debug!(path, %status, "Broker GET ok");
        Ok(body)
    }

    /// Place/cancel call. Non-2xx becomes a failure result.
    async fn order_call(&self, builder: RequestBuilder) -> BrokerResult<OrderResult> {
        let (status, body) = self.send(builder).await?;
        if status.is_success() {
            return Ok(parse::parse_order_result(body));
        }
        let (code, message) = parse::parse_error_body(&body);
        warn!(%status, code = %code, message = %message, "Broker rejected order call");
        Ok(OrderResult::failure(code, message, body))
    }
}

fn map_transport_error(e: reqwest::Error) -> BrokerError {
    if e.is_timeout() || e.is_connect() {
        BrokerError::Transient(e.to_string())
    } else {
        BrokerError::Http(e.to_string())
    }
}

fn rejection(status: StatusCode, body: &Value) -> BrokerError {
    let (code, mut message) = parse::parse_error_body(body);
    if message.is_empty() {
        if let Value::String(text) = body {
            message = text.clone();
        }
    }
    BrokerError::Rejected {
        status: status.as_u16(),
        code,
        message,
    }
}

impl BrokerGateway for DhanClient {
    fn list_orders<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<OrderSnapshot>> {
        Box::pin(async move {
            let body = self.get_json("/orders", creds).await?;
            Ok(parse::parse_orders(body))
        })
    }

    fn list_positions<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<PositionSnapshot>> {
        Box::pin(async move {
            let body = self.get_json("/positions", creds).await?;
            Ok(parse::parse_positions(body))
        })
    }

    fn fund_limits<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<FundSnapshot>> {
        Box::pin(async move {
            let body = self.get_json("/fundlimit", creds).await?;
            Ok(parse::parse_funds(body))
        })
    }

    fn place_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        request: OrderRequest,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>> {
        Box::pin(async move {
            let body = request.to_wire(&creds.client_id);
            let builder = self.request(Method::POST, "/orders", creds).json(&body);
            self.order_call(builder).await
        })
    }

    fn cancel_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>> {
        Box::pin(async move {
            let builder = self.request(Method::DELETE, &format!("/orders/{order_id}"), creds);
            self.order_call(builder).await
        })
    }

    fn activate_kill_switch<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<Value>> {
        Box::pin(async move {
            let builder = self
                .request(Method::POST, "/killswitch", creds)
                .query(&[("killSwitchStatus", "ACTIVATE")]);
            let (status, body) = self.send(builder).await?;
            if status != StatusCode::OK {
                return Err(rejection(status, &body));
            }
            Ok(body)
        })
    }
}

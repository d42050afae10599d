use serde::Serialize;
use tracing::warn;

use crate::{ChannelError, DeliveryOutcome, build_client};
use crate::phone;

#[derive(Debug, Serialize)]
struct TextMessage {
    number: String,
    text: String,
}

/// Messaging-gateway transport. Sends plain text to a per-deployment
/// gateway instance; success is decided by the HTTP status alone.
pub struct WhatsAppTransport {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    api_key: String,
}

impl WhatsAppTransport {
    pub fn new(
        base_url: impl Into<String>,
        instance: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into(),
            instance: instance.into(),
            api_key: api_key.into(),
        })
    }

    pub async fn send(&self, raw_number: &str, text: &str) -> DeliveryOutcome {
        let number = phone::normalize(raw_number);
        let url = format!(
            "{}/message/sendText/{}",
            self.base_url.trim_end_matches('/'),
            self.instance
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&TextMessage {
                number,
                text: text.to_string(),
            })
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                // The gateway echoes a message key; keep it when present.
                let id = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|body| body.get("key")?.get("id")?.as_str().map(str::to_string));
                DeliveryOutcome::sent(id)
            }
            Ok(resp) => {
                let status = resp.status();
                warn!("Gateway rejected message to {}: {}", raw_number, status);
                DeliveryOutcome::failed(format!("gateway status {status}"))
            }
            Err(e) => {
                warn!("Gateway unreachable for {}: {}", raw_number, e);
                DeliveryOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_gateway_degrades_to_failed() {
        let transport =
            WhatsAppTransport::new("http://127.0.0.1:9", "pipeline", "test-key").unwrap();
        let outcome = transport.send("(11) 99999-8888", "Olá!").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}

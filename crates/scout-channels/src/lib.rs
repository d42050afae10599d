pub mod email;
pub mod phone;
pub mod whatsapp;

use std::time::Duration;

use thiserror::Error;

/// Every transport call is bounded — a hung provider surfaces as a
/// `failed` outcome instead of a stuck request.
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of one synchronous delivery attempt. Transports never return an
/// error: failures degrade to `success = false` with the cause recorded,
/// and the caller stores the message either way.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn sent(provider_message_id: Option<String>) -> DeliveryOutcome {
        DeliveryOutcome {
            success: true,
            provider_message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> DeliveryOutcome {
        DeliveryOutcome {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

fn build_client() -> Result<reqwest::Client, ChannelError> {
    Ok(reqwest::Client::builder().timeout(TRANSPORT_TIMEOUT).build()?)
}

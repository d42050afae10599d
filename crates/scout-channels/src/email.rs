use serde::Serialize;
use tracing::warn;

use crate::{ChannelError, DeliveryOutcome, build_client};

pub const DEFAULT_API_URL: &str = "https://api.mailersend.com/v1/email";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_to_email: String,
    pub reply_to_name: String,
    /// Signature line inside the letterhead body.
    pub sender_name: String,
}

#[derive(Debug, Serialize)]
struct Party {
    email: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct EmailPayload {
    from: Party,
    to: Vec<Party>,
    subject: String,
    html: String,
    text: String,
    reply_to: Party,
}

/// Transactional email transport. One call, no retries; the provider's
/// correlation id comes back in the `x-message-id` response header.
pub struct EmailTransport {
    client: reqwest::Client,
    config: EmailConfig,
}

impl EmailTransport {
    pub fn new(config: EmailConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    pub async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        content: &str,
    ) -> DeliveryOutcome {
        let payload = EmailPayload {
            from: Party {
                email: self.config.from_email.clone(),
                name: self.config.from_name.clone(),
            },
            to: vec![Party {
                email: to_email.to_string(),
                name: to_name.to_string(),
            }],
            subject: subject.to_string(),
            html: render_letterhead(content, &self.config.sender_name),
            text: content.to_string(),
            reply_to: Party {
                email: self.config.reply_to_email.clone(),
                name: self.config.reply_to_name.clone(),
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let id = resp
                    .headers()
                    .get("x-message-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!("ms_{}", chrono::Utc::now().timestamp_millis())
                    });
                DeliveryOutcome::sent(Some(id))
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!("Email API rejected send to {}: {} {}", to_email, status, body);
                DeliveryOutcome::failed(format!("email API status {status}"))
            }
            Err(e) => {
                warn!("Email API unreachable for {}: {}", to_email, e);
                DeliveryOutcome::failed(e.to_string())
            }
        }
    }
}

/// The fixed letterhead every outbound email is wrapped in. The body text
/// is dropped in verbatim apart from newline-to-`<br>` conversion.
pub fn render_letterhead(content: &str, sender_name: &str) -> String {
    let body = content.replace('\n', "<br>");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Mensagem da Gen.OI</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 30px; text-align: center; border-radius: 10px 10px 0 0;">
        <img src="https://genoi.net/wp-content/uploads/2024/12/Logo-gen.OI-Novo-1-2048x1035.png" alt="Gen.OI" style="height: 60px; margin-bottom: 20px;">
        <h1 style="color: white; margin: 0; font-size: 24px;">Gen.OI - Inovação Aberta</h1>
    </div>

    <div style="background: #f8f9fa; padding: 30px; border-radius: 0 0 10px 10px;">
        <div style="background: white; padding: 25px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1);">
            <div style="white-space: pre-wrap; margin-bottom: 25px; font-size: 16px;">
                {body}
            </div>

            <hr style="border: none; border-top: 1px solid #eee; margin: 25px 0;">

            <div style="font-size: 14px; color: #666;">
                <p><strong>Atenciosamente,</strong><br>
                {sender_name}<br>
                <em>Agente de Inovação Aberta - Gen.OI</em></p>

                <p style="margin-top: 20px;">
                    <strong>Gen.OI</strong><br>
                    Conectando empresas às melhores startups do mundo<br>
                    🌐 <a href="https://genoi.net" style="color: #667eea;">genoi.net</a><br>
                    📧 <a href="mailto:contact@genoi.net" style="color: #667eea;">contact@genoi.net</a>
                </p>
            </div>
        </div>
    </div>

    <div style="text-align: center; margin-top: 20px; font-size: 12px; color: #999;">
        <p>Esta mensagem foi enviada através da plataforma Gen.OI de inovação aberta.</p>
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterhead_converts_newlines_to_breaks() {
        let html = render_letterhead("Olá Carla,\nTudo bem?", "Genie");
        assert!(html.contains("Olá Carla,<br>Tudo bem?"));
        assert!(html.contains("Genie<br>"));
        assert!(html.contains("Gen.OI - Inovação Aberta"));
    }

    #[test]
    fn payload_matches_provider_shape() {
        let payload = EmailPayload {
            from: Party {
                email: "noreply@genoi.net".into(),
                name: "Gen.OI - Inovação Aberta".into(),
            },
            to: vec![Party {
                email: "carla@acme.example".into(),
                name: "Carla".into(),
            }],
            subject: "Convite".into(),
            html: "<p>Oi</p>".into(),
            text: "Oi".into(),
            reply_to: Party {
                email: "contact@genoi.net".into(),
                name: "Gen.OI - Suporte".into(),
            },
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["from"]["email"], "noreply@genoi.net");
        assert_eq!(json["to"][0]["name"], "Carla");
        assert_eq!(json["reply_to"]["email"], "contact@genoi.net");
        assert!(json.get("subject").is_some() && json.get("html").is_some());
    }

    #[tokio::test]
    async fn unreachable_endpoint_degrades_to_failed() {
        let transport = EmailTransport::new(EmailConfig {
            api_url: "http://127.0.0.1:9/v1/email".into(),
            api_key: "test-key".into(),
            from_email: "noreply@genoi.net".into(),
            from_name: "Gen.OI".into(),
            reply_to_email: "contact@genoi.net".into(),
            reply_to_name: "Gen.OI".into(),
            sender_name: "Genie".into(),
        })
        .unwrap();

        let outcome = transport.send("carla@acme.example", "Carla", "Oi", "corpo").await;
        assert!(!outcome.success);
        assert!(outcome.provider_message_id.is_none());
        assert!(outcome.error.is_some());
    }
}

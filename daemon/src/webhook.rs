/// Discord-compatible webhook delivery.
///
/// A [`NotificationContext`] is rendered as a single embed:
///
/// ```json
/// {"embeds":[{"title":…,"description":…,"color":…,"thumbnail":{"url":…},
///   "author":{…},"footer":{…},"timestamp":…,"fields":[…]}]}
/// ```
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::notification::{NotificationContext, ESET_LOGO, MONITOR_NAME};
use crate::sink::{DeliveryError, DeliverySink};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub thumbnail: Image,
    pub author: Author,
    pub footer: Footer,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Author {
    pub name: String,
    pub icon_url: String,
}

#[derive(Debug, Serialize)]
pub struct Footer {
    pub text: String,
    pub icon_url: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl From<&NotificationContext> for WebhookPayload {
    fn from(ctx: &NotificationContext) -> Self {
        let theme = ctx.theme();
        let embed = Embed {
            title: ctx.title.clone(),
            description: ctx.body.clone(),
            color: theme.color,
            thumbnail: Image {
                url: theme.thumbnail.to_string(),
            },
            author: Author {
                name: MONITOR_NAME.to_string(),
                icon_url: ESET_LOGO.to_string(),
            },
            footer: Footer {
                text: format!("{MONITOR_NAME} • Uptime: {}", ctx.uptime_text()),
                icon_url: ESET_LOGO.to_string(),
            },
            timestamp: ctx.timestamp.to_rfc3339(),
            fields: ctx
                .fields
                .iter()
                .map(|f| EmbedField {
                    name: f.label.clone(),
                    value: f.value.clone(),
                    inline: f.inline,
                })
                .collect(),
        };
        WebhookPayload {
            embeds: vec![embed],
        }
    }
}

/// POSTs notifications to a webhook URL. One attempt per notification.
pub struct WebhookSink {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl DeliverySink for WebhookSink {
    async fn deliver(&self, notification: &NotificationContext) -> Result<(), DeliveryError> {
        if !self.is_configured() {
            return Err(DeliveryError::NotConfigured);
        }

        let payload = WebhookPayload::from(notification);
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        tracing::debug!("Webhook accepted notification (HTTP {})", status.as_u16());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Field, Severity, SHIELD_IMAGE, THREAT_IMAGE};
    use chrono::{TimeZone, Utc};

    fn context(severity: Severity) -> NotificationContext {
        NotificationContext {
            title: "⚠️ Threat Detected!".to_string(),
            body: "ESET has detected a potential threat.".to_string(),
            severity,
            fields: vec![
                Field {
                    label: "🔍 Detection Type".to_string(),
                    value: "Malware Detection".to_string(),
                    inline: true,
                },
                Field {
                    label: "📁 Location".to_string(),
                    value: "`System Scan`".to_string(),
                    inline: false,
                },
            ],
            detection_count: 1,
            uptime: Duration::from_secs(125),
            timestamp: Utc.with_ymd_and_hms(2024, 12, 28, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn payload_wraps_a_single_embed() {
        let json = serde_json::to_value(WebhookPayload::from(&context(Severity::Alert))).unwrap();
        let embeds = json["embeds"].as_array().unwrap();
        assert_eq!(embeds.len(), 1);
        assert_eq!(embeds[0]["title"], "⚠️ Threat Detected!");
        assert_eq!(embeds[0]["description"], "ESET has detected a potential threat.");
    }

    #[test]
    fn payload_uses_severity_theme() {
        let alert = serde_json::to_value(WebhookPayload::from(&context(Severity::Alert))).unwrap();
        assert_eq!(alert["embeds"][0]["color"], 16_711_680);
        assert_eq!(alert["embeds"][0]["thumbnail"]["url"], THREAT_IMAGE);

        let start = serde_json::to_value(WebhookPayload::from(&context(Severity::Start))).unwrap();
        assert_eq!(start["embeds"][0]["color"], 5_814_783);
        assert_eq!(start["embeds"][0]["thumbnail"]["url"], SHIELD_IMAGE);
    }

    #[test]
    fn payload_footer_shows_uptime() {
        let json = serde_json::to_value(WebhookPayload::from(&context(Severity::Stop))).unwrap();
        assert_eq!(
            json["embeds"][0]["footer"]["text"],
            "ESET Security Monitor • Uptime: 2m 5s"
        );
        assert_eq!(json["embeds"][0]["author"]["name"], MONITOR_NAME);
    }

    #[test]
    fn payload_fields_keep_order_and_inline_flag() {
        let json = serde_json::to_value(WebhookPayload::from(&context(Severity::Alert))).unwrap();
        let fields = json["embeds"][0]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "🔍 Detection Type");
        assert_eq!(fields[0]["inline"], true);
        assert_eq!(fields[1]["name"], "📁 Location");
        assert_eq!(fields[1]["inline"], false);
    }

    #[test]
    fn payload_timestamp_is_rfc3339_utc() {
        let json = serde_json::to_value(WebhookPayload::from(&context(Severity::Alert))).unwrap();
        assert_eq!(json["embeds"][0]["timestamp"], "2024-12-28T12:00:00+00:00");
    }

    #[tokio::test]
    async fn unconfigured_sink_fails_without_network() {
        let sink = WebhookSink::new("  ", Duration::from_secs(1));
        assert!(!sink.is_configured());
        let err = sink.deliver(&context(Severity::Start)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::NotConfigured));
    }

    /// Serves one request on a loopback port, answering with `status_line`,
    /// and hands back the raw request text.
    async fn one_shot_server(
        status_line: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/webhook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn no_content_response_is_success() {
        let (url, server) = one_shot_server("HTTP/1.1 204 No Content").await;
        let sink = WebhookSink::new(url, Duration::from_secs(5));
        sink.deliver(&context(Severity::Alert)).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /webhook"));
        assert!(request.contains("\"embeds\""));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, server) = one_shot_server("HTTP/1.1 429 Too Many Requests").await;
        let sink = WebhookSink::new(url, Duration::from_secs(5));
        let err = sink.deliver(&context(Severity::Alert)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status(429)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = WebhookSink::new(format!("http://{addr}/webhook"), Duration::from_secs(2));
        let err = sink.deliver(&context(Severity::Start)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}

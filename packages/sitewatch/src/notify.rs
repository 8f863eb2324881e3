use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::error::{BackendInitError, DeliveryError};
use crate::traits::Notifier;
use crate::types::{ChangeKind, ChangeRecord, RunInfo};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    site_url: &'a str,
    crawl_id: &'a str,
    #[serde(rename = "type")]
    kind: ChangeKind,
    filename: &'a str,
    /// Base64 so arbitrary page text survives any JSON consumer.
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_encoding: Option<&'static str>,
}

fn build_payload<'a>(change: &'a ChangeRecord, run: &'a RunInfo) -> WebhookPayload<'a> {
    let content = change.content.as_deref().map(|c| BASE64.encode(c));
    let content_encoding = content.as_ref().map(|_| "base64");
    WebhookPayload {
        site_url: &run.site_url,
        crawl_id: &run.crawl_id,
        kind: change.kind,
        filename: &change.filename,
        content,
        content_encoding,
    }
}

/// POSTs one JSON payload per change record to a configured endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Url,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url) -> Result<Self, BackendInitError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, change: &ChangeRecord, run: &RunInfo) -> Result<(), DeliveryError> {
        let payload = build_payload(change, run);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        debug!(filename = %change.filename, kind = change.kind.as_str(), "change delivered");
        Ok(())
    }
}

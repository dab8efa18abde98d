//! Logs ingestion sink
//!
//! POSTs each batch as a JSON array to
//! `{endpoint}/dataCollectionRules/{rule}/streams/{stream}`. Any 2xx answer
//! accepts the batch; other statuses reject it; connection failures and
//! timeouts are transport errors.

use super::{backfill_time_generated, Batch, BatchSink, DeliveryReceipt};
use crate::error::{SinkError, SinkResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Ingestion API version appended to every request
pub const API_VERSION: &str = "2023-01-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Rejection bodies longer than this are cut in receipts
const MAX_BODY_IN_MESSAGE: usize = 512;

/// Where and how to post batches
#[derive(Debug, Clone)]
pub struct HttpSinkSettings {
    /// Data collection endpoint, e.g. `https://my-dce.westeurope-1.ingest.monitor.azure.com`
    pub endpoint: String,
    /// Immutable id of the data collection rule
    pub rule_id: String,
    pub stream: String,
    /// Bearer token; requests are sent unauthenticated without one
    pub token: Option<String>,
}

impl HttpSinkSettings {
    pub fn url(&self) -> String {
        format!(
            "{}/dataCollectionRules/{}/streams/{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.rule_id,
            self.stream,
            API_VERSION
        )
    }
}

pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    endpoint: String,
}

impl HttpSink {
    pub fn new(settings: HttpSinkSettings) -> SinkResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &settings.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SinkError::Invalid(format!("bad token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Invalid(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.url(),
            endpoint: settings.endpoint,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport(&self, err: reqwest::Error) -> SinkError {
        SinkError::Transport {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl BatchSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, batch: &Batch) -> SinkResult<DeliveryReceipt> {
        let mut records = batch.records.clone();
        backfill_time_generated(&mut records, Utc::now());
        let body = serde_json::to_vec(&records)?;

        let response = self
            .client
            .post(&self.url)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        debug!(
            namespace = %batch.namespace,
            batch = batch.sequence,
            status = %status,
            "Batch posted"
        );

        if status.is_success() {
            return Ok(DeliveryReceipt::accepted(records.len()));
        }

        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_BODY_IN_MESSAGE {
            let cut = (0..=MAX_BODY_IN_MESSAGE)
                .rev()
                .find(|i| text.is_char_boundary(*i))
                .unwrap_or(0);
            text.truncate(cut);
        }
        Ok(DeliveryReceipt::rejected(
            records.len(),
            format!("HTTP {}: {}", status, text),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::accumulator::tests::record;

    fn settings(endpoint: &str) -> HttpSinkSettings {
        HttpSinkSettings {
            endpoint: endpoint.into(),
            rule_id: "dcr-0123".into(),
            stream: "Custom-FileInventory_CL".into(),
            token: Some("secret".into()),
        }
    }

    #[test]
    fn test_url_shape() {
        let sink = HttpSink::new(settings("https://dce.example.com/")).unwrap();
        assert_eq!(
            sink.url(),
            "https://dce.example.com/dataCollectionRules/dcr-0123/streams/Custom-FileInventory_CL?api-version=2023-01-01"
        );
    }

    #[test]
    fn test_bad_token_rejected() {
        let mut bad = settings("https://dce.example.com");
        bad.token = Some("line\nbreak".into());
        assert!(matches!(HttpSink::new(bad), Err(SinkError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let sink = HttpSink::new(settings("http://127.0.0.1:1")).unwrap();
        let batch = Batch {
            execution_id: "exec".into(),
            namespace: "share".into(),
            sequence: 1,
            records: vec![record("a.txt")],
        };

        assert!(matches!(
            sink.deliver(&batch).await,
            Err(SinkError::Transport { .. })
        ));
    }
}

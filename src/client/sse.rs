//! Push client transport: line-oriented event stream consumer
//!
//! Framing: a label line (`event:` or `label:`) sets the current event name, and every
//! data line (`data:` or `payload:`) fires the callback at once, tagged with that name.
//! The name sticks until the next label line. Blank lines are skipped rather than treated
//! as record terminators, so a multi-line record produces one callback per data line.

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClientError, ClientOptions};

const LABEL_FIELDS: [&str; 2] = ["event:", "label:"];
const PAYLOAD_FIELDS: [&str; 2] = ["data:", "payload:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub label: String,
    pub payload: String,
}

impl EventRecord {
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[derive(Debug, Default)]
pub struct EventParser {
    current_label: String,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    pub fn feed_line(&mut self, line: &str) -> Option<EventRecord> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(label) = field_value(line, &LABEL_FIELDS) {
            self.current_label = label.to_string();
            return None;
        }

        field_value(line, &PAYLOAD_FIELDS).map(|payload| EventRecord {
            label: self.current_label.clone(),
            payload: payload.to_string(),
        })
    }
}

fn field_value<'a>(line: &'a str, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| line.strip_prefix(field))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

pub struct SseTransport {
    url: String,
    client: reqwest::Client,
    shutdown: CancellationToken,
}

impl SseTransport {
    pub fn new(url: impl Into<String>, options: &ClientOptions) -> Result<Self, ClientError> {
        // No overall timeout: the stream is expected to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
            shutdown: CancellationToken::new(),
        })
    }

    /// Streams events into `handler` until the server ends the stream or `close` is called.
    pub async fn subscribe<F>(&self, mut handler: F) -> Result<(), ClientError>
    where
        F: FnMut(EventRecord) + Send,
    {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();

        let response = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(()),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        info!(url = %self.url, "event stream opened");

        let mut chunks = response.bytes_stream();
        let mut parser = EventParser::new();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(url = %self.url, "event stream cancelled");
                    return Ok(());
                }
                chunk = chunks.next() => chunk,
            };

            let Some(chunk) = chunk else {
                info!(url = %self.url, "event stream ended by server");
                return Ok(());
            };
            buffer.extend_from_slice(&chunk?);

            while let Some(end) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                if let Some(record) = parser.feed_line(&String::from_utf8_lossy(&line)) {
                    handler(record);
                }
            }
        }
    }

    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

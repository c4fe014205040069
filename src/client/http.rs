//! Unary client transport: one POST per call

use serde_json::Value;
use tracing::{debug, warn};

use super::{ClientError, ClientOptions};
use crate::mcp::rpc::{RequestIds, RpcRequest, RpcResponse};

#[derive(Debug)]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    ids: RequestIds,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, options: &ClientOptions) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
            ids: RequestIds::new(),
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let request = RpcRequest::new(self.ids.next_id(), method, params);
        debug!(id = request.id, method, url = %self.url, "sending http request");

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let envelope: RpcResponse = serde_json::from_slice(&body).map_err(ClientError::Decode)?;
        if envelope.id != request.id {
            warn!(
                expected = request.id,
                received = envelope.id,
                "response id does not match request"
            );
        }

        envelope.into_result().map_err(ClientError::from)
    }
}

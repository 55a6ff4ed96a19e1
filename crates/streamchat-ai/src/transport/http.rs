//! reqwest-backed transport

use std::sync::Arc;

use futures::StreamExt;
use reqwest::{Client, Method};
use tokio::task::JoinHandle;

use super::{ResponseSink, Transport, TransportRequest, TransportResponse};
use crate::error::{ChatError, Result};
use crate::http_client::build_http_client;

/// Transport that runs each exchange as a task on the current tokio runtime.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn create_request(&self) -> Result<Box<dyn TransportRequest>> {
        Ok(Box::new(ReqwestRequest {
            client: self.client.clone(),
            url: String::new(),
            verb: "GET".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            streaming: false,
            task: None,
        }))
    }
}

struct ReqwestRequest {
    client: Client,
    url: String,
    verb: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    streaming: bool,
    task: Option<JoinHandle<()>>,
}

impl TransportRequest for ReqwestRequest {
    fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    fn set_verb(&mut self, verb: &str) {
        self.verb = verb.to_string();
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    fn send(&mut self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ChatError::Runtime(e.to_string()))?;

        let method = Method::from_bytes(self.verb.as_bytes())
            .map_err(|_| ChatError::InvalidRequest(format!("bad verb '{}'", self.verb)))?;

        let mut builder = self.client.request(method, &self.url);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder.body(std::mem::take(&mut self.body)).build()?;

        let client = self.client.clone();
        let streaming = self.streaming;
        self.task = Some(runtime.spawn(run_exchange(client, request, streaming, sink)));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_exchange(
    client: Client,
    request: reqwest::Request,
    streaming: bool,
    sink: Arc<dyn ResponseSink>,
) {
    let response = match client.execute(request).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(error = %e, "Chat request failed before a response arrived");
            sink.on_complete(false, None);
            return;
        }
    };

    let status = response.status().as_u16();
    let mut body = Vec::new();

    if streaming {
        let mut byte_stream = response.bytes_stream();
        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(status, error = %e, "Stream error");
                    sink.on_complete(false, Some(TransportResponse::new(status, body)));
                    return;
                }
            };

            if chunk.is_empty() {
                continue;
            }

            body.extend_from_slice(&chunk);
            if !sink.on_body_chunk(&chunk) {
                tracing::debug!(status, "Response consumer stopped the stream");
                sink.on_complete(false, Some(TransportResponse::new(status, body)));
                return;
            }
        }
    } else {
        match response.bytes().await {
            Ok(bytes) => body.extend_from_slice(&bytes),
            Err(e) => {
                tracing::warn!(status, error = %e, "Failed to read response body");
                sink.on_complete(false, Some(TransportResponse::new(status, body)));
                return;
            }
        }
    }

    sink.on_complete(true, Some(TransportResponse::new(status, body)));
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use recycle_scan::{
    Analyzer, HttpClient, HttpError, HttpResponse, InferenceEndpoint, RetryConfig,
    RetryingTransport, ScanSession, ValidatedUrl,
};
use secrecy::SecretString;
use tokio::time::Instant;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01";
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0\x01";
pub const API_KEY: &str = "integration-key";

pub enum Step {
    Reply {
        status: u16,
        body: Vec<u8>,
        delay: Duration,
    },
    Fail(HttpError),
}

impl Step {
    pub fn verdict(text: &str) -> Self {
        Self::verdict_after(text, Duration::ZERO)
    }

    pub fn verdict_after(text: &str, delay: Duration) -> Self {
        let body = serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        });
        Self::Reply {
            status: 200,
            body: serde_json::to_vec(&body).unwrap(),
            delay,
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Reply {
            status,
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn api_error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": { "code": status, "message": message } });
        Self::Reply {
            status,
            body: serde_json::to_vec(&body).unwrap(),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Call {
    pub at: Instant,
    pub url: String,
    pub body: serde_json::Value,
}

/// Plays back canned steps in order; once exhausted it repeats `fallback`.
#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    fallback_status: Option<u16>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    pub fn always(status: u16) -> Arc<Self> {
        Arc::new(Self {
            fallback_status: Some(status),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn post_json(&self, url: &ValidatedUrl, body: Bytes) -> Result<HttpResponse, HttpError> {
        self.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            url: url.as_str().to_string(),
            body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
        });

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply {
                status,
                body,
                delay,
            }) => {
                tokio::time::sleep(delay).await;
                Ok(HttpResponse::new(status, body, "scripted".into(), 0))
            }
            Some(Step::Fail(error)) => Err(error),
            None => match self.fallback_status {
                Some(status) => Ok(HttpResponse::new(status, Vec::new(), "scripted".into(), 0)),
                None => panic!("scripted client ran out of steps"),
            },
        }
    }
}

pub fn endpoint() -> InferenceEndpoint {
    InferenceEndpoint::new(
        ValidatedUrl::new("https://inference.test/v1beta/models/test-model:generateContent")
            .unwrap(),
        SecretString::new(API_KEY.into()),
    )
}

pub fn session(client: Arc<ScriptedClient>) -> ScanSession<Arc<ScriptedClient>> {
    session_with(client, RetryConfig::default())
}

pub fn session_with(
    client: Arc<ScriptedClient>,
    config: RetryConfig,
) -> ScanSession<Arc<ScriptedClient>> {
    ScanSession::new(Analyzer::new(RetryingTransport::new(client, config), endpoint()))
}

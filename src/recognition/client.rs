use std::{future::Future, pin::Pin, time::Duration};

use anyhow::{bail, Context, Result};

use crate::capture::CapturedFrame;

use super::types::{ScanRequest, ScanResponse};

pub type ScanFuture<'a> = Pin<Box<dyn Future<Output = Result<ScanResponse>> + Send + 'a>>;

/// Remote face recognition. One call is one round trip for one frame.
pub trait RecognitionClient: Send + Sync {
    fn scan<'a>(&'a self, frame: &'a CapturedFrame) -> ScanFuture<'a>;
}

pub struct HttpRecognitionClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpRecognitionClient {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/attendance/scan", base_url.trim_end_matches('/')),
            auth_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RecognitionClient for HttpRecognitionClient {
    fn scan<'a>(&'a self, frame: &'a CapturedFrame) -> ScanFuture<'a> {
        Box::pin(async move {
            let mut request = self.http.post(&self.endpoint).json(&ScanRequest {
                image: &frame.data_url,
            });
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.context("scan request failed")?;
            let status = response.status();
            if !status.is_success() {
                bail!("scan request rejected with status {status}");
            }

            response
                .json::<ScanResponse>()
                .await
                .context("invalid scan response body")
        })
    }
}

use crate::ExecutionClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use codeexec_core::{ErrorDetail, ErrorKind, ExecutionResult};
use codeexec_server::{ExecuteRequest, LanguageInfo, LanguagesResponse, API_KEY_HEADER};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

/// Error bodies carry a `kind` that is not always an execution error kind
/// (e.g. `unauthorized`), so it is kept as a string until classified.
#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

/// HTTP client for a running `codeexec-server`.
pub struct RemoteClient {
    server_url: String,
    api_key: Option<String>,
    http_client: Client,
}

impl RemoteClient {
    pub fn new(server_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_key,
            http_client: Client::new(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }
}

fn parse_kind(kind: &str) -> Option<ErrorKind> {
    serde_json::from_value(serde_json::Value::String(kind.to_string())).ok()
}

#[async_trait]
impl ExecutionClient for RemoteClient {
    async fn execute(
        &self,
        code: &str,
        language: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        let url = format!("{}/api/execute", self.server_url);
        let request = ExecuteRequest {
            code: code.to_string(),
            language: language.to_string(),
            timeout_ms: timeout.map(|t| t.as_millis() as u64),
        };

        let response = self
            .authorized(self.http_client.post(&url).json(&request))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        let status = response.status();
        let body: ResponseBody = response
            .json()
            .await
            .with_context(|| format!("unexpected response from server ({})", status))?;

        if let Some(output) = body.output {
            return Ok(ExecutionResult::success(output));
        }

        let message = body.error.unwrap_or_else(|| format!("server returned {}", status));
        match body.kind.as_deref().and_then(parse_kind) {
            Some(kind) => Ok(ExecutionResult {
                stdout: String::new(),
                error: Some(ErrorDetail { kind, message }),
            }),
            None => anyhow::bail!("server rejected the request ({}): {}", status, message),
        }
    }

    async fn languages(&self) -> Result<Vec<LanguageInfo>> {
        let url = format!("{}/api/languages", self.server_url);
        let response = self
            .authorized(self.http_client.get(&url))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        if !response.status().is_success() {
            anyhow::bail!("failed to list languages: {}", response.status());
        }
        let body: LanguagesResponse = response.json().await?;
        Ok(body.languages)
    }
}

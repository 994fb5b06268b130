//! Connection to the remote comparison service

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, RequestBuilder, Response};
use snapmatch_common::{
    Error, MatchResult, MatchWindowData, Result, RunningSession, SessionStartInfo, TestResults,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::EngineConfig;

/// Calls made to the comparison service
#[async_trait]
pub trait ServerConnector: Send + Sync {
    async fn start_session(&self, info: &SessionStartInfo) -> Result<RunningSession>;

    /// Store a base64 PNG under `id` and return the URL it can be fetched from
    async fn upload_screenshot(&self, id: &str, screenshot64: &str) -> Result<String>;

    async fn match_window(&self, session: &RunningSession, data: &MatchWindowData) -> Result<MatchResult>;

    async fn stop_session(&self, session: &RunningSession, aborted: bool) -> Result<TestResults>;
}

fn submission_error(context: &str, cause: impl std::fmt::Display) -> Error {
    Error::MatchSubmission(format!("{}: {}", context, cause))
}

/// JSON-over-HTTP connector
pub struct HttpServerConnector {
    client: Client,
    server_url: String,
    api_key: Option<String>,
}

impl HttpServerConnector {
    pub fn new(server_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| submission_error("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            &config.server_url,
            config.resolved_api_key(),
            Duration::from_secs(config.http.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.server_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("apiKey", key.as_str())]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| submission_error(context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(submission_error(context, format!("{} {}", status, body.trim())));
        }
        Ok(response)
    }
}

#[async_trait]
impl ServerConnector for HttpServerConnector {
    async fn start_session(&self, info: &SessionStartInfo) -> Result<RunningSession> {
        let url = self.endpoint("sessions/running");
        debug!("Starting session for '{}' at {}", info.scenario_id_or_name, url);

        let response = self
            .send(
                self.client.post(&url).json(&serde_json::json!({ "startInfo": info })),
                "Failed to start session",
            )
            .await?;
        let session: RunningSession = response
            .json()
            .await
            .map_err(|e| submission_error("Failed to parse session", e))?;

        info!("Session {} started (new: {})", session.id, session.is_new);
        Ok(session)
    }

    async fn upload_screenshot(&self, id: &str, screenshot64: &str) -> Result<String> {
        let png = base64::engine::general_purpose::STANDARD
            .decode(screenshot64)
            .map_err(|e| submission_error("Invalid screenshot payload", e))?;

        let url = self.endpoint(&format!("images/{}", id));
        debug!("Uploading {} byte screenshot to {}", png.len(), url);

        let response = self
            .send(
                self.client.put(&url).header(CONTENT_TYPE, "image/png").body(png),
                "Failed to upload screenshot",
            )
            .await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(location.unwrap_or(url))
    }

    async fn match_window(&self, session: &RunningSession, data: &MatchWindowData) -> Result<MatchResult> {
        let url = self.endpoint(&format!("sessions/running/{}", session.id));
        debug!("Matching '{}' (ignore mismatch: {})", data.tag, data.ignore_mismatch);

        let response = self
            .send(self.client.post(&url).json(data), "Failed to match window")
            .await?;
        response
            .json()
            .await
            .map_err(|e| submission_error("Failed to parse match result", e))
    }

    async fn stop_session(&self, session: &RunningSession, aborted: bool) -> Result<TestResults> {
        let url = self.endpoint(&format!("sessions/running/{}", session.id));
        let aborted = aborted.to_string();

        let response = self
            .send(
                self.client
                    .delete(&url)
                    .query(&[("aborted", aborted.as_str()), ("updateBaseline", "false")]),
                "Failed to stop session",
            )
            .await?;
        let results: TestResults = response
            .json()
            .await
            .map_err(|e| submission_error("Failed to parse test results", e))?;

        info!(
            "Session {} stopped: {} match(es), {} mismatch(es)",
            session.id, results.matches, results.mismatches
        );
        Ok(results)
    }
}

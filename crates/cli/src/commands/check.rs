//! Check Command
//!
//! Runs one checkpoint for an image file inside its own session.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use snapmatch_common::{MatchLevel, MatchResult, Region, TestResults};
use snapmatch_engine::{
    CheckSettings, CheckpointRequest, EngineConfig, HttpServerConnector, MatchWindowTask,
    ServerConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::file_output::FileOutputProvider;
use crate::output::{print_error, print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CheckArgs {
    /// Screenshot to check (PNG)
    #[arg(short, long)]
    pub image: PathBuf,

    /// Checkpoint tag
    #[arg(short, long)]
    pub tag: String,

    /// Test name reported to the service (defaults to the tag)
    #[arg(long)]
    pub test_name: Option<String>,

    /// Retry timeout in milliseconds (defaults to match_timeout_ms)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Wait the whole timeout, then check exactly once
    #[arg(long)]
    pub run_once: bool,

    /// Only check this part of the image (left,top,width,height)
    #[arg(long)]
    pub region: Option<Region>,

    /// Region the service should ignore (left,top,width,height); repeatable
    #[arg(long = "ignore-region")]
    pub ignore_regions: Vec<Region>,

    /// Match level for this checkpoint
    #[arg(long)]
    pub match_level: Option<MatchLevel>,
}

impl CheckArgs {
    /// Per-checkpoint settings, or `None` when nothing overrides the session defaults
    pub fn check_settings(&self) -> Option<CheckSettings> {
        if self.match_level.is_none() && self.ignore_regions.is_empty() {
            return None;
        }

        let mut settings = CheckSettings::new();
        if let Some(level) = self.match_level {
            settings = settings.match_level(level);
        }
        for region in &self.ignore_regions {
            settings = settings.ignore(*region);
        }
        Some(settings)
    }

    pub fn checkpoint(&self) -> CheckpointRequest {
        let mut request = CheckpointRequest::new(&self.tag)
            .with_region(self.region.unwrap_or(Region::EMPTY))
            .with_source(self.image.display().to_string());
        if let Some(settings) = self.check_settings() {
            request = request.with_check_settings(settings);
        }
        if let Some(timeout) = self.timeout_ms {
            request = request.with_retry_timeout(Duration::from_millis(timeout));
        }
        if self.run_once {
            request = request.run_once_on_timeout();
        }
        request
    }
}

/// Checkpoint outcome for display
#[derive(Serialize)]
pub struct CheckDisplay {
    pub tag: String,
    pub status: String,
    pub window_id: Option<i64>,
    pub steps: u32,
    pub mismatches: u32,
    pub url: Option<String>,
}

impl CheckDisplay {
    fn new(tag: &str, result: &MatchResult, results: &TestResults) -> Self {
        Self {
            tag: tag.to_string(),
            status: if result.as_expected { "Passed" } else { "Mismatch" }.to_string(),
            window_id: result.window_id,
            steps: results.steps,
            mismatches: results.mismatches,
            url: results.url.clone(),
        }
    }
}

impl TableDisplay for CheckDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Tag", "Status", "Window", "Steps", "Mismatches", "URL"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.tag.clone(),
            self.status.clone(),
            self.window_id.map(|id| id.to_string()).unwrap_or_default(),
            self.steps.to_string(),
            self.mismatches.to_string(),
            self.url.clone().unwrap_or_default(),
        ]
    }
}

/// Run the checkpoint; returns whether it matched
pub async fn execute(args: CheckArgs, config: &EngineConfig, format: OutputFormat) -> Result<bool> {
    let connector: Arc<dyn ServerConnector> = Arc::new(
        HttpServerConnector::from_config(config).context("Failed to create server connector")?,
    );

    let test_name = args.test_name.clone().unwrap_or_else(|| args.tag.clone());
    let session = connector
        .start_session(&config.session_start_info(&test_name))
        .await
        .context("Failed to start session")?;

    let mut task = MatchWindowTask::new(
        connector.clone(),
        session.clone(),
        config.match_timeout(),
        config.default_match_settings.clone(),
        Box::new(FileOutputProvider::new(&args.image)),
    );

    let result = match task.match_window(&args.checkpoint()).await {
        Ok(result) => result,
        Err(e) => {
            if let Err(stop_err) = connector.stop_session(&session, true).await {
                warn!("Failed to abort session {}: {}", session.id, stop_err);
            }
            return Err(e).context(format!("Checkpoint '{}' failed", args.tag));
        }
    };

    let results = connector
        .stop_session(&session, false)
        .await
        .context("Failed to stop session")?;

    if result.as_expected {
        print_success(&format!("Checkpoint '{}' matched", args.tag));
    } else {
        print_error(&format!("Checkpoint '{}' does not match the baseline", args.tag));
    }
    print_item(&CheckDisplay::new(&args.tag, &result, &results), format);

    Ok(result.as_expected)
}

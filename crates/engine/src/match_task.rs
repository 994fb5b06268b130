//! Match-window task
//!
//! Takes a screenshot, submits it to the comparison service and, while the
//! service reports a mismatch, keeps polling until the retry timeout is spent.
//! One task belongs to one running session and handles one checkpoint at a
//! time (`match_window` takes `&mut self`).

use snapmatch_common::{
    AppOutput, AppOutputWithScreenshot, DefaultMatchSettings, ImageMatchOptions,
    ImageMatchSettings, MatchResult, MatchWindowData, Region, Result, RunningSession, Screenshot,
    Trigger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

use crate::connector::ServerConnector;
use crate::output::AppOutputProvider;
use crate::settings::{create_image_match_settings, CheckSettings};

/// Pause between polling attempts
pub const MATCH_INTERVAL: Duration = Duration::from_millis(500);

/// One checkpoint to match
#[derive(Debug, Clone, Default)]
pub struct CheckpointRequest {
    pub user_inputs: Vec<Trigger>,
    /// Region to capture; size-empty means the whole page
    pub region: Region,
    pub tag: String,
    /// Wait the whole retry timeout, then try exactly once
    pub should_run_once_on_timeout: bool,
    pub ignore_mismatch: bool,
    pub check_settings: Option<CheckSettings>,
    /// `None` uses the task's default retry timeout
    pub retry_timeout: Option<Duration>,
    pub source: Option<String>,
}

impl CheckpointRequest {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_check_settings(mut self, settings: CheckSettings) -> Self {
        self.check_settings = Some(settings);
        self
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    pub fn run_once_on_timeout(mut self) -> Self {
        self.should_run_once_on_timeout = true;
        self
    }

    pub fn ignore_mismatch(mut self) -> Self {
        self.ignore_mismatch = true;
        self
    }

    pub fn with_user_inputs(mut self, inputs: Vec<Trigger>) -> Self {
        self.user_inputs = inputs;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Where a `match_window` call currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Idle,
    TakingScreenshot,
    Retrying,
    Matched,
    Done,
}

pub struct MatchWindowTask {
    connector: Arc<dyn ServerConnector>,
    running_session: RunningSession,
    default_retry_timeout: Duration,
    default_match_settings: DefaultMatchSettings,
    output_provider: Box<dyn AppOutputProvider>,
    state: MatchState,
    match_result: Option<MatchResult>,
    last_screenshot: Option<Screenshot>,
    last_screenshot_bounds: Option<Region>,
}

impl MatchWindowTask {
    pub fn new(
        connector: Arc<dyn ServerConnector>,
        running_session: RunningSession,
        default_retry_timeout: Duration,
        default_match_settings: DefaultMatchSettings,
        output_provider: Box<dyn AppOutputProvider>,
    ) -> Self {
        Self {
            connector,
            running_session,
            default_retry_timeout,
            default_match_settings,
            output_provider,
            state: MatchState::Idle,
            match_result: None,
            last_screenshot: None,
            last_screenshot_bounds: None,
        }
    }

    /// Match one checkpoint, retrying until it matches or the timeout runs out
    pub async fn match_window(&mut self, request: &CheckpointRequest) -> Result<MatchResult> {
        let retry_timeout = request.retry_timeout.unwrap_or(self.default_retry_timeout);
        debug!("Matching '{}' with retry timeout {:?}", request.tag, retry_timeout);

        let started = Instant::now();
        let outcome = self.take_screenshot(request, retry_timeout).await;
        self.state = MatchState::Done;
        let screenshot = outcome?;
        debug!("Checkpoint '{}' completed in {:?}", request.tag, started.elapsed());

        let result = self.match_result.clone().unwrap_or_default();
        if request.ignore_mismatch {
            return Ok(result);
        }

        self.update_last_screenshot(screenshot);
        self.update_bounds(request.region);
        info!("Checkpoint '{}': as expected = {}", request.tag, result.as_expected);
        Ok(result)
    }

    async fn take_screenshot(
        &mut self,
        request: &CheckpointRequest,
        retry_timeout: Duration,
    ) -> Result<Option<Screenshot>> {
        if retry_timeout.is_zero() || request.should_run_once_on_timeout {
            if request.should_run_once_on_timeout {
                sleep(retry_timeout).await;
            }
            return self.try_take_screenshot(request, request.ignore_mismatch).await;
        }

        self.retry_taking_screenshot(request, retry_timeout).await
    }

    async fn retry_taking_screenshot(
        &mut self,
        request: &CheckpointRequest,
        retry_timeout: Duration,
    ) -> Result<Option<Screenshot>> {
        let start = Instant::now();
        self.state = MatchState::Retrying;

        let mut screenshot = None;
        let mut attempts = 0u32;
        while start.elapsed() < retry_timeout {
            sleep(MATCH_INTERVAL).await;
            attempts += 1;

            // Polls never count as a mismatch on the service side.
            screenshot = self.try_take_screenshot(request, true).await?;
            if self.is_as_expected() {
                self.state = MatchState::Matched;
                debug!("Matched after {} poll(s)", attempts);
                return Ok(screenshot);
            }
            self.state = MatchState::Retrying;
        }

        debug!("No match after {} poll(s), making the final attempt", attempts);
        self.try_take_screenshot(request, request.ignore_mismatch).await
    }

    async fn try_take_screenshot(
        &mut self,
        request: &CheckpointRequest,
        ignore_mismatch: bool,
    ) -> Result<Option<Screenshot>> {
        self.state = MatchState::TakingScreenshot;
        let check_settings = request.check_settings.as_ref();

        let output = self
            .output_provider
            .get_app_output(request.region, self.last_screenshot.as_ref(), check_settings)
            .await?;

        let match_settings = create_image_match_settings(
            check_settings,
            &self.default_match_settings,
            output.screenshot.as_ref(),
        )
        .await;

        let AppOutputWithScreenshot { app_output, screenshot } = output;
        let result = self
            .perform_match(request, app_output, ignore_mismatch, match_settings)
            .await?;
        trace!("Attempt result: {:?}", result);

        if result.as_expected {
            self.state = MatchState::Matched;
        }
        self.match_result = Some(result);
        Ok(screenshot)
    }

    /// Build the match package, move any inline screenshot out of band and submit it
    pub async fn perform_match(
        &self,
        request: &CheckpointRequest,
        app_output: AppOutput,
        ignore_mismatch: bool,
        image_match_settings: Option<ImageMatchSettings>,
    ) -> Result<MatchResult> {
        let check_settings = request.check_settings.as_ref();
        let options = ImageMatchOptions {
            name: request.tag.clone(),
            render_id: check_settings.and_then(|c| c.render_id.clone()),
            user_inputs: request.user_inputs.clone(),
            ignore_mismatch,
            ignore_match: false,
            force_mismatch: false,
            force_match: false,
            image_match_settings,
            source: request.source.clone(),
            variant_id: check_settings.and_then(|c| c.variation_group_id.clone()),
        };

        let mut data = MatchWindowData {
            user_inputs: request.user_inputs.clone(),
            app_output,
            tag: request.tag.clone(),
            ignore_mismatch,
            options,
        };

        if let Some(screenshot64) = data.app_output.screenshot64.take() {
            let id = uuid::Uuid::new_v4().to_string();
            let url = self.connector.upload_screenshot(&id, &screenshot64).await?;
            data.app_output.screenshot_url = Some(url);
        }

        self.connector.match_window(&self.running_session, &data).await
    }

    fn is_as_expected(&self) -> bool {
        self.match_result.as_ref().is_some_and(|r| r.as_expected)
    }

    fn update_last_screenshot(&mut self, screenshot: Option<Screenshot>) {
        if let Some(screenshot) = screenshot {
            self.last_screenshot = Some(screenshot);
        }
    }

    fn update_bounds(&mut self, region: Region) {
        let bounds = if region.is_size_empty() {
            match &self.last_screenshot {
                Some(screenshot) => screenshot.bounds(),
                // Nothing is known about the capture size.
                None => Region::UNBOUNDED,
            }
        } else {
            region
        };
        self.last_screenshot_bounds = Some(bounds);
    }

    pub fn last_screenshot(&self) -> Option<&Screenshot> {
        self.last_screenshot.as_ref()
    }

    pub fn last_screenshot_bounds(&self) -> Option<Region> {
        self.last_screenshot_bounds
    }

    pub fn match_result(&self) -> Option<&MatchResult> {
        self.match_result.as_ref()
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn running_session(&self) -> &RunningSession {
        &self.running_session
    }
}

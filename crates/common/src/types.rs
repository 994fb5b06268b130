//! Core types for SnapMatch
//!
//! Everything that crosses the wire to the comparison service is serialized
//! in camelCase to match the service's JSON model.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geometry::{Location, RectangleSize, Region};
use crate::{Error, Result};

/// How strictly the service compares a checkpoint against its baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchLevel {
    None,
    LayoutLegacy,
    Layout,
    Layout2,
    Content,
    #[default]
    Strict,
    Exact,
}

impl std::str::FromStr for MatchLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(MatchLevel::None),
            "layoutlegacy" | "layout-legacy" => Ok(MatchLevel::LayoutLegacy),
            "layout" => Ok(MatchLevel::Layout),
            "layout2" => Ok(MatchLevel::Layout2),
            "content" => Ok(MatchLevel::Content),
            "strict" => Ok(MatchLevel::Strict),
            "exact" => Ok(MatchLevel::Exact),
            other => Err(Error::InvalidArgument(format!("Unknown match level: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessibilityLevel {
    AA,
    AAA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessibilityGuidelinesVersion {
    #[serde(rename = "WCAG_2_0")]
    Wcag20,
    #[serde(rename = "WCAG_2_1")]
    Wcag21,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySettings {
    pub level: AccessibilityLevel,
    #[serde(rename = "version")]
    pub guidelines_version: AccessibilityGuidelinesVersion,
}

/// Pixel-exactness thresholds, only meaningful for `MatchLevel::Exact`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactMatchSettings {
    pub min_diff_intensity: i32,
    pub min_diff_width: i32,
    pub min_diff_height: i32,
    pub match_threshold: f64,
}

/// Session-scope match settings used wherever a checkpoint leaves a value unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultMatchSettings {
    pub match_level: MatchLevel,
    pub ignore_caret: bool,
    pub use_dom: bool,
    pub enable_patterns: bool,
    pub ignore_displacements: bool,
    pub accessibility_settings: Option<AccessibilitySettings>,
}

impl Default for DefaultMatchSettings {
    fn default() -> Self {
        Self {
            match_level: MatchLevel::Strict,
            ignore_caret: false,
            use_dom: false,
            enable_patterns: false,
            ignore_displacements: false,
            accessibility_settings: None,
        }
    }
}

/// A region the service may find displaced by up to the given offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingMatchSettings {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub max_up_offset: i32,
    pub max_down_offset: i32,
    pub max_left_offset: i32,
    pub max_right_offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessibilityRegionType {
    IgnoreContrast,
    RegularText,
    LargeText,
    BoldText,
    GraphicalObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityRegion {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "type")]
    pub region_type: AccessibilityRegionType,
}

/// Anything resolvable into screenshot coordinates
pub trait HasBounds {
    fn bounds(&self) -> Region;
}

impl HasBounds for Region {
    fn bounds(&self) -> Region {
        *self
    }
}

impl HasBounds for FloatingMatchSettings {
    fn bounds(&self) -> Region {
        Region::new(self.left, self.top, self.width, self.height)
    }
}

impl HasBounds for AccessibilityRegion {
    fn bounds(&self) -> Region {
        Region::new(self.left, self.top, self.width, self.height)
    }
}

/// Fully merged settings for one checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMatchSettings {
    pub match_level: MatchLevel,
    pub exact: Option<ExactMatchSettings>,
    pub ignore_caret: bool,
    pub use_dom: bool,
    pub enable_patterns: bool,
    pub ignore_displacements: bool,
    pub accessibility_settings: Option<AccessibilitySettings>,
    #[serde(default)]
    pub ignore: Vec<Region>,
    #[serde(default)]
    pub layout: Vec<Region>,
    #[serde(default)]
    pub strict: Vec<Region>,
    #[serde(default)]
    pub content: Vec<Region>,
    #[serde(default)]
    pub floating: Vec<FloatingMatchSettings>,
    #[serde(default)]
    pub accessibility: Vec<AccessibilityRegion>,
}

impl From<&DefaultMatchSettings> for ImageMatchSettings {
    fn from(defaults: &DefaultMatchSettings) -> Self {
        Self {
            match_level: defaults.match_level,
            exact: None,
            ignore_caret: defaults.ignore_caret,
            use_dom: defaults.use_dom,
            enable_patterns: defaults.enable_patterns,
            ignore_displacements: defaults.ignore_displacements,
            accessibility_settings: defaults.accessibility_settings,
            ignore: Vec::new(),
            layout: Vec::new(),
            strict: Vec::new(),
            content: Vec::new(),
            floating: Vec::new(),
            accessibility: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseAction {
    Click,
    RightClick,
    DoubleClick,
    Move,
    Down,
    Up,
}

/// A user input event that preceded a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "triggerType")]
pub enum Trigger {
    Mouse {
        #[serde(rename = "mouseAction")]
        mouse_action: MouseAction,
        control: Region,
        location: Location,
    },
    Text {
        control: Region,
        text: String,
    },
}

/// The application output sent with a match request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_location: Option<Location>,
}

/// A captured image plus where it sits in the page
#[derive(Debug, Clone)]
pub struct Screenshot {
    image: Arc<RgbaImage>,
    frame_location: Location,
}

impl Screenshot {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            frame_location: Location::ZERO,
        }
    }

    pub fn with_frame_location(mut self, location: Location) -> Self {
        self.frame_location = location;
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn frame_location(&self) -> Location {
        self.frame_location
    }

    pub fn size(&self) -> RectangleSize {
        RectangleSize::new(self.image.width() as i32, self.image.height() as i32)
    }

    /// The screenshot's extent in its own coordinates
    pub fn bounds(&self) -> Region {
        Region::from_parts(Location::ZERO, self.size())
    }
}

/// Output of one capture: the wire model plus the decoded screenshot
#[derive(Debug, Clone, Default)]
pub struct AppOutputWithScreenshot {
    pub app_output: AppOutput,
    pub screenshot: Option<Screenshot>,
}

/// Per-request options echoed into the match payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMatchOptions {
    pub name: String,
    pub render_id: Option<String>,
    pub user_inputs: Vec<Trigger>,
    pub ignore_mismatch: bool,
    pub ignore_match: bool,
    pub force_mismatch: bool,
    pub force_match: bool,
    pub image_match_settings: Option<ImageMatchSettings>,
    pub source: Option<String>,
    pub variant_id: Option<String>,
}

/// The package submitted to the match endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchWindowData {
    pub user_inputs: Vec<Trigger>,
    pub app_output: AppOutput,
    pub tag: String,
    pub ignore_mismatch: bool,
    pub options: ImageMatchOptions,
}

/// The service's verdict for one match attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchResult {
    pub as_expected: bool,
    pub window_id: Option<i64>,
    pub screenshot_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    pub id: String,
    pub name: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Parameters for opening a test session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartInfo {
    pub agent_id: String,
    pub app_id_or_name: String,
    pub scenario_id_or_name: String,
    pub batch_info: BatchInfo,
    pub environment_name: Option<String>,
    pub default_match_settings: ImageMatchSettings,
}

/// A session opened on the comparison service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunningSession {
    pub id: String,
    pub session_id: String,
    pub batch_id: String,
    pub url: String,
    pub is_new: bool,
}

/// Summary reported when a session is closed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestResults {
    pub status: Option<String>,
    pub steps: u32,
    pub matches: u32,
    pub mismatches: u32,
    pub missing: u32,
    pub is_new: bool,
    pub url: Option<String>,
}

//! Per-checkpoint settings and their merge with session defaults

use snapmatch_common::{
    AccessibilityRegion, DefaultMatchSettings, FloatingMatchSettings, ImageMatchSettings,
    MatchLevel, Region, Screenshot,
};
use std::fmt;
use std::sync::Arc;

use crate::regions::{
    FixedAccessibilityRegion, FixedFloatingRegion, FixedRegion, RegionCollector, RegionProvider,
};

/// Settings for a single checkpoint.
///
/// Every tunable is optional; unset values fall back to the session's
/// [`DefaultMatchSettings`] when the checkpoint is matched.
#[derive(Clone, Default)]
pub struct CheckSettings {
    pub match_level: Option<MatchLevel>,
    pub ignore_caret: Option<bool>,
    pub use_dom: Option<bool>,
    pub enable_patterns: Option<bool>,
    pub ignore_displacements: Option<bool>,
    pub render_id: Option<String>,
    pub variation_group_id: Option<String>,
    pub ignore_regions: Vec<Arc<dyn RegionProvider<Region>>>,
    pub layout_regions: Vec<Arc<dyn RegionProvider<Region>>>,
    pub strict_regions: Vec<Arc<dyn RegionProvider<Region>>>,
    pub content_regions: Vec<Arc<dyn RegionProvider<Region>>>,
    pub floating_regions: Vec<Arc<dyn RegionProvider<FloatingMatchSettings>>>,
    pub accessibility_regions: Vec<Arc<dyn RegionProvider<AccessibilityRegion>>>,
}

impl fmt::Debug for CheckSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckSettings")
            .field("match_level", &self.match_level)
            .field("ignore_caret", &self.ignore_caret)
            .field("use_dom", &self.use_dom)
            .field("enable_patterns", &self.enable_patterns)
            .field("ignore_displacements", &self.ignore_displacements)
            .field("render_id", &self.render_id)
            .field("variation_group_id", &self.variation_group_id)
            .field("ignore_regions", &self.ignore_regions.len())
            .field("layout_regions", &self.layout_regions.len())
            .field("strict_regions", &self.strict_regions.len())
            .field("content_regions", &self.content_regions.len())
            .field("floating_regions", &self.floating_regions.len())
            .field("accessibility_regions", &self.accessibility_regions.len())
            .finish()
    }
}

impl CheckSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_level(mut self, level: MatchLevel) -> Self {
        self.match_level = Some(level);
        self
    }

    pub fn ignore_caret(mut self, value: bool) -> Self {
        self.ignore_caret = Some(value);
        self
    }

    pub fn use_dom(mut self, value: bool) -> Self {
        self.use_dom = Some(value);
        self
    }

    pub fn enable_patterns(mut self, value: bool) -> Self {
        self.enable_patterns = Some(value);
        self
    }

    pub fn ignore_displacements(mut self, value: bool) -> Self {
        self.ignore_displacements = Some(value);
        self
    }

    pub fn render_id(mut self, id: impl Into<String>) -> Self {
        self.render_id = Some(id.into());
        self
    }

    pub fn variation_group_id(mut self, id: impl Into<String>) -> Self {
        self.variation_group_id = Some(id.into());
        self
    }

    pub fn ignore(self, region: Region) -> Self {
        self.ignore_with(Arc::new(FixedRegion(region)))
    }

    pub fn ignore_with(mut self, provider: Arc<dyn RegionProvider<Region>>) -> Self {
        self.ignore_regions.push(provider);
        self
    }

    pub fn layout(self, region: Region) -> Self {
        self.layout_with(Arc::new(FixedRegion(region)))
    }

    pub fn layout_with(mut self, provider: Arc<dyn RegionProvider<Region>>) -> Self {
        self.layout_regions.push(provider);
        self
    }

    pub fn strict(self, region: Region) -> Self {
        self.strict_with(Arc::new(FixedRegion(region)))
    }

    pub fn strict_with(mut self, provider: Arc<dyn RegionProvider<Region>>) -> Self {
        self.strict_regions.push(provider);
        self
    }

    pub fn content(self, region: Region) -> Self {
        self.content_with(Arc::new(FixedRegion(region)))
    }

    pub fn content_with(mut self, provider: Arc<dyn RegionProvider<Region>>) -> Self {
        self.content_regions.push(provider);
        self
    }

    pub fn floating(self, region: FloatingMatchSettings) -> Self {
        self.floating_with(Arc::new(FixedFloatingRegion(region)))
    }

    pub fn floating_with(mut self, provider: Arc<dyn RegionProvider<FloatingMatchSettings>>) -> Self {
        self.floating_regions.push(provider);
        self
    }

    pub fn accessibility(self, region: AccessibilityRegion) -> Self {
        self.accessibility_with(Arc::new(FixedAccessibilityRegion(region)))
    }

    pub fn accessibility_with(mut self, provider: Arc<dyn RegionProvider<AccessibilityRegion>>) -> Self {
        self.accessibility_regions.push(provider);
        self
    }
}

/// Merge checkpoint settings over session defaults and resolve the regions.
///
/// Returns `None` when the checkpoint carries no settings, in which case the
/// service applies the session defaults itself.
pub async fn create_image_match_settings(
    check_settings: Option<&CheckSettings>,
    defaults: &DefaultMatchSettings,
    screenshot: Option<&Screenshot>,
) -> Option<ImageMatchSettings> {
    let check = check_settings?;

    let mut settings = ImageMatchSettings {
        match_level: check.match_level.unwrap_or(defaults.match_level),
        exact: None,
        ignore_caret: check.ignore_caret.unwrap_or(defaults.ignore_caret),
        use_dom: check.use_dom.unwrap_or(defaults.use_dom),
        enable_patterns: check.enable_patterns.unwrap_or(defaults.enable_patterns),
        ignore_displacements: check
            .ignore_displacements
            .unwrap_or(defaults.ignore_displacements),
        accessibility_settings: defaults.accessibility_settings,
        ..ImageMatchSettings::from(defaults)
    };

    RegionCollector::new(screenshot)
        .collect_into(check, &mut settings)
        .await;

    Some(settings)
}

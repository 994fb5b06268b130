//! Region providers and collection
//!
//! Checkpoints declare regions (ignore, layout, strict, content, floating,
//! accessibility) through providers that are resolved against the screenshot
//! just taken. A provider that fails never fails the checkpoint: it is logged
//! and contributes nothing.

use async_trait::async_trait;
use serde_json::{json, Value};
use snapmatch_common::{
    AccessibilityRegion, Error, FloatingMatchSettings, HasBounds, ImageMatchSettings, Region,
    Result, ScriptExecutor, Screenshot,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::settings::CheckSettings;

pub const SELECTOR_BOUNDS_SCRIPT: &str = "var el = document.querySelector(arguments[0]); \
    if (!el) { return null; } \
    var r = el.getBoundingClientRect(); \
    return [r.left + window.scrollX, r.top + window.scrollY, r.width, r.height];";

/// Resolves zero or more regions of type `T` for a screenshot
#[async_trait]
pub trait RegionProvider<T>: Send + Sync {
    async fn get_regions(&self, screenshot: Option<&Screenshot>) -> Result<Vec<T>>;
}

/// A region given directly in screenshot coordinates
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion(pub Region);

#[async_trait]
impl RegionProvider<Region> for FixedRegion {
    async fn get_regions(&self, _screenshot: Option<&Screenshot>) -> Result<Vec<Region>> {
        Ok(vec![self.0])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedFloatingRegion(pub FloatingMatchSettings);

#[async_trait]
impl RegionProvider<FloatingMatchSettings> for FixedFloatingRegion {
    async fn get_regions(&self, _screenshot: Option<&Screenshot>) -> Result<Vec<FloatingMatchSettings>> {
        Ok(vec![self.0])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedAccessibilityRegion(pub AccessibilityRegion);

#[async_trait]
impl RegionProvider<AccessibilityRegion> for FixedAccessibilityRegion {
    async fn get_regions(&self, _screenshot: Option<&Screenshot>) -> Result<Vec<AccessibilityRegion>> {
        Ok(vec![self.0])
    }
}

/// The bounds of the first element matching a CSS selector
pub struct SelectorRegion {
    executor: Arc<dyn ScriptExecutor>,
    selector: String,
}

impl SelectorRegion {
    pub fn new(executor: Arc<dyn ScriptExecutor>, selector: impl Into<String>) -> Self {
        Self {
            executor,
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl RegionProvider<Region> for SelectorRegion {
    async fn get_regions(&self, screenshot: Option<&Screenshot>) -> Result<Vec<Region>> {
        let value = self
            .executor
            .execute_script(SELECTOR_BOUNDS_SCRIPT, vec![json!(self.selector)])
            .await?;

        let bounds = match &value {
            Value::Null => {
                return Err(Error::InvalidArgument(format!(
                    "No element matches selector '{}'",
                    self.selector
                )))
            }
            Value::Array(items) if items.len() == 4 => {
                let mut numbers = items.iter().map(|v| v.as_f64().map(|n| n.round() as i32));
                match (numbers.next(), numbers.next(), numbers.next(), numbers.next()) {
                    (Some(Some(left)), Some(Some(top)), Some(Some(width)), Some(Some(height))) => {
                        Region::new(left, top, width, height)
                    }
                    _ => return Err(Error::driver("Failed to read element bounds", &value)),
                }
            }
            _ => return Err(Error::driver("Failed to read element bounds", &value)),
        };

        // Element bounds are page coordinates; regions are relative to the screenshot.
        let origin = screenshot.map(|s| s.frame_location()).unwrap_or_default();
        Ok(vec![bounds.offset(-origin.x, -origin.y)])
    }
}

/// Resolves region providers against one screenshot
pub struct RegionCollector<'a> {
    screenshot: Option<&'a Screenshot>,
}

impl<'a> RegionCollector<'a> {
    pub fn new(screenshot: Option<&'a Screenshot>) -> Self {
        Self { screenshot }
    }

    /// Resolve every provider in declaration order, skipping the ones that
    /// fail or that yield a region outside the screenshot.
    pub async fn collect<T: HasBounds + Send>(&self, providers: &[Arc<dyn RegionProvider<T>>]) -> Vec<T> {
        let mut total = Vec::new();

        for (index, provider) in providers.iter().enumerate() {
            let regions = match provider.get_regions(self.screenshot).await {
                Ok(regions) => regions,
                Err(e) => {
                    warn!("Region provider {} failed, ignoring it: {}", index, e);
                    continue;
                }
            };

            if let Some(screenshot) = self.screenshot {
                let bounds = screenshot.bounds();
                if let Some(outside) = regions
                    .iter()
                    .map(HasBounds::bounds)
                    .find(|r| bounds.intersect(r).is_size_empty())
                {
                    warn!(
                        "Region provider {} returned {} which is out of bounds of {}, ignoring it",
                        index, outside, bounds
                    );
                    continue;
                }
            }

            total.extend(regions);
        }

        total
    }

    /// Resolve all six categories of `check_settings` into `settings`
    pub async fn collect_into(&self, check_settings: &CheckSettings, settings: &mut ImageMatchSettings) {
        settings.ignore = self.collect(&check_settings.ignore_regions).await;
        settings.layout = self.collect(&check_settings.layout_regions).await;
        settings.strict = self.collect(&check_settings.strict_regions).await;
        settings.content = self.collect(&check_settings.content_regions).await;
        settings.floating = self.collect(&check_settings.floating_regions).await;
        settings.accessibility = self.collect(&check_settings.accessibility_regions).await;

        debug!(
            "Collected regions: {} ignore, {} layout, {} strict, {} content, {} floating, {} accessibility",
            settings.ignore.len(),
            settings.layout.len(),
            settings.strict.len(),
            settings.content.len(),
            settings.floating.len(),
            settings.accessibility.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use image::RgbaImage;
    use snapmatch_common::{AccessibilityRegionType, DefaultMatchSettings, Location};

    struct FailingProvider;

    #[async_trait]
    impl RegionProvider<Region> for FailingProvider {
        async fn get_regions(&self, _screenshot: Option<&Screenshot>) -> Result<Vec<Region>> {
            Err(Error::DriverOperation("stale element reference".to_string()))
        }
    }

    fn screenshot(width: u32, height: u32) -> Screenshot {
        Screenshot::new(RgbaImage::new(width, height))
    }

    #[tokio::test]
    async fn test_failing_provider_is_skipped_in_order() {
        let shot = screenshot(800, 600);
        let providers: Vec<Arc<dyn RegionProvider<Region>>> = vec![
            Arc::new(FixedRegion(Region::new(0, 0, 10, 10))),
            Arc::new(FailingProvider),
            Arc::new(FixedRegion(Region::new(20, 20, 5, 5))),
        ];

        let regions = RegionCollector::new(Some(&shot)).collect(&providers).await;
        assert_eq!(regions, vec![Region::new(0, 0, 10, 10), Region::new(20, 20, 5, 5)]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_region_is_skipped() {
        let shot = screenshot(800, 600);
        let providers: Vec<Arc<dyn RegionProvider<Region>>> = vec![
            Arc::new(FixedRegion(Region::new(900, 0, 10, 10))),
            Arc::new(FixedRegion(Region::new(790, 590, 50, 50))),
        ];

        let regions = RegionCollector::new(Some(&shot)).collect(&providers).await;
        assert_eq!(regions, vec![Region::new(790, 590, 50, 50)]);
    }

    #[tokio::test]
    async fn test_without_screenshot_no_bounds_check() {
        let providers: Vec<Arc<dyn RegionProvider<Region>>> =
            vec![Arc::new(FixedRegion(Region::new(5000, 5000, 10, 10)))];
        let regions = RegionCollector::new(None).collect(&providers).await;
        assert_eq!(regions.len(), 1);
    }

    #[tokio::test]
    async fn test_selector_region_relative_to_screenshot() {
        let browser = FakeBrowser::arc(1000, 3000, 400, 300);
        browser.add_element("#banner", Region::new(100, 1200, 300, 50));
        let shot = screenshot(1000, 1000).with_frame_location(Location::new(0, 1000));

        let provider = SelectorRegion::new(browser.clone(), "#banner");
        let regions = provider.get_regions(Some(&shot)).await.unwrap();
        assert_eq!(regions, vec![Region::new(100, 200, 300, 50)]);

        let missing = SelectorRegion::new(browser.clone(), "#nope");
        assert!(missing.get_regions(Some(&shot)).await.is_err());
    }

    #[tokio::test]
    async fn test_collect_into_fills_all_categories() {
        let shot = screenshot(800, 600);
        let floating = FloatingMatchSettings {
            left: 10,
            top: 10,
            width: 50,
            height: 20,
            max_up_offset: 5,
            max_down_offset: 5,
            max_left_offset: 0,
            max_right_offset: 0,
        };
        let accessibility = AccessibilityRegion {
            left: 0,
            top: 0,
            width: 100,
            height: 30,
            region_type: AccessibilityRegionType::LargeText,
        };
        let check = CheckSettings::new()
            .ignore(Region::new(1, 1, 1, 1))
            .layout(Region::new(2, 2, 2, 2))
            .strict(Region::new(3, 3, 3, 3))
            .content(Region::new(4, 4, 4, 4))
            .floating(floating)
            .accessibility(accessibility);

        let mut settings = ImageMatchSettings::from(&DefaultMatchSettings::default());
        RegionCollector::new(Some(&shot)).collect_into(&check, &mut settings).await;

        assert_eq!(settings.ignore, vec![Region::new(1, 1, 1, 1)]);
        assert_eq!(settings.layout, vec![Region::new(2, 2, 2, 2)]);
        assert_eq!(settings.strict, vec![Region::new(3, 3, 3, 3)]);
        assert_eq!(settings.content, vec![Region::new(4, 4, 4, 4)]);
        assert_eq!(settings.floating, vec![floating]);
        assert_eq!(settings.accessibility, vec![accessibility]);
    }
}

//! Application output providers
//!
//! An output provider produces what one match attempt submits: the wire
//! `AppOutput` (with the screenshot inlined as base64 PNG) plus the decoded
//! screenshot the task keeps for region resolution and bounds.

use async_trait::async_trait;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use snapmatch_common::{
    AppOutput, AppOutputWithScreenshot, Location, Region, Result, ScriptExecutor, Screenshot,
};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use crate::config::{StitchMode, StitchingConfig};
use crate::position::{CssTranslatePositionProvider, PositionProvider, ScrollPositionProvider};
use crate::settings::CheckSettings;
use crate::stitching::{FullPageCapture, TileSource};

#[async_trait]
pub trait AppOutputProvider: Send + Sync {
    /// Capture `region` (or everything when size-empty).
    ///
    /// `last_screenshot` is the screenshot of the previous checkpoint, if any.
    async fn get_app_output(
        &self,
        region: Region,
        last_screenshot: Option<&Screenshot>,
        check_settings: Option<&CheckSettings>,
    ) -> Result<AppOutputWithScreenshot>;
}

/// Encode an image as PNG and then base64
pub fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

/// Build the wire output for a captured image
pub fn app_output_for(image: RgbaImage, frame_location: Location, title: Option<String>) -> Result<AppOutputWithScreenshot> {
    let screenshot64 = encode_png_base64(&image)?;
    Ok(AppOutputWithScreenshot {
        app_output: AppOutput {
            title,
            screenshot64: Some(screenshot64),
            ..Default::default()
        },
        screenshot: Some(Screenshot::new(image).with_frame_location(frame_location)),
    })
}

/// Captures the page by stitching viewport tiles
pub struct StitchingOutputProvider<P, T> {
    position_provider: P,
    origin_provider: Option<ScrollPositionProvider>,
    capture: FullPageCapture<T>,
    title: Option<String>,
}

impl<P: PositionProvider, T: TileSource> StitchingOutputProvider<P, T> {
    pub fn new(position_provider: P, capture: FullPageCapture<T>) -> Self {
        Self {
            position_provider,
            origin_provider: None,
            capture,
            title: None,
        }
    }

    /// Hold the native scroll at (0, 0) while `position_provider` tiles
    pub fn with_origin(mut self, origin: ScrollPositionProvider) -> Self {
        self.origin_provider = Some(origin);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[async_trait]
impl<P: PositionProvider, T: TileSource> AppOutputProvider for StitchingOutputProvider<P, T> {
    async fn get_app_output(
        &self,
        region: Region,
        _last_screenshot: Option<&Screenshot>,
        _check_settings: Option<&CheckSettings>,
    ) -> Result<AppOutputWithScreenshot> {
        let image = match &self.origin_provider {
            Some(origin) => {
                self.capture
                    .get_stitched_region_from_origin(origin, &self.position_provider, region)
                    .await?
            }
            None => {
                self.capture
                    .get_stitched_region(&self.position_provider, region)
                    .await?
            }
        };
        debug!("Stitched {}x{} screenshot", image.width(), image.height());

        let frame_location = if region.is_size_empty() {
            Location::ZERO
        } else {
            region.location()
        };
        app_output_for(image, frame_location, self.title.clone())
    }
}

/// Pick the position strategy for `config.mode` and wrap it in a stitching provider
pub fn stitching_output_provider<T: TileSource + 'static>(
    executor: Arc<dyn ScriptExecutor>,
    tile_source: T,
    config: &StitchingConfig,
) -> Box<dyn AppOutputProvider> {
    let capture = FullPageCapture::with_config(tile_source, config);
    match config.mode {
        StitchMode::Scroll => Box::new(StitchingOutputProvider::new(
            ScrollPositionProvider::new(executor),
            capture,
        )),
        StitchMode::Css => Box::new(
            StitchingOutputProvider::new(CssTranslatePositionProvider::new(executor.clone()), capture)
                .with_origin(ScrollPositionProvider::new(executor)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_pixel, FakeBrowser};

    fn decode(screenshot64: &str) -> RgbaImage {
        let png = base64::engine::general_purpose::STANDARD
            .decode(screenshot64)
            .unwrap();
        image::load_from_memory(&png).unwrap().to_rgba8()
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mode_captures_full_page() {
        for mode in [StitchMode::Scroll, StitchMode::Css] {
            let browser = FakeBrowser::arc(300, 700, 300, 250);
            let config = StitchingConfig {
                mode,
                ..Default::default()
            };
            let provider = stitching_output_provider(browser.clone(), browser.clone(), &config);

            let output = provider.get_app_output(Region::EMPTY, None, None).await.unwrap();
            let screenshot = output.screenshot.unwrap();
            assert_eq!(screenshot.image().dimensions(), (300, 700));
            assert_eq!(*screenshot.image().get_pixel(120, 650), page_pixel(120, 650));

            let decoded = decode(output.app_output.screenshot64.as_deref().unwrap());
            assert_eq!(decoded.dimensions(), (300, 700));
            assert_eq!(browser.scroll(), Location::ZERO);
            assert_eq!(browser.transform(), "");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mode_handles_scrolled_page() {
        for mode in [StitchMode::Scroll, StitchMode::Css] {
            let browser = FakeBrowser::arc(400, 1000, 400, 300);
            ScrollPositionProvider::new(browser.clone())
                .set_position(Location::new(0, 300))
                .await
                .unwrap();
            let config = StitchingConfig {
                mode,
                ..Default::default()
            };
            let provider = stitching_output_provider(browser.clone(), browser.clone(), &config);

            let output = provider.get_app_output(Region::EMPTY, None, None).await.unwrap();
            let image = output.screenshot.unwrap();
            assert_eq!(*image.image().get_pixel(5, 10), page_pixel(5, 10), "{:?}", mode);
            assert_eq!(*image.image().get_pixel(200, 990), page_pixel(200, 990), "{:?}", mode);
            assert_eq!(browser.scroll(), Location::new(0, 300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_region_output_carries_frame_location() {
        let browser = FakeBrowser::arc(600, 600, 400, 300);
        let provider = StitchingOutputProvider::new(
            ScrollPositionProvider::new(browser.clone()),
            FullPageCapture::new(browser.clone()),
        )
        .with_title("Checkout");

        let region = Region::new(100, 150, 50, 40);
        let output = provider.get_app_output(region, None, None).await.unwrap();
        let screenshot = output.screenshot.unwrap();
        assert_eq!(screenshot.frame_location(), Location::new(100, 150));
        assert_eq!(screenshot.image().dimensions(), (50, 40));
        assert_eq!(output.app_output.title.as_deref(), Some("Checkout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_error_propagates() {
        let browser = FakeBrowser::arc(400, 300, 400, 300);
        browser.fail_capture_at(0);
        let provider = stitching_output_provider(browser.clone(), browser.clone(), &StitchingConfig::default());

        let err = provider.get_app_output(Region::EMPTY, None, None).await.unwrap_err();
        assert!(matches!(err, snapmatch_common::Error::Stitch { tile: 0, .. }));
    }
}

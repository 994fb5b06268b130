//! Checkpoint output read from an image file
//!
//! The file is re-read on every attempt, so a process that keeps rewriting it
//! (a test runner dumping screenshots) is picked up by the retry loop.

use async_trait::async_trait;
use image::imageops;
use snapmatch_common::{AppOutputWithScreenshot, Error, Location, Region, Result, Screenshot};
use snapmatch_engine::output::app_output_for;
use snapmatch_engine::{AppOutputProvider, CheckSettings};
use std::path::PathBuf;
use tracing::debug;

pub struct FileOutputProvider {
    path: PathBuf,
    title: Option<String>,
}

impl FileOutputProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string());
        Self { path, title }
    }
}

#[async_trait]
impl AppOutputProvider for FileOutputProvider {
    async fn get_app_output(
        &self,
        region: Region,
        _last_screenshot: Option<&Screenshot>,
        _check_settings: Option<&CheckSettings>,
    ) -> Result<AppOutputWithScreenshot> {
        let bytes = tokio::fs::read(&self.path).await?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        debug!(
            "Read {}x{} screenshot from {}",
            image.width(),
            image.height(),
            self.path.display()
        );

        if region.is_size_empty() {
            return app_output_for(image, Location::ZERO, self.title.clone());
        }

        let bounds = Region::new(0, 0, image.width() as i32, image.height() as i32);
        let visible = bounds.intersect(&region);
        if visible.is_size_empty() {
            return Err(Error::OutOfBounds(format!(
                "Region {} is outside the {}x{} image {}",
                region,
                image.width(),
                image.height(),
                self.path.display()
            )));
        }

        let cropped = imageops::crop_imm(
            &image,
            visible.left as u32,
            visible.top as u32,
            visible.width as u32,
            visible.height as u32,
        )
        .to_image();
        app_output_for(cropped, visible.location(), self.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let image = RgbaImage::from_fn(120, 80, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        image.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_whole_image() {
        let tmp = TempDir::new().unwrap();
        let provider = FileOutputProvider::new(write_png(&tmp, "home.png"));

        let output = provider.get_app_output(Region::EMPTY, None, None).await.unwrap();
        let screenshot = output.screenshot.unwrap();
        assert_eq!(screenshot.image().dimensions(), (120, 80));
        assert_eq!(output.app_output.title.as_deref(), Some("home"));

        let png = base64::engine::general_purpose::STANDARD
            .decode(output.app_output.screenshot64.unwrap())
            .unwrap();
        assert_eq!(image::load_from_memory(&png).unwrap().width(), 120);
    }

    #[tokio::test]
    async fn test_region_is_cropped_and_clipped() {
        let tmp = TempDir::new().unwrap();
        let provider = FileOutputProvider::new(write_png(&tmp, "page.png"));

        let output = provider
            .get_app_output(Region::new(100, 10, 50, 20), None, None)
            .await
            .unwrap();
        let screenshot = output.screenshot.unwrap();
        assert_eq!(screenshot.image().dimensions(), (20, 20));
        assert_eq!(screenshot.frame_location(), Location::new(100, 10));
        assert_eq!(*screenshot.image().get_pixel(0, 0), Rgba([100, 10, 0, 255]));
    }

    #[tokio::test]
    async fn test_region_outside_image() {
        let tmp = TempDir::new().unwrap();
        let provider = FileOutputProvider::new(write_png(&tmp, "page.png"));

        let err = provider
            .get_app_output(Region::new(500, 500, 10, 10), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let provider = FileOutputProvider::new("/nonexistent/shot.png");
        let err = provider.get_app_output(Region::EMPTY, None, None).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

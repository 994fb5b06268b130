//! Full-page capture
//!
//! Captures a region larger than the viewport by moving the page under the
//! viewport tile by tile and composing the tiles into one image. The page is
//! always returned to the position it had before the capture started.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use snapmatch_common::{Error, Location, Region, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::StitchingConfig;
use crate::position::PositionProvider;

/// Pixel overlap between adjacent tiles
pub const DEFAULT_STITCHING_OVERLAP: i32 = 50;

/// Settle delay between moving the viewport and capturing it
pub const DEFAULT_WAIT_BEFORE_SCREENSHOTS: Duration = Duration::from_millis(100);

/// Captures whatever is currently visible in the viewport
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn capture_tile(&self) -> Result<RgbaImage>;
}

#[async_trait]
impl<T: TileSource + ?Sized> TileSource for Arc<T> {
    async fn capture_tile(&self) -> Result<RgbaImage> {
        (**self).capture_tile().await
    }
}

/// Fixed number of pixels removed from each edge of a tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutProvider {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl CutProvider {
    pub fn is_noop(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    pub fn cut(&self, image: RgbaImage) -> Result<RgbaImage> {
        if self.is_noop() {
            return Ok(image);
        }

        let width = image.width().saturating_sub(self.left + self.right);
        let height = image.height().saturating_sub(self.top + self.bottom);
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(format!(
                "Cut {:?} removes the whole {}x{} tile",
                self,
                image.width(),
                image.height()
            )));
        }

        Ok(imageops::crop_imm(&image, self.left, self.top, width, height).to_image())
    }
}

/// One captured viewport and where the page really was when it was taken
struct CapturedTile {
    image: RgbaImage,
    position: Location,
}

/// Split `[start, start + length)` into tile spans of at most `tile` pixels,
/// advancing by `stride`. The last span is clipped to the end.
fn tile_spans(start: i32, length: i32, tile: i32, stride: i32) -> Vec<(i32, i32)> {
    let end = start + length;
    let mut spans = Vec::new();
    let mut offset = start;
    loop {
        spans.push((offset, tile.min(end - offset)));
        if offset + tile >= end {
            break;
        }
        offset += stride;
    }
    spans
}

/// Tile rectangles covering `target`, row by row from the top-left corner
pub fn tile_grid(target: Region, tile_width: i32, tile_height: i32, overlap: i32) -> Vec<Region> {
    let columns = tile_spans(target.left, target.width, tile_width, tile_width - overlap);
    let rows = tile_spans(target.top, target.height, tile_height, tile_height - overlap);

    rows.iter()
        .flat_map(|&(top, height)| {
            columns
                .iter()
                .map(move |&(left, width)| Region::new(left, top, width, height))
        })
        .collect()
}

/// Stitches viewport tiles into one image of a page region
pub struct FullPageCapture<T> {
    tile_source: T,
    wait_before_capture: Duration,
    stitching_overlap: i32,
    scale_ratio: f64,
    cut: CutProvider,
}

impl<T: TileSource> FullPageCapture<T> {
    pub fn new(tile_source: T) -> Self {
        Self {
            tile_source,
            wait_before_capture: DEFAULT_WAIT_BEFORE_SCREENSHOTS,
            stitching_overlap: DEFAULT_STITCHING_OVERLAP,
            scale_ratio: 1.0,
            cut: CutProvider::default(),
        }
    }

    pub fn with_config(tile_source: T, config: &StitchingConfig) -> Self {
        Self::new(tile_source)
            .with_wait_before_capture(config.wait_before_capture())
            .with_overlap(config.overlap)
            .with_scale_ratio(config.scale_ratio())
            .with_cut(config.cut)
    }

    pub fn with_wait_before_capture(mut self, wait: Duration) -> Self {
        self.wait_before_capture = wait;
        self
    }

    pub fn with_overlap(mut self, overlap: i32) -> Self {
        self.stitching_overlap = overlap;
        self
    }

    pub fn with_scale_ratio(mut self, ratio: f64) -> Self {
        self.scale_ratio = ratio;
        self
    }

    pub fn with_cut(mut self, cut: CutProvider) -> Self {
        self.cut = cut;
        self
    }

    /// Capture `region`, or the provider's entire content when `region` is
    /// size-empty.
    ///
    /// The provider's state is saved first and restored on every exit path.
    /// A failure on any tile discards the tiles taken so far.
    pub async fn get_stitched_region<P: PositionProvider>(
        &self,
        provider: &P,
        region: Region,
    ) -> Result<RgbaImage> {
        let state = provider.get_state().await?;
        trace!("Saved position state {:?}", state);

        let result = self.capture_region(provider, region).await;
        let restored = provider.restore_state(&state).await;

        match (result, restored) {
            (Ok(image), Ok(())) => Ok(image),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore_err)) => {
                warn!("Failed to restore position after capture failure: {}", restore_err);
                Err(e)
            }
        }
    }

    /// Capture `region` with `provider` while `origin` holds the page at (0, 0).
    ///
    /// Used when `provider` only offsets the page relative to another
    /// positioning mechanism (a CSS transform on top of native scrolling).
    /// Both states are saved first and restored on every exit path, the
    /// provider's before the origin's.
    pub async fn get_stitched_region_from_origin<O: PositionProvider, P: PositionProvider>(
        &self,
        origin: &O,
        provider: &P,
        region: Region,
    ) -> Result<RgbaImage> {
        let origin_state = origin.get_state().await?;
        trace!("Saved origin state {:?}", origin_state);

        let result = match origin.set_position(Location::ZERO).await {
            Ok(()) => self.get_stitched_region(provider, region).await,
            Err(e) => Err(e),
        };
        let restored = origin.restore_state(&origin_state).await;

        match (result, restored) {
            (Ok(image), Ok(())) => Ok(image),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore_err)) => {
                warn!("Failed to restore origin after capture failure: {}", restore_err);
                Err(e)
            }
        }
    }

    async fn capture_region<P: PositionProvider>(
        &self,
        provider: &P,
        region: Region,
    ) -> Result<RgbaImage> {
        let target = if region.is_size_empty() {
            let entire = provider.get_entire_size().await?;
            Region::from_parts(Location::ZERO, entire)
        } else {
            region
        };
        if target.is_size_empty() {
            return Err(Error::InvalidArgument(format!(
                "Nothing to capture: target region {} is empty",
                target
            )));
        }
        debug!("Capturing region {}", target);

        // The first tile tells us how much one viewport holds.
        let first = self.capture_at(provider, target.location(), 0).await?;
        let tile_width = first.image.width() as i32;
        let tile_height = first.image.height() as i32;
        if tile_width <= self.stitching_overlap || tile_height <= self.stitching_overlap {
            return Err(Error::InvalidConfig(format!(
                "Stitching overlap {} does not fit a {}x{} tile",
                self.stitching_overlap, tile_width, tile_height
            )));
        }

        let tiles = tile_grid(target, tile_width, tile_height, self.stitching_overlap);
        debug!(
            "Stitching {} tile(s) of {}x{} with {}px overlap",
            tiles.len(),
            tile_width,
            tile_height,
            self.stitching_overlap
        );

        let mut composite = RgbaImage::new(target.width as u32, target.height as u32);
        let mut first = Some(first);
        for (index, tile) in tiles.iter().enumerate() {
            let captured = match first.take() {
                Some(captured) => captured,
                None => self.capture_at(provider, tile.location(), index).await?,
            };
            place_tile(&mut composite, &captured, *tile, target, index)?;
        }

        Ok(composite)
    }

    async fn capture_at<P: PositionProvider>(
        &self,
        provider: &P,
        location: Location,
        index: usize,
    ) -> Result<CapturedTile> {
        provider.set_position(location).await?;
        if !self.wait_before_capture.is_zero() {
            tokio::time::sleep(self.wait_before_capture).await;
        }

        let image = self
            .tile_source
            .capture_tile()
            .await
            .map_err(|e| Error::Stitch {
                tile: index,
                reason: e.to_string(),
            })?;
        let image = self.cut.cut(image)?;
        let image = self.scale(image);

        // The browser may clamp the requested position near the page edges.
        let position = provider.get_current_position().await?;
        trace!("Tile {} captured at {} (requested {})", index, position, location);

        Ok(CapturedTile { image, position })
    }

    fn scale(&self, image: RgbaImage) -> RgbaImage {
        if (self.scale_ratio - 1.0).abs() < f64::EPSILON {
            return image;
        }
        let width = ((image.width() as f64) * self.scale_ratio).round().max(1.0) as u32;
        let height = ((image.height() as f64) * self.scale_ratio).round().max(1.0) as u32;
        imageops::resize(&image, width, height, FilterType::Triangle)
    }
}

/// Copy the part of `captured` showing `tile` into the composite
fn place_tile(
    composite: &mut RgbaImage,
    captured: &CapturedTile,
    tile: Region,
    target: Region,
    index: usize,
) -> Result<()> {
    let src_x = tile.left - captured.position.x;
    let src_y = tile.top - captured.position.y;
    let available_width = captured.image.width() as i32 - src_x;
    let available_height = captured.image.height() as i32 - src_y;

    if src_x < 0 || src_y < 0 || available_width <= 0 || available_height <= 0 {
        return Err(Error::Stitch {
            tile: index,
            reason: format!(
                "viewport at {} does not show tile {}",
                captured.position, tile
            ),
        });
    }

    let width = tile.width.min(available_width) as u32;
    let height = tile.height.min(available_height) as u32;
    let part = imageops::crop_imm(&captured.image, src_x as u32, src_y as u32, width, height).to_image();

    let dest_x = (tile.left - target.left) as i64;
    let dest_y = (tile.top - target.top) as i64;
    trace!("Placing tile {} ({}x{}) at ({}, {})", index, width, height, dest_x, dest_y);
    imageops::replace(composite, &part, dest_x, dest_y);
    Ok(())
}

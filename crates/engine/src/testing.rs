//! In-memory browser used by unit tests
//!
//! Interprets the engine's position scripts against a synthetic page image and
//! renders viewport-sized tiles from wherever the page is scrolled/translated.

use async_trait::async_trait;
use image::{imageops, Rgba, RgbaImage};
use parking_lot::Mutex;
use serde_json::{json, Value};
use snapmatch_common::{Error, Location, Region, Result, ScriptExecutor};
use std::collections::HashMap;
use std::sync::Arc;

use crate::position::{
    parse_translate, GET_ENTIRE_SIZE_SCRIPT, GET_SCROLL_POSITION_SCRIPT, GET_TRANSFORM_SCRIPT,
    SET_SCROLL_POSITION_SCRIPT, SET_TRANSFORM_SCRIPT,
};
use crate::regions::SELECTOR_BOUNDS_SCRIPT;
use crate::stitching::TileSource;

#[derive(Default)]
struct BrowserState {
    scroll: Location,
    transform: String,
    captures: usize,
    fail_capture_at: Option<usize>,
    script_error: Option<String>,
    elements: HashMap<String, Region>,
}

pub(crate) struct FakeBrowser {
    page: RgbaImage,
    viewport: (u32, u32),
    state: Mutex<BrowserState>,
}

/// Deterministic pixel for page coordinate (x, y)
pub(crate) fn page_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([
        (x & 0xff) as u8,
        (y & 0xff) as u8,
        (((x >> 8) & 0x0f) | (((y >> 8) & 0x0f) << 4)) as u8,
        255,
    ])
}

impl FakeBrowser {
    pub(crate) fn new(page_width: u32, page_height: u32, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            page: RgbaImage::from_fn(page_width, page_height, page_pixel),
            viewport: (viewport_width, viewport_height),
            state: Mutex::new(BrowserState::default()),
        }
    }

    pub(crate) fn arc(page_width: u32, page_height: u32, viewport_width: u32, viewport_height: u32) -> Arc<Self> {
        Arc::new(Self::new(page_width, page_height, viewport_width, viewport_height))
    }

    pub(crate) fn scroll(&self) -> Location {
        self.state.lock().scroll
    }

    pub(crate) fn transform(&self) -> String {
        self.state.lock().transform.clone()
    }

    pub(crate) fn set_transform(&self, transform: &str) {
        self.state.lock().transform = transform.to_string();
    }

    pub(crate) fn captures(&self) -> usize {
        self.state.lock().captures
    }

    /// Make the `index`-th capture (0-based) fail
    pub(crate) fn fail_capture_at(&self, index: usize) {
        self.state.lock().fail_capture_at = Some(index);
    }

    /// Make every script fail with `message`
    pub(crate) fn fail_scripts(&self, message: &str) {
        self.state.lock().script_error = Some(message.to_string());
    }

    pub(crate) fn add_element(&self, selector: &str, bounds: Region) {
        self.state.lock().elements.insert(selector.to_string(), bounds);
    }

    fn max_scroll(&self) -> Location {
        Location::new(
            self.page.width().saturating_sub(self.viewport.0) as i32,
            self.page.height().saturating_sub(self.viewport.1) as i32,
        )
    }

    fn arg_i32(args: &[Value], index: usize) -> Result<i32> {
        args.get(index)
            .and_then(Value::as_i64)
            .map(|v| v as i32)
            .ok_or_else(|| Error::DriverOperation(format!("missing numeric argument {}", index)))
    }
}

#[async_trait]
impl ScriptExecutor for FakeBrowser {
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let mut state = self.state.lock();
        if let Some(message) = &state.script_error {
            return Err(Error::DriverOperation(message.clone()));
        }

        if script == GET_SCROLL_POSITION_SCRIPT {
            Ok(json!([state.scroll.x, state.scroll.y]))
        } else if script == SET_SCROLL_POSITION_SCRIPT {
            let max = self.max_scroll();
            let x = Self::arg_i32(&args, 0)?.clamp(0, max.x);
            let y = Self::arg_i32(&args, 1)?.clamp(0, max.y);
            state.scroll = Location::new(x, y);
            Ok(json!([x, y]))
        } else if script == GET_ENTIRE_SIZE_SCRIPT {
            Ok(json!([self.page.width(), self.page.height()]))
        } else if script == GET_TRANSFORM_SCRIPT {
            Ok(json!(state.transform))
        } else if script == SET_TRANSFORM_SCRIPT {
            let transform = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| Error::DriverOperation("missing transform argument".to_string()))?;
            state.transform = transform.to_string();
            Ok(json!(transform))
        } else if script == SELECTOR_BOUNDS_SCRIPT {
            let selector = args.first().and_then(Value::as_str).unwrap_or_default();
            Ok(match state.elements.get(selector) {
                Some(r) => json!([r.left, r.top, r.width, r.height]),
                None => Value::Null,
            })
        } else {
            Err(Error::DriverOperation(format!("unsupported script: {}", script)))
        }
    }
}

#[async_trait]
impl TileSource for FakeBrowser {
    async fn capture_tile(&self) -> Result<RgbaImage> {
        let mut state = self.state.lock();
        let index = state.captures;
        state.captures += 1;
        if state.fail_capture_at == Some(index) {
            return Err(Error::DriverOperation("screenshot command timed out".to_string()));
        }

        let translate = parse_translate(&state.transform).unwrap_or(Location::ZERO);
        let origin = state.scroll.offset(translate.x, translate.y);

        let mut tile = RgbaImage::new(self.viewport.0, self.viewport.1);
        let visible = imageops::crop_imm(
            &self.page,
            origin.x.max(0) as u32,
            origin.y.max(0) as u32,
            self.viewport.0,
            self.viewport.1,
        )
        .to_image();
        imageops::replace(&mut tile, &visible, 0, 0);
        Ok(tile)
    }
}

//! Position providers
//!
//! A position provider moves the visible part of a page and can snapshot and
//! restore where it was. Each provider has its own memento type, so a state
//! captured by one strategy cannot be handed to another.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use snapmatch_common::executor::value_to_pair;
use snapmatch_common::{Error, Location, RectangleSize, Result, ScriptExecutor};
use std::sync::Arc;
use tracing::{debug, trace};

pub const GET_SCROLL_POSITION_SCRIPT: &str = "var doc = document.documentElement; \
    var x = window.scrollX || ((window.pageXOffset || doc.scrollLeft) - (doc.clientLeft || 0)); \
    var y = window.scrollY || ((window.pageYOffset || doc.scrollTop) - (doc.clientTop || 0)); \
    return [x, y];";

pub const SET_SCROLL_POSITION_SCRIPT: &str = "window.scrollTo(arguments[0], arguments[1]); \
    return [window.scrollX, window.scrollY];";

pub const GET_ENTIRE_SIZE_SCRIPT: &str = "var doc = document.documentElement; var body = document.body; \
    var totalWidth = Math.max(doc.scrollWidth, body.scrollWidth); \
    var totalHeight = Math.max(doc.clientHeight, doc.scrollHeight, body.clientHeight, body.scrollHeight); \
    return [totalWidth, totalHeight];";

pub const GET_TRANSFORM_SCRIPT: &str = "return document.documentElement.style.transform;";

pub const SET_TRANSFORM_SCRIPT: &str = "document.documentElement.style.transform = arguments[0]; \
    return document.documentElement.style.transform;";

/// Queries and restores the scroll or transform state of a page
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Snapshot type produced by `get_state`
    type Memento: Clone + std::fmt::Debug + Send + Sync;

    /// Where the viewport currently starts, in page coordinates
    async fn get_current_position(&self) -> Result<Location>;

    /// Move the viewport so it starts at `location`; returns once applied
    async fn set_position(&self, location: Location) -> Result<()>;

    /// Full content size of the current frame
    async fn get_entire_size(&self) -> Result<RectangleSize>;

    async fn get_state(&self) -> Result<Self::Memento>;

    /// Re-apply a state captured by `get_state` on this provider
    async fn restore_state(&self, state: &Self::Memento) -> Result<()>;
}

async fn query_entire_size(executor: &dyn ScriptExecutor) -> Result<RectangleSize> {
    let value = executor
        .execute_script(GET_ENTIRE_SIZE_SCRIPT, vec![])
        .await
        .map_err(|e| Error::driver("Failed to extract entire size", e))?;
    let (width, height) = value_to_pair(&value).ok_or_else(|| {
        Error::driver("Failed to extract entire size", format!("unexpected result {}", value))
    })?;
    Ok(RectangleSize::new(width, height))
}

/// Snapshot of a scroll position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPositionMemento {
    position: Location,
}

impl ScrollPositionMemento {
    pub fn position(&self) -> Location {
        self.position
    }
}

/// Moves the viewport with native document scrolling
pub struct ScrollPositionProvider {
    executor: Arc<dyn ScriptExecutor>,
}

impl ScrollPositionProvider {
    pub fn new(executor: Arc<dyn ScriptExecutor>) -> Self {
        debug!("Creating ScrollPositionProvider");
        Self { executor }
    }
}

#[async_trait]
impl PositionProvider for ScrollPositionProvider {
    type Memento = ScrollPositionMemento;

    async fn get_current_position(&self) -> Result<Location> {
        let value = self
            .executor
            .execute_script(GET_SCROLL_POSITION_SCRIPT, vec![])
            .await
            .map_err(|e| Error::driver("Failed to extract current scroll position", e))?;
        let (x, y) = value_to_pair(&value).ok_or_else(|| {
            Error::driver(
                "Failed to extract current scroll position",
                format!("unexpected result {}", value),
            )
        })?;
        let position = Location::new(x, y);
        trace!("Current scroll position: {}", position);
        Ok(position)
    }

    async fn set_position(&self, location: Location) -> Result<()> {
        debug!("Scrolling to {}", location);
        self.executor
            .execute_script(SET_SCROLL_POSITION_SCRIPT, vec![json!(location.x), json!(location.y)])
            .await
            .map_err(|e| Error::driver(&format!("Failed to scroll to {}", location), e))?;
        Ok(())
    }

    async fn get_entire_size(&self) -> Result<RectangleSize> {
        let size = query_entire_size(self.executor.as_ref()).await?;
        trace!("Entire size: {}", size);
        Ok(size)
    }

    async fn get_state(&self) -> Result<ScrollPositionMemento> {
        let position = self.get_current_position().await?;
        Ok(ScrollPositionMemento { position })
    }

    async fn restore_state(&self, state: &ScrollPositionMemento) -> Result<()> {
        self.set_position(state.position).await?;
        debug!("Scroll position restored to {}", state.position);
        Ok(())
    }
}

/// Snapshot of a CSS transform, kept verbatim alongside the last position set
/// through the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssTranslatePositionMemento {
    transform: String,
    position: Location,
}

impl CssTranslatePositionMemento {
    pub fn transform(&self) -> &str {
        &self.transform
    }

    pub fn position(&self) -> Location {
        self.position
    }
}

/// CSS transform value that shows the page from `location`
pub fn translate_transform(location: Location) -> String {
    format!("translate({}px, {}px)", -location.x, -location.y)
}

/// Recover the page position encoded by a `translate(..)` transform.
///
/// An empty or `none` transform means the page is untranslated.
pub fn parse_translate(transform: &str) -> Option<Location> {
    let transform = transform.trim();
    if transform.is_empty() || transform == "none" {
        return Some(Location::ZERO);
    }

    let inner = transform.strip_prefix("translate(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|part| {
        let part = part.trim();
        let number = part.strip_suffix("px").unwrap_or(part);
        number.trim().parse::<f64>().ok()
    });

    let x = parts.next()??;
    let y = match parts.next() {
        Some(y) => y?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }

    Some(Location::new(
        (x.round() as i32).saturating_neg(),
        (y.round() as i32).saturating_neg(),
    ))
}

/// Moves the viewport by translating the document element.
///
/// The translation only offsets the page relative to the native scroll
/// origin, so full-page captures pair it with a scroll provider that holds
/// the document at (0, 0) while tiling.
pub struct CssTranslatePositionProvider {
    executor: Arc<dyn ScriptExecutor>,
    last_set_position: Mutex<Option<Location>>,
}

impl CssTranslatePositionProvider {
    pub fn new(executor: Arc<dyn ScriptExecutor>) -> Self {
        debug!("Creating CssTranslatePositionProvider");
        Self {
            executor,
            last_set_position: Mutex::new(None),
        }
    }

    async fn current_transform(&self) -> Result<String> {
        let value = self
            .executor
            .execute_script(GET_TRANSFORM_SCRIPT, vec![])
            .await
            .map_err(|e| Error::driver("Failed to extract current transform", e))?;
        match value {
            Value::String(transform) => Ok(transform),
            Value::Null => Ok(String::new()),
            other => Err(Error::driver(
                "Failed to extract current transform",
                format!("unexpected result {}", other),
            )),
        }
    }

    async fn apply_transform(&self, transform: &str) -> Result<()> {
        self.executor
            .execute_script(SET_TRANSFORM_SCRIPT, vec![json!(transform)])
            .await
            .map_err(|e| Error::driver(&format!("Failed to set transform '{}'", transform), e))?;
        Ok(())
    }

    /// Last position set through this provider. Before the first move, a
    /// plain `translate(..)` already on the page is read back; any other
    /// transform counts as the origin.
    fn position_for(&self, transform: &str) -> Location {
        let last = *self.last_set_position.lock();
        last.unwrap_or_else(|| parse_translate(transform).unwrap_or(Location::ZERO))
    }
}

#[async_trait]
impl PositionProvider for CssTranslatePositionProvider {
    type Memento = CssTranslatePositionMemento;

    async fn get_current_position(&self) -> Result<Location> {
        let last = *self.last_set_position.lock();
        let position = match last {
            Some(position) => position,
            None => self.position_for(&self.current_transform().await?),
        };
        trace!("Current translate position: {}", position);
        Ok(position)
    }

    async fn set_position(&self, location: Location) -> Result<()> {
        debug!("Translating to {}", location);
        self.apply_transform(&translate_transform(location)).await?;
        *self.last_set_position.lock() = Some(location);
        Ok(())
    }

    async fn get_entire_size(&self) -> Result<RectangleSize> {
        let size = query_entire_size(self.executor.as_ref()).await?;
        trace!("Entire size: {}", size);
        Ok(size)
    }

    async fn get_state(&self) -> Result<CssTranslatePositionMemento> {
        let transform = self.current_transform().await?;
        let position = self.position_for(&transform);
        Ok(CssTranslatePositionMemento {
            transform,
            position,
        })
    }

    async fn restore_state(&self, state: &CssTranslatePositionMemento) -> Result<()> {
        self.apply_transform(&state.transform).await?;
        *self.last_set_position.lock() = Some(state.position);
        debug!("Transform restored to '{}'", state.transform);
        Ok(())
    }
}

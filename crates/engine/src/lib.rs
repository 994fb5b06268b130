//! SnapMatch Engine
//!
//! Position providers, full-page stitching, region collection and the
//! match-window retry task, plus the HTTP connector to the comparison service.

pub mod config;
pub mod connector;
pub mod match_task;
pub mod output;
pub mod position;
pub mod regions;
pub mod settings;
pub mod stitching;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, StitchMode, StitchingConfig};
pub use connector::{HttpServerConnector, ServerConnector};
pub use match_task::{CheckpointRequest, MatchState, MatchWindowTask, MATCH_INTERVAL};
pub use output::{encode_png_base64, stitching_output_provider, AppOutputProvider, StitchingOutputProvider};
pub use position::{
    CssTranslatePositionMemento, CssTranslatePositionProvider, PositionProvider,
    ScrollPositionMemento, ScrollPositionProvider,
};
pub use regions::{
    FixedAccessibilityRegion, FixedFloatingRegion, FixedRegion, RegionCollector, RegionProvider,
    SelectorRegion,
};
pub use settings::{create_image_match_settings, CheckSettings};
pub use stitching::{CutProvider, FullPageCapture, TileSource};

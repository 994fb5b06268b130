//! Engine configuration

use serde::{Deserialize, Serialize};
use snapmatch_common::{BatchInfo, DefaultMatchSettings, ImageMatchSettings, SessionStartInfo};
use std::path::PathBuf;
use std::time::Duration;

use crate::stitching::{CutProvider, DEFAULT_STITCHING_OVERLAP, DEFAULT_WAIT_BEFORE_SCREENSHOTS};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "SNAPMATCH_API_KEY";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Comparison service base URL
    pub server_url: String,

    /// Comparison service API key
    pub api_key: Option<String>,

    /// Application name reported when a session starts
    pub app_name: String,

    /// Batch name grouping sessions started by this configuration
    pub batch_name: Option<String>,

    /// Environment name reported to the service
    pub environment_name: Option<String>,

    /// Default total time to retry matching, in milliseconds
    pub match_timeout_ms: u64,

    /// Session-scope match settings
    #[serde(with = "match_settings_toml")]
    pub default_match_settings: DefaultMatchSettings,

    /// Full-page capture configuration
    pub stitching: StitchingConfig,

    /// HTTP client configuration
    pub http: HttpConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "https://eyesapi.applitools.com".to_string(),
            api_key: None,
            app_name: "snapmatch".to_string(),
            batch_name: None,
            environment_name: None,
            match_timeout_ms: 2000,
            default_match_settings: DefaultMatchSettings::default(),
            stitching: StitchingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Session match settings in the file's snake_case keys; the wire model
/// itself stays camelCase.
mod match_settings_toml {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use snapmatch_common::{AccessibilitySettings, DefaultMatchSettings, MatchLevel};

    #[derive(Serialize, Deserialize)]
    #[serde(default)]
    struct MatchSettingsFile {
        match_level: MatchLevel,
        ignore_caret: bool,
        use_dom: bool,
        enable_patterns: bool,
        ignore_displacements: bool,
        accessibility_settings: Option<AccessibilitySettings>,
    }

    impl Default for MatchSettingsFile {
        fn default() -> Self {
            Self::from(&DefaultMatchSettings::default())
        }
    }

    impl From<&DefaultMatchSettings> for MatchSettingsFile {
        fn from(settings: &DefaultMatchSettings) -> Self {
            Self {
                match_level: settings.match_level,
                ignore_caret: settings.ignore_caret,
                use_dom: settings.use_dom,
                enable_patterns: settings.enable_patterns,
                ignore_displacements: settings.ignore_displacements,
                accessibility_settings: settings.accessibility_settings,
            }
        }
    }

    impl From<MatchSettingsFile> for DefaultMatchSettings {
        fn from(file: MatchSettingsFile) -> Self {
            Self {
                match_level: file.match_level,
                ignore_caret: file.ignore_caret,
                use_dom: file.use_dom,
                enable_patterns: file.enable_patterns,
                ignore_displacements: file.ignore_displacements,
                accessibility_settings: file.accessibility_settings,
            }
        }
    }

    pub fn serialize<S: Serializer>(settings: &DefaultMatchSettings, serializer: S) -> Result<S::Ok, S::Error> {
        MatchSettingsFile::from(settings).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DefaultMatchSettings, D::Error> {
        MatchSettingsFile::deserialize(deserializer).map(DefaultMatchSettings::from)
    }
}

/// How the viewport is moved between tiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StitchMode {
    /// Native scrolling of the document
    Scroll,
    /// CSS `translate` of the document element
    #[default]
    Css,
}

/// Full-page capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchingConfig {
    /// Position strategy used while tiling
    pub mode: StitchMode,

    /// Pixel overlap between adjacent tiles
    pub overlap: i32,

    /// Settle delay after moving the viewport, in milliseconds
    pub wait_before_capture_ms: u64,

    /// Device pixel ratio of the captured tiles
    pub device_pixel_ratio: f64,

    /// Fixed edges removed from every tile (browser chrome, sticky bars)
    pub cut: CutProvider,
}

impl Default for StitchingConfig {
    fn default() -> Self {
        Self {
            mode: StitchMode::Css,
            overlap: DEFAULT_STITCHING_OVERLAP,
            wait_before_capture_ms: DEFAULT_WAIT_BEFORE_SCREENSHOTS.as_millis() as u64,
            device_pixel_ratio: 1.0,
            cut: CutProvider::default(),
        }
    }
}

impl StitchingConfig {
    pub fn wait_before_capture(&self) -> Duration {
        Duration::from_millis(self.wait_before_capture_ms)
    }

    /// Factor applied to captured tiles to bring them to CSS pixels
    pub fn scale_ratio(&self) -> f64 {
        1.0 / self.device_pixel_ratio
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> snapmatch_common::Result<()> {
        if self.stitching.overlap < 0 {
            return Err(snapmatch_common::Error::InvalidConfig(format!(
                "stitching.overlap must not be negative (got {})",
                self.stitching.overlap
            )));
        }
        let ratio = self.stitching.device_pixel_ratio;
        if ratio.is_nan() || ratio <= 0.0 {
            return Err(snapmatch_common::Error::InvalidConfig(format!(
                "stitching.device_pixel_ratio must be positive (got {})",
                self.stitching.device_pixel_ratio
            )));
        }
        if self.server_url.is_empty() {
            return Err(snapmatch_common::Error::InvalidConfig(
                "server_url must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Default retry timeout for checkpoints that do not set their own
    pub fn match_timeout(&self) -> Duration {
        Duration::from_millis(self.match_timeout_ms)
    }

    /// The configured API key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }

    /// Get the default configuration path
    pub fn default_path() -> PathBuf {
        snapmatch_common::default_config_path()
    }

    /// Build the start request for a session running `test_name`
    pub fn session_start_info(&self, test_name: &str) -> SessionStartInfo {
        SessionStartInfo {
            agent_id: format!("snapmatch/{}", snapmatch_common::VERSION),
            app_id_or_name: self.app_name.clone(),
            scenario_id_or_name: test_name.to_string(),
            batch_info: BatchInfo {
                id: uuid::Uuid::new_v4().to_string(),
                name: self.batch_name.clone(),
                started_at: chrono::Utc::now(),
            },
            environment_name: self.environment_name.clone(),
            default_match_settings: ImageMatchSettings::from(&self.default_match_settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapmatch_common::MatchLevel;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.match_timeout_ms, 2000);
        assert_eq!(config.stitching.mode, StitchMode::Css);
        assert_eq!(config.stitching.overlap, 50);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = EngineConfig::default();
        config.match_timeout_ms = 4500;
        config.stitching.mode = StitchMode::Scroll;
        config.default_match_settings.match_level = MatchLevel::Layout;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.match_timeout_ms, 4500);
        assert_eq!(loaded.stitching.mode, StitchMode::Scroll);
        assert_eq!(loaded.default_match_settings.match_level, MatchLevel::Layout);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "match_timeout_ms = 0\n[stitching]\nmode = \"scroll\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.match_timeout_ms, 0);
        assert_eq!(config.stitching.mode, StitchMode::Scroll);
        assert_eq!(config.stitching.wait_before_capture_ms, 100);
        assert_eq!(config.http.timeout_secs, 300);
    }

    #[test]
    fn test_match_settings_use_snake_case_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[default_match_settings]\nmatch_level = \"Content\"\nignore_caret = true\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_match_settings.match_level, MatchLevel::Content);
        assert!(config.default_match_settings.ignore_caret);
        assert!(!config.default_match_settings.use_dom);

        let written = toml::to_string_pretty(&config).unwrap();
        assert!(written.contains("match_level = \"Content\""));
        assert!(!written.contains("matchLevel"));
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[stitching]\noverlap = -5\n").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn test_scale_ratio() {
        let mut config = StitchingConfig::default();
        config.device_pixel_ratio = 2.0;
        assert_eq!(config.scale_ratio(), 0.5);
    }
}

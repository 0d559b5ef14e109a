use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default = "default_live_oracle")]
    pub live_oracle: OracleConfig,
    #[serde(default = "default_stitch_oracle")]
    pub stitch_oracle: OracleConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source of captured frames for the replay binary.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Directory of exported frames, replayed in file-name order.
    pub frames_dir: Option<String>,
    #[serde(default = "default_capture_fps")]
    pub fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    /// Minimum spacing between kept frames.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// A frame is only kept when the content moved up by more than this.
    #[serde(default = "default_min_shift")]
    pub min_shift: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Row-signature correlation over the whole overlap.
    Rows,
    /// Template block search around a single anchor row.
    Block,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub kind: OracleKind,
    /// Largest shift searched, as a fraction of the previous image height.
    #[serde(default = "default_max_shift_ratio")]
    pub max_shift_ratio: f32,
    #[serde(default = "default_min_overlap_rows")]
    pub min_overlap_rows: u32,
    #[serde(default = "default_strips")]
    pub strips: u32,
    /// Columns at the right edge excluded from row signatures (scroll bars).
    #[serde(default = "default_ignore_right_px")]
    pub ignore_right_px: u32,
    #[serde(default = "default_block_height")]
    pub block_height: u32,
    #[serde(default = "default_block_width")]
    pub block_width: u32,
    /// Vertical position of the template block in the current image, 0..=1.
    #[serde(default)]
    pub anchor_ratio: f32,
    /// Per-pixel luma difference still treated as a match.
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtPolicy {
    /// Discard debt that no predecessor can absorb.
    #[default]
    Drop,
    /// Report unabsorbed debt as a stitch failure.
    Fail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StitchConfig {
    #[serde(default = "default_accept_confidence")]
    pub accept_confidence: f32,
    #[serde(default)]
    pub debt_policy: DebtPolicy,
    #[serde(default = "default_output")]
    pub output: String,
    /// When set, resolved ranges are written here, and an existing file is
    /// used instead of resolving (manual seam correction).
    pub ranges_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub chunk_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_dir: None,
            fps: default_capture_fps(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            min_confidence: default_min_confidence(),
            min_shift: default_min_shift(),
        }
    }
}

impl OracleConfig {
    /// Defaults for the given oracle kind.
    pub fn new(kind: OracleKind) -> Self {
        Self {
            kind,
            max_shift_ratio: default_max_shift_ratio(),
            min_overlap_rows: default_min_overlap_rows(),
            strips: default_strips(),
            ignore_right_px: default_ignore_right_px(),
            block_height: default_block_height(),
            block_width: default_block_width(),
            anchor_ratio: 0.0,
            tolerance: default_tolerance(),
        }
    }
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            accept_confidence: default_accept_confidence(),
            debt_policy: DebtPolicy::default(),
            output: default_output(),
            ranges_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("admission.min_confidence", self.admission.min_confidence),
            ("stitch.accept_confidence", self.stitch.accept_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1, got {value}")));
            }
        }
        for (name, oracle) in [("live_oracle", &self.live_oracle), ("stitch_oracle", &self.stitch_oracle)] {
            if !(oracle.max_shift_ratio > 0.0 && oracle.max_shift_ratio <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.max_shift_ratio must be within (0, 1], got {}",
                    oracle.max_shift_ratio
                )));
            }
            if !(0.0..=1.0).contains(&oracle.anchor_ratio) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.anchor_ratio must be within 0..=1, got {}",
                    oracle.anchor_ratio
                )));
            }
        }
        if self.capture.fps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "capture.fps must be positive, got {}",
                self.capture.fps
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_capture_fps() -> f64 {
    60.0
}
fn default_throttle_ms() -> u64 {
    100
}
fn default_min_confidence() -> f32 {
    0.6
}
fn default_min_shift() -> i32 {
    10
}
fn default_live_oracle() -> OracleConfig {
    OracleConfig {
        max_shift_ratio: 1.0 / 3.0,
        ..OracleConfig::new(OracleKind::Block)
    }
}
fn default_stitch_oracle() -> OracleConfig {
    OracleConfig {
        max_shift_ratio: 1.0,
        ..OracleConfig::new(OracleKind::Rows)
    }
}
fn default_max_shift_ratio() -> f32 {
    1.0 / 3.0
}
fn default_min_overlap_rows() -> u32 {
    32
}
fn default_strips() -> u32 {
    8
}
fn default_ignore_right_px() -> u32 {
    0
}
fn default_block_height() -> u32 {
    20
}
fn default_block_width() -> u32 {
    50
}
fn default_tolerance() -> u8 {
    10
}
fn default_accept_confidence() -> f32 {
    0.5
}
fn default_output() -> String {
    "longshot.png".into()
}
fn default_log_level() -> String {
    "info".into()
}

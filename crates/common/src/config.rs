//! Run settings
//!
//! Process-wide defaults for every test case. Settings are loaded once and
//! passed explicitly to the components that need them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Settings file looked up in the working directory
pub const SETTINGS_FILE: &str = "vizreg.toml";

pub const DEFAULT_OUTPUT_DIR: &str = "screenshots";
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1024;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 786;
pub const DEFAULT_THRESHOLD: f64 = 0.01;
pub const DEFAULT_WAIT_MS: u64 = 0;

const FROM_DEFAULT: &str = "default";

/// Default values applied to test cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Origin of these settings: "default" or the file they were read from
    #[serde(skip)]
    pub from: String,

    /// Directory receiving images and the results ledger
    pub output_dir: PathBuf,

    pub viewport_width: u32,

    pub viewport_height: u32,

    /// Fraction of pixels allowed to differ (0.01 = 1%)
    pub threshold: f64,

    /// Delay between page load and capture
    pub wait_ms: u64,

    /// Screenshot capture configuration
    pub capture: CaptureConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            from: FROM_DEFAULT.to_string(),
            output_dir: working_dir().join(DEFAULT_OUTPUT_DIR),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            threshold: DEFAULT_THRESHOLD,
            wait_ms: DEFAULT_WAIT_MS,
            capture: CaptureConfig::default(),
        }
    }
}

/// Browser engine used for captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(Error::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

/// Capture-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub browser: Browser,

    /// Node.js executable used to drive Playwright
    pub node_binary: String,

    /// Capture the full scrollable page rather than the viewport
    pub full_page: bool,

    pub headless: bool,

    /// Navigation timeout handed to the browser (0 = browser default)
    pub navigation_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            node_binary: "node".to_string(),
            full_page: true,
            headless: true,
            navigation_timeout_ms: 0,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// an error. Relative output directories resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        let path = absolute(path);
        let base = path.parent().map(Path::to_path_buf).unwrap_or_else(working_dir);
        settings.from = path.to_string_lossy().into_owned();
        settings.normalize(&base);
        Ok(settings)
    }

    /// Look for `vizreg.toml` in `dir`, falling back to defaults on any failure
    pub fn discover_in(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file: {}", e);
                Self::default()
            }
        }
    }

    /// Look for `vizreg.toml` in the working directory
    pub fn discover() -> Self {
        Self::discover_in(&working_dir())
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace unusable values with defaults and anchor relative paths at `base`
    fn normalize(&mut self, base: &Path) {
        if self.output_dir.as_os_str().is_empty() {
            self.output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        if self.viewport_width == 0 {
            self.viewport_width = DEFAULT_VIEWPORT_WIDTH;
        }
        if self.viewport_height == 0 {
            self.viewport_height = DEFAULT_VIEWPORT_HEIGHT;
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            self.threshold = DEFAULT_THRESHOLD;
        }
    }

    /// Whether these are the built-in defaults rather than file contents
    pub fn is_default(&self) -> bool {
        self.from == FROM_DEFAULT
    }
}

/// Current working directory, or `.` if it cannot be determined
pub fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir().join(path)
    }
}

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ShelfError};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";

/// Default external archive tool.
pub const DEFAULT_TOOL: &str = "7z";

/// Default bound on a single external tool invocation.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// Service configuration.
///
/// Built once at startup and shared read-only with every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfConfig {
    /// Directory holding the disk images
    pub image_dir: PathBuf,

    /// URL path prefix (empty, or `/segment[/segment...]` without trailing slash)
    pub url_prefix: String,

    /// Root under which per-extraction scratch directories are created
    pub scratch_dir: PathBuf,

    /// Address the HTTP listener binds to
    pub listen: SocketAddr,

    /// External archive tool used for listing and extraction
    pub tool: PathBuf,

    /// Upper bound on one external tool invocation in seconds
    pub tool_timeout_secs: u64,

    /// Image format profile
    pub format: ImageFormat,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            image_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("isos"),
            url_prefix: String::new(),
            scratch_dir: std::env::temp_dir().join("isoshelf"),
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            tool: PathBuf::from(DEFAULT_TOOL),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            format: ImageFormat::default(),
        }
    }
}

impl ShelfConfig {
    /// Tool timeout as a `Duration`.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Check invariants that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        if self.tool_timeout_secs == 0 {
            return Err(ShelfError::ConfigError(
                "tool timeout must be greater than zero".to_string(),
            ));
        }
        if !self.format.suffix.starts_with('.') || self.format.suffix.len() < 2 {
            return Err(ShelfError::ConfigError(format!(
                "image suffix must look like '.ext', got '{}'",
                self.format.suffix
            )));
        }
        if self.url_prefix != normalize_prefix(&self.url_prefix) {
            return Err(ShelfError::ConfigError(format!(
                "url prefix '{}' is not normalized",
                self.url_prefix
            )));
        }
        Ok(())
    }
}

/// Per-format rules for image files and their internal names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFormat {
    /// File suffix identifying images in the store (e.g. ".iso")
    pub suffix: String,

    /// Internal names are matched case-insensitively (folded to uppercase)
    pub case_insensitive: bool,
}

impl ImageFormat {
    /// ISO9660 optical disc images.
    ///
    /// Plain ISO9660 names are uppercase; Joliet and Rock Ridge images keep
    /// mixed case, so folding is opt-in.
    pub fn iso9660(fold_case: bool) -> Self {
        Self {
            suffix: ".iso".to_string(),
            case_insensitive: fold_case,
        }
    }
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::iso9660(false)
    }
}

/// Normalize a URL prefix to either "" or "/a/b" form.
pub fn normalize_prefix(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

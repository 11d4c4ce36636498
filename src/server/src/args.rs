//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use isoshelf_core::config::{
    normalize_prefix, DEFAULT_LISTEN, DEFAULT_TOOL, DEFAULT_TOOL_TIMEOUT_SECS,
};
use isoshelf_core::{ImageFormat, ShelfConfig};

/// Isoshelf disk image browser
#[derive(Parser, Debug)]
#[command(name = "isoshelf", version, about = "Browse and download files inside disk images")]
pub struct Args {
    /// Directory holding the disk images.
    #[arg(long, env = "ISOSHELF_IMAGE_DIR", default_value = "~/isos")]
    pub image_dir: String,

    /// URL path prefix the service is mounted under.
    #[arg(long, env = "ISOSHELF_URL_PREFIX", default_value = "")]
    pub url_prefix: String,

    /// Root for per-extraction scratch directories (default: <temp>/isoshelf).
    #[arg(long, env = "ISOSHELF_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "ISOSHELF_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// 7-Zip executable used for listing and extraction.
    #[arg(long, env = "ISOSHELF_7Z", default_value = DEFAULT_TOOL)]
    pub tool: PathBuf,

    /// Timeout for one 7-Zip invocation in seconds.
    #[arg(long, env = "ISOSHELF_TOOL_TIMEOUT", default_value_t = DEFAULT_TOOL_TIMEOUT_SECS)]
    pub tool_timeout: u64,

    /// Match names inside images case-insensitively.
    #[arg(long, env = "ISOSHELF_FOLD_CASE")]
    pub fold_case: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "ISOSHELF_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Build the service configuration.
    pub fn into_config(self) -> ShelfConfig {
        ShelfConfig {
            image_dir: expand_home(&self.image_dir),
            url_prefix: normalize_prefix(&self.url_prefix),
            scratch_dir: self
                .scratch_dir
                .unwrap_or_else(|| std::env::temp_dir().join("isoshelf")),
            listen: self.listen,
            tool: self.tool,
            tool_timeout_secs: self.tool_timeout,
            format: ImageFormat::iso9660(self.fold_case),
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(path.strip_prefix("~/").unwrap_or(""))
    } else {
        PathBuf::from(path)
    }
}

//! 7-Zip subprocess reader.
//!
//! Listing scrapes the technical table printed by `7z l`:
//!
//! ```text
//!    Date      Time    Attr         Size   Compressed  Name
//! ------------------- ----- ------------ ------------  ------------------------
//! 2024-04-23 12:00:00 .....         1858         2048  boot/grub/grub.cfg
//! ------------------- ----- ------------ ------------  ------------------------
//! 2024-04-23 12:00:00               1858         2048  1 files
//! ```
//!
//! Extraction runs `7z x -spd` (no wildcard matching) into a caller-provided
//! directory, for members the listing shows as files.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use isoshelf_core::error::{Result, ShelfError};
use isoshelf_core::{ArchiveEntry, ImageHandle, ShelfConfig};

use super::ArchiveReader;

/// Number of whitespace-separated columns in a data row.
const ROW_FIELDS: usize = 6;

/// Reader that shells out to a 7-Zip compatible binary.
#[derive(Debug, Clone)]
pub struct SevenZipReader {
    tool: PathBuf,
    timeout: Duration,
}

/// Why an external tool invocation did not succeed.
#[derive(Debug)]
enum ToolFailure {
    Spawn(std::io::Error),
    TimedOut(Duration),
    Exit { status: ExitStatus, detail: String },
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::Spawn(e) => write!(f, "failed to start archive tool: {}", e),
            ToolFailure::TimedOut(t) => write!(f, "archive tool timed out after {:?}", t),
            ToolFailure::Exit { status, detail } if detail.is_empty() => {
                write!(f, "archive tool exited with {}", status)
            }
            ToolFailure::Exit { status, detail } => {
                write!(f, "archive tool exited with {}: {}", status, detail)
            }
        }
    }
}

impl SevenZipReader {
    pub fn new(tool: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ShelfConfig) -> Self {
        Self::new(&config.tool, config.tool_timeout())
    }

    /// Run the tool to completion and return its stdout.
    ///
    /// The child is killed if the timeout elapses or the future is dropped.
    async fn run(&self, args: &[&OsStr]) -> std::result::Result<String, ToolFailure> {
        let mut command = Command::new(&self.tool);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolFailure::Spawn(e)),
            Err(_) => return Err(ToolFailure::TimedOut(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();
            return Err(ToolFailure::Exit {
                status: output.status,
                detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ArchiveReader for SevenZipReader {
    async fn list_entries(&self, image: &ImageHandle) -> Result<Vec<ArchiveEntry>> {
        if !image.path.is_file() {
            return Err(ShelfError::ArchiveUnavailable {
                image: image.name.clone(),
                message: "image file is missing".to_string(),
            });
        }

        let stdout = self
            .run(&[OsStr::new("l"), OsStr::new("--"), image.path.as_os_str()])
            .await
            .map_err(|failure| ShelfError::ArchiveUnavailable {
                image: image.name.clone(),
                message: failure.to_string(),
            })?;

        let entries = parse_listing(&stdout);
        tracing::debug!(
            image = %image.name,
            entries = entries.len(),
            "Listed archive"
        );
        Ok(entries)
    }

    async fn extract_file(
        &self,
        image: &ImageHandle,
        internal_path: &str,
        dest: &Path,
    ) -> Result<PathBuf> {
        let failed = |message: String| ShelfError::ExtractionFailed {
            image: image.name.clone(),
            path: internal_path.to_string(),
            message,
        };

        // `x` extracts whole subtrees for directory arguments; only listed
        // file entries may reach it.
        let entries = match self.list_entries(image).await {
            Ok(entries) => entries,
            Err(ShelfError::ArchiveUnavailable { message, .. }) => return Err(failed(message)),
            Err(e) => return Err(e),
        };
        if !entries.iter().any(|entry| entry.path == internal_path) {
            let subtree = format!("{}/", internal_path);
            let message = if entries.iter().any(|entry| entry.path.starts_with(&subtree)) {
                "member is a directory"
            } else {
                "member not found in archive"
            };
            return Err(failed(message.to_string()));
        }

        let mut output_dir = OsString::from("-o");
        output_dir.push(dest);

        self.run(&[
            OsStr::new("x"),
            OsStr::new("-y"),
            OsStr::new("-spd"),
            output_dir.as_os_str(),
            OsStr::new("--"),
            image.path.as_os_str(),
            OsStr::new(internal_path),
        ])
        .await
        .map_err(|failure| failed(failure.to_string()))?;

        // Symlinks are refused so a crafted image cannot point at host files.
        let extracted = dest.join(internal_path);
        match tokio::fs::symlink_metadata(&extracted).await {
            Ok(meta) if meta.is_file() => Ok(extracted),
            Ok(_) => Err(failed("member is not a regular file".to_string())),
            Err(_) => Err(failed("member not found in archive".to_string())),
        }
    }
}

/// Parse `7z l` output into file entries.
///
/// Only rows between the first and second delimiter lines are data. Rows
/// that do not have exactly six columns, whose size is not a number, or
/// whose attributes mark a directory are skipped. Names containing
/// whitespace therefore never appear.
pub fn parse_listing(output: &str) -> Vec<ArchiveEntry> {
    let mut entries = Vec::new();
    let mut in_rows = false;

    for line in output.lines() {
        if is_delimiter(line) {
            if in_rows {
                break;
            }
            in_rows = true;
            continue;
        }
        if !in_rows {
            continue;
        }
        if let Some(entry) = parse_row(line) {
            entries.push(entry);
        }
    }

    entries
}

fn is_delimiter(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("---") && line.chars().all(|c| c == '-' || c == ' ')
}

fn parse_row(line: &str) -> Option<ArchiveEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != ROW_FIELDS {
        return None;
    }

    let [_date, _time, attr, size, _packed, name] = fields.as_slice() else {
        return None;
    };
    if attr.starts_with('D') {
        return None;
    }
    let size: u64 = size.parse().ok()?;

    let name = name.replace('\\', "/");
    let name = name.trim_start_matches("./").trim_start_matches('/');
    if name.is_empty() {
        return None;
    }

    Some(ArchiveEntry::new(name, size))
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use capview_app::{Capture, DetailView, SortOrder, sort_captures};
use std::cmp::Reverse;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, warn};

pub const APP_NAME: &str = "capview";
pub const CAPTURES_DIR_ENV: &str = "CAPVIEW_CAPTURES_DIR";

/// Read/write access to the directory the detection service writes captures
/// into.
#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: PathBuf,
    offset: UtcOffset,
}

impl CaptureStore {
    /// Opens `dir` using the machine's local UTC offset, falling back to UTC
    /// when it cannot be determined.
    pub fn open(dir: &Path) -> Result<Self> {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self::open_with_offset(dir, offset)
    }

    /// File names carry the camera's wall-clock time, so mtimes are shifted
    /// into `offset` before they are compared with them.
    pub fn open_with_offset(dir: &Path, offset: UtcOffset) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create captures directory {}", dir.display()))?;
        let dir = fs::canonicalize(dir)
            .with_context(|| format!("resolve captures directory {}", dir.display()))?;
        Ok(Self { dir, offset })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    pub fn list(&self, order: SortOrder) -> Result<Vec<Capture>> {
        let mut captures = self.scan()?;
        sort_captures(&mut captures, order);
        Ok(captures)
    }

    /// Looks a capture up by full file name, then by stem.
    pub fn find(&self, key: &str) -> Result<Option<Capture>> {
        let captures = self.scan()?;
        if let Some(index) = captures
            .iter()
            .position(|capture| capture.file_name() == key)
        {
            return Ok(captures.into_iter().nth(index));
        }

        let mut by_stem = captures
            .into_iter()
            .filter(|capture| capture.name.stem == key)
            .collect::<Vec<_>>();
        // Several extensions can share a stem; pick one deterministically.
        by_stem.sort_by(|left, right| left.file_name().cmp(right.file_name()));
        Ok(by_stem.into_iter().next())
    }

    pub fn resolve_detail(&self, file_name: &str) -> Result<DetailView> {
        validate_file_name(file_name)?;
        let capture = self.find(file_name)?.ok_or_else(|| {
            anyhow!(
                "capture {file_name:?} not found in {}; press r to reload the list",
                self.dir.display()
            )
        })?;
        Ok(DetailView {
            file_name: capture.file_name().to_owned(),
            src: capture.path.display().to_string(),
        })
    }

    /// Captures taken on the same calendar day as `now`, judged by the date in
    /// the file name when it has one and by the file's mtime otherwise.
    pub fn captures_today(&self, now: OffsetDateTime) -> Result<Vec<Capture>> {
        let today = now.date();
        Ok(self
            .list(SortOrder::Newest)?
            .into_iter()
            .filter(|capture| match capture.captured_on() {
                Some(date) => date == today,
                None => capture
                    .modified
                    .is_some_and(|modified| modified.to_offset(now.offset()).date() == today),
            })
            .collect())
    }

    /// Keeps the `limit` most recently modified captures and deletes the rest.
    /// A limit of zero disables pruning.
    pub fn prune(&self, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut captures = self.scan()?;
        if captures.len() <= limit {
            return Ok(Vec::new());
        }
        captures.sort_by_key(|capture| (Reverse(capture.modified), capture.file_name().to_owned()));

        let mut removed = Vec::new();
        for capture in captures.into_iter().skip(limit) {
            fs::remove_file(&capture.path)
                .with_context(|| format!("remove capture {}", capture.path.display()))?;
            warn!(
                file = capture.file_name(),
                limit, "capture limit exceeded; removed oldest capture"
            );
            removed.push(capture.name.file_name);
        }
        Ok(removed)
    }

    /// Returns `false` when there was nothing to delete.
    pub fn delete(&self, file_name: &str) -> Result<bool> {
        validate_file_name(file_name)?;
        let path = self.dir.join(file_name);
        if !path.is_file() {
            debug!(file = file_name, "delete skipped; capture not found");
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("delete capture {}", path.display()))?;
        debug!(file = file_name, "capture deleted");
        Ok(true)
    }

    fn scan(&self) -> Result<Vec<Capture>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("read captures directory {}", self.dir.display()))?;

        let mut captures = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("read entry in {}", self.dir.display()))?;
            let path = entry.path();
            let Some(mut capture) = Capture::from_path(&path) else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable capture");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            capture.size_bytes = metadata.len();
            capture.modified = metadata
                .modified()
                .ok()
                .map(|modified| OffsetDateTime::from(modified).to_offset(self.offset));
            captures.push(capture);
        }

        debug!(dir = %self.dir.display(), count = captures.len(), "scanned captures");
        Ok(captures)
    }
}

pub fn default_captures_dir() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(CAPTURES_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {CAPTURES_DIR_ENV} to the captures directory")
    })?;
    Ok(data_root.join(APP_NAME).join("captures"))
}

pub fn validate_captures_dir(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("captures directory must not be empty");
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "captures directory {path:?} looks like a URI ({scheme}://); set [server].base_url for remote captures and pass a local path here"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("captures directory {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!("captures directory {path:?} contains '?'; remove query parameters");
    }

    Ok(())
}

fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() {
        bail!("capture file name must not be empty");
    }
    if file_name.contains(['/', '\\']) || file_name == "." || file_name == ".." {
        bail!("capture file name {file_name:?} must not contain path components");
    }
    Ok(())
}

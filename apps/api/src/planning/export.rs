//! File Exporter — writes JSON copies of results into the downloads directory.
//!
//! Filenames are always derived here, never taken from a caller verbatim.
//! Writes go to a temp file in the target directory and are renamed into
//! place. There is no protection against concurrent writers.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[cfg(unix)]
const EXPORT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{prefix}_{clean_name}_{YYYYmmdd_HHMMSS}.json`, where `clean_name`
    /// keeps only alphanumerics, spaces, `-` and `_`, then turns spaces into `_`.
    pub fn generate_filename(
        prefix: &str,
        user_name: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> String {
        let stamp = timestamp.unwrap_or_else(Utc::now).format(TIMESTAMP_FORMAT);
        let clean: String = user_name
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
            .collect();
        let clean = clean.trim_end().replace(' ', "_");
        format!("{prefix}_{clean}_{stamp}.json")
    }

    /// `{prefix}_{YYYYmmdd_HHMMSS}.json` for whole-collection exports.
    pub fn timestamped_filename(prefix: &str) -> String {
        format!("{prefix}_{}.json", Utc::now().format(TIMESTAMP_FORMAT))
    }

    /// Serializes `data` as pretty JSON into `filename` inside the downloads
    /// directory. Returns the written path, or `None` if anything failed.
    pub fn save_json<T: Serialize + ?Sized>(&self, data: &T, filename: &str) -> Option<PathBuf> {
        match self.try_save_json(data, filename) {
            Ok(path) => {
                info!("Saved response to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Error saving response to file {filename}: {e:#}");
                None
            }
        }
    }

    fn try_save_json<T: Serialize + ?Sized>(&self, data: &T, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() || filename.contains(|c: char| c == '/' || c == '\\') || filename.contains("..") {
            anyhow::bail!("refusing unsafe export filename {filename:?}");
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let body = serde_json::to_vec_pretty(data).context("failed to serialize export")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("failed to create temp export file")?;
        tmp.write_all(&body).context("failed to write export")?;
        tmp.flush().context("failed to flush export")?;

        // NamedTempFile creates 0600 and persist keeps the mode.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(EXPORT_FILE_MODE))
                .context("failed to set export permissions")?;
        }

        let path = self.dir.join(filename);
        tmp.persist(&path)
            .with_context(|| format!("failed to move export into {}", path.display()))?;
        Ok(path)
    }
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::shared::constants::{RECORDING_EXTENSION, RECORDING_FILE_PREFIX};

/// Destination for finished recordings.
pub trait DownloadSink: Send {
    /// Stores `bytes` under `file_name` and returns where it ended up.
    fn deliver(&mut self, file_name: &str, bytes: &[u8])
        -> Result<PathBuf, Box<dyn std::error::Error>>;
}

/// `face-recording-<unix millis>.webm`
pub fn recording_file_name(unix_millis: u128) -> String {
    format!("{RECORDING_FILE_PREFIX}-{unix_millis}.{RECORDING_EXTENSION}")
}

/// Writes recordings into a directory, creating it on first use.
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The user's download directory, falling back to home, then the
    /// working directory.
    pub fn user_downloads() -> Self {
        let dir = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn deliver(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(file_name);
        let temp_path = dest.with_extension("part");

        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.flush()?;
            drop(file);
            fs::rename(&temp_path, &dest)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(format!("failed to save {}: {e}", dest.display()).into());
        }

        log::info!("Saved recording to {} ({} bytes)", dest.display(), bytes.len());
        Ok(dest)
    }
}

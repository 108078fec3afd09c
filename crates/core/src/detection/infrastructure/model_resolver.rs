use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{APP_DIR_NAME, MODELS_DIR};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found (searched {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a model file.
#[derive(Clone, Debug)]
pub struct ModelLocation {
    pub name: String,
    /// Explicit override; when set and missing, resolution fails immediately.
    pub explicit: Option<PathBuf>,
    /// Fixed relative directory shipped next to the binary.
    pub bundled_dir: PathBuf,
    /// Optional remote copy, fetched into the user cache on first use.
    pub url: Option<String>,
}

impl ModelLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explicit: None,
            bundled_dir: PathBuf::from(MODELS_DIR),
            url: None,
        }
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }
}

/// Resolve a model file.
///
/// Resolution order:
/// 1. Explicit path
/// 2. Bundled relative directory (`models/`)
/// 3. User cache directory (platform-specific)
/// 4. Download from the configured URL into the cache
pub fn resolve(
    location: &ModelLocation,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir().ok();
    resolve_in(location, cache_dir.as_deref(), progress)
}

fn resolve_in(
    location: &ModelLocation,
    cache_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(ref path) = location.explicit {
        if path.is_file() {
            return Ok(path.clone());
        }
        return Err(ModelResolveError::NotFound {
            name: location.name.clone(),
            searched: vec![path.clone()],
        });
    }

    let bundled_path = location.bundled_dir.join(&location.name);
    if bundled_path.is_file() {
        return Ok(bundled_path);
    }
    let mut searched = vec![bundled_path];

    if let Some(dir) = cache_dir {
        let cached_path = dir.join(&location.name);
        if cached_path.is_file() {
            return Ok(cached_path);
        }
        searched.push(cached_path.clone());

        if let Some(ref url) = location.url {
            log::info!("Downloading {} from {url}", location.name);
            fs::create_dir_all(dir).map_err(ModelResolveError::CacheDir)?;
            download(url, &cached_path, progress)?;
            return Ok(cached_path);
        }
    } else if location.url.is_some() {
        return Err(ModelResolveError::NoCacheDir);
    }

    Err(ModelResolveError::NotFound {
        name: location.name.clone(),
        searched,
    })
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceTrack/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceTrack/models/` or `~/.cache/FaceTrack/models/`
/// - Windows: `%LOCALAPPDATA%/FaceTrack/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut reader = response;
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn location(tmp: &TempDir) -> ModelLocation {
        ModelLocation {
            name: "test_model.onnx".into(),
            explicit: None,
            bundled_dir: tmp.path().join("models"),
            url: None,
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.onnx");
        fs::write(&explicit, b"explicit").unwrap();
        let bundled = tmp.path().join("models");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();

        let loc = location(&tmp).with_explicit(Some(explicit.clone()));
        assert_eq!(resolve_in(&loc, None, None).unwrap(), explicit);
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let loc = location(&tmp).with_explicit(Some(tmp.path().join("nope.onnx")));
        let err = resolve_in(&loc, None, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound { .. }));
    }

    #[test]
    fn test_bundled_before_cache() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("models");
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&bundled).unwrap();
        fs::create_dir_all(&cache).unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();
        fs::write(cache.join("test_model.onnx"), b"cached").unwrap();

        let resolved = resolve_in(&location(&tmp), Some(&cache), None).unwrap();
        assert_eq!(fs::read(resolved).unwrap(), b"bundled");
    }

    #[test]
    fn test_falls_back_to_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("test_model.onnx"), b"cached").unwrap();

        let resolved = resolve_in(&location(&tmp), Some(&cache), None).unwrap();
        assert_eq!(resolved, cache.join("test_model.onnx"));
    }

    #[test]
    fn test_nothing_found_without_url() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let err = resolve_in(&location(&tmp), Some(&cache), None).unwrap_err();
        match err {
            ModelResolveError::NotFound { searched, .. } => assert_eq!(searched.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}

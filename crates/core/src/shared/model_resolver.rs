use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("model {name} is not cached or bundled and no download URL is configured")]
    Unavailable { name: String },
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

/// Where to look for a classifier model file.
pub struct ModelLookup<'a> {
    pub name: &'a str,
    pub explicit: Option<&'a Path>,
    pub bundled_dir: Option<&'a Path>,
    pub url: Option<&'a str>,
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory (next to the vocabulary file)
/// 4. Download from the configured URL into the cache
pub fn resolve(
    lookup: &ModelLookup<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = lookup.explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::NotFound(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, lookup, progress)
}

fn resolve_in(
    cache_dir: &Path,
    lookup: &ModelLookup<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(lookup.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = lookup.bundled_dir {
        let bundled_path = dir.join(lookup.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = lookup.url else {
        return Err(ModelResolveError::Unavailable {
            name: lookup.name.to_string(),
        });
    };
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Sign2Speech/models/`
/// - Linux: `$XDG_CACHE_HOME/Sign2Speech/models/` or `~/.cache/Sign2Speech/models/`
/// - Windows: `%LOCALAPPDATA%/Sign2Speech/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Sign2Speech").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Sign2Speech").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_err)?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let write_err = |e| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        if let Err(e) = file.write_all(chunk) {
            drop(file);
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(e));
        }
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lookup<'a>(bundled: Option<&'a Path>, url: Option<&'a str>) -> ModelLookup<'a> {
        ModelLookup {
            name: "model.onnx",
            explicit: None,
            bundled_dir: bundled,
            url,
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.onnx");
        fs::write(&path, b"model").unwrap();

        let found = resolve(
            &ModelLookup {
                name: "model.onnx",
                explicit: Some(&path),
                bundled_dir: None,
                url: None,
            },
            None,
        )
        .unwrap();

        assert_eq!(found, path);
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.onnx");
        let result = resolve(
            &ModelLookup {
                name: "model.onnx",
                explicit: Some(&path),
                bundled_dir: None,
                url: None,
            },
            None,
        );
        assert!(matches!(result, Err(ModelResolveError::NotFound(_))));
    }

    #[test]
    fn test_cache_checked_before_bundled() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("model.onnx"), b"cached").unwrap();
        fs::write(bundled.join("model.onnx"), b"bundled").unwrap();

        let found = resolve_in(&cache, &lookup(Some(&bundled), None), None).unwrap();

        assert_eq!(found, cache.join("model.onnx"));
    }

    #[test]
    fn test_bundled_used_when_not_cached() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("model.onnx"), b"bundled").unwrap();

        let found = resolve_in(&tmp.path().join("cache"), &lookup(Some(&bundled), None), None)
            .unwrap();

        assert_eq!(found, bundled.join("model.onnx"));
    }

    #[test]
    fn test_no_url_and_nothing_local_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let result = resolve_in(&tmp.path().join("cache"), &lookup(None, None), None);
        assert!(matches!(result, Err(ModelResolveError::Unavailable { .. })));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("Sign2Speech"));
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

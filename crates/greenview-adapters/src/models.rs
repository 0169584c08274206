//! Model downloading and caching adapter.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use greenview_core::inference::ModelFiles;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

macro_rules! checkpoint_url {
    ($file:literal) => {
        concat!(
            "https://huggingface.co/nvidia/segformer-b5-finetuned-cityscapes-1024-1024/resolve/main/",
            $file
        )
    };
}

/// Called with `(model name, bytes downloaded, total bytes if known)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Download URL.
    pub url: &'static str,
    /// Expected SHA256 hash; `None` skips verification.
    pub sha256: Option<&'static str>,
    /// Filename in models directory.
    pub filename: &'static str,
}

/// Files making up the SegFormer-B5 Cityscapes checkpoint.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "segformer-b5-cityscapes-weights",
        url: checkpoint_url!("model.safetensors"),
        sha256: None,
        filename: "model.safetensors",
    },
    ModelInfo {
        name: "segformer-b5-cityscapes-config",
        url: checkpoint_url!("config.json"),
        sha256: None,
        filename: "config.json",
    },
];

static MODELS_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Overrides the models directory for the rest of the process.
///
/// Returns false if an override was already set.
pub fn set_models_dir(dir: PathBuf) -> bool {
    MODELS_DIR_OVERRIDE.set(dir).is_ok()
}

/// Returns the models directory path.
///
/// Uses the override from [`set_models_dir`] if set, otherwise
/// `XDG_DATA_HOME/greenview/models` or `~/.local/share/greenview/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE.get() {
        return dir.clone();
    }
    default_models_dir()
}

fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("greenview")
        .join("models")
}

/// Paths the segmentation engine loads from.
#[must_use]
pub fn model_files() -> ModelFiles {
    model_files_in(&models_dir())
}

/// Paths of the checkpoint files inside `dir`.
#[must_use]
pub fn model_files_in(dir: &Path) -> ModelFiles {
    ModelFiles {
        weights: dir.join("model.safetensors"),
        config: dir.join("config.json"),
    }
}

/// Ensures all required models are downloaded, reporting progress to `progress`.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models_with_progress(progress: Option<&ProgressCallback>) -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir).context("Failed to create models directory")?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            download_model(model, &path, progress)?;
        }
    }

    Ok(())
}

/// Streams a model to a temporary file, verifies it, then moves it in place.
fn download_model(model: &ModelInfo, path: &Path, progress: Option<&ProgressCallback>) -> Result<()> {
    info!("Downloading model: {}", model.name);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30 * 60))
        .build()
        .context("Failed to build HTTP client")?;
    let mut response = client
        .get(model.url)
        .send()
        .with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    let partial = path.with_extension("part");
    let file =
        File::create(&partial).with_context(|| format!("Failed to create {}", partial.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut downloaded = 0u64;

    loop {
        let n = response
            .read(&mut buf)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer
            .write_all(&buf[..n])
            .with_context(|| format!("Failed to write {}", model.name))?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(model.name, downloaded, total);
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", model.name))?;

    let hash = format!("{:x}", hasher.finalize());
    if let Err(e) = verify_checksum(model, &hash) {
        let _ = fs::remove_file(&partial);
        return Err(e.context(format!(
            "Try deleting {} and re-running to download a fresh copy.",
            path.display()
        )));
    }

    fs::rename(&partial, path).with_context(|| format!("Failed to move {} into place", model.name))?;

    info!("Downloaded {} ({downloaded} bytes)", model.name);
    Ok(())
}

fn verify_checksum(model: &ModelInfo, actual: &str) -> Result<()> {
    match model.sha256 {
        None => {
            debug!("Skipping checksum verification for {}", model.name);
            Ok(())
        }
        Some(expected) if expected.eq_ignore_ascii_case(actual) => Ok(()),
        Some(expected) => anyhow::bail!(
            "Checksum mismatch for {}: expected {expected}, got {actual}",
            model.name
        ),
    }
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| models_dir().join(m.filename))
}

/// Checks if all models are installed.
#[must_use]
pub fn all_models_installed() -> bool {
    let dir = models_dir();
    MODELS.iter().all(|m| dir.join(m.filename).exists())
}

/// Lists installed models with their status.
#[must_use]
pub fn list_models() -> Vec<(String, bool)> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().ends_with("greenview/models"));
    }

    #[test]
    fn test_urls_end_with_filename() {
        for model in MODELS {
            assert!(model.url.ends_with(model.filename), "{}", model.url);
        }
    }

    #[test]
    fn test_model_path() {
        let path = model_path("segformer-b5-cityscapes-weights")
            .unwrap_or_else(|| panic!("should have path"));
        assert!(path.ends_with("model.safetensors"));
    }

    #[test]
    fn test_model_path_unknown() {
        assert!(model_path("unknown").is_none());
    }

    #[test]
    fn test_model_files_in() {
        let files = model_files_in(Path::new("/tmp/m"));
        assert_eq!(files.weights, PathBuf::from("/tmp/m/model.safetensors"));
        assert_eq!(files.config, PathBuf::from("/tmp/m/config.json"));
    }

    #[test]
    fn test_checksum_verification() {
        let mut model = MODELS[0].clone();
        assert!(verify_checksum(&model, "abc").is_ok());
        model.sha256 = Some("ABC");
        assert!(verify_checksum(&model, "abc").is_ok());
        model.sha256 = Some("def");
        assert!(verify_checksum(&model, "abc").is_err());
    }
}

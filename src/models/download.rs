use crate::error::{DeltaError, Result};
use crate::models::registry::models_dir;
use hf_hub::api::tokio::Api;
use hf_hub::{Repo, RepoType};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Headroom required before starting a download. GGUF files are large and
/// hf-hub gives no size up front, so this is a floor, not an exact check.
const MIN_FREE_MB: u64 = 1024;

/// Model downloader backed by Hugging Face Hub
pub struct ModelDownloader {
    models_dir: PathBuf,
}

impl ModelDownloader {
    /// Create new downloader targeting `~/.delta/models`
    pub fn new() -> Result<Self> {
        let models_dir = models_dir()?;
        fs::create_dir_all(&models_dir)?;

        Ok(Self { models_dir })
    }

    /// Create a downloader targeting a specific directory
    pub fn with_dir(models_dir: impl Into<PathBuf>) -> Result<Self> {
        let models_dir = models_dir.into();
        fs::create_dir_all(&models_dir)?;

        Ok(Self { models_dir })
    }

    /// Fetch `filename` from `repo_id` and install it as `<alias>.gguf`
    ///
    /// Returns the final local path. The file is renamed out of the hub
    /// cache so the alias-named path is the single source of truth.
    pub async fn download(&self, alias: &str, repo_id: &str, filename: &str) -> Result<PathBuf> {
        self.check_disk_space(MIN_FREE_MB)?;

        tracing::info!("Downloading {filename} from {repo_id}");

        let spinner = download_spinner(&format!("Downloading {filename} from {repo_id}..."));

        let api = Api::new()
            .map_err(|e| DeltaError::Download(format!("Failed to initialize Hub API: {e}")))?;

        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let fetched = repo.get(filename).await.map_err(|e| {
            spinner.finish_and_clear();
            DeltaError::Download(format!("Failed to download {filename}: {e}"))
        })?;

        spinner.finish_and_clear();

        let target = self.model_path(alias);
        move_into_place(&fetched, &target)?;

        let size_bytes = fs::metadata(&target).map_or(0, |m| m.len());
        tracing::info!(
            "Downloaded {} to {} ({})",
            filename,
            target.display(),
            format_bytes(size_bytes)
        );
        println!("✓ Pulled '{alias}' ({})", format_bytes(size_bytes));

        Ok(target)
    }

    /// Check that at least `min_free_mb` is available on the models filesystem
    fn check_disk_space(&self, min_free_mb: u64) -> Result<()> {
        let stats = nix::sys::statvfs::statvfs(&self.models_dir)
            .map_err(|e| DeltaError::Download(format!("Failed to check disk space: {e}")))?;

        let available_bytes = stats.blocks_available() * stats.block_size();
        let required_bytes = min_free_mb * 1_024 * 1_024;

        if available_bytes < required_bytes {
            let available_mb = available_bytes / (1_024 * 1_024);
            return Err(DeltaError::Download(format!(
                "Not enough disk space: {min_free_mb} MB required, {available_mb} MB available"
            )));
        }

        Ok(())
    }

    /// Path where the model file for `alias` is stored
    #[must_use]
    pub fn model_path(&self, alias: &str) -> PathBuf {
        self.models_dir.join(format!("{alias}.gguf"))
    }
}

/// Move `src` to `dst`, falling back to copy+remove across filesystems
fn move_into_place(src: &std::path::Path, dst: &std::path::Path) -> Result<()> {
    if src == dst {
        return Ok(());
    }

    if fs::rename(src, dst).is_err() {
        fs::copy(src, dst)?;
        fs::remove_file(src)?;
    }

    Ok(())
}

/// Spinner tied to the download it decorates; cleared when it finishes
fn download_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Format a byte count with the largest fitting binary unit
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1 << 30, "GB"), (1 << 20, "MB"), (1 << 10, "KB")];

    for (scale, unit) in UNITS {
        if bytes >= scale {
            return format!("{:.2} {unit}", bytes as f64 / scale as f64);
        }
    }

    format!("{bytes} B")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes_unit_boundaries() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1 << 20), "1.00 MB");
        assert_eq!(format_bytes(1 << 30), "1.00 GB");
    }

    #[test]
    fn test_format_bytes_model_sized_values() {
        // Typical GGUF sizes
        assert_eq!(format_bytes(2_621_440), "2.50 MB");
        assert_eq!(format_bytes(4_831_838_208), "4.50 GB");
        assert_eq!(format_bytes(7_516_192_768), "7.00 GB");
    }

    #[test]
    fn test_model_path() {
        let dir = TempDir::new().unwrap();
        let downloader = ModelDownloader::with_dir(dir.path()).unwrap();
        let path = downloader.model_path("llama3");
        assert!(path.to_string_lossy().ends_with("llama3.gguf"));
    }

    #[test]
    fn test_move_into_place_same_fs() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("weights.gguf");
        let dst = dir.path().join("llama3.gguf");
        fs::write(&src, b"fake gguf").unwrap();

        move_into_place(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"fake gguf");
    }

    #[test]
    fn test_move_into_place_noop_when_already_there() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llama3.gguf");
        fs::write(&path, b"fake gguf").unwrap();

        move_into_place(&path, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_check_disk_space_floor_passes_on_tmp() {
        let dir = TempDir::new().unwrap();
        let downloader = ModelDownloader::with_dir(dir.path()).unwrap();
        // A zero-MB floor is always satisfiable
        assert!(downloader.check_disk_space(0).is_ok());
    }
}

//! Locating model files.
//!
//! A model named `name` is read from `{models_dir}/{name}/` when that
//! directory exists. Otherwise its ONNX export and tokenizer are fetched
//! from the Hugging Face hub into the local Hugging Face cache.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::Api;

use crate::error::EmbeddingError;
use crate::Result;

/// ONNX graph file inside a model directory.
pub const MODEL_FILE: &str = "model.onnx";

/// Tokenizer file inside a model directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Organisation assumed for model names without one.
pub const DEFAULT_HUB_ORG: &str = "sentence-transformers";

/// Hub paths tried, in order, for the ONNX graph.
const HUB_MODEL_PATHS: [&str; 2] = ["onnx/model.onnx", "model.onnx"];

/// Paths of the two files a model needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

impl ModelFiles {
    /// Files laid out flat in `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
        }
    }

    /// Find the files for `name`, preferring `{models_dir}/{name}/` and
    /// falling back to the hub.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no local directory and the download fails.
    pub fn resolve(models_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::resolve_with(models_dir, name, download)
    }

    fn resolve_with<F>(models_dir: impl AsRef<Path>, name: &str, fetch: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<Self>,
    {
        let local = models_dir.as_ref().join(name);
        if local.is_dir() {
            return Ok(Self::in_dir(local));
        }

        let repo_id = hub_repo_id(name);
        tracing::info!(
            model = %name,
            repo = %repo_id,
            missing = %local.display(),
            "Model directory not found, downloading from the hub"
        );
        fetch(&repo_id)
    }

    /// Fail on the first file that does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::ModelLoad`] naming the missing file.
    pub fn check_exist(&self) -> Result<()> {
        for path in [&self.model, &self.tokenizer] {
            if !path.exists() {
                return Err(EmbeddingError::ModelLoad(format!(
                    "file not found: {}",
                    path.display()
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// Hub repository for a model name: bare names live under
/// [`DEFAULT_HUB_ORG`].
#[must_use]
pub fn hub_repo_id(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{DEFAULT_HUB_ORG}/{name}")
    }
}

fn download(repo_id: &str) -> Result<ModelFiles> {
    let api = Api::new()
        .map_err(|e| EmbeddingError::ModelLoad(format!("failed to start hub client: {e}")))?;
    let repo = api.model(repo_id.to_string());

    let mut last_error = None;
    let mut model = None;
    for path in HUB_MODEL_PATHS {
        match repo.get(path) {
            Ok(file) => {
                model = Some(file);
                break;
            }
            Err(e) => last_error = Some(format!("{path}: {e}")),
        }
    }
    let model = model.ok_or_else(|| {
        EmbeddingError::ModelLoad(format!(
            "no ONNX export in {repo_id} ({})",
            last_error.unwrap_or_default()
        ))
    })?;

    let tokenizer = repo.get(TOKENIZER_FILE).map_err(|e| {
        EmbeddingError::ModelLoad(format!("failed to fetch {TOKENIZER_FILE} from {repo_id}: {e}"))
    })?;

    tracing::info!(repo = %repo_id, path = %model.display(), "Model files downloaded");
    Ok(ModelFiles { model, tokenizer })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_fetch(repo: &str) -> Result<ModelFiles> {
        panic!("unexpected download of {repo}");
    }

    #[test]
    fn test_in_dir() {
        let files = ModelFiles::in_dir("/models/mini");
        assert_eq!(files.model, PathBuf::from("/models/mini/model.onnx"));
        assert_eq!(files.tokenizer, PathBuf::from("/models/mini/tokenizer.json"));
    }

    #[test]
    fn test_hub_repo_id() {
        assert_eq!(
            hub_repo_id("all-MiniLM-L6-v2"),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(hub_repo_id("BAAI/bge-small-en"), "BAAI/bge-small-en");
    }

    #[test]
    fn test_local_directory_wins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("all-MiniLM-L6-v2");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MODEL_FILE), b"onnx").unwrap();
        std::fs::write(dir.join(TOKENIZER_FILE), b"{}").unwrap();

        let files = ModelFiles::resolve_with(tmp.path(), "all-MiniLM-L6-v2", never_fetch).unwrap();
        assert_eq!(files, ModelFiles::in_dir(&dir));
        files.check_exist().unwrap();
    }

    #[test]
    fn test_nested_local_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("sentence-transformers").join("all-MiniLM-L6-v2");
        std::fs::create_dir_all(&dir).unwrap();

        let files = ModelFiles::resolve_with(
            tmp.path(),
            "sentence-transformers/all-MiniLM-L6-v2",
            never_fetch,
        )
        .unwrap();
        assert_eq!(files, ModelFiles::in_dir(&dir));
    }

    #[test]
    fn test_missing_directory_fetches_from_hub() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut requested = None;

        let files = ModelFiles::resolve_with(tmp.path(), "all-MiniLM-L6-v2", |repo| {
            requested = Some(repo.to_string());
            Ok(ModelFiles::in_dir("/cache/snapshot"))
        })
        .unwrap();

        assert_eq!(
            requested.as_deref(),
            Some("sentence-transformers/all-MiniLM-L6-v2")
        );
        assert_eq!(files.model, PathBuf::from("/cache/snapshot/model.onnx"));
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ModelFiles::resolve_with(tmp.path(), "gone", |repo| {
            Err(EmbeddingError::ModelLoad(format!("404 for {repo}")).into())
        })
        .unwrap_err();
        assert!(err.to_string().contains("404 for sentence-transformers/gone"));
    }

    #[test]
    fn test_check_exist_names_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MODEL_FILE), b"onnx").unwrap();

        let err = ModelFiles::in_dir(tmp.path()).check_exist().unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }
}

//! Model tree staging

use servd_core::{ModelResource, ServdResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one staging pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Models copied into the tree during this pass
    pub staged: Vec<String>,
    /// Models already present in the tree
    pub present: Vec<String>,
    /// Models hosted remotely, left to the serving runtime
    pub remote: Vec<String>,
    /// Models that could not be staged, with the reason
    pub failed: Vec<(String, String)>,
}

/// Local model directory that models are staged into
pub struct ModelTree {
    download_dir: PathBuf,
}

impl ModelTree {
    pub fn new(download_dir: PathBuf) -> Self {
        Self { download_dir }
    }

    /// Path a model is staged at
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(name)
    }

    /// Copy every missing local model into the tree
    pub async fn stage(&self, models: &[ModelResource]) -> ServdResult<StageReport> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let mut report = StageReport::default();
        for model in models {
            let target = self.model_path(&model.name);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                report.present.push(model.name.clone());
                continue;
            }

            let Some(source) = model.local_source() else {
                debug!(model = %model.name, path = %model.model_path, "Skipping remote model");
                report.remote.push(model.name.clone());
                continue;
            };

            match self.copy_into(source, &target).await {
                Ok(()) => {
                    info!(model = %model.name, path = %target.display(), "Staged model");
                    report.staged.push(model.name.clone());
                }
                Err(e) => {
                    warn!(model = %model.name, error = %e, "Failed to stage model");
                    report.failed.push((model.name.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Copy `source` to a temporary sibling of `target`, then rename it in place
    async fn copy_into(&self, source: &Path, target: &Path) -> std::io::Result<()> {
        let mut tmp_name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".staging");
        let tmp = target.with_file_name(tmp_name);

        if tokio::fs::try_exists(&tmp).await.unwrap_or(false) {
            remove_path(&tmp).await?;
        }

        if let Err(e) = copy_tree(source, &tmp).await {
            let _ = remove_path(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, target).await
    }
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    if tokio::fs::metadata(path).await?.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

async fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    if !tokio::fs::metadata(source).await?.is_dir() {
        tokio::fs::copy(source, target).await?;
        return Ok(());
    }

    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dest = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), dest));
            } else {
                tokio::fs::copy(entry.path(), dest).await?;
            }
        }
    }

    Ok(())
}

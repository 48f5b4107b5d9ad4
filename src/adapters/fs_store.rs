//! Directory-backed case store.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::collaborators::CaseStore;
use crate::context::{render_case_name, CaseHandle};
use crate::error::{RunError, RunResult};

/// Name of the file recording the current case.
const CURRENT_CASE_FILE: &str = "current_case";

/// Case store keeping one directory per case under a root directory.
#[derive(Debug, Clone)]
pub struct FsCaseStore {
    root: PathBuf,
}

impl FsCaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of a case.
    pub fn case_path(&self, case: &CaseHandle) -> PathBuf {
        self.root.join(&case.name)
    }

    /// Name of the current case, if one has been set.
    pub async fn current(&self) -> RunResult<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_CASE_FILE)).await {
            Ok(name) => Ok(Some(name.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RunError::Io(e)),
        }
    }
}

#[async_trait]
impl CaseStore for FsCaseStore {
    async fn resolve(&self, template: &str, iteration: u32) -> RunResult<CaseHandle> {
        let case = CaseHandle::new(render_case_name(template, iteration)?, iteration);
        let path = self.case_path(&case);
        fs::create_dir_all(&path).await.map_err(|e| {
            RunError::CaseStore(format!("cannot create case '{}': {}", path.display(), e))
        })?;
        Ok(case)
    }

    /// Atomically replace the current-case marker.
    async fn switch_current(&self, case: &CaseHandle) -> RunResult<()> {
        fs::create_dir_all(&self.root).await?;
        let marker = self.root.join(CURRENT_CASE_FILE);
        let temp = marker.with_extension("tmp");

        let mut file = fs::File::create(&temp).await?;
        file.write_all(case.name.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &marker).await?;
        tracing::info!(case = %case, "switched current case");
        Ok(())
    }
}

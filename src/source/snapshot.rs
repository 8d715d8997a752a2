use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::BatchSource;
use crate::error::SourceError;
use crate::model::{Batch, SolutionReport};

/// Writes every submitted report to `<dir>/<batch_id>-<n>.json` before passing it on.
///
/// A failed write is returned as [`SourceError::Io`] and the inner source is not called.
pub struct SnapshotSource<S> {
    inner: S,
    dir: PathBuf,
    written: AtomicU64,
}

impl<S: BatchSource> SnapshotSource<S> {
    pub fn new(inner: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
            written: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, report: &SolutionReport) -> Result<PathBuf, SourceError> {
        let n = self.written.fetch_add(1, Ordering::Relaxed) + 1;
        let file = format!("{}-{n}.json", sanitize(report.batch_id.as_str()));
        let path = self.dir.join(file);

        let body = serde_json::to_vec_pretty(report).map_err(|e| SourceError::Decode {
            reason: e.to_string(),
        })?;
        let io = |source| SourceError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io)?;
        tokio::fs::write(&path, body).await.map_err(io)?;
        Ok(path)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl<S: BatchSource> BatchSource for SnapshotSource<S> {
    async fn poll_next_batch(&self) -> Result<Option<Batch>, SourceError> {
        self.inner.poll_next_batch().await
    }

    async fn submit_solution(&self, report: &SolutionReport) -> Result<(), SourceError> {
        let path = self.write(report).await?;
        tracing::debug!(path = %path.display(), batch = %report.batch_id, "snapshot written");
        self.inner.submit_solution(report).await
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    fn report(batch: &str) -> SolutionReport {
        SolutionReport::new(batch.into(), &[], &[], &[], &[], 3)
    }

    #[tokio::test]
    async fn stores_pretty_json_and_forwards() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotSource::new(InMemorySource::new(), dir.path().join("results"));

        source.submit_solution(&report("req/7")).await.unwrap();
        source.submit_solution(&report("req/7")).await.unwrap();

        let first = dir.path().join("results").join("req_7-1.json");
        let text = tokio::fs::read_to_string(&first).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["batch_id"], "req/7");
        assert_eq!(value["solve_time_ms"], 3);
        assert!(text.contains('\n'));
        assert!(dir.path().join("results").join("req_7-2.json").exists());

        assert_eq!(source.inner().submitted().await.len(), 2);
    }
}

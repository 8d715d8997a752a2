use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::BatchSource;
use crate::error::SourceError;
use crate::model::{Batch, SolutionReport};

/// Batches pushed by the embedding code; submitted reports are kept for inspection.
#[derive(Default)]
pub struct InMemorySource {
    pending: Mutex<VecDeque<Batch>>,
    submitted: Mutex<Vec<SolutionReport>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source pre-loaded with `batches`, served in order.
    pub fn with_batches(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self {
            pending: Mutex::new(batches.into_iter().collect()),
            submitted: Mutex::default(),
        }
    }

    pub async fn push(&self, batch: Batch) {
        self.pending.lock().await.push_back(batch);
    }

    /// Reports received so far, in submission order.
    pub async fn submitted(&self) -> Vec<SolutionReport> {
        self.submitted.lock().await.clone()
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl BatchSource for InMemorySource {
    async fn poll_next_batch(&self) -> Result<Option<Batch>, SourceError> {
        Ok(self.pending.lock().await.pop_front())
    }

    async fn submit_solution(&self, report: &SolutionReport) -> Result<(), SourceError> {
        self.submitted.lock().await.push(report.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Demand, Location};

    #[tokio::test]
    async fn serves_batches_in_push_order() {
        let source = InMemorySource::with_batches([Batch::fresh("a", vec![])]);
        source
            .push(Batch::fresh("b", vec![Demand::new(1, 3, Location::new(1.0, 1.0))]))
            .await;

        assert_eq!(source.poll_next_batch().await.unwrap().unwrap().id.as_str(), "a");
        assert_eq!(source.poll_next_batch().await.unwrap().unwrap().id.as_str(), "b");
        assert!(source.poll_next_batch().await.unwrap().is_none());
    }
}

//! Periodic action sampling a discrete source into an edge detector.

use std::sync::Arc;

use async_trait::async_trait;

use crate::button::EdgeDetector;
use crate::poller::{PollError, TaskAction};
use crate::sampler::DiscreteSampler;

/// Reads one sample per firing and feeds it to the detector.
pub struct ButtonAction {
    sampler: Arc<dyn DiscreteSampler>,
    detector: Arc<EdgeDetector>,
}

impl ButtonAction {
    pub fn new(sampler: Arc<dyn DiscreteSampler>, detector: Arc<EdgeDetector>) -> Self {
        Self { sampler, detector }
    }

    pub fn detector(&self) -> &Arc<EdgeDetector> {
        &self.detector
    }
}

#[async_trait]
impl TaskAction for ButtonAction {
    async fn run(&self) -> Result<(), PollError> {
        let state = self.sampler.read_discrete().await?;
        self.detector.sample(state).await?;
        Ok(())
    }
}

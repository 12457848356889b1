use affvid_core::Stage;

use crate::error::PipelineError;

/// Tracks the stage one product has reached within a run.
///
/// Stages only move forward one step at a time; a product restored from a
/// persisted checkpoint starts at the checkpoint's stage instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductProgress {
    external_id: String,
    stage: Stage,
}

impl ProductProgress {
    /// A product already in the catalog.
    #[must_use]
    pub fn new(external_id: impl Into<String>) -> Self {
        Self::resumed(external_id, Stage::Extracted)
    }

    #[must_use]
    pub fn resumed(external_id: impl Into<String>, stage: Stage) -> Self {
        Self {
            external_id: external_id.into(),
            stage,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The stage this product would attempt next; `Done` once finished.
    #[must_use]
    pub fn attempting(&self) -> Stage {
        self.stage.next().unwrap_or(Stage::Done)
    }

    /// Moves to `to`, which must be the immediate successor of the current
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] for a backwards,
    /// repeated or skipping move.
    pub fn advance(&mut self, to: Stage) -> Result<(), PipelineError> {
        if self.stage.next() != Some(to) {
            return Err(PipelineError::IllegalTransition {
                external_id: self.external_id.clone(),
                from: self.stage,
                to,
            });
        }
        tracing::debug!(external_id = %self.external_id, from = %self.stage, to = %to, "stage advanced");
        self.stage = to;
        Ok(())
    }
}

use crate::error::{DynarunError, ErrorCode, Result};
use crate::plugin::{Analysis, HookDispatcher};
use tracing::{debug, error, warn};

use super::SessionId;

/// Brackets entry execution with analysis lifecycle hooks
///
/// [`begin`](Self::begin) runs `begin_execution` in order and stops at the
/// first failure. [`finish`](Self::finish) runs `end_execution` on exactly
/// the analyses whose begin hook completed, and must be awaited on every
/// exit path once `begin` has been called.
pub struct LifecycleScope {
    session_id: SessionId,
    analyses: Vec<Box<dyn Analysis>>,
    begun: usize,
    finished: bool,
}

impl LifecycleScope {
    pub fn new(session_id: SessionId, analyses: Vec<Box<dyn Analysis>>) -> Self {
        Self {
            session_id,
            analyses,
            begun: 0,
            finished: false,
        }
    }

    pub async fn begin(&mut self) -> Result<()> {
        for analysis in self.analyses.iter_mut().skip(self.begun) {
            debug!("begin_execution: {}", analysis.name());
            analysis.begin_execution().await.map_err(|e| {
                DynarunError::session_with_code(
                    ErrorCode::SESSION_HOOK_FAILED,
                    format!("begin_execution failed for {}", analysis.name()),
                    Some(self.session_id.to_string()),
                )
                .with_source(e)
            })?;
            self.begun += 1;
        }
        Ok(())
    }

    /// Number of analyses whose begin hook completed
    pub fn begun(&self) -> usize {
        self.begun
    }

    /// Event dispatcher over the active analyses
    pub fn dispatcher(&mut self) -> HookDispatcher<'_> {
        HookDispatcher::new(&mut self.analyses[..self.begun])
    }

    /// Run every pending end hook, reporting the first failure
    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        let mut first_error = None;

        for analysis in self.analyses.iter_mut().take(self.begun) {
            debug!("end_execution: {}", analysis.name());
            if let Err(e) = analysis.end_execution().await {
                error!("end_execution failed for {}: {}", analysis.name(), e);
                first_error.get_or_insert_with(|| {
                    DynarunError::session_with_code(
                        ErrorCode::SESSION_HOOK_FAILED,
                        format!("end_execution failed for {}", analysis.name()),
                        Some(self.session_id.to_string()),
                    )
                    .with_source(e)
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for LifecycleScope {
    fn drop(&mut self) {
        if !self.finished && self.begun > 0 {
            warn!(
                "Session {} dropped its lifecycle scope with {} end hooks pending",
                self.session_id, self.begun
            );
        }
    }
}

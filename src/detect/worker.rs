use super::{DetectionLoop, DetectionOutcome, StopHandle};
use crate::action::ActionTrigger;
use crate::capture::ScreenCapture;
use crate::search::TemplateMatcher;
use crate::util::{TriggerError, TriggerResult};
use std::thread::JoinHandle;

/// A detection loop running on its own thread.
///
/// The spawning thread keeps a [`StopHandle`] and never blocks on capture or
/// matching; [`join`](Self::join) is the only wait.
pub struct DetectionWorker {
    stop: StopHandle,
    handle: JoinHandle<DetectionOutcome>,
}

impl DetectionWorker {
    /// Moves `detection` onto a named worker thread and starts it.
    pub fn spawn<M, C, A>(mut detection: DetectionLoop<M, C, A>) -> TriggerResult<Self>
    where
        M: TemplateMatcher + Send + 'static,
        C: ScreenCapture + Send + 'static,
        A: ActionTrigger + Send + 'static,
    {
        let stop = detection.stop_handle();
        let handle = std::thread::Builder::new()
            .name("glyph-detect".into())
            .spawn(move || detection.run())
            .map_err(|e| TriggerError::Worker(e.to_string()))?;
        Ok(Self { stop, handle })
    }

    /// Asks the loop to stop at its next check.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the loop to end and returns its outcome.
    pub fn join(self) -> TriggerResult<DetectionOutcome> {
        self.handle
            .join()
            .map_err(|_| TriggerError::Worker("detection thread panicked".into()))
    }
}

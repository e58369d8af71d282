//! Polling detection loop.
//!
//! A [`DetectionPlan`] lists stages; each stage names a template and the
//! monitor region to watch for it. The loop re-captures the region until the
//! template shows up, moves on to the next stage, and after the last stage
//! fires the [`ActionTrigger`] at the configured click point.
//!
//! Every negative result is handled the same way: capture failures, empty
//! captures and matcher errors all count as a miss and the stage is retried
//! with fresh pixels.

use crate::action::ActionTrigger;
use crate::capture::ScreenCapture;
use crate::geometry::{Point, Rectangle};
use crate::image::{normalize, GrayscaleMatrix};
use crate::search::{MatchParams, TemplateMatcher};
use crate::trace::{trace_debug, trace_event, trace_span, trace_warn};
use crate::util::{TriggerError, TriggerResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod worker;

pub use worker::DetectionWorker;

/// One target to wait for.
#[derive(Clone, Debug)]
pub struct Stage {
    pub name: String,
    pub template: GrayscaleMatrix,
    pub region: Rectangle,
}

impl Stage {
    pub fn new(name: impl Into<String>, template: GrayscaleMatrix, region: Rectangle) -> Self {
        Self {
            name: name.into(),
            template,
            region,
        }
    }
}

/// Bounds on how long a single stage may keep polling.
///
/// The default is unbounded with no pause between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopLimits {
    /// Maximum attempts per stage.
    pub max_attempts: Option<u64>,
    /// Wall-clock budget per stage.
    pub timeout: Option<Duration>,
    /// Pause after each unsuccessful attempt.
    pub poll_interval: Duration,
}

/// Everything the loop needs to run one detection cycle.
#[derive(Clone, Debug)]
pub struct DetectionPlan {
    pub monitor_index: usize,
    pub stages: Vec<Stage>,
    pub click_point: Point,
    pub params: MatchParams,
    pub limits: LoopLimits,
}

impl DetectionPlan {
    /// Rejects plans the loop cannot run.
    pub fn validate(&self) -> TriggerResult<()> {
        if self.stages.is_empty() {
            return Err(TriggerError::InvalidInput("detection plan has no stages"));
        }
        if let Some(stage) = self.stages.iter().find(|s| s.template.is_empty()) {
            trace_warn!("stage {} has an empty template", stage.name);
            return Err(TriggerError::EmptyInput("template"));
        }
        for stage in &self.stages {
            let (width, height) = (stage.region.width() as usize, stage.region.height() as usize);
            if stage.template.width() > width || stage.template.height() > height {
                trace_warn!("stage {} template does not fit {}", stage.name, stage.region);
                return Err(TriggerError::TemplateTooLarge {
                    template_width: stage.template.width(),
                    template_height: stage.template.height(),
                    source_width: width,
                    source_height: height,
                });
            }
        }
        Ok(())
    }
}

/// Observable loop state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    /// Polling for stage `stage` (index into the plan).
    Searching { stage: usize },
    Acting,
}

/// How a call to [`DetectionLoop::run`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Every stage matched and the action was issued. `hits` holds one
    /// monitor-space position per stage.
    Completed { hits: Vec<Point> },
    /// The stop handle was raised.
    Stopped,
    AttemptsExhausted { stage: usize, attempts: u64 },
    TimedOut { stage: usize },
}

/// Cooperative cancellation flag shared with the loop.
///
/// Checked between attempts; an in-flight capture or match runs to completion.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Host-side polling state machine.
pub struct DetectionLoop<M, C, A> {
    matcher: M,
    capture: C,
    action: A,
    plan: DetectionPlan,
    state: LoopState,
    stop: StopHandle,
}

impl<M, C, A> DetectionLoop<M, C, A>
where
    M: TemplateMatcher,
    C: ScreenCapture,
    A: ActionTrigger,
{
    pub fn new(plan: DetectionPlan, matcher: M, capture: C, action: A) -> TriggerResult<Self> {
        plan.validate()?;
        Ok(Self {
            matcher,
            capture,
            action,
            plan,
            state: LoopState::Idle,
            stop: StopHandle::new(),
        })
    }

    /// Handle that stops the loop at its next check.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs every stage in order, then the action.
    ///
    /// Returns to [`LoopState::Idle`] however the cycle ends.
    pub fn run(&mut self) -> DetectionOutcome {
        let _span = trace_span!("detection_cycle", stages = self.plan.stages.len()).entered();
        let mut hits = Vec::with_capacity(self.plan.stages.len());

        for stage in 0..self.plan.stages.len() {
            self.state = LoopState::Searching { stage };
            match self.poll_stage(stage) {
                Ok(point) => hits.push(point),
                Err(outcome) => {
                    self.state = LoopState::Idle;
                    return outcome;
                }
            }
        }

        self.state = LoopState::Acting;
        let click = self.plan.click_point;
        if let Err(err) = self.action.act(click) {
            trace_warn!("action at {} failed: {}", click, err);
        }
        trace_event!("detection_completed", click_x = click.x, click_y = click.y);
        self.state = LoopState::Idle;
        DetectionOutcome::Completed { hits }
    }

    fn poll_stage(&mut self, stage: usize) -> Result<Point, DetectionOutcome> {
        let limits = self.plan.limits;
        let started = Instant::now();
        let mut attempts = 0u64;

        loop {
            if self.stop.is_stopped() {
                return Err(DetectionOutcome::Stopped);
            }
            if limits.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(DetectionOutcome::AttemptsExhausted { stage, attempts });
            }
            if limits.timeout.is_some_and(|t| started.elapsed() >= t) {
                return Err(DetectionOutcome::TimedOut { stage });
            }

            attempts += 1;
            if let Some(point) = self.attempt(stage) {
                let current = &self.plan.stages[stage];
                trace_event!(
                    "stage_matched",
                    stage = current.name.as_str(),
                    attempts = attempts,
                    x = point.x,
                    y = point.y
                );
                return Ok(point);
            }
            if !limits.poll_interval.is_zero() {
                std::thread::sleep(limits.poll_interval);
            }
        }
    }

    /// One capture-normalize-match round. `None` on any kind of miss.
    fn attempt(&mut self, stage: usize) -> Option<Point> {
        let current = &self.plan.stages[stage];
        let frame = match self.capture.capture(self.plan.monitor_index, current.region) {
            Ok(frame) => frame,
            Err(err) => {
                trace_debug!("capture for {} failed: {}", current.name, err);
                return None;
            }
        };
        let source = normalize(&frame);
        if source.is_empty() {
            trace_debug!("capture for {} was empty", current.name);
            return None;
        }
        self.matcher
            .find_first_match(&source, &current.template, &self.plan.params)
            .point()
            .map(|offset| offset.offset_by(current.region.visible_origin()))
    }
}

//! Bounded-retry state machine.
//!
//! ```text
//! Running(i) --accepted--------------------> Accepted
//! Running(i) --fatal-----------------------> FatalFailed
//! Running(i) --retry, i + 1 <  max---------> Running(i + 1)
//! Running(i) --retry, i + 1 == max---------> Exhausted
//! ```
//!
//! The state machine does no I/O. The runtime supervisor feeds it one verdict
//! per generator call and acts on the returned [`Transition`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::correction::CorrectionBuilder;
use crate::policy::Verdict;
use crate::KernelError;

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "iteration", rename_all = "snake_case")]
pub enum LoopPhase {
    Running(usize),
    Accepted,
    FatalFailed,
    Exhausted,
}

impl LoopPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopPhase::Running(_))
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Running(i) => write!(f, "RUNNING({})", i),
            LoopPhase::Accepted => write!(f, "ACCEPTED"),
            LoopPhase::FatalFailed => write!(f, "FATAL_FAILED"),
            LoopPhase::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// A rejection absorbed by the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 0-based iteration that produced the rejected draft
    pub iteration: usize,
    /// Rejection reason
    pub reason: String,
    pub evaluated_at: DateTime<Utc>,
}

/// What the supervisor must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Release the draft.
    Accept,
    /// Call the generator again with [`LoopState::instruction`].
    Retry { iteration: usize },
    /// Abort now, regardless of remaining budget.
    Fatal { iteration: usize, reason: String },
    /// Budget spent without an accepted draft.
    Exhausted { attempts: usize, last_reason: String },
}

/// Per-run loop state.
#[derive(Debug, Clone)]
pub struct LoopState {
    phase: LoopPhase,
    max_iterations: usize,
    instruction: Option<String>,
    rejections: Vec<AttemptRecord>,
}

impl LoopState {
    /// Start in `Running(0)` with no instruction.
    pub fn new(max_iterations: usize) -> Result<Self, KernelError> {
        if max_iterations == 0 {
            return Err(KernelError::ZeroIterations);
        }

        Ok(Self {
            phase: LoopPhase::Running(0),
            max_iterations,
            instruction: None,
            rejections: Vec::new(),
        })
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Current iteration while running.
    pub fn iteration(&self) -> Option<usize> {
        match self.phase {
            LoopPhase::Running(i) => Some(i),
            _ => None,
        }
    }

    /// Correction instruction for the current iteration (none on iteration 0).
    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// Rejections absorbed so far, oldest first.
    pub fn rejections(&self) -> &[AttemptRecord] {
        &self.rejections
    }

    pub fn into_rejections(self) -> Vec<AttemptRecord> {
        self.rejections
    }

    /// Apply the verdict for the current iteration's draft.
    pub fn advance(
        &mut self,
        query: &str,
        verdict: &Verdict,
        builder: &CorrectionBuilder,
    ) -> Result<Transition, KernelError> {
        let LoopPhase::Running(i) = self.phase else {
            return Err(KernelError::LoopFinished(self.phase));
        };

        match verdict {
            Verdict::Accepted => {
                self.phase = LoopPhase::Accepted;
                Ok(Transition::Accept)
            }
            Verdict::Fatal { reason } => {
                self.phase = LoopPhase::FatalFailed;
                Ok(Transition::Fatal {
                    iteration: i,
                    reason: reason.clone(),
                })
            }
            Verdict::Retry { reason, .. } => {
                self.rejections.push(AttemptRecord {
                    iteration: i,
                    reason: reason.clone(),
                    evaluated_at: Utc::now(),
                });

                if i + 1 < self.max_iterations {
                    self.instruction = Some(builder.build_for(query, verdict));
                    self.phase = LoopPhase::Running(i + 1);
                    Ok(Transition::Retry { iteration: i + 1 })
                } else {
                    self.phase = LoopPhase::Exhausted;
                    Ok(Transition::Exhausted {
                        attempts: i + 1,
                        last_reason: reason.clone(),
                    })
                }
            }
        }
    }
}

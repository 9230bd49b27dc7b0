//! Isolated, time-limited execution of a parsed program.
//!
//! Every [`SandboxExecutor::execute`] call builds a fresh interpreter context
//! on its own worker thread: a new global scope, new intrinsics, a new heap
//! registry and a new output buffer. Nothing is shared with other calls, and
//! the worker tears the context down before it exits.
//!
//! The host side waits for the worker with the configured timeout. When it
//! elapses the output buffer is sealed and an interrupt flag is raised; the
//! evaluator polls that flag at every statement, loop iteration and call, so
//! even `while (true) {}` stops promptly. The interrupt cannot be caught by
//! the program and `finally` blocks do not run on it.
//!
//! The program sees only the allow-listed globals installed by the builtins
//! module: output capture, `Math`, `JSON`, the fundamental constructors and
//! a handful of conversion functions.

mod builtins;
mod format;
mod heap;
mod interpreter;
mod operators;
mod output;
mod scope;
mod value;

pub use output::{CaptureError, OutputSink};

use crate::syntax::Program;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use value::Value;

/// Reported when the wall-clock limit elapses.
pub fn timeout_message(timeout: Duration) -> String {
    format!("Execution timed out after {}ms", timeout.as_millis())
}

/// Reported when the heap or output ceiling is exceeded.
pub const RESOURCE_LIMIT_MESSAGE: &str = "Execution exceeded resource limits";

/// How long the host waits for an interrupted worker before detaching it.
pub const INTERRUPT_GRACE: Duration = Duration::from_millis(250);

/// Reported for internal failures; carries no detail on purpose.
pub const SANDBOX_FAULT_MESSAGE: &str = "Sandbox fault";

/// Bounds applied to one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Wall-clock limit (milliseconds in JSON).
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Ceiling on live objects and scopes created by the program.
    pub max_heap_objects: usize,
    /// Deepest allowed chain of nested calls.
    pub max_call_depth: usize,
    /// Most output lines captured.
    pub max_output_lines: usize,
    /// Most bytes of output captured.
    pub max_output_bytes: usize,
    /// Stack reserved for the worker thread, in bytes.
    pub stack_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_heap_objects: 1_000_000,
            max_call_depth: 1_000,
            max_output_lines: 10_000,
            max_output_bytes: 4 * 1024 * 1024,
            stack_size: 256 * 1024 * 1024,
        }
    }
}

impl ExecutionLimits {
    /// Default limits with a different timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Lifecycle of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Context requested, worker not started.
    Created,
    /// Worker evaluating the program.
    Running,
    /// The program ran to the end (possibly with an uncaught exception).
    Completed,
    /// The wall-clock limit elapsed.
    TimedOut,
    /// A resource ceiling was hit or the worker failed.
    Faulted,
    /// Worker joined and context torn down.
    Finalized,
}

impl ExecutionState {
    /// Whether `next` may follow `self`.
    pub fn can_advance_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Created, Faulted)
                | (Running, Completed | TimedOut | Faulted)
                | (Completed | TimedOut | Faulted, Finalized)
        )
    }

    /// One of the three outcomes of a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::TimedOut | ExecutionState::Faulted
        )
    }
}

/// Outcome of running a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Captured output lines, in the order produced.
    pub logs: Vec<String>,
    /// `false` only when the sandbox could not finish the program.
    pub success: bool,
    /// Failure description when `success` is `false`.
    pub error: Option<String>,
    /// How the run ended (`Completed`, `TimedOut` or `Faulted`).
    pub state: ExecutionState,
    /// Wall-clock time spent, including teardown.
    pub elapsed: Duration,
}

/// How the worker thread finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerOutcome {
    Completed,
    Interrupted,
    Exhausted,
}

/// Non-local exits of evaluation.
#[derive(Clone, Debug)]
pub(crate) enum Abort {
    /// A catchable JavaScript exception.
    Throw(Value),
    /// Evaluation must stop; not catchable, `finally` does not run.
    Halt(Halt),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Halt {
    Interrupted,
    ResourceExhausted,
}

impl From<heap::HeapExhausted> for Abort {
    fn from(_: heap::HeapExhausted) -> Self {
        Abort::Halt(Halt::ResourceExhausted)
    }
}

pub(crate) type EvalResult<T> = Result<T, Abort>;

struct Lifecycle {
    state: ExecutionState,
}

impl Lifecycle {
    fn advance(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "sandbox state");
        self.state = next;
    }
}

/// Runs programs in fresh, isolated contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxExecutor {
    seed: u64,
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxExecutor {
    /// Seed used by `Math.random` unless overridden.
    pub const DEFAULT_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

    /// Executor with the default `Math.random` seed.
    pub fn new() -> Self {
        Self {
            seed: Self::DEFAULT_SEED,
        }
    }

    /// Executor whose contexts seed `Math.random` with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Run `program` under `limits`.
    ///
    /// Never panics and always returns after at most the timeout plus
    /// [`INTERRUPT_GRACE`]. A worker still busy after the grace period is
    /// detached; it stops at its next interrupt poll.
    pub fn execute(&self, program: &Program, limits: &ExecutionLimits) -> ExecutionResult {
        let started = Instant::now();
        let mut lifecycle = Lifecycle {
            state: ExecutionState::Created,
        };
        let sink = OutputSink::new(limits.max_output_lines, limits.max_output_bytes);
        let interrupt = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();

        let worker_program = program.clone();
        let worker_limits = limits.clone();
        let worker_sink = sink.clone();
        let worker_interrupt = Arc::clone(&interrupt);
        let seed = self.seed;
        let spawned = thread::Builder::new()
            .name("jsbox-sandbox".into())
            .stack_size(limits.stack_size)
            .spawn(move || {
                let outcome = interpreter::run(
                    &worker_program,
                    &worker_limits,
                    seed,
                    worker_sink,
                    worker_interrupt,
                );
                let _ = sender.send(outcome);
            });

        let outcome = match spawned {
            Err(err) => {
                tracing::warn!(error = %err, "failed to spawn sandbox worker");
                Outcome::Fault
            }
            Ok(handle) => {
                lifecycle.advance(ExecutionState::Running);
                let (outcome, stopped) = match receiver.recv_timeout(limits.timeout) {
                    Ok(WorkerOutcome::Completed) => (Outcome::Completed, true),
                    Ok(WorkerOutcome::Exhausted) => (Outcome::Exhausted, true),
                    Ok(WorkerOutcome::Interrupted) => (Outcome::TimedOut, true),
                    Err(RecvTimeoutError::Timeout) => {
                        sink.seal();
                        interrupt.store(true, Ordering::SeqCst);
                        let stopped = !matches!(
                            receiver.recv_timeout(INTERRUPT_GRACE),
                            Err(RecvTimeoutError::Timeout)
                        );
                        (Outcome::TimedOut, stopped)
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::warn!("sandbox worker panicked");
                        (Outcome::Fault, true)
                    }
                };
                if stopped {
                    let _ = handle.join();
                } else {
                    tracing::warn!("sandbox worker ignored the interrupt; detaching it");
                }
                outcome
            }
        };

        let (state, error) = match outcome {
            Outcome::Completed => (ExecutionState::Completed, None),
            Outcome::TimedOut => (
                ExecutionState::TimedOut,
                Some(timeout_message(limits.timeout)),
            ),
            Outcome::Exhausted => (
                ExecutionState::Faulted,
                Some(RESOURCE_LIMIT_MESSAGE.to_string()),
            ),
            Outcome::Fault => (
                ExecutionState::Faulted,
                Some(SANDBOX_FAULT_MESSAGE.to_string()),
            ),
        };
        lifecycle.advance(state);
        let logs = sink.drain();
        lifecycle.advance(ExecutionState::Finalized);

        ExecutionResult {
            success: error.is_none(),
            logs,
            error,
            state,
            elapsed: started.elapsed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    TimedOut,
    Exhausted,
    Fault,
}

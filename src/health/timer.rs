//! Per-operation deadlines.
//!
//! A [`Deadline`] is a plain value owned by one stage. Work wrapped by
//! [`timed`] receives it and arms every blocking call with
//! [`Deadline::remaining`], so an expired stage returns promptly without any
//! process-wide timer.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::health::error::CheckError;
use crate::health::types::Stage;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    stage: Stage,
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn start(stage: Stage, limit: Option<Duration>) -> Self {
        Self {
            stage,
            started: Instant::now(),
            limit: limit.filter(|limit| !limit.is_zero()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.elapsed() >= limit)
    }

    /// Time left before the deadline, `None` when the stage is unbounded.
    /// Never returns a zero duration: an exhausted deadline is reported as
    /// the stage's timeout instead.
    pub fn remaining(&self) -> Result<Option<Duration>, CheckError> {
        match self.limit {
            None => Ok(None),
            Some(limit) => match limit.checked_sub(self.elapsed()) {
                Some(left) if !left.is_zero() => Ok(Some(left)),
                _ => Err(self.timeout()),
            },
        }
    }

    pub fn timeout(&self) -> CheckError {
        CheckError::Timeout { stage: self.stage }
    }

    /// Runs blocking `work` that cannot be armed with a socket timeout and
    /// waits for it at most until the deadline.
    ///
    /// Bounded work runs on its own thread; on expiry the thread is left to
    /// finish in the background and its result is dropped. Unbounded work
    /// runs inline.
    pub fn wait_for<T, F>(&self, work: F) -> Result<T, CheckError>
    where
        F: FnOnce() -> Result<T, CheckError> + Send + 'static,
        T: Send + 'static,
    {
        let Some(left) = self.remaining()? else {
            return work();
        };
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("{}-worker", self.stage))
            .spawn(move || {
                let _ = tx.send(work());
            })
            .map_err(CheckError::io)?;
        match rx.recv_timeout(left) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(stage = %self.stage, "abandoning work past deadline");
                Err(self.timeout())
            }
            Err(RecvTimeoutError::Disconnected) => Err(CheckError::io(io::Error::other(
                "worker exited without a result",
            ))),
        }
    }
}

/// Output of a completed [`timed`] call.
#[derive(Debug)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Runs `work` under a fresh deadline for `stage`.
///
/// Work that overruns the deadline fails with the stage's timeout even if it
/// eventually succeeded.
pub fn timed<T, F>(stage: Stage, limit: Option<Duration>, work: F) -> Result<Timed<T>, CheckError>
where
    F: FnOnce(&Deadline) -> Result<T, CheckError>,
{
    let deadline = Deadline::start(stage, limit);
    tracing::debug!(%stage, limit = ?deadline.limit(), "stage started");
    let value = work(&deadline)?;
    let elapsed = deadline.elapsed();
    if deadline.limit().is_some_and(|limit| elapsed > limit) {
        return Err(deadline.timeout());
    }
    tracing::debug!(%stage, elapsed = elapsed.as_secs_f64(), "stage finished");
    Ok(Timed { value, elapsed })
}

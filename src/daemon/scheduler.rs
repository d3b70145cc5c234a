//! Fixed-interval job scheduler.
//!
//! Jobs are registered before the loop starts and run back-to-back, in
//! registration order, on every tick. The loop is strictly sequential: a tick
//! finishes (including its logging) before the pacer is asked to wait for the
//! next one. Any job error, or a panic inside a job, ends the loop with
//! [`SraError::FatalJob`]; the entrypoint turns that into a distinct exit status.

#![allow(missing_docs)]

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::core::errors::{JobError, Result, SraError};

type JobBody<'a> = Box<dyn FnMut() -> std::result::Result<(), JobError> + 'a>;

/// A named unit of work. The name is used only for logging.
pub struct Job<'a> {
    name: String,
    body: JobBody<'a>,
}

impl<'a> Job<'a> {
    pub fn new(
        name: impl Into<String>,
        body: impl FnMut() -> std::result::Result<(), JobError> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Whether the loop should carry on after a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Continue,
    Stop,
}

/// Waits between ticks.
pub trait Pacer {
    fn wait(&mut self, interval: Duration) -> Pace;
}

/// Sleeps for the interval unless a shutdown message arrives first.
///
/// Shutdown is only observed here, between ticks; a running job is never
/// interrupted.
#[derive(Debug)]
pub struct ShutdownPacer {
    shutdown: Receiver<()>,
}

impl ShutdownPacer {
    #[must_use]
    pub const fn new(shutdown: Receiver<()>) -> Self {
        Self { shutdown }
    }
}

impl Pacer for ShutdownPacer {
    fn wait(&mut self, interval: Duration) -> Pace {
        match self.shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => Pace::Continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Pace::Stop,
        }
    }
}

/// Ordered job registry plus the tick loop.
pub struct Scheduler<'a> {
    jobs: Vec<Job<'a>>,
    interval: Duration,
    ticks: u64,
}

impl<'a> Scheduler<'a> {
    /// A zero interval is invalid configuration.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SraError::InvalidConfig {
                details: "scheduler interval must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            jobs: Vec::new(),
            interval,
            ticks: 0,
        })
    }

    /// Append a job. Insertion order is execution order.
    pub fn register(&mut self, job: Job<'a>) {
        tracing::info!(job = job.name(), "job scheduled");
        self.jobs.push(job);
    }

    #[must_use]
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(Job::name).collect()
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed ticks so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run every registered job once, in order.
    pub fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        let tick = self.ticks;
        for job in &mut self.jobs {
            let started = Instant::now();
            tracing::info!(job = job.name.as_str(), tick, "job starting");
            match run_guarded(&mut job.body) {
                Ok(()) => {
                    tracing::info!(
                        job = job.name.as_str(),
                        tick,
                        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "job finished"
                    );
                }
                Err(source) => {
                    tracing::error!(job = job.name.as_str(), tick, error = %source, "job failed");
                    return Err(SraError::FatalJob {
                        job: job.name.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Loop forever: tick, then wait. Returns `Ok` only when the pacer asks
    /// to stop; a job failure returns the fatal error.
    pub fn run(&mut self, pacer: &mut dyn Pacer) -> Result<()> {
        tracing::info!(
            jobs = self.jobs.len(),
            interval_secs = self.interval.as_secs(),
            "scheduler started"
        );
        loop {
            self.tick()?;
            tracing::debug!(interval_secs = self.interval.as_secs(), "waiting for next tick");
            if pacer.wait(self.interval) == Pace::Stop {
                tracing::info!(ticks = self.ticks, "scheduler stopping");
                return Ok(());
            }
        }
    }
}

fn run_guarded(body: &mut JobBody<'_>) -> std::result::Result<(), JobError> {
    match panic::catch_unwind(AssertUnwindSafe(|| body())) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(JobError::Panicked { message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records waits and stops after a fixed number of them.
    struct CountingPacer<'e> {
        remaining: usize,
        events: &'e RefCell<Vec<String>>,
    }

    impl Pacer for CountingPacer<'_> {
        fn wait(&mut self, interval: Duration) -> Pace {
            self.events
                .borrow_mut()
                .push(format!("sleep {}", interval.as_secs()));
            if self.remaining <= 1 {
                return Pace::Stop;
            }
            self.remaining -= 1;
            Pace::Continue
        }
    }

    fn recording_job<'e>(name: &'static str, events: &'e RefCell<Vec<String>>) -> Job<'e> {
        Job::new(name, move || {
            events.borrow_mut().push(name.to_string());
            Ok(())
        })
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Scheduler::new(Duration::ZERO).is_err());
    }

    #[test]
    fn runs_jobs_in_order_once_per_tick_then_sleeps() {
        let events = RefCell::new(Vec::new());
        let mut scheduler = Scheduler::new(Duration::from_secs(30)).expect("valid");
        scheduler.register(recording_job("first", &events));
        scheduler.register(recording_job("second", &events));
        scheduler.register(recording_job("third", &events));
        assert_eq!(scheduler.job_names(), ["first", "second", "third"]);

        let mut pacer = CountingPacer {
            remaining: 2,
            events: &events,
        };
        scheduler.run(&mut pacer).expect("clean stop");

        assert_eq!(
            *events.borrow(),
            [
                "first", "second", "third", "sleep 30", "first", "second", "third", "sleep 30",
            ]
        );
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn failing_job_is_fatal_and_skips_the_rest() {
        let events = RefCell::new(Vec::new());
        let mut scheduler = Scheduler::new(Duration::from_secs(1)).expect("valid");
        scheduler.register(recording_job("before", &events));
        scheduler.register(Job::new("broken", || {
            Err(JobError::Failed {
                details: "state is corrupt".to_string(),
            })
        }));
        scheduler.register(recording_job("after", &events));

        let mut pacer = CountingPacer {
            remaining: 5,
            events: &events,
        };
        let err = scheduler.run(&mut pacer).expect_err("fatal");
        assert_eq!(err.exit_code(), crate::core::errors::exit_status::FATAL_JOB);
        assert!(matches!(err, SraError::FatalJob { ref job, .. } if job == "broken"));
        assert_eq!(*events.borrow(), ["before"]);
    }

    #[test]
    fn panicking_job_becomes_fatal_error() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1)).expect("valid");
        scheduler.register(Job::new("explodes", || panic!("index out of range")));
        let err = scheduler.tick().expect_err("fatal");
        match err {
            SraError::FatalJob {
                source: JobError::Panicked { message },
                ..
            } => assert!(message.contains("index out of range")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn job_state_survives_between_ticks() {
        let mut count = 0u32;
        {
            let mut scheduler = Scheduler::new(Duration::from_secs(1)).expect("valid");
            scheduler.register(Job::new("counter", || {
                count += 1;
                Ok(())
            }));
            scheduler.tick().expect("tick");
            scheduler.tick().expect("tick");
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn shutdown_pacer_stops_on_message_or_disconnect() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut pacer = ShutdownPacer::new(rx);
        assert_eq!(pacer.wait(Duration::from_millis(10)), Pace::Continue);
        tx.send(()).expect("send");
        assert_eq!(pacer.wait(Duration::from_secs(5)), Pace::Stop);
        drop(tx);
        assert_eq!(pacer.wait(Duration::from_secs(5)), Pace::Stop);
    }
}

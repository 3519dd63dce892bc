//! Job queue
//!
//! A FIFO of pending jobs (promise reactions, thenable resolution, queued
//! callbacks and host jobs). Each job remembers the realm it was enqueued in
//! and runs to completion before the next one is dequeued. The queue also
//! keeps execution statistics and the list of rejected promises that nobody
//! has handled yet.

use crate::error::{Error, Result};
use crate::promise::reaction::{self, PromiseReaction};
use crate::promise::state;
use crate::runtime::{RealmId, Runtime, Value};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Work carried by a job
pub enum JobKind {
    /// Run a promise reaction with the settled value
    PromiseReaction {
        reaction: PromiseReaction,
        argument: Value,
    },
    /// Call `then` on a thenable with fresh resolving functions for `promise`
    PromiseResolveThenable {
        promise: Value,
        thenable: Value,
        then: Value,
    },
    /// Call a function value with arguments (queueMicrotask)
    Callback { callback: Value, args: Vec<Value> },
    /// Host-defined job
    Host(Box<dyn FnOnce(&mut Runtime) -> Result<()>>),
}

impl JobKind {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::PromiseReaction { .. } => "PromiseReactionJob",
            JobKind::PromiseResolveThenable { .. } => "PromiseResolveThenableJob",
            JobKind::Callback { .. } => "CallbackJob",
            JobKind::Host(_) => "HostJob",
        }
    }

    pub(crate) fn run(self, rt: &mut Runtime) -> Result<()> {
        match self {
            JobKind::PromiseReaction { reaction, argument } => {
                reaction::promise_reaction_job(rt, reaction, argument)
            }
            JobKind::PromiseResolveThenable {
                promise,
                thenable,
                then,
            } => state::promise_resolve_thenable_job(rt, &promise, &thenable, &then),
            JobKind::Callback { callback, args } => {
                rt.call(&callback, &Value::Undefined, &args)?;
                Ok(())
            }
            JobKind::Host(job) => job(rt),
        }
    }
}

impl fmt::Debug for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of work plus the realm it runs in
#[derive(Debug)]
pub struct Job {
    pub realm: RealmId,
    pub kind: JobKind,
}

impl Job {
    pub fn new(realm: RealmId, kind: JobKind) -> Self {
        Self { realm, kind }
    }
}

/// Operation reported to the host promise rejection tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionOperation {
    /// A promise was rejected while it had no handlers
    Reject,
    /// A handler was attached to an already rejected, unhandled promise
    Handle,
    /// A resolve function was called after the promise was already resolved
    ResolveAfterResolved,
    /// A reject function was called after the promise was already resolved
    RejectAfterResolved,
}

/// A rejected promise with no handler attached
#[derive(Debug, Clone)]
pub struct UnhandledRejection {
    pub promise: Value,
    pub reason: Value,
}

/// Runtime statistics for the job queue
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLoopStats {
    /// Total jobs enqueued
    pub jobs_enqueued: u64,
    /// Total jobs run
    pub jobs_run: u64,
    /// Jobs that completed abruptly
    pub jobs_failed: u64,
    /// Total microtask checkpoints performed
    pub checkpoints: u64,
    /// Maximum jobs drained in a single checkpoint
    pub max_jobs_per_checkpoint: u64,
    /// Total promises created
    pub promises_created: u64,
    /// Total promises settled (fulfilled or rejected)
    pub promises_settled: u64,
    /// Promises rejected without a handler
    pub unhandled_rejections: u64,
}

/// Outcome of a microtask checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointResult {
    /// Jobs executed during the checkpoint
    pub jobs_run: usize,
    /// Jobs still queued because the budget ran out
    pub jobs_remaining: usize,
}

/// The job queue
#[derive(Default)]
pub struct EventLoop {
    /// Pending jobs, oldest first
    queue: VecDeque<Job>,
    /// Rejected promises without handlers, in rejection order
    unhandled_rejections: Vec<UnhandledRejection>,
    /// Errors thrown by callback and host jobs
    job_errors: Vec<Error>,
    /// Statistics
    stats: EventLoopStats,
}

impl EventLoop {
    /// Create an empty job queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job
    pub fn enqueue(&mut self, job: Job) {
        self.stats.jobs_enqueued += 1;
        self.queue.push_back(job);
    }

    /// Take the oldest job
    pub fn dequeue(&mut self) -> Option<Job> {
        self.queue.pop_front()
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn record_job_run(&mut self) {
        self.stats.jobs_run += 1;
    }

    pub(crate) fn record_job_error(&mut self, error: Error) {
        self.stats.jobs_failed += 1;
        self.job_errors.push(error);
    }

    pub(crate) fn record_checkpoint(&mut self, jobs_run: usize) {
        self.stats.checkpoints += 1;
        self.stats.max_jobs_per_checkpoint = self.stats.max_jobs_per_checkpoint.max(jobs_run as u64);
    }

    pub(crate) fn record_promise_created(&mut self) {
        self.stats.promises_created += 1;
    }

    pub(crate) fn record_promise_settled(&mut self) {
        self.stats.promises_settled += 1;
    }

    /// Remember a rejection that has no handler yet
    pub fn track_unhandled_rejection(&mut self, promise: Value, reason: Value) {
        self.stats.unhandled_rejections += 1;
        self.unhandled_rejections
            .push(UnhandledRejection { promise, reason });
    }

    /// Forget a tracked rejection once a handler is attached
    pub fn untrack_rejection(&mut self, promise: &Value) {
        self.unhandled_rejections
            .retain(|entry| !entry.promise.strict_equals(promise));
    }

    /// Number of tracked unhandled rejections
    pub fn unhandled_rejection_count(&self) -> usize {
        self.unhandled_rejections.len()
    }

    /// Take all tracked unhandled rejections
    pub fn drain_unhandled_rejections(&mut self) -> Vec<UnhandledRejection> {
        std::mem::take(&mut self.unhandled_rejections)
    }

    /// Take all errors thrown by callback and host jobs
    pub fn drain_job_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.job_errors)
    }

    /// Get a snapshot of the statistics
    pub fn stats(&self) -> EventLoopStats {
        self.stats.clone()
    }

    /// Reset statistics counters
    pub fn reset_stats(&mut self) {
        self.stats = EventLoopStats::default();
    }
}

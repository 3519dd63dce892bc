//! Runtime
//!
//! The [`Runtime`] owns the realms, the job queue, the configuration and the
//! host rejection tracker. Everything else in the crate is written as free
//! functions over `&mut Runtime`, in the style of the abstract operations they
//! implement.

pub mod closure;
pub mod config;
mod operations;
pub mod realm;
pub mod value;

pub use closure::BuiltinClosure;
pub(crate) use operations::describe;
pub use config::RuntimeConfig;
pub use realm::{Intrinsics, Realm, RealmId};
pub use value::{
    NativeConstructFn, NativeFn, Object, ObjectKind, ObjectRef, PropertyKey, Value,
    WellKnownSymbol,
};

use crate::error::{Error, ErrorKind, Result};
use crate::event_loop::{
    CheckpointResult, EventLoop, EventLoopStats, Job, JobKind, RejectionOperation,
    UnhandledRejection,
};
use crate::promise::state;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Argument at `index`, or undefined when absent
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Host hook invoked for every rejection tracker operation
pub type RejectionTracker = Box<dyn FnMut(&Value, RejectionOperation)>;

/// The promise and iteration runtime
pub struct Runtime {
    /// All realms, indexed by [`RealmId`]
    realms: Vec<Realm>,
    /// Realm of the running execution context
    current_realm: RealmId,
    /// Pending jobs and loop bookkeeping
    event_loop: EventLoop,
    /// Tunables
    config: RuntimeConfig,
    /// Optional host rejection tracker
    rejection_tracker: Option<RejectionTracker>,
}

impl Runtime {
    /// Create a runtime with the default configuration and one realm
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with a custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let realm = Realm::new(RealmId::new(0));
        debug!(?config, "runtime created");
        Self {
            realms: vec![realm],
            current_realm: RealmId::new(0),
            event_loop: EventLoop::new(),
            config,
            rejection_tracker: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ========================================================================
    // Realms
    // ========================================================================

    /// Create an additional realm with its own intrinsics
    pub fn create_realm(&mut self) -> RealmId {
        let id = RealmId::new(self.realms.len());
        self.realms.push(Realm::new(id));
        debug!(realm = %id, "realm created");
        id
    }

    /// Get a realm
    pub fn realm(&self, id: RealmId) -> &Realm {
        &self.realms[id.index()]
    }

    /// Realm of the running execution context
    pub fn current_realm(&self) -> RealmId {
        self.current_realm
    }

    /// Switch the running realm, returning the previous one
    pub fn enter_realm(&mut self, id: RealmId) -> RealmId {
        std::mem::replace(&mut self.current_realm, id)
    }

    /// Intrinsics of the current realm
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.realm(self.current_realm).intrinsics
    }

    /// Global object of the current realm
    pub fn global_object(&self) -> Value {
        Value::Object(self.realm(self.current_realm).global.clone())
    }

    /// `%Promise%` of the current realm
    pub fn promise_constructor(&self) -> Value {
        Value::Object(self.intrinsics().promise_constructor.clone())
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Enqueue a job to run in `realm`
    pub fn enqueue_job(&mut self, realm: RealmId, kind: JobKind) {
        trace!(job = kind.name(), realm = %realm, "job enqueued");
        self.event_loop.enqueue(Job::new(realm, kind));
    }

    /// Queue a callback to be called with `args` (queueMicrotask)
    pub fn queue_microtask(&mut self, callback: Value, args: Vec<Value>) -> Result<()> {
        if !callback.is_callable() {
            return Err(Error::type_error(crate::error::messages::not_a_function(
                &describe(&callback),
            )));
        }
        let realm = self.get_function_realm(&callback);
        self.enqueue_job(realm, JobKind::Callback { callback, args });
        Ok(())
    }

    /// Queue a host job in the current realm
    pub fn enqueue_host_job<F>(&mut self, job: F)
    where
        F: FnOnce(&mut Runtime) -> Result<()> + 'static,
    {
        let realm = self.current_realm;
        self.enqueue_job(realm, JobKind::Host(Box::new(job)));
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.event_loop.pending_jobs()
    }

    /// Run the oldest job, returning false when the queue is empty
    pub fn run_one_job(&mut self) -> bool {
        let Some(job) = self.event_loop.dequeue() else {
            return false;
        };
        let name = job.kind.name();
        let previous = self.enter_realm(job.realm);
        trace!(job = name, realm = %job.realm, "running job");
        if let Err(error) = job.kind.run(self) {
            warn!(job = name, %error, "job completed abruptly");
            self.event_loop.record_job_error(error);
        }
        self.current_realm = previous;
        self.event_loop.record_job_run();
        true
    }

    /// Run jobs until the queue is empty, including jobs enqueued meanwhile
    pub fn run_jobs(&mut self) -> usize {
        let mut jobs_run = 0;
        while self.run_one_job() {
            jobs_run += 1;
        }
        self.event_loop.record_checkpoint(jobs_run);
        debug!(jobs_run, "job queue drained");
        self.report_unhandled_rejections();
        jobs_run
    }

    /// Run jobs until the queue is empty or the configured budget is spent
    pub fn run_microtask_checkpoint(&mut self) -> CheckpointResult {
        let budget = self.config.max_jobs_per_checkpoint.max(1);
        let mut jobs_run = 0;
        while jobs_run < budget && self.run_one_job() {
            jobs_run += 1;
        }
        let jobs_remaining = self.event_loop.pending_jobs();
        if jobs_remaining > 0 {
            warn!(budget, jobs_remaining, "microtask checkpoint budget exhausted");
        }
        self.event_loop.record_checkpoint(jobs_run);
        if jobs_remaining == 0 {
            self.report_unhandled_rejections();
        }
        CheckpointResult {
            jobs_run,
            jobs_remaining,
        }
    }

    /// Get job queue statistics
    pub fn stats(&self) -> EventLoopStats {
        self.event_loop.stats()
    }

    /// Reset job queue statistics
    pub fn reset_stats(&mut self) {
        self.event_loop.reset_stats();
    }

    fn report_unhandled_rejections(&self) {
        let count = self.event_loop.unhandled_rejection_count();
        if count > 0 {
            warn!(count, "rejected promises without a handler");
        }
    }

    pub(crate) fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    /// Take the errors thrown by callback and host jobs
    pub fn take_job_errors(&mut self) -> Vec<Error> {
        self.event_loop.drain_job_errors()
    }

    // ========================================================================
    // Rejection tracking
    // ========================================================================

    /// Install a host promise rejection tracker
    pub fn set_rejection_tracker<F>(&mut self, tracker: F)
    where
        F: FnMut(&Value, RejectionOperation) + 'static,
    {
        self.rejection_tracker = Some(Box::new(tracker));
    }

    /// Take the rejected promises that still have no handler
    pub fn take_unhandled_rejections(&mut self) -> Vec<UnhandledRejection> {
        self.event_loop.drain_unhandled_rejections()
    }

    /// HostPromiseRejectionTracker
    pub(crate) fn host_promise_rejection_tracker(
        &mut self,
        promise: &Value,
        operation: RejectionOperation,
    ) {
        debug!(?operation, "promise rejection tracker");
        if self.config.track_unhandled_rejections {
            match operation {
                RejectionOperation::Reject => {
                    let reason = state::promise_result(promise).unwrap_or_default();
                    self.event_loop
                        .track_unhandled_rejection(promise.clone(), reason);
                }
                RejectionOperation::Handle => self.event_loop.untrack_rejection(promise),
                RejectionOperation::ResolveAfterResolved
                | RejectionOperation::RejectAfterResolved => {}
            }
        }
        if let Some(tracker) = self.rejection_tracker.as_mut() {
            tracker(promise, operation);
        }
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate an object with the given internal slots and prototype
    pub fn alloc(&mut self, kind: ObjectKind, prototype: Option<ObjectRef>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::with_kind(kind, prototype))))
    }

    /// Create an ordinary object inheriting from `%Object.prototype%`
    pub fn new_object(&mut self) -> Value {
        let proto = self.intrinsics().object_prototype.clone();
        self.alloc(ObjectKind::Ordinary, Some(proto))
    }

    /// Create an array from a list of values (CreateArrayFromList)
    pub fn new_array(&mut self, values: Vec<Value>) -> Value {
        let proto = self.intrinsics().array_prototype.clone();
        self.alloc(ObjectKind::Array(values), Some(proto))
    }

    /// Create a native function in the current realm
    pub fn new_function<F>(&mut self, name: &str, func: F) -> Value
    where
        F: Fn(&mut Runtime, &Value, &[Value]) -> Result<Value> + 'static,
    {
        let proto = self.intrinsics().function_prototype.clone();
        Value::Object(realm::native_function(
            &proto,
            self.current_realm,
            name,
            Rc::new(func),
            None,
        ))
    }

    /// Create a constructible native function in the current realm
    ///
    /// `construct` receives the arguments and `new.target`. A fresh
    /// `prototype` object is attached, with `constructor` pointing back.
    pub fn new_constructor<F, C>(&mut self, name: &str, call: F, construct: C) -> Value
    where
        F: Fn(&mut Runtime, &Value, &[Value]) -> Result<Value> + 'static,
        C: Fn(&mut Runtime, &[Value], &Value) -> Result<Value> + 'static,
    {
        let proto = self.intrinsics().function_prototype.clone();
        let function = realm::native_function(
            &proto,
            self.current_realm,
            name,
            Rc::new(call),
            Some(Rc::new(construct)),
        );
        let prototype = self.new_object();
        if let Value::Object(obj) = &prototype {
            obj.borrow_mut().set_property(
                PropertyKey::from("constructor"),
                Value::Object(function.clone()),
            );
        }
        function
            .borrow_mut()
            .set_property(PropertyKey::from("prototype"), prototype);
        Value::Object(function)
    }

    /// Create a built-in closure function object in the current realm
    pub fn new_closure(&mut self, closure: BuiltinClosure) -> Value {
        let proto = self.intrinsics().function_prototype.clone();
        let realm = self.current_realm;
        self.alloc(ObjectKind::Closure { closure, realm }, Some(proto))
    }

    /// Create an error object of the given kind
    pub fn new_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self.intrinsics().error_prototype.clone();
        let mut object = Object::with_kind(
            ObjectKind::Error {
                kind,
                message: message.to_string(),
            },
            Some(proto),
        );
        object.set_property(PropertyKey::from("name"), Value::from(kind.name()));
        object.set_property(PropertyKey::from("message"), Value::from(message));
        Value::from_object(object)
    }

    /// Create an AggregateError carrying `errors`
    pub fn create_aggregate_error(&mut self, errors: Vec<Value>, message: &str) -> Value {
        let error = self.new_error(ErrorKind::AggregateError, message);
        let errors = self.new_array(errors);
        if let Value::Object(obj) = &error {
            obj.borrow_mut()
                .set_property(PropertyKey::from("errors"), errors);
        }
        error
    }

    /// Materialize an error as a language value (a rejection reason)
    ///
    /// Thrown values pass through unchanged; engine errors become error
    /// objects of the current realm.
    pub fn error_to_value(&mut self, error: Error) -> Value {
        match error {
            Error::Throw(value) => value,
            Error::RuntimeError { kind, message } => self.new_error(kind, &message),
            Error::InternalError(message) => self.new_error(ErrorKind::InternalError, &message),
            Error::ConfigError(message) => self.new_error(ErrorKind::GenericError, &message),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

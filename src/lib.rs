//! Settle: the promise and async-iteration core of a JavaScript runtime
//!
//! Settle implements the parts of an ECMAScript engine that decide *when*
//! asynchronous code runs: promise capabilities and the promise state
//! machine, the job queue that delivers reactions, the `Promise` combinators,
//! and the iteration protocols built on top of them (iterator close, the
//! async-from-sync adapter, async iterator helpers and wrappers).
//!
//! There is no parser or interpreter here. Callables are host closures or
//! built-in continuations, and objects are plain property bags with a few
//! internal-slot kinds.
//!
//! # Quick Start
//!
//! ```
//! use settle::{promise, Runtime, Value};
//!
//! fn main() -> settle::Result<()> {
//!     let mut rt = Runtime::new();
//!     let capability = promise::new_promise_capability(&mut rt, None)?;
//!     let on_fulfilled = rt.new_function("log", |_, _, args| {
//!         println!("settled with {}", settle::runtime::arg(args, 0));
//!         Ok(Value::Undefined)
//!     });
//!     promise::promise_then(&mut rt, &capability.promise, on_fulfilled, Value::Undefined)?;
//!     capability.resolve(&mut rt, Value::from(42))?;
//!
//!     // Nothing has run yet: reactions are jobs.
//!     rt.run_jobs();
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`runtime`] | values, objects, realms, configuration and abstract operations |
//! | [`event_loop`] | jobs, the FIFO queue, statistics, rejection tracking records |
//! | [`promise`] | state machine, capabilities, reactions, combinators, `Promise` built-ins |
//! | [`iteration`] | iterator records, close protocol, async adapters and helpers |
// Clippy configuration.
//
// - type_complexity: continuation closures carry Rc<RefCell<..>> state
// - new_without_default: capability and record types have no meaningful default
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]

pub mod error;
pub mod event_loop;
pub mod iteration;
pub mod promise;
pub mod runtime;

pub use error::{Error, ErrorKind, Result};
pub use event_loop::{CheckpointResult, EventLoopStats, RejectionOperation, UnhandledRejection};
pub use iteration::{IteratorKind, IteratorRecord};
pub use promise::{PromiseCapability, PromiseState};
pub use runtime::{ObjectKind, RealmId, Runtime, RuntimeConfig, Value};

/// Settle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

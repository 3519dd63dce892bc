//! Promise reactions and PerformPromiseThen

use crate::error::{messages, Error, Result};
use crate::event_loop::{JobKind, RejectionOperation};
use crate::promise::capability::PromiseCapability;
use crate::promise::state::{with_promise_data_mut, PromiseState};
use crate::runtime::{describe, Runtime, Value};
use tracing::debug;

/// Type of promise reaction
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseReactionType {
    Fulfill,
    Reject,
}

/// Handler of a reaction
#[derive(Clone, Debug)]
pub enum ReactionHandler {
    /// A function value to call with the settled value
    Callable(Value),
    /// No handler: pass the value through (fulfill) or rethrow it (reject)
    Empty,
}

impl ReactionHandler {
    fn from_value(value: &Value) -> Self {
        if value.is_callable() {
            ReactionHandler::Callable(value.clone())
        } else {
            ReactionHandler::Empty
        }
    }
}

/// A Promise reaction (then/catch/finally callback)
#[derive(Clone, Debug)]
pub struct PromiseReaction {
    /// Capability to settle with the handler's outcome, if any
    pub capability: Option<PromiseCapability>,
    /// Type of reaction
    pub reaction_type: PromiseReactionType,
    /// The handler to run
    pub handler: ReactionHandler,
}

/// Enqueue a PromiseReactionJob in the realm of its handler
pub(crate) fn enqueue_reaction_job(rt: &mut Runtime, reaction: PromiseReaction, argument: Value) {
    let realm = match &reaction.handler {
        ReactionHandler::Callable(handler) => rt.get_function_realm(handler),
        ReactionHandler::Empty => rt.current_realm(),
    };
    rt.enqueue_job(realm, JobKind::PromiseReaction { reaction, argument });
}

/// PerformPromiseThen
///
/// Registers the handlers on `promise` (or schedules them right away if it
/// is already settled) and returns the capability's promise, or undefined
/// when no capability was supplied. Non-callable handlers act as identity
/// (fulfillment) and thrower (rejection).
pub fn perform_promise_then(
    rt: &mut Runtime,
    promise: &Value,
    on_fulfilled: &Value,
    on_rejected: &Value,
    result_capability: Option<PromiseCapability>,
) -> Result<Value> {
    let result = result_capability
        .as_ref()
        .map(|capability| capability.promise.clone())
        .unwrap_or_default();
    let fulfill_reaction = PromiseReaction {
        capability: result_capability.clone(),
        reaction_type: PromiseReactionType::Fulfill,
        handler: ReactionHandler::from_value(on_fulfilled),
    };
    let reject_reaction = PromiseReaction {
        capability: result_capability,
        reaction_type: PromiseReactionType::Reject,
        handler: ReactionHandler::from_value(on_rejected),
    };

    let settled = with_promise_data_mut(promise, |data| {
        let was_handled = data.is_handled;
        data.is_handled = true;
        match data.state {
            PromiseState::Pending => {
                data.fulfill_reactions.push(fulfill_reaction);
                data.reject_reactions.push(reject_reaction);
                None
            }
            PromiseState::Fulfilled => Some((fulfill_reaction, data.result.clone(), true)),
            PromiseState::Rejected => Some((reject_reaction, data.result.clone(), was_handled)),
        }
    });

    match settled {
        None => {
            return Err(Error::type_error(messages::incompatible_receiver(
                "PerformPromiseThen",
                &describe(promise),
            )))
        }
        Some(None) => {}
        Some(Some((reaction, argument, was_handled))) => {
            if !was_handled {
                rt.host_promise_rejection_tracker(promise, RejectionOperation::Handle);
            }
            enqueue_reaction_job(rt, reaction, argument);
        }
    }
    Ok(result)
}

/// PromiseReactionJob
pub(crate) fn promise_reaction_job(
    rt: &mut Runtime,
    reaction: PromiseReaction,
    argument: Value,
) -> Result<()> {
    let handler_result = match &reaction.handler {
        ReactionHandler::Empty => match reaction.reaction_type {
            PromiseReactionType::Fulfill => Ok(argument),
            PromiseReactionType::Reject => Err(Error::Throw(argument)),
        },
        ReactionHandler::Callable(handler) => rt.call(handler, &Value::Undefined, &[argument]),
    };
    let Some(capability) = reaction.capability else {
        if let Err(error) = handler_result {
            debug!(%error, "reaction without capability completed abruptly");
        }
        return Ok(());
    };
    match handler_result {
        Ok(value) => capability.resolve(rt, value),
        Err(error) => {
            let reason = rt.error_to_value(error);
            capability.reject(rt, reason)
        }
    }
}

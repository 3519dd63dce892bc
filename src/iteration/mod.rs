//! Iteration protocols
//!
//! Iterator records and the close protocol, the built-in list iterator, and
//! the async side: async close, the async-from-sync adapter, async iterator
//! helpers and the wrap-for-async-iterator adapters.

pub mod async_close;
pub mod async_from_sync;
pub mod helper;
pub mod list_iterator;
pub mod record;
pub mod wrap;

pub use async_close::{async_iterator_close, CloseCompletion};
pub use async_from_sync::create_async_from_sync_iterator;
pub use helper::{
    async_iterator_drop, async_iterator_filter, async_iterator_map, async_iterator_take,
    create_async_iterator_helper, get_iterator_direct, AsyncIteratorHelperState, HelperKind,
};
pub use list_iterator::{create_list_iterator, create_list_iterator_record};
pub use record::{
    close_with_error, create_iter_result_object, get_iterator, get_iterator_from_method,
    iterator_close, iterator_complete, iterator_next, iterator_step, iterator_step_value,
    iterator_to_list, iterator_value, IteratorKind, IteratorRecord,
};
pub use wrap::{async_iterator_from, create_wrap_for_async_iterator};

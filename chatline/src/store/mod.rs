//! Client-side state for the chat list and the message feed.
//!
//! Both stores are cheap handles over shared state. The lock is never held
//! across an await; async results are applied only if their generation is
//! still current.

mod chat_list;
mod feed;

pub use chat_list::ChatList;
pub use feed::{LoadOutcome, MessageFeed, SendPath};

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

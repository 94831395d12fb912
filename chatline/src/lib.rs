//! Realtime sync core of a session-authenticated chat client.

pub mod api;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;
pub mod realtime;
pub mod search;
pub mod session;
pub mod store;
pub mod sync;

pub use error::{Error, Result};

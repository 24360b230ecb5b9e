//! Core of songq: the channel-log cursor, the per-day request accumulator,
//! the now-playing extraction and the queue matcher.
//!
//! Everything here is transport-agnostic. The daemon supplies the HTTP log
//! client, the timer and the render target.

pub mod chat;
pub mod config;
pub mod cursor;
pub mod day_key;
pub mod error;
pub mod matcher;
pub mod platform;
pub mod state;
pub mod store;
pub mod view;

pub use error::{Error, Result};

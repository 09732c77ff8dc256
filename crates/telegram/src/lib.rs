//! Telegram front end for the subscription gate.
//!
//! Uses teloxide to receive messages, confirm callbacks, and join-request
//! events, polls channel membership on demand, and delivers catalog media
//! to users who pass the gate.

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod oracle;
pub mod reconciler;
pub mod screen;
pub mod state;

#[cfg(test)]
mod testing;

pub use {
    config::BotConfig,
    error::{Error, Result},
};

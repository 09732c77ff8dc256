//! Media catalog: maps short numeric content codes to Telegram file ids.
//!
//! Delivery is gated elsewhere; this crate only stores and looks up the
//! code table.

pub mod catalog;
pub mod error;

pub use {
    catalog::{JsonMediaCatalog, MediaCatalog},
    error::{Error, Result},
};

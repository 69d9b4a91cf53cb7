//! Common utilities and types shared across Strongroom modules.
//!
//! This module provides the error taxonomy used by the decoder and the key
//! deriver, plus small value types that several crates need to agree on.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{ParseMode, SensitiveBytes};

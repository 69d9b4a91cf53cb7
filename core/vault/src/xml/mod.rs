//! Decoding of the plaintext vault document.
//!
//! The document is read in a single forward pass. Cross references that
//! point ahead are resolved through a UUID registry, and pool attachments
//! are materialized once the whole document has been consumed.

mod cursor;
mod decoder;
mod diagnostics;
mod elements;
mod registry;
mod scalar;

pub use decoder::{decode_vault, VaultDecoder};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use scalar::ScalarPolicy;

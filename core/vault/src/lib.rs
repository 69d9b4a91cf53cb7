//! Vault model and document decoder for Strongroom.
//!
//! This crate provides:
//! - The in-memory vault graph: groups, entries, metadata and attachments
//! - A decoder for the plaintext XML payload of a vault container
//! - Decoder configuration
//!
//! # Architecture
//! Groups and entries are stored in arenas owned by [`Vault`] and linked by
//! id. The decoder fills a vault in one pass, decrypting protected values
//! with a keystream supplied by the container layer.

pub mod binary_pool;
pub mod config;
pub mod entry;
pub mod group;
pub mod meta;
pub mod time_info;
pub mod tree;
pub mod xml;

pub use binary_pool::BinaryPool;
pub use config::{DecoderConfig, MAX_STANDARD_ICON};
pub use entry::{Attachments, AutoType, AutoTypeAssociation, Entry, EntryAttribute, EntryAttributes};
pub use group::{Group, TriState};
pub use meta::{Color, CustomIcon, DeletedObject, MemoryProtection, Metadata};
pub use time_info::TimeInfo;
pub use tree::{EntryId, GroupId, Vault};
pub use xml::{decode_vault, Diagnostic, Diagnostics, ScalarPolicy, VaultDecoder};

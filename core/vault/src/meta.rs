//! Vault-wide metadata.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::tree::GroupId;

/// RGB color as stored in the document (`#RRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Which default entry fields should stay protected in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryProtection {
    pub protect_title: bool,
    pub protect_username: bool,
    pub protect_password: bool,
    pub protect_url: bool,
    pub protect_notes: bool,
}

impl Default for MemoryProtection {
    fn default() -> Self {
        Self {
            protect_title: false,
            protect_username: false,
            protect_password: true,
            protect_url: false,
            protect_notes: false,
        }
    }
}

/// A custom icon. The image data is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomIcon {
    pub uuid: Uuid,
    pub data: Vec<u8>,
}

/// Tombstone for a removed group or entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedObject {
    pub uuid: Uuid,
    pub deletion_time: DateTime<Utc>,
}

/// Default number of history snapshots kept per entry.
pub const DEFAULT_HISTORY_MAX_ITEMS: i32 = 10;

/// Default total history size per entry, in bytes.
pub const DEFAULT_HISTORY_MAX_SIZE: i32 = 6 * 1024 * 1024;

/// Database metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub generator: String,
    pub name: String,
    pub name_changed: Option<DateTime<Utc>>,
    pub description: String,
    pub description_changed: Option<DateTime<Utc>>,
    pub default_user_name: String,
    pub default_user_name_changed: Option<DateTime<Utc>>,
    pub maintenance_history_days: i32,
    pub color: Option<Color>,
    pub master_key_changed: Option<DateTime<Utc>>,
    pub master_key_change_rec: i32,
    pub master_key_change_force: i32,
    pub memory_protection: MemoryProtection,
    pub recycle_bin_enabled: bool,
    pub recycle_bin: Option<GroupId>,
    pub recycle_bin_changed: Option<DateTime<Utc>>,
    pub entry_templates_group: Option<GroupId>,
    pub entry_templates_group_changed: Option<DateTime<Utc>>,
    pub last_selected_group: Option<GroupId>,
    pub last_top_visible_group: Option<GroupId>,
    pub history_max_items: i32,
    pub history_max_size: i32,
    pub settings_changed: Option<DateTime<Utc>>,
    custom_icons: Vec<CustomIcon>,
    custom_data: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            generator: String::new(),
            name: String::new(),
            name_changed: None,
            description: String::new(),
            description_changed: None,
            default_user_name: String::new(),
            default_user_name_changed: None,
            maintenance_history_days: 365,
            color: None,
            master_key_changed: None,
            master_key_change_rec: -1,
            master_key_change_force: -1,
            memory_protection: MemoryProtection::default(),
            recycle_bin_enabled: true,
            recycle_bin: None,
            recycle_bin_changed: None,
            entry_templates_group: None,
            entry_templates_group_changed: None,
            last_selected_group: None,
            last_top_visible_group: None,
            history_max_items: DEFAULT_HISTORY_MAX_ITEMS,
            history_max_size: DEFAULT_HISTORY_MAX_SIZE,
            settings_changed: None,
            custom_icons: Vec::new(),
            custom_data: Vec::new(),
        }
    }

    /// Add a custom icon, replacing any icon with the same UUID.
    pub fn add_custom_icon(&mut self, uuid: Uuid, data: Vec<u8>) {
        match self.custom_icons.iter_mut().find(|icon| icon.uuid == uuid) {
            Some(icon) => icon.data = data,
            None => self.custom_icons.push(CustomIcon { uuid, data }),
        }
    }

    pub fn custom_icon(&self, uuid: &Uuid) -> Option<&CustomIcon> {
        self.custom_icons.iter().find(|icon| icon.uuid == *uuid)
    }

    pub fn custom_icons(&self) -> &[CustomIcon] {
        &self.custom_icons
    }

    /// Set a custom data item, replacing the value of an existing key.
    pub fn set_custom_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.custom_data.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.custom_data.push((key, value)),
        }
    }

    pub fn custom_data(&self, key: &str) -> Option<&str> {
        self.custom_data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn custom_data_items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

//! Entries: credential records and their history.

use uuid::Uuid;

use crate::meta::Color;
use crate::time_info::TimeInfo;
use crate::tree::GroupId;

/// Attribute keys every entry carries, initially empty.
pub const DEFAULT_ATTRIBUTES: [&str; 5] = ["Title", "UserName", "Password", "URL", "Notes"];

/// A named string field of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAttribute {
    pub key: String,
    pub value: String,
    pub protected: bool,
}

/// Ordered attribute map with unique keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAttributes {
    items: Vec<EntryAttribute>,
}

impl EntryAttributes {
    /// Attributes holding only the empty default keys.
    pub fn new() -> Self {
        Self {
            items: DEFAULT_ATTRIBUTES
                .iter()
                .map(|key| EntryAttribute {
                    key: (*key).to_string(),
                    value: String::new(),
                    protected: false,
                })
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).map(|attr| attr.value.as_str())
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.find(key).is_some_and(|attr| attr.protected)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace `key`, keeping its position if it exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, protected: bool) {
        let key = key.into();
        let value = value.into();
        match self.items.iter_mut().find(|attr| attr.key == key) {
            Some(attr) => {
                attr.value = value;
                attr.protected = protected;
            }
            None => self.items.push(EntryAttribute {
                key,
                value,
                protected,
            }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|attr| attr.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryAttribute> {
        self.items.iter()
    }

    /// Attributes beyond the defaults.
    pub fn custom(&self) -> impl Iterator<Item = &EntryAttribute> {
        self.items
            .iter()
            .filter(|attr| !DEFAULT_ATTRIBUTES.contains(&attr.key.as_str()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find(&self, key: &str) -> Option<&EntryAttribute> {
        self.items.iter().find(|attr| attr.key == key)
    }
}

impl Default for EntryAttributes {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered attachment map with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    items: Vec<(String, Vec<u8>)>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Insert or replace the attachment called `name`.
    pub fn set(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.items.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = data,
            None => self.items.push((name, data)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Window title pattern with its keystroke sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTypeAssociation {
    pub window: String,
    pub sequence: String,
}

/// Auto-type configuration of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoType {
    pub enabled: bool,
    pub obfuscation: i32,
    pub default_sequence: String,
    pub associations: Vec<AutoTypeAssociation>,
}

impl Default for AutoType {
    fn default() -> Self {
        Self {
            enabled: true,
            obfuscation: 0,
            default_sequence: String::new(),
            associations: Vec::new(),
        }
    }
}

/// A credential record.
#[derive(Debug, Clone)]
pub struct Entry {
    pub uuid: Uuid,
    icon_number: u32,
    custom_icon: Option<Uuid>,
    pub foreground_color: Option<Color>,
    pub background_color: Option<Color>,
    pub override_url: String,
    pub tags: String,
    pub times: TimeInfo,
    pub attributes: EntryAttributes,
    pub attachments: Attachments,
    pub auto_type: AutoType,
    /// Prior versions of this entry, oldest first. Snapshots share the
    /// entry's UUID and never carry history of their own.
    pub history: Vec<Entry>,
    pub(crate) group: Option<GroupId>,
}

impl Entry {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            icon_number: 0,
            custom_icon: None,
            foreground_color: None,
            background_color: None,
            override_url: String::new(),
            tags: String::new(),
            times: TimeInfo::new(),
            attributes: EntryAttributes::new(),
            attachments: Attachments::new(),
            auto_type: AutoType::default(),
            history: Vec::new(),
            group: None,
        }
    }

    pub fn title(&self) -> &str {
        self.attributes.get("Title").unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        self.attributes.get("UserName").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.attributes.get("Password").unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.attributes.get("URL").unwrap_or_default()
    }

    pub fn icon_number(&self) -> u32 {
        self.icon_number
    }

    pub fn custom_icon(&self) -> Option<Uuid> {
        self.custom_icon
    }

    pub fn set_icon_number(&mut self, icon: u32) {
        self.icon_number = icon;
        self.custom_icon = None;
    }

    pub fn set_custom_icon(&mut self, uuid: Uuid) {
        self.custom_icon = Some(uuid);
        self.icon_number = 0;
    }

    /// Owning group; `None` for history snapshots.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Overwrite every data field with `other`'s, keeping the group link
    /// and history.
    pub(crate) fn copy_data_from(&mut self, other: Entry) {
        self.uuid = other.uuid;
        self.icon_number = other.icon_number;
        self.custom_icon = other.custom_icon;
        self.foreground_color = other.foreground_color;
        self.background_color = other.background_color;
        self.override_url = other.override_url;
        self.tags = other.tags;
        self.times = other.times;
        self.attributes = other.attributes;
        self.attachments = other.attachments;
        self.auto_type = other.auto_type;
    }
}

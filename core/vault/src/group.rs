//! Groups: hierarchical containers of entries.

use uuid::Uuid;

use crate::time_info::TimeInfo;
use crate::tree::{EntryId, GroupId};

/// Icon shown for a new group.
pub const DEFAULT_GROUP_ICON: u32 = 48;

/// Setting that can defer to the parent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Inherit,
    Enable,
    Disable,
}

/// A group in the vault tree.
///
/// Parent, child and entry links are arena ids owned by the [`crate::Vault`].
#[derive(Debug, Clone)]
pub struct Group {
    pub uuid: Uuid,
    pub name: String,
    pub notes: String,
    icon_number: u32,
    custom_icon: Option<Uuid>,
    pub times: TimeInfo,
    pub is_expanded: bool,
    pub default_auto_type_sequence: String,
    pub auto_type: TriState,
    pub searching: TriState,
    pub last_top_visible_entry: Option<EntryId>,
    pub(crate) parent: Option<GroupId>,
    pub(crate) children: Vec<GroupId>,
    pub(crate) entries: Vec<EntryId>,
}

impl Group {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            name: String::new(),
            notes: String::new(),
            icon_number: DEFAULT_GROUP_ICON,
            custom_icon: None,
            times: TimeInfo::new(),
            is_expanded: true,
            default_auto_type_sequence: String::new(),
            auto_type: TriState::Inherit,
            searching: TriState::Inherit,
            last_top_visible_entry: None,
            parent: None,
            children: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn icon_number(&self) -> u32 {
        self.icon_number
    }

    pub fn custom_icon(&self) -> Option<Uuid> {
        self.custom_icon
    }

    /// Use a built-in icon; clears any custom icon.
    pub fn set_icon_number(&mut self, icon: u32) {
        self.icon_number = icon;
        self.custom_icon = None;
    }

    /// Use a custom icon.
    pub fn set_custom_icon(&mut self, uuid: Uuid) {
        self.custom_icon = Some(uuid);
        self.icon_number = 0;
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Overwrite every data field with `other`'s, keeping tree links.
    pub(crate) fn copy_data_from(&mut self, other: Group) {
        self.uuid = other.uuid;
        self.name = other.name;
        self.notes = other.notes;
        self.icon_number = other.icon_number;
        self.custom_icon = other.custom_icon;
        self.times = other.times;
        self.is_expanded = other.is_expanded;
        self.default_auto_type_sequence = other.default_auto_type_sequence;
        self.auto_type = other.auto_type;
        self.searching = other.searching;
        self.last_top_visible_entry = other.last_top_visible_entry;
    }
}

//! Element vocabulary, one dispatch table per nesting level.
//!
//! Names are matched exactly; anything that fails to parse is an unknown
//! element and gets skipped.

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum FileElement {
    Meta,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum MetaElement {
    Generator,
    HeaderHash,
    DatabaseName,
    DatabaseNameChanged,
    DatabaseDescription,
    DatabaseDescriptionChanged,
    DefaultUserName,
    DefaultUserNameChanged,
    MaintenanceHistoryDays,
    Color,
    MasterKeyChanged,
    MasterKeyChangeRec,
    MasterKeyChangeForce,
    MemoryProtection,
    CustomIcons,
    RecycleBinEnabled,
    #[strum(serialize = "RecycleBinUUID")]
    RecycleBinUuid,
    RecycleBinChanged,
    EntryTemplatesGroup,
    EntryTemplatesGroupChanged,
    LastSelectedGroup,
    LastTopVisibleGroup,
    HistoryMaxItems,
    HistoryMaxSize,
    Binaries,
    CustomData,
    SettingsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum MemoryProtectionElement {
    ProtectTitle,
    ProtectUserName,
    ProtectPassword,
    #[strum(serialize = "ProtectURL")]
    ProtectUrl,
    ProtectNotes,
}

/// Children of `Icon` in `CustomIcons`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum IconElement {
    #[strum(serialize = "UUID")]
    Uuid,
    Data,
}

/// Children of `Item` in `CustomData` and of entry `String`/`Binary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum KeyValueElement {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum RootElement {
    Group,
    DeletedObjects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum GroupElement {
    #[strum(serialize = "UUID")]
    Uuid,
    Name,
    Notes,
    #[strum(serialize = "IconID")]
    IconId,
    #[strum(serialize = "CustomIconUUID")]
    CustomIconUuid,
    Times,
    IsExpanded,
    DefaultAutoTypeSequence,
    EnableAutoType,
    EnableSearching,
    LastTopVisibleEntry,
    Group,
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum DeletedObjectElement {
    #[strum(serialize = "UUID")]
    Uuid,
    DeletionTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum EntryElement {
    #[strum(serialize = "UUID")]
    Uuid,
    #[strum(serialize = "IconID")]
    IconId,
    #[strum(serialize = "CustomIconUUID")]
    CustomIconUuid,
    ForegroundColor,
    BackgroundColor,
    #[strum(serialize = "OverrideURL")]
    OverrideUrl,
    Tags,
    Times,
    String,
    Binary,
    AutoType,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum AutoTypeElement {
    Enabled,
    DataTransferObfuscation,
    DefaultSequence,
    Association,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum AssociationElement {
    Window,
    KeystrokeSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub(crate) enum TimesElement {
    LastModificationTime,
    CreationTime,
    LastAccessTime,
    ExpiryTime,
    Expires,
    UsageCount,
    LocationChanged,
}

//! Recursive-descent decoder for the vault document.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::cursor::{StartTag, XmlCursor};
use super::diagnostics::{Diagnostic, Diagnostics};
use super::elements::{
    AssociationElement, AutoTypeElement, DeletedObjectElement, EntryElement, FileElement,
    GroupElement, IconElement, KeyValueElement, MemoryProtectionElement, MetaElement, RootElement,
    TimesElement,
};
use super::registry::Registry;
use super::scalar::ScalarPolicy;
use crate::binary_pool::BinaryPool;
use crate::config::DecoderConfig;
use crate::entry::{AutoType, AutoTypeAssociation, Entry};
use crate::group::Group;
use crate::meta::{Color, DeletedObject};
use crate::time_info::TimeInfo;
use crate::tree::{EntryId, GroupId, Vault};
use strongroom_common::{Error, Result};
use strongroom_crypto::KeystreamCipher;

/// Deepest `Group` nesting accepted before the decode is refused.
const MAX_GROUP_DEPTH: usize = 128;

/// Decodes the plaintext XML payload of a vault into a [`Vault`].
///
/// One decoder may be reused; every call to [`VaultDecoder::decode`]
/// starts from a fresh vault and clears the previous diagnostics.
#[derive(Debug, Clone, Default)]
pub struct VaultDecoder {
    config: DecoderConfig,
    binary_pool: BinaryPool,
    diagnostics: Diagnostics,
    header_hash: Vec<u8>,
}

impl VaultDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Seed the binary pool, e.g. from the container's inner header.
    /// Ids declared in the document's `Binaries` section overwrite these.
    pub fn with_binary_pool(mut self, pool: BinaryPool) -> Self {
        self.binary_pool = pool;
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode `input` into `vault`.
    ///
    /// Protected values are decrypted with `cipher` in document order. On
    /// error `vault` holds whatever was read so far and should be dropped.
    pub fn decode<R: BufRead>(
        &mut self,
        input: R,
        vault: &mut Vault,
        cipher: Option<&mut dyn KeystreamCipher>,
    ) -> Result<()> {
        self.diagnostics.clear();
        self.header_hash.clear();
        *vault = Vault::new();
        vault.binaries = self.binary_pool.clone();

        debug!(
            mode = ?self.config.mode,
            has_cipher = cipher.is_some(),
            "decoding vault document"
        );

        let registry = Registry::new(vault);
        let mut ctx = DecodeContext {
            cursor: XmlCursor::new(input),
            vault: &mut *vault,
            cipher,
            policy: ScalarPolicy::new(self.config.mode),
            max_icon_id: self.config.max_icon_id,
            registry,
            binary_refs: Vec::new(),
            diagnostics: &mut self.diagnostics,
            header_hash: &mut self.header_hash,
            group_depth: 0,
        };
        ctx.parse_document()?;
        ctx.finish();

        debug!(
            groups = vault.group_count(),
            entries = vault.entry_count(),
            diagnostics = self.diagnostics.len(),
            "vault document decoded"
        );
        Ok(())
    }

    /// Diagnostics from the last decode.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Raw `Meta/HeaderHash` value from the last decode, empty if absent.
    pub fn header_hash(&self) -> &[u8] {
        &self.header_hash
    }
}

/// Decode a complete document held in memory.
pub fn decode_vault(
    input: &[u8],
    cipher: Option<&mut dyn KeystreamCipher>,
    config: DecoderConfig,
) -> Result<(Vault, Diagnostics)> {
    let mut decoder = VaultDecoder::new(config);
    let mut vault = Vault::new();
    decoder.decode(input, &mut vault, cipher)?;
    Ok((vault, decoder.into_diagnostics()))
}

/// A pool reference to materialize once the whole document is read.
struct BinaryRef {
    pool_id: String,
    entry: EntryId,
    /// Index into the entry's history, or the entry itself.
    history: Option<usize>,
    name: String,
}

/// An entry as read from the document, before it joins the registry.
struct ParsedEntry {
    entry: Entry,
    /// `(pool id, attachment name)` pairs.
    binary_refs: Vec<(String, String)>,
    history: Vec<ParsedEntry>,
}

struct DecodeContext<'a, 'c, R> {
    cursor: XmlCursor<R>,
    vault: &'a mut Vault,
    cipher: Option<&'c mut dyn KeystreamCipher>,
    policy: ScalarPolicy,
    max_icon_id: u32,
    registry: Registry,
    binary_refs: Vec<BinaryRef>,
    diagnostics: &'a mut Diagnostics,
    header_hash: &'a mut Vec<u8>,
    group_depth: usize,
}

impl<R: BufRead> DecodeContext<'_, '_, R> {
    fn strict(&self) -> bool {
        self.policy.mode().is_strict()
    }

    fn parse_document(&mut self) -> Result<()> {
        let mut root_parsed = false;
        while let Some(tag) = self.cursor.next_child()? {
            if tag.name == "KeePassFile" && !root_parsed {
                root_parsed = self.parse_file()?;
            } else {
                self.skip_unknown(&tag, "document")?;
            }
        }

        if !root_parsed {
            return Err(Error::Structure("No root group".to_string()));
        }
        Ok(())
    }

    fn parse_file(&mut self) -> Result<bool> {
        let mut root_found = false;
        let mut root_parsed = false;
        while let Some(tag) = self.cursor.next_child()? {
            match FileElement::from_str(&tag.name) {
                Ok(FileElement::Meta) => self.parse_meta()?,
                Ok(FileElement::Root) => {
                    if root_found {
                        return Err(Error::Structure("Multiple root elements".to_string()));
                    }
                    root_found = true;
                    root_parsed = self.parse_root()?;
                }
                Err(_) => self.skip_unknown(&tag, "KeePassFile")?,
            }
        }
        Ok(root_parsed)
    }

    fn parse_meta(&mut self) -> Result<()> {
        while let Some(tag) = self.cursor.next_child()? {
            let Ok(element) = MetaElement::from_str(&tag.name) else {
                self.skip_unknown(&tag, "Meta")?;
                continue;
            };

            match element {
                MetaElement::Generator => self.vault.metadata.generator = self.read_string(&tag)?,
                MetaElement::HeaderHash => *self.header_hash = self.read_binary(&tag)?,
                MetaElement::DatabaseName => self.vault.metadata.name = self.read_string(&tag)?,
                MetaElement::DatabaseNameChanged => {
                    self.vault.metadata.name_changed = Some(self.read_datetime(&tag)?)
                }
                MetaElement::DatabaseDescription => {
                    self.vault.metadata.description = self.read_string(&tag)?
                }
                MetaElement::DatabaseDescriptionChanged => {
                    self.vault.metadata.description_changed = Some(self.read_datetime(&tag)?)
                }
                MetaElement::DefaultUserName => {
                    self.vault.metadata.default_user_name = self.read_string(&tag)?
                }
                MetaElement::DefaultUserNameChanged => {
                    self.vault.metadata.default_user_name_changed = Some(self.read_datetime(&tag)?)
                }
                MetaElement::MaintenanceHistoryDays => {
                    self.vault.metadata.maintenance_history_days = self.read_number(&tag)?
                }
                MetaElement::Color => self.vault.metadata.color = self.read_color(&tag)?,
                MetaElement::MasterKeyChanged => {
                    self.vault.metadata.master_key_changed = Some(self.read_datetime(&tag)?)
                }
                MetaElement::MasterKeyChangeRec => {
                    self.vault.metadata.master_key_change_rec = self.read_number(&tag)?
                }
                MetaElement::MasterKeyChangeForce => {
                    self.vault.metadata.master_key_change_force = self.read_number(&tag)?
                }
                MetaElement::MemoryProtection => self.parse_memory_protection()?,
                MetaElement::CustomIcons => self.parse_custom_icons()?,
                MetaElement::RecycleBinEnabled => {
                    self.vault.metadata.recycle_bin_enabled = self.read_bool(&tag)?
                }
                MetaElement::RecycleBinUuid => {
                    self.vault.metadata.recycle_bin = self.read_group_ref(&tag)?
                }
                MetaElement::RecycleBinChanged => {
                    self.vault.metadata.recycle_bin_changed = Some(self.read_datetime(&tag)?)
                }
                MetaElement::EntryTemplatesGroup => {
                    self.vault.metadata.entry_templates_group = self.read_group_ref(&tag)?
                }
                MetaElement::EntryTemplatesGroupChanged => {
                    self.vault.metadata.entry_templates_group_changed =
                        Some(self.read_datetime(&tag)?)
                }
                MetaElement::LastSelectedGroup => {
                    self.vault.metadata.last_selected_group = self.read_group_ref(&tag)?
                }
                MetaElement::LastTopVisibleGroup => {
                    self.vault.metadata.last_top_visible_group = self.read_group_ref(&tag)?
                }
                MetaElement::HistoryMaxItems => {
                    if let Some(value) = self.read_history_limit(&tag, "HistoryMaxItems")? {
                        self.vault.metadata.history_max_items = value;
                    }
                }
                MetaElement::HistoryMaxSize => {
                    if let Some(value) = self.read_history_limit(&tag, "HistoryMaxSize")? {
                        self.vault.metadata.history_max_size = value;
                    }
                }
                MetaElement::Binaries => self.parse_binaries()?,
                MetaElement::CustomData => self.parse_custom_data()?,
                MetaElement::SettingsChanged => {
                    self.vault.metadata.settings_changed = Some(self.read_datetime(&tag)?)
                }
            }
        }
        Ok(())
    }

    fn parse_memory_protection(&mut self) -> Result<()> {
        while let Some(tag) = self.cursor.next_child()? {
            let Ok(element) = MemoryProtectionElement::from_str(&tag.name) else {
                self.skip_unknown(&tag, "MemoryProtection")?;
                continue;
            };

            let value = self.read_bool(&tag)?;
            let protection = &mut self.vault.metadata.memory_protection;
            match element {
                MemoryProtectionElement::ProtectTitle => protection.protect_title = value,
                MemoryProtectionElement::ProtectUserName => protection.protect_username = value,
                MemoryProtectionElement::ProtectPassword => protection.protect_password = value,
                MemoryProtectionElement::ProtectUrl => protection.protect_url = value,
                MemoryProtectionElement::ProtectNotes => protection.protect_notes = value,
            }
        }
        Ok(())
    }

    fn parse_custom_icons(&mut self) -> Result<()> {
        while let Some(_icon) = self.next_item("Icon", "CustomIcons")? {
            let mut uuid = None;
            let mut data = None;
            while let Some(tag) = self.cursor.next_child()? {
                match IconElement::from_str(&tag.name) {
                    Ok(IconElement::Uuid) => {
                        let value = self.read_uuid(&tag)?;
                        uuid = (!value.is_nil()).then_some(value);
                    }
                    Ok(IconElement::Data) => data = Some(self.read_binary(&tag)?),
                    Err(_) => self.skip_unknown(&tag, "Icon")?,
                }
            }

            match (uuid, data) {
                (Some(uuid), Some(data)) => self.vault.metadata.add_custom_icon(uuid, data),
                _ => return Err(Error::Content("Missing icon uuid or data".to_string())),
            }
        }
        Ok(())
    }

    fn parse_binaries(&mut self) -> Result<()> {
        while let Some(tag) = self.next_item("Binary", "Binaries")? {
            let id = tag.attribute("ID").unwrap_or_default().to_string();
            let compressed = tag
                .attribute("Compressed")
                .is_some_and(|value| value.eq_ignore_ascii_case("True"));

            let text = self.cursor.read_text(&tag)?;
            let data = if compressed {
                self.policy.parse_compressed_binary(&text)?
            } else {
                self.policy.parse_binary(&text)?
            };

            if self.vault.binaries.insert(id.clone(), data).is_some() {
                self.diagnostics.push(Diagnostic::OverwrittenBinary { id });
            }
        }
        Ok(())
    }

    fn parse_custom_data(&mut self) -> Result<()> {
        while let Some(_item) = self.next_item("Item", "CustomData")? {
            let (key, value) = self.parse_key_value("Item")?;
            match (key, value) {
                (Some(key), Some(value)) => self.vault.metadata.set_custom_data(key, value),
                _ => return Err(Error::Content("Missing custom data key or value".to_string())),
            }
        }
        Ok(())
    }

    fn parse_key_value(&mut self, parent: &str) -> Result<(Option<String>, Option<String>)> {
        let mut key = None;
        let mut value = None;
        while let Some(tag) = self.cursor.next_child()? {
            match KeyValueElement::from_str(&tag.name) {
                Ok(KeyValueElement::Key) => key = Some(self.read_string(&tag)?),
                Ok(KeyValueElement::Value) => value = Some(self.read_string(&tag)?),
                Err(_) => self.skip_unknown(&tag, parent)?,
            }
        }
        Ok((key, value))
    }

    fn parse_root(&mut self) -> Result<bool> {
        let mut group_parsed = false;
        while let Some(tag) = self.cursor.next_child()? {
            match RootElement::from_str(&tag.name) {
                Ok(RootElement::Group) => {
                    if group_parsed {
                        return Err(Error::Structure("Multiple group elements".to_string()));
                    }
                    let root = self.parse_group()?;
                    self.vault.set_root(root);
                    group_parsed = true;
                }
                Ok(RootElement::DeletedObjects) => self.parse_deleted_objects()?,
                Err(_) => self.skip_unknown(&tag, "Root")?,
            }
        }
        Ok(group_parsed)
    }

    fn parse_deleted_objects(&mut self) -> Result<()> {
        while let Some(_object) = self.next_item("DeletedObject", "DeletedObjects")? {
            let mut uuid = None;
            let mut deletion_time = None;
            while let Some(tag) = self.cursor.next_child()? {
                match DeletedObjectElement::from_str(&tag.name) {
                    Ok(DeletedObjectElement::Uuid) => {
                        let value = self.read_uuid(&tag)?;
                        if value.is_nil() {
                            if self.strict() {
                                return Err(Error::Content("Null DeleteObject uuid".to_string()));
                            }
                            continue;
                        }
                        uuid = Some(value);
                    }
                    Ok(DeletedObjectElement::DeletionTime) => {
                        deletion_time = Some(self.read_datetime(&tag)?)
                    }
                    Err(_) => self.skip_unknown(&tag, "DeletedObject")?,
                }
            }

            match (uuid, deletion_time) {
                (Some(uuid), Some(deletion_time)) => self.vault.deleted_objects.push(DeletedObject {
                    uuid,
                    deletion_time,
                }),
                _ if self.strict() => {
                    return Err(Error::Content(
                        "Missing DeletedObject uuid or time".to_string(),
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_group(&mut self) -> Result<GroupId> {
        if self.group_depth >= MAX_GROUP_DEPTH {
            return Err(Error::Structure("Group nesting too deep".to_string()));
        }
        self.group_depth += 1;
        let parsed = self.parse_group_body();
        self.group_depth -= 1;
        parsed
    }

    fn parse_group_body(&mut self) -> Result<GroupId> {
        let mut group = Group::new(Uuid::nil());
        let mut children = Vec::new();
        let mut entries = Vec::new();

        while let Some(tag) = self.cursor.next_child()? {
            let Ok(element) = GroupElement::from_str(&tag.name) else {
                self.skip_unknown(&tag, "Group")?;
                continue;
            };

            match element {
                GroupElement::Uuid => {
                    let uuid = self.read_uuid(&tag)?;
                    if uuid.is_nil() {
                        if self.strict() {
                            return Err(Error::Content("Null group uuid".to_string()));
                        }
                        group.uuid = Uuid::new_v4();
                    } else {
                        group.uuid = uuid;
                    }
                }
                GroupElement::Name => group.name = self.read_string(&tag)?,
                GroupElement::Notes => group.notes = self.read_string(&tag)?,
                GroupElement::IconId => {
                    let icon = self.read_number(&tag)?;
                    group.set_icon_number(self.group_icon(icon)?);
                }
                GroupElement::CustomIconUuid => {
                    let uuid = self.read_uuid(&tag)?;
                    if !uuid.is_nil() {
                        group.set_custom_icon(uuid);
                    }
                }
                GroupElement::Times => group.times = self.parse_times()?,
                GroupElement::IsExpanded => group.is_expanded = self.read_bool(&tag)?,
                GroupElement::DefaultAutoTypeSequence => {
                    group.default_auto_type_sequence = self.read_string(&tag)?
                }
                GroupElement::EnableAutoType => {
                    let text = self.read_string(&tag)?;
                    group.auto_type = self.policy.parse_tri_state(&text, "EnableAutoType")?;
                }
                GroupElement::EnableSearching => {
                    let text = self.read_string(&tag)?;
                    group.searching = self.policy.parse_tri_state(&text, "EnableSearching")?;
                }
                GroupElement::LastTopVisibleEntry => {
                    let uuid = self.read_uuid(&tag)?;
                    group.last_top_visible_entry = self.registry.get_entry(self.vault, uuid);
                }
                GroupElement::Group => children.push(self.parse_group()?),
                GroupElement::Entry => entries.push(self.parse_entry()?),
            }
        }

        if group.uuid.is_nil() {
            if self.strict() {
                return Err(Error::Content("No group uuid found".to_string()));
            }
            group.uuid = Uuid::new_v4();
        }

        let id = self.registry.merge_group(self.vault, group);
        for child in children {
            if self.vault.is_same_or_ancestor(child, id) {
                return Err(Error::Content("Group cannot contain itself".to_string()));
            }
            self.vault.set_group_parent(child, Some(id));
        }
        for entry in entries {
            self.vault.set_entry_group(entry, id);
        }
        Ok(id)
    }

    fn group_icon(&mut self, icon: i32) -> Result<u32> {
        if icon < 0 {
            if self.strict() {
                return Err(Error::Content("Invalid group icon number".to_string()));
            }
            return Ok(0);
        }

        let number = icon.unsigned_abs();
        if number > self.max_icon_id {
            self.diagnostics.push(Diagnostic::IconIdClamped {
                icon_id: icon,
                clamped_to: self.max_icon_id,
            });
            return Ok(self.max_icon_id);
        }
        Ok(number)
    }

    /// Parse a top-level entry and merge it into the registry.
    fn parse_entry(&mut self) -> Result<EntryId> {
        let ParsedEntry {
            entry,
            binary_refs,
            history,
        } = self.parse_entry_body(false)?;

        let id = self.registry.merge_entry(self.vault, entry);
        let uuid = self.vault.entry(id).uuid;

        let mut snapshots = Vec::with_capacity(history.len());
        for (index, snapshot) in history.into_iter().enumerate() {
            let mut item = snapshot.entry;
            if item.uuid != uuid {
                if self.strict() {
                    return Err(Error::Content(
                        "History element with different uuid".to_string(),
                    ));
                }
                item.uuid = uuid;
            }
            for (pool_id, name) in snapshot.binary_refs {
                self.binary_refs.push(BinaryRef {
                    pool_id,
                    entry: id,
                    history: Some(index),
                    name,
                });
            }
            snapshots.push(item);
        }
        self.vault.entry_mut(id).history = snapshots;

        for (pool_id, name) in binary_refs {
            self.binary_refs.push(BinaryRef {
                pool_id,
                entry: id,
                history: None,
                name,
            });
        }
        Ok(id)
    }

    fn parse_entry_body(&mut self, in_history: bool) -> Result<ParsedEntry> {
        let mut entry = Entry::new(Uuid::nil());
        let mut binary_refs = Vec::new();
        let mut history = Vec::new();

        while let Some(tag) = self.cursor.next_child()? {
            let Ok(element) = EntryElement::from_str(&tag.name) else {
                self.skip_unknown(&tag, "Entry")?;
                continue;
            };

            match element {
                EntryElement::Uuid => {
                    let uuid = self.read_uuid(&tag)?;
                    if uuid.is_nil() {
                        if self.strict() {
                            return Err(Error::Content("Null entry uuid".to_string()));
                        }
                        entry.uuid = Uuid::new_v4();
                    } else {
                        entry.uuid = uuid;
                    }
                }
                EntryElement::IconId => {
                    let icon = self.read_number(&tag)?;
                    if icon < 0 && self.strict() {
                        return Err(Error::Content("Invalid entry icon number".to_string()));
                    }
                    entry.set_icon_number(u32::try_from(icon).unwrap_or(0));
                }
                EntryElement::CustomIconUuid => {
                    let uuid = self.read_uuid(&tag)?;
                    if !uuid.is_nil() {
                        entry.set_custom_icon(uuid);
                    }
                }
                EntryElement::ForegroundColor => entry.foreground_color = self.read_color(&tag)?,
                EntryElement::BackgroundColor => entry.background_color = self.read_color(&tag)?,
                EntryElement::OverrideUrl => entry.override_url = self.read_string(&tag)?,
                EntryElement::Tags => entry.tags = self.read_string(&tag)?,
                EntryElement::Times => entry.times = self.parse_times()?,
                EntryElement::String => self.parse_entry_string(&mut entry)?,
                EntryElement::Binary => {
                    if let Some(reference) = self.parse_entry_binary(&mut entry)? {
                        binary_refs.push(reference);
                    }
                }
                EntryElement::AutoType => self.parse_auto_type(&mut entry.auto_type)?,
                EntryElement::History => {
                    if in_history {
                        return Err(Error::Content(
                            "History element in history entry".to_string(),
                        ));
                    }
                    history = self.parse_history()?;
                }
            }
        }

        if entry.uuid.is_nil() {
            if self.strict() {
                return Err(Error::Content("No entry uuid found".to_string()));
            }
            entry.uuid = Uuid::new_v4();
        }

        Ok(ParsedEntry {
            entry,
            binary_refs,
            history,
        })
    }

    fn parse_history(&mut self) -> Result<Vec<ParsedEntry>> {
        let mut items = Vec::new();
        while let Some(_entry) = self.next_item("Entry", "History")? {
            items.push(self.parse_entry_body(true)?);
        }
        Ok(items)
    }

    fn parse_entry_string(&mut self, entry: &mut Entry) -> Result<()> {
        let mut key = None;
        let mut value = None;
        let mut protect = false;

        while let Some(tag) = self.cursor.next_child()? {
            match KeyValueElement::from_str(&tag.name) {
                Ok(KeyValueElement::Key) => key = Some(self.read_string(&tag)?),
                Ok(KeyValueElement::Value) => {
                    let is_protected = tag.attribute("Protected") == Some("True");
                    let protect_in_memory = tag.attribute("ProtectInMemory") == Some("True");

                    let mut text = self.read_string(&tag)?;
                    if is_protected && !text.is_empty() {
                        let mut data = self.policy.parse_binary(&text)?;
                        self.decrypt(&mut data)?;
                        text = String::from_utf8_lossy(&data).into_owned();
                    }

                    protect = is_protected || protect_in_memory;
                    value = Some(text);
                }
                Err(_) => self.skip_unknown(&tag, "String")?,
            }
        }

        let (Some(key), Some(value)) = (key, value) else {
            return Err(Error::Content("Entry string key or value missing".to_string()));
        };

        // Default attributes always exist with an empty value.
        if entry
            .attributes
            .get(&key)
            .is_some_and(|existing| !existing.is_empty())
        {
            return Err(Error::Content("Duplicate custom attribute found".to_string()));
        }
        entry.attributes.set(key, value, protect);
        Ok(())
    }

    /// Returns `(pool id, attachment name)` when the value is a pool reference.
    fn parse_entry_binary(&mut self, entry: &mut Entry) -> Result<Option<(String, String)>> {
        let mut key = None;
        let mut value = None;
        let mut pool_ref = None;

        while let Some(tag) = self.cursor.next_child()? {
            match KeyValueElement::from_str(&tag.name) {
                Ok(KeyValueElement::Key) => key = Some(self.read_string(&tag)?),
                Ok(KeyValueElement::Value) => {
                    if let Some(reference) = tag.attribute("Ref") {
                        pool_ref = Some(reference.to_string());
                        self.cursor.skip(&tag)?;
                        value = Some(Vec::new());
                    } else {
                        let is_protected = tag.attribute("Protected") == Some("True");
                        let mut data = self.read_binary(&tag)?;
                        if is_protected && !data.is_empty() {
                            self.decrypt(&mut data)?;
                        }
                        value = Some(data);
                    }
                }
                Err(_) => self.skip_unknown(&tag, "Binary")?,
            }
        }

        let (Some(key), Some(value)) = (key, value) else {
            return Err(Error::Content("Entry binary key or value missing".to_string()));
        };
        if entry.attachments.contains(&key) {
            return Err(Error::Content("Duplicate attachment found".to_string()));
        }

        entry.attachments.set(key.clone(), value);
        Ok(pool_ref.map(|pool_id| (pool_id, key)))
    }

    fn parse_auto_type(&mut self, auto_type: &mut AutoType) -> Result<()> {
        while let Some(tag) = self.cursor.next_child()? {
            match AutoTypeElement::from_str(&tag.name) {
                Ok(AutoTypeElement::Enabled) => auto_type.enabled = self.read_bool(&tag)?,
                Ok(AutoTypeElement::DataTransferObfuscation) => {
                    auto_type.obfuscation = self.read_number(&tag)?
                }
                Ok(AutoTypeElement::DefaultSequence) => {
                    auto_type.default_sequence = self.read_string(&tag)?
                }
                Ok(AutoTypeElement::Association) => {
                    let association = self.parse_association()?;
                    auto_type.associations.push(association);
                }
                Err(_) => self.skip_unknown(&tag, "AutoType")?,
            }
        }
        Ok(())
    }

    fn parse_association(&mut self) -> Result<AutoTypeAssociation> {
        let mut window = None;
        let mut sequence = None;
        while let Some(tag) = self.cursor.next_child()? {
            match AssociationElement::from_str(&tag.name) {
                Ok(AssociationElement::Window) => window = Some(self.read_string(&tag)?),
                Ok(AssociationElement::KeystrokeSequence) => {
                    sequence = Some(self.read_string(&tag)?)
                }
                Err(_) => self.skip_unknown(&tag, "Association")?,
            }
        }

        match (window, sequence) {
            (Some(window), Some(sequence)) => Ok(AutoTypeAssociation { window, sequence }),
            _ => Err(Error::Content(
                "Auto-type association window or sequence missing".to_string(),
            )),
        }
    }

    fn parse_times(&mut self) -> Result<TimeInfo> {
        let mut times = TimeInfo::new();
        while let Some(tag) = self.cursor.next_child()? {
            let Ok(element) = TimesElement::from_str(&tag.name) else {
                self.skip_unknown(&tag, "Times")?;
                continue;
            };

            match element {
                TimesElement::LastModificationTime => {
                    times.last_modification_time = self.read_datetime(&tag)?
                }
                TimesElement::CreationTime => times.creation_time = self.read_datetime(&tag)?,
                TimesElement::LastAccessTime => times.last_access_time = self.read_datetime(&tag)?,
                TimesElement::ExpiryTime => times.expiry_time = self.read_datetime(&tag)?,
                TimesElement::Expires => times.expires = self.read_bool(&tag)?,
                TimesElement::UsageCount => times.usage_count = self.read_number(&tag)?,
                TimesElement::LocationChanged => times.location_changed = self.read_datetime(&tag)?,
            }
        }
        Ok(times)
    }

    /// Resolve registry placeholders and pool references.
    fn finish(self) {
        let DecodeContext {
            vault,
            registry,
            binary_refs,
            diagnostics,
            ..
        } = self;

        registry.finish(vault, diagnostics);

        let (unmapped, unused) = {
            let pool_ids: BTreeSet<&str> = vault.binaries.ids().collect();
            let referenced: BTreeSet<&str> =
                binary_refs.iter().map(|r| r.pool_id.as_str()).collect();
            let unmapped: Vec<String> = referenced
                .difference(&pool_ids)
                .map(|id| id.to_string())
                .collect();
            let unused: Vec<String> = pool_ids
                .difference(&referenced)
                .map(|id| id.to_string())
                .collect();
            (unmapped, unused)
        };
        for id in unmapped {
            diagnostics.push(Diagnostic::UnmappedBinary { id });
        }
        for id in unused {
            diagnostics.push(Diagnostic::UnusedBinary { id });
        }

        for reference in binary_refs {
            let data = vault
                .binaries
                .get(&reference.pool_id)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            let entry = vault.entry_mut(reference.entry);
            let attachments = match reference.history {
                None => Some(&mut entry.attachments),
                Some(index) => entry.history.get_mut(index).map(|item| &mut item.attachments),
            };
            if let Some(attachments) = attachments {
                attachments.set(reference.name, data);
            }
        }
    }

    /// Next child called `name`; any other child is skipped.
    fn next_item(&mut self, name: &str, parent: &str) -> Result<Option<StartTag>> {
        while let Some(tag) = self.cursor.next_child()? {
            if tag.name == name {
                return Ok(Some(tag));
            }
            self.skip_unknown(&tag, parent)?;
        }
        Ok(None)
    }

    fn skip_unknown(&mut self, tag: &StartTag, parent: &str) -> Result<()> {
        self.diagnostics.push(Diagnostic::SkippedElement {
            element: tag.name.clone(),
            parent: parent.to_string(),
        });
        self.cursor.skip(tag)
    }

    fn decrypt(&mut self, data: &mut [u8]) -> Result<()> {
        match self.cipher.as_mut() {
            Some(cipher) => cipher.apply_keystream(data),
            None => Err(Error::Crypto(
                "Unable to decrypt protected value: no keystream available".to_string(),
            )),
        }
    }

    fn read_string(&mut self, tag: &StartTag) -> Result<String> {
        self.cursor.read_text(tag)
    }

    fn read_bool(&mut self, tag: &StartTag) -> Result<bool> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_bool(&text)
    }

    fn read_number(&mut self, tag: &StartTag) -> Result<i32> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_number(&text)
    }

    fn read_uuid(&mut self, tag: &StartTag) -> Result<Uuid> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_uuid(&text)
    }

    fn read_binary(&mut self, tag: &StartTag) -> Result<Vec<u8>> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_binary(&text)
    }

    fn read_datetime(&mut self, tag: &StartTag) -> Result<chrono::DateTime<chrono::Utc>> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_datetime(&text)
    }

    fn read_color(&mut self, tag: &StartTag) -> Result<Option<Color>> {
        let text = self.cursor.read_text(tag)?;
        self.policy.parse_color(&text)
    }

    fn read_group_ref(&mut self, tag: &StartTag) -> Result<Option<GroupId>> {
        let uuid = self.read_uuid(tag)?;
        Ok(self.registry.get_group(self.vault, uuid))
    }

    fn read_history_limit(&mut self, tag: &StartTag, field: &'static str) -> Result<Option<i32>> {
        let value = self.read_number(tag)?;
        if value < -1 {
            self.diagnostics
                .push(Diagnostic::InvalidHistoryLimit { field, value });
            return Ok(None);
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use strongroom_common::{ErrorKind, ParseMode};

    fn b64_uuid(uuid: &Uuid) -> String {
        STANDARD.encode(uuid.as_bytes())
    }

    fn decode(xml: &str, mode: ParseMode) -> Result<(Vault, Diagnostics)> {
        let config = DecoderConfig {
            mode,
            ..DecoderConfig::default()
        };
        decode_vault(xml.as_bytes(), None, config)
    }

    fn root_only(root: &Uuid, group_body: &str, meta: &str) -> String {
        format!(
            "<KeePassFile><Meta>{meta}</Meta><Root><Group><UUID>{}</UUID>{group_body}</Group></Root></KeePassFile>",
            b64_uuid(root)
        )
    }

    #[test]
    fn test_missing_root_is_structural() {
        let err = decode("<KeePassFile><Meta/></KeePassFile>", ParseMode::Lenient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.to_string(), "Structural error: No root group");

        let err = decode("<Other/>", ParseMode::Lenient).unwrap_err();
        assert!(err.is_structural());
    }

    fn nested_groups(depth: usize) -> String {
        let mut groups = String::new();
        for _ in 0..depth {
            groups.push_str(&format!("<Group><UUID>{}</UUID>", b64_uuid(&Uuid::new_v4())));
        }
        groups.push_str(&"</Group>".repeat(depth));
        format!("<KeePassFile><Root>{groups}</Root></KeePassFile>")
    }

    #[test]
    fn test_group_nesting_limit() {
        let (vault, _) = decode(&nested_groups(MAX_GROUP_DEPTH), ParseMode::Lenient).unwrap();
        assert_eq!(vault.group_count(), MAX_GROUP_DEPTH);

        let err = decode(&nested_groups(MAX_GROUP_DEPTH + 1), ParseMode::Lenient).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(err.to_string(), "Structural error: Group nesting too deep");

        let err = decode(&nested_groups(5_000), ParseMode::Strict).unwrap_err();
        assert_eq!(err.to_string(), "Structural error: Group nesting too deep");
    }

    #[test]
    fn test_unknown_elements_are_skipped() {
        let root = Uuid::new_v4();
        let xml = root_only(&root, "<Shiny><Nested/></Shiny><Name>Root</Name>", "<Plugin>x</Plugin>");
        let (vault, diagnostics) = decode(&xml, ParseMode::Strict).unwrap();

        assert_eq!(vault.root_group().unwrap().name, "Root");
        let skipped: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::SkippedElement { element, parent } => {
                    Some((element.as_str(), parent.as_str()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec![("Plugin", "Meta"), ("Shiny", "Group")]);
    }

    #[test]
    fn test_meta_fields() {
        let root = Uuid::new_v4();
        let icon = Uuid::new_v4();
        let meta = format!(
            "<Generator>strongroom</Generator>\
             <HeaderHash>AQID</HeaderHash>\
             <DatabaseName>Personal</DatabaseName>\
             <Color>#00FF00</Color>\
             <MemoryProtection><ProtectTitle>True</ProtectTitle><ProtectPassword>False</ProtectPassword></MemoryProtection>\
             <CustomIcons><Icon><UUID>{}</UUID><Data>iVBO</Data></Icon></CustomIcons>\
             <RecycleBinUUID>{}</RecycleBinUUID>\
             <HistoryMaxItems>-5</HistoryMaxItems>\
             <HistoryMaxSize>1024</HistoryMaxSize>\
             <CustomData><Item><Key>k</Key><Value>v</Value></Item></CustomData>",
            b64_uuid(&icon),
            b64_uuid(&root)
        );
        let xml = root_only(&root, "", &meta);

        let mut decoder = VaultDecoder::new(DecoderConfig::strict());
        let mut vault = Vault::new();
        decoder.decode(xml.as_bytes(), &mut vault, None).unwrap();

        let metadata = &vault.metadata;
        assert_eq!(metadata.generator, "strongroom");
        assert_eq!(metadata.name, "Personal");
        assert_eq!(metadata.color, Some(Color::new(0, 255, 0)));
        assert!(metadata.memory_protection.protect_title);
        assert!(!metadata.memory_protection.protect_password);
        assert_eq!(metadata.custom_icon(&icon).unwrap().data, STANDARD.decode("iVBO").unwrap());
        assert_eq!(metadata.recycle_bin, vault.root());
        assert_eq!(metadata.history_max_items, crate::meta::DEFAULT_HISTORY_MAX_ITEMS);
        assert_eq!(metadata.history_max_size, 1024);
        assert_eq!(metadata.custom_data("k"), Some("v"));
        assert_eq!(decoder.header_hash(), &[1, 2, 3]);
        assert!(decoder.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::InvalidHistoryLimit { field: "HistoryMaxItems", value: -5 }
        )));
    }

    #[test]
    fn test_missing_icon_data_is_error() {
        let root = Uuid::new_v4();
        let meta = format!("<CustomIcons><Icon><UUID>{}</UUID></Icon></CustomIcons>", b64_uuid(&root));
        let err = decode(&root_only(&root, "", &meta), ParseMode::Lenient).unwrap_err();
        assert_eq!(err.to_string(), "Content error: Missing icon uuid or data");
    }

    #[test]
    fn test_group_icon_rules() {
        let root = Uuid::new_v4();
        let (vault, diagnostics) =
            decode(&root_only(&root, "<IconID>500</IconID>", ""), ParseMode::Strict).unwrap();
        assert_eq!(vault.root_group().unwrap().icon_number(), 68);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::IconIdClamped { icon_id: 500, clamped_to: 68 })));

        let (vault, _) =
            decode(&root_only(&root, "<IconID>-3</IconID>", ""), ParseMode::Lenient).unwrap();
        assert_eq!(vault.root_group().unwrap().icon_number(), 0);

        let err = decode(&root_only(&root, "<IconID>-3</IconID>", ""), ParseMode::Strict).unwrap_err();
        assert_eq!(err.to_string(), "Content error: Invalid group icon number");
    }

    #[test]
    fn test_tri_state_flags() {
        let root = Uuid::new_v4();
        let body = "<EnableAutoType>false</EnableAutoType><EnableSearching>NULL</EnableSearching>";
        let (vault, _) = decode(&root_only(&root, body, ""), ParseMode::Strict).unwrap();
        let group = vault.root_group().unwrap();
        assert_eq!(group.auto_type, crate::group::TriState::Disable);
        assert_eq!(group.searching, crate::group::TriState::Inherit);

        let err = decode(
            &root_only(&root, "<EnableAutoType>sometimes</EnableAutoType>", ""),
            ParseMode::Lenient,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Content error: Invalid EnableAutoType value");
    }

    #[test]
    fn test_deleted_objects() {
        let root = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let deleted = format!(
            "<DeletedObjects>\
               <DeletedObject><UUID>{}</UUID><DeletionTime>2020-01-01T00:00:00Z</DeletionTime></DeletedObject>\
               <DeletedObject><UUID></UUID><DeletionTime>2020-01-01T00:00:00Z</DeletionTime></DeletedObject>\
               <DeletedObject><DeletionTime>2020-01-01T00:00:00Z</DeletionTime></DeletedObject>\
             </DeletedObjects>",
            b64_uuid(&gone)
        );
        let xml = format!(
            "<KeePassFile><Root><Group><UUID>{}</UUID></Group>{deleted}</Root></KeePassFile>",
            b64_uuid(&root)
        );

        let (vault, _) = decode(&xml, ParseMode::Lenient).unwrap();
        assert_eq!(vault.deleted_objects.len(), 1);
        assert_eq!(vault.deleted_objects[0].uuid, gone);

        let err = decode(&xml, ParseMode::Strict).unwrap_err();
        assert_eq!(err.to_string(), "Content error: Null DeleteObject uuid");
    }

    #[test]
    fn test_protected_value_without_cipher_is_crypto_error() {
        let root = Uuid::new_v4();
        let entry = Uuid::new_v4();
        let body = format!(
            "<Entry><UUID>{}</UUID><String><Key>Password</Key><Value Protected=\"True\">AAAA</Value></String></Entry>",
            b64_uuid(&entry)
        );
        let err = decode(&root_only(&root, &body, ""), ParseMode::Lenient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_entry_string_missing_value() {
        let root = Uuid::new_v4();
        let entry = Uuid::new_v4();
        let body = format!(
            "<Entry><UUID>{}</UUID><String><Key>Title</Key></String></Entry>",
            b64_uuid(&entry)
        );
        let err = decode(&root_only(&root, &body, ""), ParseMode::Lenient).unwrap_err();
        assert_eq!(err.to_string(), "Content error: Entry string key or value missing");
    }

    #[test]
    fn test_self_containing_group_is_rejected() {
        let root = Uuid::new_v4();
        let body = format!("<Group><UUID>{}</UUID></Group>", b64_uuid(&root));
        let err = decode(&root_only(&root, &body, ""), ParseMode::Lenient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Content);
    }

    #[test]
    fn test_decoder_reuse_resets_state() {
        let root = Uuid::new_v4();
        let mut decoder = VaultDecoder::new(DecoderConfig::lenient());
        let mut vault = Vault::new();

        let noisy = root_only(&root, "<Unknown/>", "<HeaderHash>AQID</HeaderHash>");
        decoder.decode(noisy.as_bytes(), &mut vault, None).unwrap();
        assert_eq!(decoder.diagnostics().len(), 1);

        let clean = root_only(&root, "", "");
        decoder.decode(clean.as_bytes(), &mut vault, None).unwrap();
        assert!(decoder.diagnostics().is_empty());
        assert!(decoder.header_hash().is_empty());
        assert_eq!(vault.group_count(), 1);
    }
}

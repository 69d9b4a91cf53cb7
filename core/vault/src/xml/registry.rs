//! UUID-keyed get-or-create registry of canonical groups and entries.

use std::collections::HashMap;
use uuid::Uuid;

use super::diagnostics::{Diagnostic, Diagnostics};
use crate::entry::Entry;
use crate::group::Group;
use crate::tree::{EntryId, GroupId, Vault};

/// Hands out one canonical arena slot per UUID.
///
/// The first lookup of an unknown UUID allocates a placeholder under a
/// synthetic parent group. A later definition is merged into that same
/// slot, so ids handed out early stay valid.
pub(crate) struct Registry {
    groups: HashMap<Uuid, GroupId>,
    entries: HashMap<Uuid, EntryId>,
    placeholder_parent: GroupId,
}

impl Registry {
    pub fn new(vault: &mut Vault) -> Self {
        let placeholder_parent = vault.alloc_group(Group::new(Uuid::nil()));
        Self {
            groups: HashMap::new(),
            entries: HashMap::new(),
            placeholder_parent,
        }
    }

    /// Canonical group for `uuid`; `None` for the nil UUID.
    pub fn get_group(&mut self, vault: &mut Vault, uuid: Uuid) -> Option<GroupId> {
        if uuid.is_nil() {
            return None;
        }
        Some(self.group_slot(vault, uuid))
    }

    /// Canonical entry for `uuid`; `None` for the nil UUID.
    pub fn get_entry(&mut self, vault: &mut Vault, uuid: Uuid) -> Option<EntryId> {
        if uuid.is_nil() {
            return None;
        }
        Some(self.entry_slot(vault, uuid))
    }

    /// Copy a freshly parsed group into its canonical slot.
    pub fn merge_group(&mut self, vault: &mut Vault, parsed: Group) -> GroupId {
        let id = self.group_slot(vault, parsed.uuid);
        vault.group_mut(id).copy_data_from(parsed);
        id
    }

    /// Copy a freshly parsed entry into its canonical slot.
    pub fn merge_entry(&mut self, vault: &mut Vault, parsed: Entry) -> EntryId {
        let id = self.entry_slot(vault, parsed.uuid);
        vault.entry_mut(id).copy_data_from(parsed);
        id
    }

    /// Report references that were never defined and hand the index to
    /// the vault.
    pub fn finish(self, vault: &mut Vault, diagnostics: &mut Diagnostics) {
        for &id in vault.child_groups(self.placeholder_parent) {
            diagnostics.push(Diagnostic::UnresolvedGroupReference {
                uuid: vault.group(id).uuid,
            });
        }
        for &id in vault.group_entries(self.placeholder_parent) {
            diagnostics.push(Diagnostic::UnresolvedEntryReference {
                uuid: vault.entry(id).uuid,
            });
        }
        vault.install_index(self.groups, self.entries, self.placeholder_parent);
    }

    fn group_slot(&mut self, vault: &mut Vault, uuid: Uuid) -> GroupId {
        if let Some(&id) = self.groups.get(&uuid) {
            return id;
        }
        let id = vault.alloc_group(Group::new(uuid));
        vault.set_group_parent(id, Some(self.placeholder_parent));
        self.groups.insert(uuid, id);
        id
    }

    fn entry_slot(&mut self, vault: &mut Vault, uuid: Uuid) -> EntryId {
        if let Some(&id) = self.entries.get(&uuid) {
            return id;
        }
        let id = vault.alloc_entry(Entry::new(uuid));
        vault.set_entry_group(id, self.placeholder_parent);
        self.entries.insert(uuid, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_stable() {
        let mut vault = Vault::new();
        let mut registry = Registry::new(&mut vault);
        let uuid = Uuid::new_v4();

        let first = registry.get_group(&mut vault, uuid).unwrap();
        let second = registry.get_group(&mut vault, uuid).unwrap();
        assert_eq!(first, second);
        assert!(registry.get_group(&mut vault, Uuid::nil()).is_none());
        assert!(registry.get_entry(&mut vault, Uuid::nil()).is_none());
    }

    #[test]
    fn test_merge_keeps_placeholder_identity() {
        let mut vault = Vault::new();
        let mut registry = Registry::new(&mut vault);
        let uuid = Uuid::new_v4();

        let early = registry.get_entry(&mut vault, uuid).unwrap();
        let mut parsed = Entry::new(uuid);
        parsed.tags = "work".to_string();
        let merged = registry.merge_entry(&mut vault, parsed);

        assert_eq!(early, merged);
        assert_eq!(vault.entry(early).tags, "work");
    }

    #[test]
    fn test_finish_reports_placeholders() {
        let mut vault = Vault::new();
        let mut registry = Registry::new(&mut vault);
        let dangling = Uuid::new_v4();
        let defined = Uuid::new_v4();

        registry.get_group(&mut vault, dangling);
        let id = registry.get_group(&mut vault, defined).unwrap();
        vault.set_root(id);

        let mut diagnostics = Diagnostics::new();
        registry.finish(&mut vault, &mut diagnostics);

        assert_eq!(
            diagnostics.into_vec(),
            vec![Diagnostic::UnresolvedGroupReference { uuid: dangling }]
        );
        assert_eq!(vault.unresolved_groups().len(), 1);
        assert_eq!(vault.find_group(&defined), Some(id));
    }
}

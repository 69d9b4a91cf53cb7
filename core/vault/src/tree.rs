//! Vault object graph.
//!
//! Groups and entries live in arenas owned by the [`Vault`] and refer to
//! each other by [`GroupId`] / [`EntryId`]. Parent, child and cross
//! references are plain ids, so forward references and back-references never
//! form ownership cycles.

use std::collections::HashMap;
use uuid::Uuid;

use crate::binary_pool::BinaryPool;
use crate::entry::Entry;
use crate::group::Group;
use crate::meta::{DeletedObject, Metadata};

/// Arena index of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) usize);

/// Arena index of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) usize);

/// The decoded credential database.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    /// Database metadata.
    pub metadata: Metadata,
    /// Tombstones of removed objects.
    pub deleted_objects: Vec<DeletedObject>,
    /// Attachment pool as declared by the document.
    pub binaries: BinaryPool,
    groups: Vec<Group>,
    entries: Vec<Entry>,
    root: Option<GroupId>,
    group_index: HashMap<Uuid, GroupId>,
    entry_index: HashMap<Uuid, EntryId>,
    /// Synthetic parent of references that were never defined.
    unresolved: Option<GroupId>,
}

impl Vault {
    /// Create an empty vault with no root group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the root group.
    pub fn root(&self) -> Option<GroupId> {
        self.root
    }

    /// The root group.
    pub fn root_group(&self) -> Option<&Group> {
        self.root.map(|id| self.group(id))
    }

    /// Get a group by id.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this vault.
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    /// Get a mutable group by id.
    pub fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.0]
    }

    /// Get an entry by id.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this vault.
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.0]
    }

    /// Get a mutable entry by id.
    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.0]
    }

    /// Look up a group by UUID.
    pub fn find_group(&self, uuid: &Uuid) -> Option<GroupId> {
        self.group_index.get(uuid).copied()
    }

    /// Look up an entry by UUID.
    pub fn find_entry(&self, uuid: &Uuid) -> Option<EntryId> {
        self.entry_index.get(uuid).copied()
    }

    /// Direct child groups, in document order.
    pub fn child_groups(&self, id: GroupId) -> &[GroupId] {
        &self.groups[id.0].children
    }

    /// Entries directly inside a group, in document order.
    pub fn group_entries(&self, id: GroupId) -> &[EntryId] {
        &self.groups[id.0].entries
    }

    /// All groups reachable from the root, depth-first, root included.
    pub fn groups(&self) -> Vec<GroupId> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_groups(root, &mut out);
        }
        out
    }

    /// Recursively collect groups.
    fn collect_groups(&self, id: GroupId, out: &mut Vec<GroupId>) {
        out.push(id);
        for child in &self.groups[id.0].children {
            self.collect_groups(*child, out);
        }
    }

    /// All entries reachable from the root, depth-first.
    pub fn entries(&self) -> Vec<EntryId> {
        self.groups()
            .into_iter()
            .flat_map(|group| self.groups[group.0].entries.iter().copied())
            .collect()
    }

    /// Count groups in the tree, root included.
    pub fn group_count(&self) -> usize {
        self.groups().len()
    }

    /// Count entries in the tree.
    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    /// Groups that were referenced but never defined.
    pub fn unresolved_groups(&self) -> &[GroupId] {
        match self.unresolved {
            Some(id) => &self.groups[id.0].children,
            None => &[],
        }
    }

    /// Entries that were referenced but never defined.
    pub fn unresolved_entries(&self) -> &[EntryId] {
        match self.unresolved {
            Some(id) => &self.groups[id.0].entries,
            None => &[],
        }
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    pub fn is_same_or_ancestor(&self, ancestor: GroupId, id: GroupId) -> bool {
        let mut current = Some(id);
        while let Some(group) = current {
            if group == ancestor {
                return true;
            }
            current = self.groups[group.0].parent;
        }
        false
    }

    pub(crate) fn alloc_group(&mut self, group: Group) -> GroupId {
        self.groups.push(group);
        GroupId(self.groups.len() - 1)
    }

    pub(crate) fn alloc_entry(&mut self, entry: Entry) -> EntryId {
        self.entries.push(entry);
        EntryId(self.entries.len() - 1)
    }

    /// Move `child` under `parent`, appending it to the parent's children.
    pub(crate) fn set_group_parent(&mut self, child: GroupId, parent: Option<GroupId>) {
        if let Some(old) = self.groups[child.0].parent.take() {
            self.groups[old.0].children.retain(|c| *c != child);
        }
        if let Some(parent) = parent {
            self.groups[parent.0].children.push(child);
        }
        self.groups[child.0].parent = parent;
    }

    /// Move `entry` into `group`, appending it to the group's entries.
    pub(crate) fn set_entry_group(&mut self, entry: EntryId, group: GroupId) {
        if let Some(old) = self.entries[entry.0].group.take() {
            self.groups[old.0].entries.retain(|e| *e != entry);
        }
        self.groups[group.0].entries.push(entry);
        self.entries[entry.0].group = Some(group);
    }

    /// Make `id` the root group, detaching it from any parent.
    pub(crate) fn set_root(&mut self, id: GroupId) {
        self.set_group_parent(id, None);
        self.root = Some(id);
    }

    pub(crate) fn install_index(
        &mut self,
        groups: HashMap<Uuid, GroupId>,
        entries: HashMap<Uuid, EntryId>,
        unresolved: GroupId,
    ) {
        self.group_index = groups;
        self.entry_index = entries;
        self.unresolved = Some(unresolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(vault: &mut Vault, name: &str) -> GroupId {
        let mut g = Group::new(Uuid::new_v4());
        g.name = name.to_string();
        vault.alloc_group(g)
    }

    #[test]
    fn test_empty_vault() {
        let vault = Vault::new();
        assert!(vault.root_group().is_none());
        assert_eq!(vault.group_count(), 0);
        assert_eq!(vault.entry_count(), 0);
        assert!(vault.unresolved_groups().is_empty());
    }

    #[test]
    fn test_nested_structure() {
        let mut vault = Vault::new();
        let root = group(&mut vault, "Root");
        let dir = group(&mut vault, "Email");
        vault.set_root(root);
        vault.set_group_parent(dir, Some(root));

        let entry = vault.alloc_entry(Entry::new(Uuid::new_v4()));
        vault.set_entry_group(entry, dir);

        assert_eq!(vault.groups(), vec![root, dir]);
        assert_eq!(vault.entries(), vec![entry]);
        assert_eq!(vault.group(dir).parent(), Some(root));
        assert_eq!(vault.entry(entry).group(), Some(dir));
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let mut vault = Vault::new();
        let a = group(&mut vault, "a");
        let b = group(&mut vault, "b");
        let child = group(&mut vault, "child");

        vault.set_group_parent(child, Some(a));
        vault.set_group_parent(child, Some(b));

        assert!(vault.child_groups(a).is_empty());
        assert_eq!(vault.child_groups(b), &[child]);

        let entry = vault.alloc_entry(Entry::new(Uuid::new_v4()));
        vault.set_entry_group(entry, a);
        vault.set_entry_group(entry, b);
        assert!(vault.group_entries(a).is_empty());
        assert_eq!(vault.group_entries(b), &[entry]);
    }

    #[test]
    fn test_is_same_or_ancestor() {
        let mut vault = Vault::new();
        let root = group(&mut vault, "root");
        let mid = group(&mut vault, "mid");
        let leaf = group(&mut vault, "leaf");
        vault.set_group_parent(mid, Some(root));
        vault.set_group_parent(leaf, Some(mid));

        assert!(vault.is_same_or_ancestor(root, leaf));
        assert!(vault.is_same_or_ancestor(leaf, leaf));
        assert!(!vault.is_same_or_ancestor(leaf, root));
    }
}

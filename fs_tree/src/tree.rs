//! Entry arena
//!
//! All entries live in one map keyed by [`EntryId`]. Parent and child links
//! are ids into that map, and the root's parent is the root's own id.

use crate::entry::{Entry, EntryContent};
use crate::path::{Component, ParsedPath};
use core_types::{EntryId, Identity};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by tree mutation and path resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// No entry with this name
    #[error("not found: {0}")]
    NotFound(String),

    /// Name already taken in the target directory
    #[error("already exists: {0}")]
    DuplicateName(String),

    /// Traversal or insertion through a file
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Traversal refused by the caller's permission check
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// An id that is not in the arena
    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),
}

/// Arena of entries forming the namespace tree
#[derive(Debug, Clone)]
pub struct EntryTree {
    entries: HashMap<EntryId, Entry>,
    root: EntryId,
    next_id: EntryId,
}

impl EntryTree {
    /// Creates a tree holding only the root directory `/`
    pub fn new(owner: Identity, now: u64) -> Self {
        let root = EntryId::new(1);
        let mut entries = HashMap::new();
        entries.insert(root, Entry::new_directory(root, "/", root, owner, now));

        Self {
            entries,
            root,
            next_id: root.next(),
        }
    }

    /// Id of the root directory
    pub fn root(&self) -> EntryId {
        self.root
    }

    /// Mints a fresh entry id
    pub fn allocate_id(&mut self) -> EntryId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub fn get(&self, id: EntryId) -> Result<&Entry, TreeError> {
        self.entries.get(&id).ok_or(TreeError::UnknownEntry(id))
    }

    pub fn get_mut(&mut self, id: EntryId) -> Result<&mut Entry, TreeError> {
        self.entries.get_mut(&id).ok_or(TreeError::UnknownEntry(id))
    }

    /// Number of live entries, root included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every live entry in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Looks up `name` inside directory `dir`
    pub fn lookup(&self, dir: EntryId, name: &str) -> Result<EntryId, TreeError> {
        let entry = self.get(dir)?;
        if !entry.is_directory() {
            return Err(TreeError::NotADirectory(entry.name.clone()));
        }
        entry
            .child(name)
            .ok_or_else(|| TreeError::NotFound(name.to_string()))
    }

    /// Links `entry` under `parent`
    ///
    /// The entry's `parent` field is overwritten with `parent`.
    pub fn insert(&mut self, parent: EntryId, mut entry: Entry) -> Result<EntryId, TreeError> {
        let id = entry.id;
        let dir = self.get_mut(parent)?;
        let dir_name = dir.name.clone();
        let children = dir
            .children_mut()
            .ok_or(TreeError::NotADirectory(dir_name))?;
        if children.contains_key(&entry.name) {
            return Err(TreeError::DuplicateName(entry.name));
        }
        children.insert(entry.name.clone(), id);

        entry.parent = parent;
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Renames `old` to `new` inside `dir`, re-keying the parent's children
    pub fn rename(&mut self, dir: EntryId, old: &str, new: &str) -> Result<EntryId, TreeError> {
        let id = self.lookup(dir, old)?;
        let children = self
            .get_mut(dir)?
            .children_mut()
            .ok_or_else(|| TreeError::NotADirectory(old.to_string()))?;
        if children.contains_key(new) {
            return Err(TreeError::DuplicateName(new.to_string()));
        }
        children.remove(old);
        children.insert(new.to_string(), id);

        self.get_mut(id)?.name = new.to_string();
        Ok(id)
    }

    /// Ids of `id` and all its descendants, parents before children
    pub fn subtree(&self, id: EntryId) -> Result<Vec<EntryId>, TreeError> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let entry = self.get(current)?;
            order.push(current);
            if let Some(children) = entry.children() {
                // Reverse so the pop order follows name order
                stack.extend(children.values().rev().copied());
            }
        }
        Ok(order)
    }

    /// Every block index referenced by `id` and its descendants
    pub fn subtree_blocks(&self, id: EntryId) -> Result<Vec<u64>, TreeError> {
        let mut blocks = Vec::new();
        for entry_id in self.subtree(id)? {
            blocks.extend_from_slice(self.get(entry_id)?.blocks());
        }
        Ok(blocks)
    }

    /// Unlinks `name` from `dir` and drops its whole subtree from the arena
    ///
    /// Returns the removed entries, deepest first. Blocks referenced by them
    /// are not touched; the caller frees them beforehand.
    pub fn detach(&mut self, dir: EntryId, name: &str) -> Result<Vec<Entry>, TreeError> {
        let id = self.lookup(dir, name)?;
        if id == self.root {
            return Err(TreeError::PermissionDenied("/".to_string()));
        }
        let ids = self.subtree(id)?;

        if let Some(children) = self.get_mut(dir)?.children_mut() {
            children.remove(name);
        }

        let mut removed = Vec::with_capacity(ids.len());
        for entry_id in ids.into_iter().rev() {
            if let Some(entry) = self.entries.remove(&entry_id) {
                removed.push(entry);
            }
        }
        Ok(removed)
    }

    /// Returns true if `ancestor` is `id` or lies on its parent chain
    pub fn is_ancestor(&self, ancestor: EntryId, id: EntryId) -> bool {
        let mut current = id;
        loop {
            if current == ancestor {
                return true;
            }
            match self.entries.get(&current) {
                Some(entry) if entry.parent != current => current = entry.parent,
                _ => return false,
            }
        }
    }

    /// Absolute path of an entry, e.g. `/docs/notes`
    pub fn path_of(&self, id: EntryId) -> Result<String, TreeError> {
        let mut names = Vec::new();
        let mut current = id;
        while current != self.root {
            let entry = self.get(current)?;
            names.push(entry.name.as_str());
            current = entry.parent;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// Total blocks referenced by live files
    pub fn referenced_blocks(&self) -> usize {
        self.entries.values().map(|entry| entry.blocks().len()).sum()
    }

    /// Resolves `path` starting from `start` (or the root if absolute)
    ///
    /// `can_traverse` is asked before entering a directory and before
    /// ascending to a parent; a `false` answer aborts with `PermissionDenied`.
    /// Resolution either reaches the final directory or fails without side
    /// effects.
    pub fn resolve<F>(
        &self,
        start: EntryId,
        path: &ParsedPath<'_>,
        mut can_traverse: F,
    ) -> Result<EntryId, TreeError>
    where
        F: FnMut(&Entry) -> bool,
    {
        let mut current = if path.absolute { self.root } else { start };

        for component in &path.components {
            match component {
                Component::Current => {}
                Component::Parent => {
                    let parent = self.get(current)?.parent;
                    if parent == current {
                        continue;
                    }
                    let parent_entry = self.get(parent)?;
                    if !can_traverse(parent_entry) {
                        return Err(TreeError::PermissionDenied(parent_entry.name.clone()));
                    }
                    current = parent;
                }
                Component::Name(name) => {
                    let child = self.get(self.lookup(current, name)?)?;
                    match child.content() {
                        EntryContent::Directory(_) => {
                            if !can_traverse(child) {
                                return Err(TreeError::PermissionDenied(name.to_string()));
                            }
                            current = child.id;
                        }
                        EntryContent::File { .. } => {
                            return Err(TreeError::NotADirectory(name.to_string()));
                        }
                    }
                }
            }
        }

        Ok(current)
    }
}

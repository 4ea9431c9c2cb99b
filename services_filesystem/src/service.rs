//! Filesystem engine implementation
//!
//! This module provides the engine that implements filesystem operations by
//! combining the block store, the entry tree and the permission policy.
//!
//! Every operation validates first and mutates last. Blocks are allocated
//! and written before any tree change, and released again if a later step
//! fails, so an error never leaves blocks or entries behind.

use crate::config::{ConfigError, EngineConfig};
use crate::operations::{DiskUsage, EntrySummary, FileSystemOperations, OperationError, StatInfo};
use core_types::{EntryId, GroupId, Identity, UserId};
use fs_tree::{Component, Entry, EntryTree, FileKind, ParsedPath, PathResolver, TreeError};
use hal::{BlockDevice, Clock, RamDisk, SystemClock};
use log::{debug, info, warn};
use services_storage::{Access, BlockStore, PermissionPolicy, PermissionTriple};
use std::collections::HashMap;

/// The filesystem engine
///
/// Owns the block store, the entry tree, the current directory and the
/// acting identity of one session.
pub struct FilesystemEngine<D: BlockDevice = RamDisk> {
    store: BlockStore<D>,
    tree: EntryTree,
    cwd: EntryId,
    identity: Identity,
    policy: PermissionPolicy,
    clock: Box<dyn Clock>,
}

impl FilesystemEngine<RamDisk> {
    /// Creates an engine on a RAM disk sized by `config`
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }

    /// Creates an engine on a RAM disk with an explicit clock
    pub fn with_clock(config: EngineConfig, clock: impl Clock + 'static) -> Result<Self, ConfigError> {
        config.validate()?;
        let disk = RamDisk::new(config.block_count, config.block_size);
        Ok(Self::with_device(disk, &config, clock))
    }
}

impl Default for FilesystemEngine<RamDisk> {
    fn default() -> Self {
        Self::with_device(RamDisk::default(), &EngineConfig::default(), SystemClock)
    }
}

impl<D: BlockDevice> FilesystemEngine<D> {
    /// Creates an engine on an existing device
    ///
    /// The device's geometry wins over `block_size` and `block_count` in
    /// `config`; the remaining settings are taken from `config`.
    pub fn with_device(device: D, config: &EngineConfig, clock: impl Clock + 'static) -> Self {
        let identity = config.initial_identity();
        let tree = EntryTree::new(identity, clock.now());
        let store = BlockStore::new(device);

        info!(
            "filesystem ready: {} blocks of {} bytes, superuser bypass {}",
            store.capacity(),
            store.block_size(),
            config.superuser_bypass
        );

        Self {
            cwd: tree.root(),
            store,
            tree,
            identity,
            policy: config.policy(),
            clock: Box::new(clock),
        }
    }

    /// The block store (for inspection)
    pub fn store(&self) -> &BlockStore<D> {
        &self.store
    }

    /// The entry tree (for inspection)
    pub fn tree(&self) -> &EntryTree {
        &self.tree
    }

    /// Mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut D {
        self.store.device_mut()
    }

    pub fn policy(&self) -> PermissionPolicy {
        self.policy
    }

    /// Id of the current directory
    pub fn cwd(&self) -> EntryId {
        self.cwd
    }

    /// Block occupancy snapshot
    pub fn usage(&self) -> DiskUsage {
        DiskUsage {
            block_size: self.store.block_size(),
            total_blocks: self.store.capacity(),
            used_blocks: self.store.used_blocks(),
            free_blocks: self.store.free_blocks(),
        }
    }

    fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Fails with `PermissionDenied` unless the acting identity holds `access`
    fn require(&self, id: EntryId, access: Access) -> Result<(), OperationError> {
        let entry = self.tree.get(id)?;
        if self.policy.check_access(self.identity, entry, access) {
            return Ok(());
        }
        warn!("{} denied {} on {}", self.identity, access, entry.name);
        Err(OperationError::PermissionDenied(entry.name.clone()))
    }

    /// Resolves a directory path with an Execute check per hop
    fn resolve_dir(&self, path: &ParsedPath<'_>) -> Result<EntryId, OperationError> {
        let policy = self.policy;
        let identity = self.identity;
        self.tree
            .resolve(self.cwd, path, |entry| {
                policy.check_access(identity, entry, Access::EXECUTE)
            })
            .map_err(|err| {
                if let TreeError::PermissionDenied(name) = &err {
                    warn!("{} denied traversal into {}", identity, name);
                }
                err.into()
            })
    }

    /// Resolves all but the last component and validates the last as a name
    fn resolve_parent<'p>(&self, path: &'p str) -> Result<(EntryId, &'p str), OperationError> {
        let parsed = PathResolver::parse(path);
        let (dir_path, last) = parsed
            .split_last()
            .ok_or_else(|| OperationError::InvalidName(path.to_string()))?;
        let name = match last {
            Component::Name(name) if PathResolver::is_valid_name(name) => name,
            _ => return Err(OperationError::InvalidName(path.to_string())),
        };
        let dir = self.resolve_dir(&dir_path)?;
        Ok((dir, name))
    }

    /// Resolves a path to its containing directory and the entry it names
    fn resolve_target(&self, path: &str) -> Result<(EntryId, EntryId), OperationError> {
        let (dir, name) = self.resolve_parent(path)?;
        let id = self.tree.lookup(dir, name)?;
        Ok((dir, id))
    }

    /// Frees blocks that are no longer referenced
    ///
    /// The bitmap is always updated; a device error while zeroing is logged.
    fn release(&mut self, blocks: &[u64]) {
        if let Err(err) = self.store.free(blocks) {
            warn!("failed to zero released blocks {:?}: {}", blocks, err);
        }
    }

    /// Allocates blocks for `content` and writes it, releasing them on failure
    fn store_content(&mut self, content: &[u8]) -> Result<Vec<u64>, OperationError> {
        let blocks = self.store.allocate(content.len())?;
        if let Err(err) = self.store.write(&blocks, content) {
            self.release(&blocks);
            return Err(err.into());
        }
        Ok(blocks)
    }

    fn copy_file(
        &mut self,
        src: EntryId,
        dst_dir: EntryId,
        dst_name: &str,
    ) -> Result<EntryId, OperationError> {
        let source = self.tree.get(src)?;
        let kind = source.file_kind().unwrap_or_default();
        let size = source.size;
        let source_blocks = source.blocks().to_vec();

        // A copy holds what read_file returns, so zero bytes are dropped
        let content = self.store.read(&source_blocks, size)?;
        let blocks = self.store_content(&content)?;

        let id = self.tree.allocate_id();
        let entry = Entry::new_file(
            id,
            dst_name,
            kind,
            dst_dir,
            self.identity,
            blocks.clone(),
            content.len(),
            self.now(),
        );
        if let Err(err) = self.tree.insert(dst_dir, entry) {
            self.release(&blocks);
            return Err(err.into());
        }
        Ok(id)
    }

    /// Copies a directory subtree, duplicating every file's content
    fn copy_tree(
        &mut self,
        src: EntryId,
        dst_dir: EntryId,
        dst_name: &str,
    ) -> Result<EntryId, OperationError> {
        let ids = self.tree.subtree(src)?;
        for &id in &ids {
            self.require(id, Access::READ)?;
        }

        let mut staged: HashMap<EntryId, (Vec<u64>, usize)> = HashMap::new();
        for &id in &ids {
            let entry = self.tree.get(id)?;
            if entry.is_directory() {
                continue;
            }
            let source_blocks = entry.blocks().to_vec();
            let size = entry.size;

            let copied = self
                .store
                .read(&source_blocks, size)
                .map_err(OperationError::from)
                .and_then(|content| Ok((self.store_content(&content)?, content.len())));
            match copied {
                Ok(staged_file) => {
                    staged.insert(id, staged_file);
                }
                Err(err) => {
                    for (blocks, _) in staged.values() {
                        self.release(blocks);
                    }
                    return Err(err);
                }
            }
        }

        // Build every entry before linking any of them
        let now = self.now();
        let mut mapping: HashMap<EntryId, EntryId> = HashMap::new();
        let mut copies = Vec::with_capacity(ids.len());
        for &id in &ids {
            let source = self.tree.get(id)?;
            let (parent, name) = if id == src {
                (dst_dir, dst_name.to_string())
            } else {
                let parent = mapping
                    .get(&source.parent)
                    .copied()
                    .ok_or(TreeError::UnknownEntry(source.parent))?;
                (parent, source.name.clone())
            };
            let permissions = source.permissions;
            let kind = source.file_kind();

            let new_id = self.tree.allocate_id();
            let mut entry = match kind {
                None => Entry::new_directory(new_id, name, parent, self.identity, now),
                Some(kind) => {
                    let (blocks, size) = staged.remove(&id).unwrap_or_default();
                    Entry::new_file(new_id, name, kind, parent, self.identity, blocks, size, now)
                }
            };
            entry.permissions = permissions;
            mapping.insert(id, new_id);
            copies.push((parent, entry));
        }

        let root_copy = copies
            .first()
            .map(|(_, entry)| entry.id)
            .ok_or(TreeError::UnknownEntry(src))?;
        for (parent, entry) in copies {
            self.tree.insert(parent, entry)?;
        }
        Ok(root_copy)
    }
}

impl<D: BlockDevice> FileSystemOperations for FilesystemEngine<D> {
    fn create_directory(&mut self, path: &str) -> Result<EntryId, OperationError> {
        let (parent, name) = self.resolve_parent(path)?;
        if self.tree.get(parent)?.child(name).is_some() {
            return Err(OperationError::DuplicateName(name.to_string()));
        }
        self.require(parent, Access::WRITE)?;

        let id = self.tree.allocate_id();
        let entry = Entry::new_directory(id, name, parent, self.identity, self.now());
        self.tree.insert(parent, entry)?;

        debug!("created directory {} ({})", path, id);
        Ok(id)
    }

    fn change_directory(&mut self, path: &str) -> Result<(), OperationError> {
        let target = self.resolve_dir(&PathResolver::parse(path))?;
        self.cwd = target;
        debug!("changed directory to {}", self.current_path());
        Ok(())
    }

    fn list_directory(&self) -> Result<Vec<EntrySummary>, OperationError> {
        self.require(self.cwd, Access::READ)?;

        let dir = self.tree.get(self.cwd)?;
        let mut listing = Vec::with_capacity(dir.child_count());
        if let Some(children) = dir.children() {
            for id in children.values() {
                listing.push(EntrySummary::from(self.tree.get(*id)?));
            }
        }
        Ok(listing)
    }

    fn create_file(&mut self, path: &str, kind: FileKind) -> Result<EntryId, OperationError> {
        let (parent, name) = self.resolve_parent(path)?;
        let now = self.now();

        let existing = self.tree.get(parent)?.child(name);
        if let Some(existing) = existing {
            self.tree.get_mut(existing)?.modified_at = now;
            debug!("touched {} ({})", path, existing);
            return Ok(existing);
        }
        self.require(parent, Access::WRITE)?;

        // An empty file still reserves one block
        let blocks = self.store.allocate(0)?;
        let id = self.tree.allocate_id();
        let entry = Entry::new_file(id, name, kind, parent, self.identity, blocks.clone(), 0, now);
        if let Err(err) = self.tree.insert(parent, entry) {
            self.release(&blocks);
            return Err(err.into());
        }

        debug!("created file {} ({}) in blocks {:?}", path, id, blocks);
        Ok(id)
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> Result<(), OperationError> {
        let (parent, name) = self.resolve_parent(path)?;
        let now = self.now();

        let existing = self.tree.get(parent)?.child(name);
        let Some(id) = existing else {
            self.require(parent, Access::WRITE)?;

            let blocks = self.store_content(content)?;
            let id = self.tree.allocate_id();
            let entry = Entry::new_file(
                id,
                name,
                FileKind::Text,
                parent,
                self.identity,
                blocks.clone(),
                content.len(),
                now,
            );
            if let Err(err) = self.tree.insert(parent, entry) {
                self.release(&blocks);
                return Err(err.into());
            }
            debug!("wrote {} bytes to new file {} ({})", content.len(), path, id);
            return Ok(());
        };

        if self.tree.get(id)?.is_directory() {
            return Err(OperationError::IsADirectory(name.to_string()));
        }
        self.require(id, Access::WRITE)?;

        // New blocks first, so a failed allocation keeps the old content
        let blocks = self.store_content(content)?;
        let entry = self.tree.get_mut(id)?;
        let old = entry.replace_blocks(blocks, content.len()).unwrap_or_default();
        entry.modified_at = now;
        self.release(&old);

        debug!("wrote {} bytes to {} ({})", content.len(), path, id);
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, OperationError> {
        let (_, id) = self.resolve_target(path)?;
        let entry = self.tree.get(id)?;
        if entry.is_directory() {
            return Err(OperationError::IsADirectory(entry.name.clone()));
        }
        self.require(id, Access::READ)?;

        let blocks = entry.blocks().to_vec();
        let size = entry.size;
        let content = self.store.read(&blocks, size)?;

        let now = self.now();
        self.tree.get_mut(id)?.accessed_at = now;
        Ok(content)
    }

    fn remove(&mut self, path: &str, recursive: bool) -> Result<(), OperationError> {
        let (parent, name) = self.resolve_parent(path)?;
        let id = self.tree.lookup(parent, name)?;
        self.require(parent, Access::WRITE)?;

        let entry = self.tree.get(id)?;
        if entry.is_directory() {
            if entry.child_count() > 0 && !recursive {
                return Err(OperationError::DirectoryNotEmpty(name.to_string()));
            }
        } else {
            self.require(id, Access::WRITE)?;
        }

        let blocks = self.tree.subtree_blocks(id)?;
        self.release(&blocks);

        if self.tree.is_ancestor(id, self.cwd) {
            self.cwd = parent;
        }
        let removed = self.tree.detach(parent, name)?;

        debug!(
            "removed {} ({} entries, {} blocks)",
            path,
            removed.len(),
            blocks.len()
        );
        Ok(())
    }

    fn rename(&mut self, path: &str, new_name: &str) -> Result<(), OperationError> {
        let (parent, name) = self.resolve_parent(path)?;
        if !PathResolver::is_valid_name(new_name) {
            return Err(OperationError::InvalidName(new_name.to_string()));
        }
        let id = self.tree.lookup(parent, name)?;
        if self.tree.get(parent)?.child(new_name).is_some() {
            return Err(OperationError::DuplicateName(new_name.to_string()));
        }
        self.require(parent, Access::WRITE)?;
        self.require(id, Access::WRITE)?;

        let now = self.now();
        self.tree.rename(parent, name, new_name)?;
        self.tree.get_mut(id)?.modified_at = now;

        debug!("renamed {} to {}", path, new_name);
        Ok(())
    }

    fn copy(&mut self, src: &str, dst: &str) -> Result<EntryId, OperationError> {
        let (_, src_id) = self.resolve_target(src)?;
        let (dst_dir, dst_name) = self.resolve_parent(dst)?;
        if self.tree.get(dst_dir)?.child(dst_name).is_some() {
            return Err(OperationError::DuplicateName(dst_name.to_string()));
        }
        self.require(src_id, Access::READ)?;
        self.require(dst_dir, Access::WRITE)?;

        let id = if self.tree.get(src_id)?.is_directory() {
            self.copy_tree(src_id, dst_dir, dst_name)?
        } else {
            self.copy_file(src_id, dst_dir, dst_name)?
        };

        debug!("copied {} to {} ({})", src, dst, id);
        Ok(id)
    }

    fn change_mode(&mut self, path: &str, mode: u32) -> Result<(), OperationError> {
        let (_, id) = self.resolve_target(path)?;
        let entry = self.tree.get(id)?;
        if !self.policy.may_change_mode(self.identity, entry) {
            warn!("{} may not change mode of {}", self.identity, entry.name);
            return Err(OperationError::PermissionDenied(entry.name.clone()));
        }

        let permissions = PermissionTriple::from_mode(mode);
        self.tree.get_mut(id)?.permissions = permissions;

        debug!("changed mode of {} to {}", path, permissions);
        Ok(())
    }

    fn file_status(&self, path: &str) -> Result<StatInfo, OperationError> {
        let (_, id) = self.resolve_target(path)?;
        Ok(StatInfo::from(self.tree.get(id)?))
    }

    fn execute(&mut self, path: &str) -> Result<(), OperationError> {
        let (_, id) = self.resolve_target(path)?;
        if self.tree.get(id)?.is_directory() {
            return Err(OperationError::IsADirectory(path.to_string()));
        }
        self.require(id, Access::EXECUTE)?;

        let now = self.now();
        self.tree.get_mut(id)?.accessed_at = now;

        info!("executing {} as {}", path, self.identity);
        Ok(())
    }

    fn set_identity(&mut self, uid: u32, gid: Option<u32>) {
        self.identity.uid = UserId(uid);
        if let Some(gid) = gid {
            self.identity.gid = GroupId(gid);
        }
        debug!("identity switched to {}", self.identity);
    }

    fn current_identity(&self) -> Identity {
        self.identity
    }

    fn current_path(&self) -> String {
        self.tree
            .path_of(self.cwd)
            .unwrap_or_else(|_| "/".to_string())
    }
}

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::entry::{ContentHash, Entry};
use crate::error::{Error, Result};
use crate::header::{Magic, Overrides};
use crate::path;

/// In-memory archive: insertion-ordered entries plus the bookkeeping
/// indices that keep hardlink groups consistent. All mutation goes through
/// [`Archive::insert`] and [`Archive::remove`]; the indices are never
/// exposed raw.
#[derive(Debug, Default, Clone)]
pub struct Archive {
    entries: Vec<Entry>,
    names: HashMap<String, usize>,
    /// ino -> names sharing it, in insertion order.
    inodes: HashMap<u32, Vec<String>>,
    /// payload digest -> name holding the canonical copy.
    hashes: HashMap<ContentHash, String>,
    magic: Magic,
    reproducible: bool,
    absolute: bool,
    overrides: Overrides,
}

/// Where an inserted entry lands relative to the inode index. Decided
/// before any index is touched so a failed insert leaves the archive
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    NewBucket,
    Append { clear_payload: bool },
}

impl Archive {
    pub fn new() -> Archive {
        Archive::default()
    }

    /// Default field overrides applied to every entry this archive
    /// constructs from a path or explicit fields. Entries decoded from the
    /// wire are taken as-is.
    pub fn set_overrides(&mut self, overrides: Overrides) {
        self.overrides = overrides;
    }

    /// Zero mtimes and assign inodes sequentially instead of trusting the
    /// host filesystem, for byte-identical output from equivalent inputs.
    pub fn set_reproducible(&mut self, reproducible: bool) {
        self.reproducible = reproducible;
    }

    pub fn is_reproducible(&self) -> bool {
        self.reproducible
    }

    /// Keep leading slashes in archive names instead of stripping them.
    pub fn set_absolute_names(&mut self, absolute: bool) {
        self.absolute = absolute;
    }

    /// Structure the archive was read with, newc for built archives.
    pub fn magic(&self) -> Magic {
        self.magic
    }

    pub(crate) fn set_magic(&mut self, magic: Magic) {
        self.magic = magic;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.names.get(name).map(|&idx| &self.entries[idx])
    }

    /// Entry names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name())
    }

    /// Entries in insertion order, which is also serialization order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Insert an entry, resolving inode collisions and detecting hardlinks
    /// both by declared inode and by identical content. Fails without
    /// touching the archive.
    pub fn insert(&mut self, mut entry: Entry) -> Result<()> {
        let name = entry.name().to_string();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }
        if self.reproducible {
            let header = entry.header_mut();
            header.ino = 0;
            header.mtime = 0;
        }

        let (mut ino, mut placement) = self.place_by_inode(&entry)?;

        // Content dedup. A fresh payload that byte-matches a known digest
        // is a hardlink discovered across unrelated inodes; an equal digest
        // over different bytes is corruption and aborts before any index
        // changes. Membership declared through a shared inode wins over
        // digest reassignment.
        let hash = entry.hash().copied();
        let mut register_hash = false;
        if let Some(hash) = hash {
            match (placement, self.hashes.get(&hash)) {
                (Placement::NewBucket, Some(holder)) => {
                    let held = &self.entries[self.names[holder]];
                    if held.payload() == entry.payload() {
                        ino = held.header().ino;
                        placement = Placement::Append {
                            clear_payload: true,
                        };
                        tracing::debug!(
                            name,
                            holder = holder.as_str(),
                            ino,
                            "content matches an existing entry, linking"
                        );
                    } else {
                        return Err(Error::HashCollision {
                            existing: holder.clone(),
                            incoming: name,
                        });
                    }
                }
                (Placement::Append { clear_payload: false }, Some(holder)) => {
                    // Adopting the canonical payload of a declared link
                    // group; the digest may already belong elsewhere.
                    let held = &self.entries[self.names[holder]];
                    if held.payload() != entry.payload() {
                        return Err(Error::HashCollision {
                            existing: holder.clone(),
                            incoming: name,
                        });
                    }
                }
                (Placement::Append { clear_payload: true }, _) => {}
                (_, None) => register_hash = true,
            }
        }

        // Validation is done; mutate the indices as a unit.
        entry.header_mut().ino = ino;
        if placement == (Placement::Append { clear_payload: true }) {
            if let Some(file) = entry.as_file_mut() {
                file.take_data();
            }
        }
        if register_hash {
            if let Some(hash) = hash {
                self.hashes.insert(hash, name.clone());
            }
        }

        let bucket = self.inodes.entry(ino).or_default();
        bucket.push(name.clone());
        let siblings = bucket.clone();

        self.names.insert(name, self.entries.len());
        self.entries.push(entry);
        self.set_nlink(&siblings);
        Ok(())
    }

    /// Remove an entry by name, relocating its payload to a surviving
    /// hardlink sibling first so no link group is left without a copy.
    pub fn remove(&mut self, name: &str) -> Result<Entry> {
        let idx = match self.names.get(name) {
            Some(&idx) => idx,
            None => return Err(Error::NotFound(name.to_string())),
        };
        let ino = self.entries[idx].header().ino;
        let removed_hash = self.entries[idx].hash().copied();

        let survivor = self
            .inodes
            .get(&ino)
            .and_then(|bucket| bucket.iter().find(|n| n.as_str() != name))
            .cloned();

        if let Some(survivor) = survivor {
            let data = match self.entries[idx].as_file_mut() {
                Some(file) if !file.data().is_empty() => file.take_data(),
                _ => Vec::new(),
            };
            if !data.is_empty() {
                tracing::debug!(
                    name,
                    to = survivor.as_str(),
                    "relocating payload to surviving hardlink"
                );
                let sidx = self.names[&survivor];
                if let Some(file) = self.entries[sidx].as_file_mut() {
                    file.set_data(data);
                }
                if let Some(hash) = removed_hash {
                    if self.hashes.get(&hash).map(String::as_str) == Some(name) {
                        self.hashes.insert(hash, survivor);
                    }
                }
            }
        } else if let Some(hash) = removed_hash {
            if self.hashes.get(&hash).map(String::as_str) == Some(name) {
                self.hashes.remove(&hash);
            }
        }

        let mut siblings = Vec::new();
        if let Some(bucket) = self.inodes.get_mut(&ino) {
            bucket.retain(|n| n != name);
            if bucket.is_empty() {
                self.inodes.remove(&ino);
            } else {
                siblings = bucket.clone();
            }
        }

        self.names.remove(name);
        let entry = self.entries.remove(idx);
        for v in self.names.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
        self.set_nlink(&siblings);
        Ok(entry)
    }

    /// Fold another archive into this one, entry by entry. Inherits
    /// insert's collision handling and failure modes.
    pub fn merge(&mut self, other: Archive) -> Result<()> {
        for entry in other.entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Snapshot a filesystem path into the archive. The archive name is the
    /// path relative to `relative_to` when given, otherwise the path with
    /// its leading slash stripped.
    pub fn append_path(&mut self, path: &Path, relative_to: Option<&Path>) -> Result<()> {
        let name = path::name_from_path(path, relative_to, self.absolute)?;
        let entry = Entry::from_path(path, name, &self.overrides)?;
        self.insert(entry)
    }

    pub fn append_paths<I, P>(&mut self, paths: I, relative_to: Option<&Path>) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.append_path(path.as_ref(), relative_to)?;
        }
        Ok(())
    }

    pub fn add_symlink(&mut self, name: &str, target: &str) -> Result<()> {
        let name = path::normalize_name(name, self.absolute)?;
        let entry = Entry::symlink(name, target, &self.overrides)?;
        self.insert(entry)
    }

    pub fn add_chardev(&mut self, name: &str, major: u32, minor: u32) -> Result<()> {
        let name = path::normalize_name(name, self.absolute)?;
        let entry = Entry::char_device(name, major, minor, &self.overrides)?;
        self.insert(entry)
    }

    /// Decide which inode bucket an entry joins, without mutating anything.
    fn place_by_inode(&self, entry: &Entry) -> Result<(u32, Placement)> {
        let ino = entry.header().ino;
        let bucket = match self.inodes.get(&ino) {
            Some(bucket) => bucket,
            None => return Ok((ino, Placement::NewBucket)),
        };

        // Only regular files hardlink; a bucket holding anything else can
        // not absorb new members.
        let all_files = bucket
            .iter()
            .all(|n| self.entries[self.names[n]].as_file().is_some());

        if entry.as_file().is_some() && all_files {
            if entry.payload().is_empty() {
                // Wire-declared hardlink with the payload elsewhere.
                return Ok((ino, Placement::Append { clear_payload: false }));
            }
            let canonical = bucket.iter().find_map(|n| {
                let payload = self.entries[self.names[n]].payload();
                if payload.is_empty() {
                    None
                } else {
                    Some(payload)
                }
            });
            match canonical {
                Some(data) if data == entry.payload() => {
                    return Ok((ino, Placement::Append { clear_payload: true }));
                }
                None => {
                    // Payload-last link group on the wire: every sibling so
                    // far was empty, this member carries the data.
                    return Ok((ino, Placement::Append { clear_payload: false }));
                }
                Some(_) => {}
            }
        }

        // Unrelated entry reusing a taken inode; move it to a fresh one.
        let next = self.next_inode()?;
        tracing::debug!(
            name = entry.name(),
            ino,
            reassigned = next,
            "inode collision, reassigning"
        );
        Ok((next, Placement::NewBucket))
    }

    fn next_inode(&self) -> Result<u32> {
        let max = self.inodes.keys().copied().max().unwrap_or(0);
        max.checked_add(1).ok_or(Error::InodeExhausted)
    }

    fn set_nlink(&mut self, siblings: &[String]) {
        let nlink = siblings.len() as u32;
        for name in siblings {
            if let Some(&idx) = self.names.get(name) {
                self.entries[idx].header_mut().nlink = nlink;
            }
        }
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

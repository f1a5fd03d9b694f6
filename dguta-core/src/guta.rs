use std::{collections::BTreeSet, time::SystemTime};

use bincode::{Decode, Encode};
use serde::Serialize;

use crate::{age::AgeBucket, filter::Filter, filetype::FileType};

/// One (group, user, type) aggregate row within a directory. The age bucket
/// is not stored here; it lives in the record key the row was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize)]
pub struct Gut {
    pub gid: u32,
    pub uid: u32,
    pub file_type: FileType,
    pub count: u64,
    pub size: u64,
    /// Oldest access time among aggregated entries; 0 = no valid time seen.
    pub atime: i64,
    /// Newest modify time among aggregated entries; 0 = no valid time seen.
    pub mtime: i64,
}

/// The rows stored for one (directory, age bucket) record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Serialize)]
pub struct Guts(pub Vec<Gut>);

impl Guts {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical row order: (gid, uid, type).
    pub fn sort(&mut self) {
        self.0
            .sort_by_key(|g| (g.gid, g.uid, g.file_type.code()));
    }

    pub fn append(&mut self, other: &mut Guts) {
        self.0.append(&mut other.0);
    }

    /// Sorts and coalesces rows sharing a (gid, uid, type) key by summing
    /// counts and sizes and folding times. Used when the same directory is
    /// present in more than one opened store.
    pub fn merged(mut self) -> Guts {
        self.sort();
        let mut out: Vec<Gut> = Vec::with_capacity(self.0.len());
        for gut in self.0 {
            match out.last_mut() {
                Some(prev)
                    if (prev.gid, prev.uid, prev.file_type)
                        == (gut.gid, gut.uid, gut.file_type) =>
                {
                    prev.count += gut.count;
                    prev.size += gut.size;
                    if gut.atime > 0 && (prev.atime == 0 || gut.atime < prev.atime) {
                        prev.atime = gut.atime;
                    }
                    if gut.mtime > prev.mtime {
                        prev.mtime = gut.mtime;
                    }
                }
                _ => out.push(gut),
            }
        }
        Guts(out)
    }
}

/// The read-side projection of "how much data matching a filter lives under a
/// directory, including descendants". Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirSummary {
    pub dir: String,
    pub count: u64,
    pub size: u64,
    /// Oldest access time seen; 0 if none.
    pub atime: i64,
    /// Newest modify time seen; 0 if none.
    pub mtime: i64,
    pub uids: Vec<u32>,
    pub gids: Vec<u32>,
    pub file_types: Vec<FileType>,
    pub age: AgeBucket,
    /// Most recent modification time among the stores that contributed data;
    /// a "data as-of" timestamp for callers.
    pub modtime: SystemTime,
}

/// Accumulates filtered rows and child summaries into one [`DirSummary`].
#[derive(Debug)]
pub(crate) struct SummaryBuilder {
    count: u64,
    size: u64,
    atime: i64,
    mtime: i64,
    uids: BTreeSet<u32>,
    gids: BTreeSet<u32>,
    file_types: BTreeSet<FileType>,
    modtime: SystemTime,
}

impl SummaryBuilder {
    pub(crate) fn new(modtime: SystemTime) -> Self {
        Self {
            count: 0,
            size: 0,
            atime: 0,
            mtime: 0,
            uids: BTreeSet::new(),
            gids: BTreeSet::new(),
            file_types: BTreeSet::new(),
            modtime,
        }
    }

    pub(crate) fn add_gut(&mut self, gut: &Gut, age: AgeBucket, filter: &Filter) {
        let passes = filter.passes(gut, age);
        if passes.track_type {
            self.file_types.insert(gut.file_type);
        }
        if !passes.count {
            return;
        }
        self.count += gut.count;
        self.size += gut.size;
        self.fold_times(gut.atime, gut.mtime);
        self.uids.insert(gut.uid);
        self.gids.insert(gut.gid);
    }

    pub(crate) fn merge_summary(&mut self, child: &DirSummary) {
        self.count += child.count;
        self.size += child.size;
        self.fold_times(child.atime, child.mtime);
        self.uids.extend(child.uids.iter().copied());
        self.gids.extend(child.gids.iter().copied());
        self.file_types.extend(child.file_types.iter().copied());
        if child.modtime > self.modtime {
            self.modtime = child.modtime;
        }
    }

    fn fold_times(&mut self, atime: i64, mtime: i64) {
        if atime > 0 && (self.atime == 0 || atime < self.atime) {
            self.atime = atime;
        }
        if mtime > self.mtime {
            self.mtime = mtime;
        }
    }

    pub(crate) fn build(self, dir: &str, age: AgeBucket) -> DirSummary {
        DirSummary {
            dir: dir.to_string(),
            count: self.count,
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            uids: self.uids.into_iter().collect(),
            gids: self.gids.into_iter().collect(),
            file_types: self.file_types.into_iter().collect(),
            age,
            modtime: self.modtime,
        }
    }
}

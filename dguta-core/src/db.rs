use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    time::SystemTime,
};

use ahash::AHashSet as HashSet;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    age::AgeBucket,
    encoding::{
        decode_children, decode_guts, encode_children, encode_guts, record_key, split_record_key,
        CHILDREN_BUCKET, GUT_BUCKET,
    },
    error::{Error, Result},
    guta::{Gut, Guts},
    summary::{parent_of, SummaryLine},
};

/// Diagnostic counts from a full sequential scan of both namespaces.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct DbInfo {
    pub num_dirs: u64,
    pub num_dgutas: u64,
    pub num_parents: u64,
    pub num_children: u64,
}

/// Result of looking a directory up across every opened store.
#[derive(Debug)]
pub struct Lookup {
    pub guts: Guts,
    /// How many opened stores had no data for the key. Partial absence is not
    /// an error; only all-absent is [`Error::DirNotFound`].
    pub not_found: usize,
    /// Most recent modification time among the contributing stores.
    pub modtime: SystemTime,
}

struct StoreHandle {
    db: sled::Db,
    guts: sled::Tree,
    children: sled::Tree,
    modtime: SystemTime,
}

/// The embedded store: per-(directory, age) aggregate records in a `gut`
/// tree, a parent-to-children index in a `children` tree.
///
/// One `Db` either writes exactly one freshly created store
/// ([`Db::create`] + [`Db::store`]) or reads any number of previously
/// created stores as a logical union ([`Db::open`]). Store directories are
/// never mutated in place once written; refreshing data means building a new
/// store and swapping at a higher level.
pub struct Db {
    paths: Vec<PathBuf>,
    stores: Vec<StoreHandle>,
    // Directories whose parent-index entry was already written during this
    // store() lifecycle, so a parent spanning batches is not re-appended.
    indexed_dirs: HashSet<String>,
}

// Per-directory accumulation while loading one batch.
struct DirRecord {
    dir: String,
    by_age: Vec<(AgeBucket, Vec<Gut>)>,
}

impl DirRecord {
    fn new(line: SummaryLine) -> Self {
        let mut rec = DirRecord {
            dir: line.dir.clone(),
            by_age: Vec::new(),
        };
        rec.push(line);
        rec
    }

    fn push(&mut self, line: SummaryLine) {
        match self.by_age.iter_mut().find(|(age, _)| *age == line.age) {
            Some((_, guts)) => guts.push(line.gut),
            None => self.by_age.push((line.age, vec![line.gut])),
        }
    }
}

impl Db {
    /// A handle over one or more store directories. Nothing is touched on
    /// disk until [`create`](Db::create) or [`open`](Db::open).
    pub fn new(paths: Vec<PathBuf>) -> Db {
        Db {
            paths,
            stores: Vec::new(),
            indexed_dirs: HashSet::default(),
        }
    }

    /// Initializes an empty store at the first configured path. Fails with
    /// [`Error::AlreadyExists`] if non-empty store files are already present;
    /// an existing store is never silently overwritten.
    pub fn create(&mut self) -> Result<()> {
        let path = self.first_path()?;
        if non_empty_dir(&path) {
            return Err(Error::AlreadyExists { path });
        }
        self.stores.push(open_store(&path, SystemTime::now())?);
        debug!("created store at {}", path.display());
        Ok(())
    }

    /// Streams intermediate-format lines into the created store, committing
    /// every `batch_size` directories. Input must be sorted by directory
    /// (the summariser emits it that way); an out-of-order line is rejected
    /// with a parse error rather than silently replacing a directory's
    /// earlier records. Memory use is O(batch_size).
    ///
    /// For each flushed batch the children index is committed before the
    /// records, so a reader that observes a directory's record can trust the
    /// corresponding index entry exists. A parse error aborts the whole call
    /// before the offending batch is committed.
    pub fn store<R: BufRead>(&mut self, reader: R, batch_size: usize) -> Result<()> {
        if self.stores.is_empty() {
            self.create()?;
        }
        let batch_size = batch_size.max(1);

        let mut batch: Vec<DirRecord> = Vec::with_capacity(batch_size);
        let mut current: Option<DirRecord> = None;
        let mut lineno = 0u64;
        let mut dirs = 0u64;

        for line in reader.lines() {
            lineno += 1;
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let parsed = SummaryLine::parse(&line, lineno)?;
            match current.as_mut() {
                Some(rec) if rec.dir == parsed.dir => rec.push(parsed),
                _ => {
                    if let Some(rec) = current.take() {
                        // Strict order means a directory can never recur, so
                        // no earlier write can be clobbered.
                        if parsed.dir < rec.dir {
                            return Err(Error::Parse {
                                line: lineno,
                                reason: format!(
                                    "input not sorted by directory: {:?} after {:?}",
                                    parsed.dir, rec.dir
                                ),
                            });
                        }
                        batch.push(rec);
                        if batch.len() >= batch_size {
                            dirs += batch.len() as u64;
                            self.commit_batch(&mut batch)?;
                        }
                    }
                    current = Some(DirRecord::new(parsed));
                }
            }
        }
        if let Some(rec) = current.take() {
            batch.push(rec);
        }
        if !batch.is_empty() {
            dirs += batch.len() as u64;
            self.commit_batch(&mut batch)?;
        }

        self.stores[0].db.flush()?;
        debug!("stored {dirs} directories from {lineno} lines");
        Ok(())
    }

    fn commit_batch(&mut self, batch: &mut Vec<DirRecord>) -> Result<()> {
        let Self {
            stores,
            indexed_dirs,
            ..
        } = self;
        let store = &stores[0];

        // New parent -> children additions from this batch.
        let mut additions: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for rec in batch.iter() {
            if !indexed_dirs.insert(rec.dir.clone()) {
                continue;
            }
            if let Some(parent) = parent_of(&rec.dir) {
                additions.entry(parent).or_default().push(rec.dir.clone());
            }
        }

        let mut children_batch = sled::Batch::default();
        for (parent, mut kids) in additions {
            let mut all = match store.children.get(parent.as_bytes())? {
                Some(v) => decode_children(&v)?,
                None => Vec::new(),
            };
            all.append(&mut kids);
            all.sort();
            all.dedup();
            children_batch.insert(parent.as_bytes(), encode_children(&all)?);
        }
        store.children.apply_batch(children_batch)?;

        let mut gut_batch = sled::Batch::default();
        for rec in batch.drain(..) {
            for (age, guts) in rec.by_age {
                let mut guts = Guts(guts);
                guts.sort();
                gut_batch.insert(record_key(&rec.dir, age), encode_guts(&guts)?);
            }
        }
        store.guts.apply_batch(gut_batch)?;
        Ok(())
    }

    /// Opens every configured store path for reading. Fails with
    /// [`Error::NotExists`] if any path is missing or holds no data.
    pub fn open(&mut self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(invalid_input("no store paths configured"));
        }
        for path in self.paths.clone() {
            if !non_empty_dir(&path) {
                return Err(Error::NotExists { path });
            }
            let modtime = dir_modtime(&path);
            self.stores.push(open_store(&path, modtime)?);
        }
        Ok(())
    }

    /// Fetches the directory's rows for the given age bucket across all
    /// opened stores, summing rows that appear in more than one.
    pub fn lookup(&self, dir: &str, age: AgeBucket) -> Result<Lookup> {
        let key = record_key(dir, age);
        let mut guts = Guts::default();
        let mut not_found = 0;
        let mut modtime = SystemTime::UNIX_EPOCH;

        for store in &self.stores {
            match store.guts.get(&key)? {
                Some(v) => {
                    let mut g = decode_guts(&v)?;
                    guts.append(&mut g);
                    if store.modtime > modtime {
                        modtime = store.modtime;
                    }
                }
                None => not_found += 1,
            }
        }

        if not_found == self.stores.len() {
            return Err(Error::DirNotFound {
                dir: dir.to_string(),
            });
        }

        Ok(Lookup {
            guts: guts.merged(),
            not_found,
            modtime,
        })
    }

    /// Sorted, de-duplicated immediate child directories across all opened
    /// stores. Missing index entries simply yield an empty list.
    pub fn children(&self, dir: &str) -> Vec<String> {
        let mut out = Vec::new();
        for store in &self.stores {
            match store.children.get(dir.as_bytes()) {
                Ok(Some(v)) => match decode_children(&v) {
                    Ok(mut kids) => out.append(&mut kids),
                    Err(e) => warn!("{dir}: corrupt children entry: {e}"),
                },
                Ok(None) => {}
                Err(e) => warn!("{dir}: children read failed: {e}"),
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Full-scan diagnostic counts over both namespaces of every store.
    pub fn info(&self) -> Result<DbInfo> {
        let mut info = DbInfo::default();
        for store in &self.stores {
            for kv in store.guts.iter() {
                let (k, v) = kv?;
                let (_, age) = split_record_key(&k)?;
                if age == AgeBucket::All {
                    info.num_dirs += 1;
                }
                info.num_dgutas += decode_guts(&v)?.0.len() as u64;
            }
            for kv in store.children.iter() {
                let (_, v) = kv?;
                info.num_parents += 1;
                info.num_children += decode_children(&v)?.len() as u64;
            }
        }
        Ok(info)
    }

    pub fn num_stores(&self) -> usize {
        self.stores.len()
    }

    /// Flushes and releases every opened store, attempting all of them even
    /// if one fails and returning the collected failures.
    pub fn close(&mut self) -> Result<()> {
        let mut errs = Vec::new();
        for store in self.stores.drain(..) {
            if let Err(e) = store.db.flush() {
                errs.push(Error::Db(e));
            }
        }
        self.indexed_dirs.clear();
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(Error::CloseAll(errs)),
        }
    }

    fn first_path(&self) -> Result<PathBuf> {
        self.paths
            .first()
            .cloned()
            .ok_or_else(|| invalid_input("no store paths configured"))
    }
}

fn open_store(path: &Path, modtime: SystemTime) -> Result<StoreHandle> {
    let db = sled::open(path)?;
    let guts = db.open_tree(GUT_BUCKET)?;
    let children = db.open_tree(CHILDREN_BUCKET)?;
    Ok(StoreHandle {
        db,
        guts,
        children,
        modtime,
    })
}

fn non_empty_dir(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => false,
    }
}

// Newest modification time among the store's files; the "data as-of"
// timestamp surfaced in summaries.
fn dir_modtime(path: &Path) -> SystemTime {
    let own = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let Ok(entries) = fs::read_dir(path) else {
        return own;
    };
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok()?.modified().ok())
        .fold(own, |acc, t| if t > acc { t } else { acc })
}

fn invalid_input(msg: &str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidInput, msg))
}

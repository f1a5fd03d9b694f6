use std::io::Write;

use ahash::AHashMap as HashMap;

use crate::{
    age::{buckets_for, AgeBucket},
    error::{Error, Result},
    filetype::{infer_file_type, is_temp, FileType},
    guta::Gut,
};

/// One stat event from the collection stage. The core never touches the
/// filesystem itself; callers either fill `file_type` via
/// [`infer_file_type`]/[`is_temp`] semantics (done internally here) or feed
/// lines through [`parse_stat_line`].
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub is_dir: bool,
}

type AggKey = (u32, u32, FileType, AgeBucket);

#[derive(Debug, Clone, Copy)]
struct Agg {
    count: u64,
    size: u64,
    atime: i64,
    mtime: i64,
}

/// Aggregates stat events into per-directory (gid, uid, type, age) rows.
///
/// Each entry is attributed to its immediate parent directory only; nested
/// totals are computed at query time by [`crate::tree::Tree`]. Directories
/// themselves become a [`FileType::Dir`] row inside their parent.
pub struct Summariser {
    ref_time: i64,
    dirs: HashMap<String, HashMap<AggKey, Agg>>,
}

impl Summariser {
    /// `ref_time` is the epoch-seconds "now" that age bucketing is relative
    /// to; passing it in keeps aggregation deterministic and test-friendly.
    pub fn new(ref_time: i64) -> Self {
        Self {
            ref_time,
            dirs: HashMap::default(),
        }
    }

    pub fn add(&mut self, info: &FileInfo) -> Result<()> {
        if !info.path.starts_with('/') || info.path.len() < 2 && !info.is_dir {
            return Err(Error::Parse {
                line: 0,
                reason: format!("not an absolute path: {:?}", info.path),
            });
        }

        // The root itself has no parent to be recorded in.
        let Some(dir) = parent_of(&info.path) else {
            return Ok(());
        };
        let dir = dir.to_string();

        let mut types = [FileType::Other; 2];
        let types = if info.is_dir {
            types[0] = FileType::Dir;
            &types[..1]
        } else if is_temp(&info.path) {
            types[0] = FileType::Temp;
            types[1] = infer_file_type(&info.path);
            &types[..2]
        } else {
            types[0] = infer_file_type(&info.path);
            &types[..1]
        };

        let ages = buckets_for(info.atime, info.mtime, self.ref_time);
        let by_key = self.dirs.entry(dir).or_default();
        for &ft in types {
            for &age in &ages {
                let agg = by_key.entry((info.gid, info.uid, ft, age)).or_insert(Agg {
                    count: 0,
                    size: 0,
                    atime: 0,
                    mtime: 0,
                });
                agg.count += 1;
                agg.size += info.size;
                if info.atime > 0 && (agg.atime == 0 || info.atime < agg.atime) {
                    agg.atime = info.atime;
                }
                if info.mtime > agg.mtime {
                    agg.mtime = info.mtime;
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Writes the intermediate line format: one tab-separated line per
    /// (directory, gid, uid, type, age) row, sorted by directory and then row
    /// key, so output is deterministic and ready for batch loading.
    pub fn output<W: Write>(&self, mut w: W) -> Result<()> {
        let mut dirs: Vec<&String> = self.dirs.keys().collect();
        dirs.sort();
        for dir in dirs {
            let by_key = &self.dirs[dir];
            let mut keys: Vec<&AggKey> = by_key.keys().collect();
            keys.sort_by_key(|(gid, uid, ft, age)| (*gid, *uid, ft.code(), age.code()));
            for key in keys {
                let (gid, uid, ft, age) = key;
                let a = &by_key[key];
                writeln!(
                    w,
                    "{dir}\t{gid}\t{uid}\t{}\t{}\t{}\t{}\t{}\t{}",
                    ft.code(),
                    age.code(),
                    a.count,
                    a.size,
                    a.atime,
                    a.mtime
                )?;
            }
        }
        Ok(())
    }
}

/// Parses a raw stat-collector line:
/// `path\tsize\tuid\tgid\tatime\tmtime\tis_dir` with is_dir as 0/1.
pub fn parse_stat_line(line: &str, lineno: u64) -> Result<FileInfo> {
    let mut fields = line.split('\t');
    let mut next = |what: &str| {
        fields.next().ok_or_else(|| Error::Parse {
            line: lineno,
            reason: format!("missing field: {what}"),
        })
    };

    let path = next("path")?.to_string();
    let size = parse_num(next("size")?, "size", lineno)?;
    let uid = parse_num(next("uid")?, "uid", lineno)?;
    let gid = parse_num(next("gid")?, "gid", lineno)?;
    let atime = parse_num(next("atime")?, "atime", lineno)?;
    let mtime = parse_num(next("mtime")?, "mtime", lineno)?;
    let is_dir = match next("is_dir")? {
        "0" => false,
        "1" => true,
        other => {
            return Err(Error::Parse {
                line: lineno,
                reason: format!("bad is_dir flag: {other:?}"),
            })
        }
    };

    Ok(FileInfo {
        path,
        size,
        uid,
        gid,
        atime,
        mtime,
        is_dir,
    })
}

/// One parsed intermediate-format line.
#[derive(Debug, Clone)]
pub struct SummaryLine {
    pub dir: String,
    pub age: AgeBucket,
    pub gut: Gut,
}

impl SummaryLine {
    pub fn parse(line: &str, lineno: u64) -> Result<SummaryLine> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 9 {
            return Err(Error::Parse {
                line: lineno,
                reason: format!("expected 9 fields, got {}", fields.len()),
            });
        }

        let dir = fields[0].to_string();
        if !dir.starts_with('/') {
            return Err(Error::Parse {
                line: lineno,
                reason: format!("not an absolute directory: {dir:?}"),
            });
        }
        let gid = parse_num(fields[1], "gid", lineno)?;
        let uid = parse_num(fields[2], "uid", lineno)?;
        let ft_code: u8 = parse_num(fields[3], "file type", lineno)?;
        let file_type = FileType::from_code(ft_code).ok_or_else(|| Error::Parse {
            line: lineno,
            reason: format!("bad file type code: {ft_code}"),
        })?;
        let age_code: u8 = parse_num(fields[4], "age", lineno)?;
        let age = AgeBucket::from_code(age_code).ok_or_else(|| Error::Parse {
            line: lineno,
            reason: format!("bad age bucket code: {age_code}"),
        })?;
        let count = parse_num(fields[5], "count", lineno)?;
        let size = parse_num(fields[6], "size", lineno)?;
        let atime = parse_num(fields[7], "atime", lineno)?;
        let mtime = parse_num(fields[8], "mtime", lineno)?;

        Ok(SummaryLine {
            dir,
            age,
            gut: Gut {
                gid,
                uid,
                file_type,
                count,
                size,
                atime,
                mtime,
            },
        })
    }
}

fn parse_num<T: std::str::FromStr>(s: &str, what: &str, lineno: u64) -> Result<T> {
    s.parse().map_err(|_| Error::Parse {
        line: lineno,
        reason: format!("bad {what}: {s:?}"),
    })
}

/// Parent directory of an absolute path; `None` for the root.
pub(crate) fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        Some("/")
    } else {
        Some(&trimmed[..idx])
    }
}

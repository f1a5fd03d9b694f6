//! Directory/Group/User/Type/Age (DGUTA) disk-usage aggregation and query.
//!
//! Stat records from an external collection stage are summarised in memory
//! per directory ([`Summariser`]), loaded in batches into an embedded
//! key-value store ([`Db`]), and queried hierarchically ([`Tree`]) to answer
//! "where is the data" for arbitrary group/user/type/age filters without
//! re-walking the filesystem.

pub mod age;
pub mod db;
pub mod encoding;
mod error;
pub mod filetype;
pub mod filter;
pub mod guta;
pub mod summary;
pub mod tree;

pub use age::{buckets_for, AgeBucket};
pub use db::{Db, DbInfo, Lookup};
pub use error::{Error, Result};
pub use filetype::{infer_file_type, is_temp, FileType};
pub use filter::{Filter, Passes};
pub use guta::{DirSummary, Gut, Guts};
pub use summary::{parse_stat_line, FileInfo, Summariser, SummaryLine};
pub use tree::{depth_splits, DirInfo, SplitFn, Tree};

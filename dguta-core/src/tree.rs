use std::path::PathBuf;

use serde::Serialize;

use crate::{
    age::AgeBucket,
    db::Db,
    error::Result,
    filter::Filter,
    guta::{DirSummary, SummaryBuilder},
};

/// A directory's own nested summary plus one nested summary per immediate
/// child that has any filtered content.
#[derive(Debug, Clone, Serialize)]
pub struct DirInfo {
    pub current: DirSummary,
    pub children: Vec<DirSummary>,
}

/// Maps a path to its recursion-depth budget for [`Tree::where_is`],
/// letting callers grant particular path patterns deeper descent.
pub type SplitFn<'a> = dyn Fn(&str) -> usize + Sync + 'a;

/// A fixed depth budget regardless of path.
pub fn depth_splits(depth: usize) -> impl Fn(&str) -> usize + Sync {
    move |_| depth
}

/// Read-side query engine over one or more opened stores. All query methods
/// take `&self` and are safe to call from concurrent threads; the `Tree`
/// exclusively owns its [`Db`] and must be closed exactly once.
pub struct Tree {
    db: Db,
}

impl Tree {
    /// Opens the given store directories read-only as a logical union.
    pub fn new(paths: Vec<PathBuf>) -> Result<Tree> {
        let mut db = Db::new(paths);
        db.open()?;
        Ok(Tree { db })
    }

    /// The directory's nested totals and the nested totals of each immediate
    /// child with filtered content. Children with zero passing count are
    /// omitted from the list but still fold into `current`'s type tracking.
    pub fn dir_info(&self, dir: &str, filter: &Filter) -> Result<DirInfo> {
        let mut builder = match self.db.lookup(dir, filter.age) {
            Ok(lookup) => {
                let mut builder = SummaryBuilder::new(lookup.modtime);
                for gut in &lookup.guts.0 {
                    builder.add_gut(gut, filter.age, filter);
                }
                builder
            }
            // An ancestor can hold data for a narrow age bucket only via
            // its descendants; its own record then exists for All but not
            // for the queried bucket. Absent for All too means the
            // directory really is unknown, and that error stands.
            Err(e) if e.is_dir_not_found() => {
                let all = self.db.lookup(dir, AgeBucket::All)?;
                SummaryBuilder::new(all.modtime)
            }
            Err(e) => return Err(e),
        };

        let mut children = Vec::new();
        for child in self.db.children(dir) {
            let summary = self.nested_summary(&child, filter)?;
            builder.merge_summary(&summary);
            if summary.count > 0 {
                children.push(summary);
            }
        }

        Ok(DirInfo {
            current: builder.build(dir, filter.age),
            children,
        })
    }

    /// True if any immediate child has nonzero filtered nested count. Cheaper
    /// than [`dir_info`](Tree::dir_info): counts only, no summaries.
    pub fn dir_has_children(&self, dir: &str, filter: &Filter) -> bool {
        self.db
            .children(dir)
            .iter()
            .any(|child| self.nested_count(child, filter) > 0)
    }

    /// The "base directory" discovery walk. From `dir`, single-child chains
    /// holding 100% of the filtered data are collapsed so results point at
    /// the first directory where data fans out or terminates; the split
    /// function then decides, per path, whether to also descend into each
    /// surviving child. Results are flattened and sorted by size descending,
    /// ties by path ascending.
    pub fn where_is(
        &self,
        dir: &str,
        filter: &Filter,
        splits: &SplitFn<'_>,
    ) -> Result<Vec<DirSummary>> {
        let mut results = self.where_step(dir, filter, splits, 0)?;
        results.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.dir.cmp(&b.dir)));
        Ok(results)
    }

    fn where_step(
        &self,
        dir: &str,
        filter: &Filter,
        splits: &SplitFn<'_>,
        depth: usize,
    ) -> Result<Vec<DirSummary>> {
        let mut di = self.dir_info(dir, filter)?;
        while di.children.len() == 1 && di.current.count == di.children[0].count {
            let only = di.children[0].dir.clone();
            di = self.dir_info(&only, filter)?;
        }

        let mut results = vec![di.current.clone()];
        if splits(&di.current.dir) > depth {
            for child in &di.children {
                results.extend(self.where_step(&child.dir, filter, splits, depth + 1)?);
            }
        }
        Ok(results)
    }

    /// Per branch, the shallowest directory holding filtered files directly
    /// (its count is not fully explained by its children); descent stops
    /// there. Sorted by directory path ascending.
    pub fn file_locations(&self, dir: &str, filter: &Filter) -> Result<Vec<DirSummary>> {
        let mut out = Vec::new();
        self.locate(dir, filter, &mut out)?;
        out.sort_by(|a, b| a.dir.cmp(&b.dir));
        Ok(out)
    }

    fn locate(&self, dir: &str, filter: &Filter, out: &mut Vec<DirSummary>) -> Result<()> {
        let di = self.dir_info(dir, filter)?;
        if di.current.count == 0 {
            return Ok(());
        }
        let from_children: u64 = di.children.iter().map(|c| c.count).sum();
        if from_children < di.current.count {
            out.push(di.current);
            return Ok(());
        }
        for child in &di.children {
            self.locate(&child.dir, filter, out)?;
        }
        Ok(())
    }

    /// Diagnostic counts from the underlying store.
    pub fn info(&self) -> Result<crate::db::DbInfo> {
        self.db.info()
    }

    /// Releases the underlying store.
    pub fn close(&mut self) -> Result<()> {
        self.db.close()
    }

    // Nested summary for dir: its own filtered rows plus every descendant's,
    // computed at read time (stored records are per-level, not cumulative).
    //
    // A directory can hold a record for All but not for a narrower age
    // bucket while a descendant does, so a missing (dir, age) key here means
    // "nothing at this level", not an error; the children index is
    // age-agnostic and descent continues regardless.
    fn nested_summary(&self, dir: &str, filter: &Filter) -> Result<DirSummary> {
        let mut builder = match self.db.lookup(dir, filter.age) {
            Ok(lookup) => {
                let mut builder = SummaryBuilder::new(lookup.modtime);
                for gut in &lookup.guts.0 {
                    builder.add_gut(gut, filter.age, filter);
                }
                builder
            }
            Err(e) if e.is_dir_not_found() => SummaryBuilder::new(std::time::UNIX_EPOCH),
            Err(e) => return Err(e),
        };
        for child in self.db.children(dir) {
            let summary = self.nested_summary(&child, filter)?;
            builder.merge_summary(&summary);
        }
        Ok(builder.build(dir, filter.age))
    }

    fn nested_count(&self, dir: &str, filter: &Filter) -> u64 {
        let mut count: u64 = match self.db.lookup(dir, filter.age) {
            Ok(lookup) => lookup
                .guts
                .0
                .iter()
                .filter(|g| filter.passes(g, filter.age).count)
                .map(|g| g.count)
                .sum(),
            Err(_) => 0,
        };
        for child in self.db.children(dir) {
            count += self.nested_count(&child, filter);
        }
        count
    }
}

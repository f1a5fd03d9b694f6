use serde::{Deserialize, Serialize};

use crate::{age::AgeBucket, filetype::FileType, guta::Gut};

/// Optional predicate over aggregate rows. A `None` dimension accepts
/// everything; the age dimension is always exact (callers wanting "any age"
/// ask for [`AgeBucket::All`], which every entry is stored under).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    pub gids: Option<Vec<u32>>,
    pub uids: Option<Vec<u32>>,
    pub types: Option<Vec<FileType>>,
    pub age: AgeBucket,
}

/// Outcome of applying a [`Filter`] to one row. `count` admits the row into
/// totals; `track_type` admits only its file type into the observed-type set,
/// so temp data can be reported as present without being double-counted.
#[derive(Debug, Clone, Copy)]
pub struct Passes {
    pub count: bool,
    pub track_type: bool,
}

impl Filter {
    pub fn passes(&self, gut: &Gut, age: AgeBucket) -> Passes {
        let ok = age == self.age
            && in_set(&self.gids, gut.gid)
            && in_set(&self.uids, gut.uid)
            && in_set(&self.types, gut.file_type);

        // A temp row duplicates the same bytes filed under the real type, so
        // it only counts when the filter asks for temp and nothing else.
        if gut.file_type == FileType::Temp && !self.is_exactly_temp() {
            return Passes {
                count: false,
                track_type: ok,
            };
        }

        Passes {
            count: ok,
            track_type: ok,
        }
    }

    fn is_exactly_temp(&self) -> bool {
        matches!(self.types.as_deref(), Some([FileType::Temp]))
    }
}

#[inline]
fn in_set<T: PartialEq>(set: &Option<Vec<T>>, value: T) -> bool {
    match set {
        Some(vals) => vals.contains(&value),
        None => true,
    }
}

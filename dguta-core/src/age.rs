use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Closed set of age classifications. `All` receives every entry; the band
/// buckets are cumulative, so an entry whose access (`A*`) or modify (`M*`)
/// age exceeds a bucket's threshold lands in that bucket and every smaller
/// one. Codes are stable on disk (one byte at the end of each record key).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Default,
)]
#[repr(u8)]
pub enum AgeBucket {
    #[default]
    All = 0,
    A1y = 1,
    A2y = 2,
    A3y = 3,
    A5y = 4,
    A7y = 5,
    M1y = 6,
    M2y = 7,
    M3y = 8,
    M5y = 9,
    M7y = 10,
}

pub const NUM_AGE_BUCKETS: usize = 11;

const YEAR_SECS: i64 = 365 * 24 * 60 * 60;

// Single threshold table; adjusting the bands only means editing these rows.
const ATIME_BANDS: [(AgeBucket, i64); 5] = [
    (AgeBucket::A1y, YEAR_SECS),
    (AgeBucket::A2y, 2 * YEAR_SECS),
    (AgeBucket::A3y, 3 * YEAR_SECS),
    (AgeBucket::A5y, 5 * YEAR_SECS),
    (AgeBucket::A7y, 7 * YEAR_SECS),
];

const MTIME_BANDS: [(AgeBucket, i64); 5] = [
    (AgeBucket::M1y, YEAR_SECS),
    (AgeBucket::M2y, 2 * YEAR_SECS),
    (AgeBucket::M3y, 3 * YEAR_SECS),
    (AgeBucket::M5y, 5 * YEAR_SECS),
    (AgeBucket::M7y, 7 * YEAR_SECS),
];

impl AgeBucket {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<AgeBucket> {
        use AgeBucket::*;
        Some(match code {
            0 => All,
            1 => A1y,
            2 => A2y,
            3 => A3y,
            4 => A5y,
            5 => A7y,
            6 => M1y,
            7 => M2y,
            8 => M3y,
            9 => M5y,
            10 => M7y,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use AgeBucket::*;
        match self {
            All => "all",
            A1y => "a1y",
            A2y => "a2y",
            A3y => "a3y",
            A5y => "a5y",
            A7y => "a7y",
            M1y => "m1y",
            M2y => "m2y",
            M3y => "m3y",
            M5y => "m5y",
            M7y => "m7y",
        }
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use AgeBucket::*;
        Ok(match s {
            "all" => All,
            "a1y" => A1y,
            "a2y" => A2y,
            "a3y" => A3y,
            "a5y" => A5y,
            "a7y" => A7y,
            "m1y" => M1y,
            "m2y" => M2y,
            "m3y" => M3y,
            "m5y" => M5y,
            "m7y" => M7y,
            _ => return Err(format!("unknown age bucket: {s}")),
        })
    }
}

/// Every bucket an entry with the given times belongs to, relative to
/// `ref_time`. A zero time is the "no valid time seen" sentinel and opts the
/// entry out of that dimension's bands (it still lands in `All`).
pub fn buckets_for(atime: i64, mtime: i64, ref_time: i64) -> Vec<AgeBucket> {
    let mut out = Vec::with_capacity(NUM_AGE_BUCKETS);
    out.push(AgeBucket::All);
    if atime > 0 {
        let age = ref_time - atime;
        for (bucket, threshold) in ATIME_BANDS {
            if age >= threshold {
                out.push(bucket);
            }
        }
    }
    if mtime > 0 {
        let age = ref_time - mtime;
        for (bucket, threshold) in MTIME_BANDS {
            if age >= threshold {
                out.push(bucket);
            }
        }
    }
    out
}

use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Closed set of file classifications. Codes are stable on disk; new types
/// must only be appended.
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
pub enum FileType {
    #[default]
    Other = 0,
    Temp = 1,
    Vcf = 2,
    VcfGz = 3,
    Bcf = 4,
    Sam = 5,
    Bam = 6,
    Cram = 7,
    Fasta = 8,
    Fastq = 9,
    FastqGz = 10,
    PedBed = 11,
    Compressed = 12,
    Text = 13,
    Log = 14,
    Dir = 15,
}

pub const NUM_FILE_TYPES: usize = 16;

impl FileType {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<FileType> {
        use FileType::*;
        Some(match code {
            0 => Other,
            1 => Temp,
            2 => Vcf,
            3 => VcfGz,
            4 => Bcf,
            5 => Sam,
            6 => Bam,
            7 => Cram,
            8 => Fasta,
            9 => Fastq,
            10 => FastqGz,
            11 => PedBed,
            12 => Compressed,
            13 => Text,
            14 => Log,
            15 => Dir,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use FileType::*;
        match self {
            Other => "other",
            Temp => "temp",
            Vcf => "vcf",
            VcfGz => "vcf.gz",
            Bcf => "bcf",
            Sam => "sam",
            Bam => "bam",
            Cram => "cram",
            Fasta => "fasta",
            Fastq => "fastq",
            FastqGz => "fastq.gz",
            PedBed => "ped/bed",
            Compressed => "compressed",
            Text => "text",
            Log => "log",
            Dir => "dir",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use FileType::*;
        Ok(match s {
            "other" => Other,
            "temp" | "temporary" => Temp,
            "vcf" => Vcf,
            "vcf.gz" => VcfGz,
            "bcf" => Bcf,
            "sam" => Sam,
            "bam" => Bam,
            "cram" => Cram,
            "fasta" => Fasta,
            "fastq" => Fastq,
            "fastq.gz" => FastqGz,
            "ped/bed" => PedBed,
            "compressed" => Compressed,
            "text" => Text,
            "log" => Log,
            "dir" => Dir,
            _ => return Err(format!("unknown file type: {s}")),
        })
    }
}

// Suffix tables checked in order; multi-part extensions before their tails so
// ".vcf.gz" never falls through to "compressed".
const VCF_GZ: &[&str] = &[".vcf.gz"];
const VCF: &[&str] = &[".vcf"];
const BCF: &[&str] = &[".bcf"];
const SAM: &[&str] = &[".sam"];
const BAM: &[&str] = &[".bam"];
const CRAM: &[&str] = &[".cram"];
const FASTA: &[&str] = &[".fasta", ".fa"];
const FASTQ_GZ: &[&str] = &[".fastq.gz", ".fq.gz"];
const FASTQ: &[&str] = &[".fastq", ".fq"];
const PED_BED: &[&str] = &[".ped", ".map", ".bed", ".bim", ".fam"];
const COMPRESSED: &[&str] = &[".bzip2", ".gz", ".tgz", ".zip", ".xz", ".bgz", ".bcf.gz"];
const TEXT: &[&str] = &[".csv", ".tsv", ".txt", ".text", ".md", ".dat", "readme"];
const LOG: &[&str] = &[".log", ".out", ".o", ".err", ".e", ".oe"];

#[inline]
fn has_suffix(name: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| name.ends_with(s))
}

/// Pure classification of a path into the closed type set. Case-insensitive,
/// no filesystem access. Temp-ness is a separate, additive classification;
/// see [`is_temp`].
pub fn infer_file_type(path: &str) -> FileType {
    let name = basename(path).to_ascii_lowercase();

    if has_suffix(&name, VCF_GZ) {
        FileType::VcfGz
    } else if has_suffix(&name, VCF) {
        FileType::Vcf
    } else if has_suffix(&name, BCF) {
        FileType::Bcf
    } else if has_suffix(&name, SAM) {
        FileType::Sam
    } else if has_suffix(&name, BAM) {
        FileType::Bam
    } else if has_suffix(&name, CRAM) {
        FileType::Cram
    } else if has_suffix(&name, FASTA) {
        FileType::Fasta
    } else if has_suffix(&name, FASTQ_GZ) {
        FileType::FastqGz
    } else if has_suffix(&name, FASTQ) {
        FileType::Fastq
    } else if has_suffix(&name, PED_BED) {
        FileType::PedBed
    } else if has_suffix(&name, COMPRESSED) {
        FileType::Compressed
    } else if has_suffix(&name, TEXT) {
        FileType::Text
    } else if has_suffix(&name, LOG) {
        FileType::Log
    } else {
        FileType::Other
    }
}

/// True if the path looks like scratch data: an ancestor directory named
/// tmp/temp, or a tmp-marked basename. A temp file is aggregated under both
/// [`FileType::Temp`] and its inferred type.
pub fn is_temp(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    for comp in lower.split('/') {
        if comp == "tmp" || comp == "temp" {
            return true;
        }
    }
    let base = basename(&lower);
    base.starts_with("tmp.")
        || base.starts_with(".tmp")
        || base.ends_with(".tmp")
        || base.contains(".tmp.")
}

#[inline]
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

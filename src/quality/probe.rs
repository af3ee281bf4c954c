//! Infers the quality encoding of a FASTQ file from the range of quality codes
//! seen in its first records.

use std::path::Path;

use log::debug;
use serde::Serialize;

use super::QualitySystem;
use crate::errors::Result;
use crate::fastq::Reader;

/// Upper bound on the number of records inspected.
pub const PROBE_RECORD_CAP: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub min_char: u8,
    pub max_char: u8,
    pub system: QualitySystem,
    pub records_sampled: usize,
    pub max_len: usize,
}

/// Maps an observed `(min, max)` code range to the most likely encoding.
pub fn classify(min: u8, max: u8) -> QualitySystem {
    if min < b';' {
        if max == b'I' { QualitySystem::Sanger } else { QualitySystem::Illumina18 }
    } else if min < b'@' {
        QualitySystem::Solexa
    } else if min < b'B' {
        QualitySystem::Illumina13
    } else {
        QualitySystem::Illumina15
    }
}

pub fn probe<P: AsRef<Path>>(path: P) -> Result<ProbeReport> {
    probe_with_cap(path, PROBE_RECORD_CAP)
}

pub fn probe_with_cap<P: AsRef<Path>>(path: P, cap: usize) -> Result<ProbeReport> {
    let mut reader = Reader::open(path.as_ref())?;
    let mut min = b'~';
    let mut max = b'!';
    let mut max_len = 0;
    let mut sampled = 0;

    while sampled < cap {
        let Some(rec) = reader.next_record()? else { break };
        if let Some(&lo) = rec.qual.iter().min() {
            min = min.min(lo);
        }
        if let Some(&hi) = rec.qual.iter().max() {
            max = max.max(hi);
        }
        max_len = max_len.max(rec.len());
        sampled += 1;
    }

    let report = ProbeReport { min_char: min, max_char: max, system: classify(min, max), records_sampled: sampled, max_len };
    debug!("probed {}: {:?}", path.as_ref().display(), report);
    Ok(report)
}

pub mod quantile;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::errors::{QcError, Result};
use crate::fastq::FastqRecord;
use crate::filter::FilterOutcome;
use crate::quality::{quality_value, QualitySystem, QUALITY_LEVELS};
use self::quantile::QualitySummary;

/// Columns of `base_info`: A, C, G, T, N for raw reads, then for clean reads.
pub const BASE_COLUMNS: usize = 10;
/// Columns of `filtered_read_info`: the four reasons plus the per-end total.
pub const REASON_COLUMNS: usize = 5;
/// Column of `filtered_read_info` counting ends that tripped at least one check.
pub const FILTERED_TOTAL: usize = 4;

pub const BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    Raw = 0,
    Clean = 1,
}

impl Population {
    /// Row of the raw/clean-split tables for end `end`.
    pub fn row(self, end: usize) -> usize {
        2 * end + self as usize
    }
}

#[inline]
fn base_index(b: u8) -> usize {
    match b {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 4,
    }
}

/// Aggregate counters and histograms for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub n_ends: usize,
    pub max_read_len: usize,
    pub n_total: u64,
    pub n_filtered: u64,
    pub n_clean: u64,
    /// `[2e | 2e+1][len]`, raw then clean; `len` in `0..=max_read_len`.
    pub read_len_info: Vec<Vec<u64>>,
    /// `[e][reason]`, see [`REASON_COLUMNS`].
    pub filtered_read_info: Vec<[u64; REASON_COLUMNS]>,
    /// `[e][pos][base]`, see [`BASE_COLUMNS`].
    pub base_info: Vec<Vec<[u64; BASE_COLUMNS]>>,
    /// `[2e | 2e+1][pos][q]`, raw then clean.
    pub base_quality_info: Vec<Vec<Vec<u64>>>,
}

impl Statistics {
    pub fn new(n_ends: usize, max_read_len: usize) -> Self {
        Self {
            n_ends,
            max_read_len,
            n_total: 0,
            n_filtered: 0,
            n_clean: 0,
            read_len_info: vec![vec![0; max_read_len + 1]; 2 * n_ends],
            filtered_read_info: vec![[0; REASON_COLUMNS]; n_ends],
            base_info: vec![vec![[0; BASE_COLUMNS]; max_read_len]; n_ends],
            base_quality_info: vec![vec![vec![0; QUALITY_LEVELS]; max_read_len]; 2 * n_ends],
        }
    }

    /// Fails without touching any table when a read is longer than the tables allow.
    pub fn check_lengths(&self, records: &[FastqRecord]) -> Result<()> {
        match records.iter().map(FastqRecord::len).find(|&len| len > self.max_read_len) {
            Some(len) => Err(QcError::ReadTooLong { len, max: self.max_read_len }),
            None => Ok(()),
        }
    }

    /// Accounts one record (or pair) and its filter outcome. Quality values are
    /// read in `system`, the encoding of the raw input.
    pub fn record(&mut self, records: &[FastqRecord], outcome: &FilterOutcome, system: QualitySystem) -> Result<()> {
        self.check_lengths(records)?;

        self.n_total += 1;
        let clean = outcome.is_clean();
        if clean { self.n_clean += 1 } else { self.n_filtered += 1 }

        for (end, (rec, verdict)) in records.iter().zip(outcome.ends()).enumerate() {
            for reason in verdict.reasons() {
                self.filtered_read_info[end][reason as usize] += 1;
            }
            if verdict.is_filtered() {
                self.filtered_read_info[end][FILTERED_TOTAL] += 1;
            }

            self.add_read(end, Population::Raw, rec, system);
            if clean {
                self.add_read(end, Population::Clean, rec, system);
            }
        }
        Ok(())
    }

    fn add_read(&mut self, end: usize, population: Population, rec: &FastqRecord, system: QualitySystem) {
        let row = population.row(end);
        let base_offset = population as usize * BASES.len();
        self.read_len_info[row][rec.len()] += 1;

        let bases = &mut self.base_info[end];
        let quals = &mut self.base_quality_info[row];
        for (pos, (&b, &q)) in rec.seq.iter().zip(&rec.qual).enumerate() {
            bases[pos][base_offset + base_index(b)] += 1;
            quals[pos][quality_value(q, system)] += 1;
        }
    }

    /// Element-wise addition of another instance of the same shape.
    pub fn merge(&mut self, other: &Statistics) {
        debug_assert_eq!(self.n_ends, other.n_ends);
        debug_assert_eq!(self.max_read_len, other.max_read_len);

        self.n_total += other.n_total;
        self.n_filtered += other.n_filtered;
        self.n_clean += other.n_clean;
        for (a, b) in self.read_len_info.iter_mut().zip(&other.read_len_info) {
            add_into(a, b);
        }
        for (a, b) in self.filtered_read_info.iter_mut().zip(&other.filtered_read_info) {
            add_into(a, b);
        }
        for (a, b) in self.base_info.iter_mut().zip(&other.base_info) {
            for (x, y) in a.iter_mut().zip(b) {
                add_into(x, y);
            }
        }
        for (a, b) in self.base_quality_info.iter_mut().zip(&other.base_quality_info) {
            for (x, y) in a.iter_mut().zip(b) {
                add_into(x, y);
            }
        }
    }

    /// Per-position quality summaries for one end and population. Positions
    /// past the longest observed read are left out.
    pub fn quality_by_position(&self, end: usize, population: Population) -> Vec<QualitySummary> {
        let rows = &self.base_quality_info[population.row(end)];
        let used = rows.iter().rposition(|h| h.iter().any(|&c| c > 0)).map_or(0, |p| p + 1);
        rows[..used].iter().map(|h| QualitySummary::from_histogram(h)).collect()
    }

    /// Summary over the column totals of every position.
    pub fn overall_quality(&self, end: usize, population: Population) -> QualitySummary {
        let mut totals = vec![0u64; QUALITY_LEVELS];
        for h in &self.base_quality_info[population.row(end)] {
            add_into(&mut totals, h);
        }
        QualitySummary::from_histogram(&totals)
    }

    /// Number of bases of each kind over all positions, in [`BASES`] order.
    pub fn base_totals(&self, end: usize, population: Population) -> [u64; 5] {
        let offset = population as usize * BASES.len();
        let mut totals = [0u64; 5];
        for counts in &self.base_info[end] {
            for (t, c) in totals.iter_mut().zip(&counts[offset..offset + 5]) {
                *t += c;
            }
        }
        totals
    }

    /// Total bases in the population of end `end`.
    pub fn total_bases(&self, end: usize, population: Population) -> u64 {
        self.read_len_info[population.row(end)].iter().enumerate().map(|(len, &n)| len as u64 * n).sum()
    }
}

fn add_into(a: &mut [u64], b: &[u64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

/// The run-wide statistics, shared by every worker. Each worker folds its
/// local instance in once, when its stripe is done.
#[derive(Debug, Clone)]
pub struct SharedStatistics {
    inner: Arc<Mutex<Statistics>>,
}

impl SharedStatistics {
    pub fn new(n_ends: usize, max_read_len: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(Statistics::new(n_ends, max_read_len))) }
    }

    pub fn fold(&self, local: &Statistics) {
        // addition commutes, so a panicked peer's partial fold cannot break the sum
        let mut shared = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        shared.merge(local);
    }

    pub fn snapshot(&self) -> Statistics {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Takes the statistics out, cloning only if another handle is still alive.
    pub fn into_inner(self) -> Statistics {
        match Arc::try_unwrap(self.inner) {
            Ok(m) => m.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => Self { inner: shared }.snapshot(),
        }
    }
}

pub mod adapter;

use serde::Serialize;

use crate::fastq::FastqRecord;
use crate::quality::QualitySystem;
use self::adapter::AdapterIndex;

/// Thresholds a read is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterParams {
    pub max_n_rate: f64,
    pub min_avg_quality: f64,
    pub max_low_quality_rate: f64,
    pub min_base_quality: i32,
    pub raw_system: QualitySystem,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            max_n_rate: 0.05,
            min_avg_quality: 0.0,
            max_low_quality_rate: 0.5,
            min_base_quality: 5,
            raw_system: QualitySystem::Illumina18,
        }
    }
}

/// Why a read was filtered; the discriminant is its column in the per-end
/// reason table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    HighNRate = 0,
    LowAverageQuality = 1,
    HighLowQualityRate = 2,
    Adapter = 3,
}

impl Reason {
    pub const ALL: [Reason; 4] =
        [Reason::HighNRate, Reason::LowAverageQuality, Reason::HighLowQualityRate, Reason::Adapter];
}

/// Checks that fired for one end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadVerdict {
    fired: [bool; 4],
}

impl ReadVerdict {
    pub fn fired(&self, reason: Reason) -> bool {
        self.fired[reason as usize]
    }

    pub fn is_filtered(&self) -> bool {
        self.fired.iter().any(|&f| f)
    }

    pub fn reasons(&self) -> impl Iterator<Item = Reason> + '_ {
        Reason::ALL.into_iter().filter(move |&r| self.fired(r))
    }

    fn set(&mut self, reason: Reason, fired: bool) {
        self.fired[reason as usize] = fired;
    }
}

/// Verdicts for a read or a pair. The record (pair) is filtered when any end is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    ends: [ReadVerdict; 2],
    n_ends: usize,
}

impl FilterOutcome {
    pub fn ends(&self) -> &[ReadVerdict] {
        &self.ends[..self.n_ends]
    }

    pub fn is_filtered(&self) -> bool {
        self.ends().iter().any(ReadVerdict::is_filtered)
    }

    pub fn is_clean(&self) -> bool {
        !self.is_filtered()
    }
}

pub fn n_rate(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let n = seq.iter().filter(|&&b| b == b'N' || b == b'n').count();
    n as f64 / seq.len() as f64
}

pub fn average_quality(qual: &[u8], system: QualitySystem) -> f64 {
    if qual.is_empty() {
        return 0.0;
    }
    let sum: u64 = qual.iter().map(|&b| b as u64).sum();
    sum as f64 / qual.len() as f64 - system.zero_quality() as f64
}

pub fn low_quality_rate(qual: &[u8], system: QualitySystem, threshold: i32) -> f64 {
    if qual.is_empty() {
        return 0.0;
    }
    let zero = system.zero_quality() as i32;
    let low = qual.iter().filter(|&&b| (b as i32) - zero < threshold).count();
    low as f64 / qual.len() as f64
}

pub struct ReadFilter {
    params: FilterParams,
    adapters: Vec<AdapterIndex>,
}

impl ReadFilter {
    /// `adapters` is either empty (no contamination check) or holds one index per end.
    pub fn new(params: FilterParams, adapters: Vec<AdapterIndex>) -> Self {
        Self { params, adapters }
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn check_read(&self, end: usize, rec: &FastqRecord) -> ReadVerdict {
        let p = &self.params;
        let mut v = ReadVerdict::default();
        v.set(Reason::HighNRate, n_rate(&rec.seq) > p.max_n_rate);
        v.set(Reason::LowAverageQuality, average_quality(&rec.qual, p.raw_system) < p.min_avg_quality);
        v.set(
            Reason::HighLowQualityRate,
            low_quality_rate(&rec.qual, p.raw_system, p.min_base_quality) > p.max_low_quality_rate,
        );
        let contaminated = self.adapters.get(end).map_or(false, |index| index.contains(rec.id()));
        v.set(Reason::Adapter, contaminated);
        v
    }

    /// Judges one record (single-end) or one pair; `records[e]` is end `e`.
    pub fn check(&self, records: &[FastqRecord]) -> FilterOutcome {
        debug_assert!(matches!(records.len(), 1 | 2));
        let mut outcome = FilterOutcome { ends: [ReadVerdict::default(); 2], n_ends: records.len() };
        for (end, rec) in records.iter().enumerate() {
            outcome.ends[end] = self.check_read(end, rec);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, seq: &str, qual: &str) -> FastqRecord {
        FastqRecord::new(format!("@{id}").as_bytes(), seq.as_bytes(), b"+", qual.as_bytes())
    }

    fn sanger() -> FilterParams {
        FilterParams { raw_system: QualitySystem::Sanger, ..FilterParams::default() }
    }

    #[test]
    fn test_metrics() {
        assert!((n_rate(b"ACGTN") - 0.2).abs() < 1e-9);
        assert_eq!(n_rate(b""), 0.0);
        // '+' is 10 and '5' is 20 in Sanger
        assert!((average_quality(b"+5", QualitySystem::Sanger) - 15.0).abs() < 1e-9);
        assert!((low_quality_rate(b"+5+5", QualitySystem::Sanger, 15) - 0.5).abs() < 1e-9);
        assert_eq!(low_quality_rate(b"", QualitySystem::Sanger, 15), 0.0);
    }

    #[test]
    fn test_clean_read_passes() {
        let filter = ReadFilter::new(sanger(), Vec::new());
        let outcome = filter.check(&[rec("r1", "ACGTACGTAC", "IIIIIIIIII")]);
        assert!(outcome.is_clean());
        assert_eq!(outcome.ends().len(), 1);
    }

    #[test]
    fn test_high_n_rate() {
        let filter = ReadFilter::new(sanger(), Vec::new());
        let v = filter.check_read(0, &rec("r1", "ACGTNCGTNC", "IIIIIIIIII"));
        assert!(v.fired(Reason::HighNRate));
        assert_eq!(v.reasons().collect::<Vec<_>>(), vec![Reason::HighNRate]);
    }

    #[test]
    fn test_multiple_reasons_fire_together() {
        let params = FilterParams { min_avg_quality: 20.0, ..sanger() };
        let filter = ReadFilter::new(params, Vec::new());
        let v = filter.check_read(0, &rec("r1", "NNNNACGTAC", "##########"));
        assert!(v.fired(Reason::HighNRate));
        assert!(v.fired(Reason::LowAverageQuality));
        assert!(v.fired(Reason::HighLowQualityRate));
        assert!(!v.fired(Reason::Adapter));
    }

    #[test]
    fn test_adapter_check_is_per_end() {
        let mut first = AdapterIndex::default();
        first.insert(b"r1/1");
        let filter = ReadFilter::new(sanger(), vec![first, AdapterIndex::default()]);
        let outcome = filter.check(&[rec("r1/1", "ACGT", "IIII"), rec("r1/2", "ACGT", "IIII")]);
        assert!(outcome.is_filtered());
        assert!(outcome.ends()[0].fired(Reason::Adapter));
        assert!(!outcome.ends()[1].is_filtered());
    }

    #[test]
    fn test_pair_filtered_when_either_end_fails() {
        let params = FilterParams { min_avg_quality: 20.0, ..sanger() };
        let filter = ReadFilter::new(params, Vec::new());
        let outcome = filter.check(&[rec("p/1", "ACGT", "++++"), rec("p/2", "ACGT", "IIII")]);
        assert!(outcome.is_filtered());
        assert!(outcome.ends()[0].fired(Reason::LowAverageQuality));
        assert!(!outcome.ends()[1].fired(Reason::LowAverageQuality));
    }

    #[test]
    fn test_filtering_is_deterministic() {
        let filter = ReadFilter::new(sanger(), Vec::new());
        let r = rec("r1", "ACNTACGTAC", "II#IIII5II");
        assert_eq!(filter.check(&[r.clone()]), filter.check(&[r]));
    }
}

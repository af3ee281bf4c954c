//! Striped multi-threaded FASTQ quality filtering.
//!
//! Reads (or read pairs) are judged against N-rate, average-quality,
//! low-quality-rate and adapter-list checks, written to clean or dropped
//! outputs with optional quality re-encoding, and summarised in per-position
//! length, base and quality histograms.

pub mod config;
pub mod errors;
pub mod fastq;
pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod stats;
pub mod threading;

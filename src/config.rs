use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use log::{info, warn};
use serde::Serialize;

use crate::errors::{QcError, Result};
use crate::filter::FilterParams;
use crate::quality::probe::ProbeReport;
use crate::quality::QualitySystem;

/// Hard cap on worker threads.
pub const MAX_THREADS: usize = 8;
pub const DEFAULT_STRIPE_SIZE: usize = 500_000;

#[derive(Parser, Debug, Clone)]
#[command(name = "fqclean", version, about = "Quality filter and statistics for FASTQ reads")]
pub struct Cli {
    /// Raw FASTQ file(s): one for single-end, two for paired-end
    #[arg(short='f', long="raw_fastq", required=true, num_args=1..=2)]
    pub raw_fastq: Vec<PathBuf>,
    /// Adapter list(s), one per raw FASTQ
    #[arg(short='a', long="adapter", num_args=1..=2)]
    pub adapter: Vec<PathBuf>,
    #[arg(short='O', long="out_dir", required_unless_present="check_quality_system")]
    pub out_dir: Option<PathBuf>,
    #[arg(short='o', long="out_basename", required_unless_present="check_quality_system")]
    pub out_basename: Option<String>,
    /// Directory for per-worker temp files (default: out_dir)
    #[arg(short='T', long="tmp_dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Only report the detected quality system
    #[arg(short='c', long="check_quality_system", action=ArgAction::SetTrue)]
    pub check_quality_system: bool,

    // Filtering
    #[arg(short='l', long="max_read_len", default_value_t=100)]
    pub max_read_len: usize,
    #[arg(short='N', long="base_n_rate", default_value_t=0.05)]
    pub base_n_rate: f64,
    #[arg(short='Q', long="average_quality", default_value_t=0.0)]
    pub average_quality: f64,
    #[arg(short='q', long="per_base_quality", default_value_t=5)]
    pub per_base_quality: i32,
    #[arg(short='r', long="low_quality_rate", default_value_t=0.5)]
    pub low_quality_rate: f64,

    // Quality systems: 0 Sanger, 1 Solexa, 2 Illumina 1.3+, 3 Illumina 1.5+, 4 Illumina 1.8+
    #[arg(short='s', long="raw_quality_system")]
    pub raw_quality_system: Option<u8>,
    /// Trust --raw_quality_system over the detected one
    #[arg(short='p', long="prefer_specified_raw_quality_system", action=ArgAction::SetTrue)]
    pub prefer_specified_raw_quality_system: bool,
    #[arg(short='S', long="clean_quality_system", default_value_t=4)]
    pub clean_quality_system: u8,

    // Threading
    #[arg(short='t', long="thread", default_value_t=8)]
    pub thread: usize,
    /// Records per block handed to each worker in turn
    #[arg(long="stripe_size", default_value_t=DEFAULT_STRIPE_SIZE)]
    pub stripe_size: usize,
    #[arg(short='z', long="compression", default_value_t=4)]
    pub compression: u32,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub raw_fastq: Vec<PathBuf>,
    pub adapters: Vec<PathBuf>,
    pub clean_fastq: Vec<PathBuf>,
    pub dropped_fastq: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub out_basename: String,
    pub tmp_dir: PathBuf,
    pub threads: usize,
    pub stripe_size: usize,
    pub max_read_len: usize,
    pub compression: u32,
    pub params: FilterParams,
    pub clean_system: QualitySystem,
}

/// Clean and dropped output paths: `<base>.clean.fastq.gz` for single-end,
/// `<base>_1.clean.fastq.gz` / `<base>_2...` for paired-end.
pub fn output_paths(out_dir: &Path, basename: &str, n_ends: usize) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let stem = |end: usize| if n_ends == 1 { basename.to_string() } else { format!("{basename}_{}", end + 1) };
    let clean = (0..n_ends).map(|e| out_dir.join(format!("{}.clean.fastq.gz", stem(e)))).collect();
    let dropped = (0..n_ends).map(|e| out_dir.join(format!("{}.dropped.fastq.gz", stem(e)))).collect();
    (clean, dropped)
}

fn missing(parameter: &str) -> QcError {
    QcError::InvalidParameter { parameter: parameter.to_string(), reason: "is required".to_string() }
}

impl RunConfig {
    /// Combines the command line with what the probe saw in the first input.
    pub fn resolve(cli: &Cli, probe: &ProbeReport) -> Result<Self> {
        let out_dir = cli.out_dir.clone().ok_or_else(|| missing("out_dir"))?;
        let out_basename = cli.out_basename.clone().ok_or_else(|| missing("out_basename"))?;
        let (clean_fastq, dropped_fastq) = output_paths(&out_dir, &out_basename, cli.raw_fastq.len());

        let raw_system = if cli.prefer_specified_raw_quality_system {
            let id = cli.raw_quality_system.ok_or_else(|| missing("raw_quality_system"))?;
            let sys = QualitySystem::from_id(id)?;
            warn!("using the specified raw quality system {sys} instead of the detected {}", probe.system);
            sys
        } else {
            info!("treating quality codes as {}", probe.system);
            probe.system
        };
        let clean_system = QualitySystem::from_id(cli.clean_quality_system)?;
        if raw_system == clean_system {
            info!("quality codes stay in {raw_system}");
        } else {
            info!("quality codes will be converted from {raw_system} to {clean_system}");
        }

        let mut max_read_len = cli.max_read_len;
        if probe.max_len > max_read_len {
            warn!("sampled reads are up to {} bases, raising max_read_len from {max_read_len}", probe.max_len);
            max_read_len = probe.max_len;
        }

        let stripe_size = cli.stripe_size;
        let mut threads = if cli.thread == 0 { num_cpus::get() } else { cli.thread };
        if threads > MAX_THREADS {
            warn!("{threads} threads requested, using the maximum of {MAX_THREADS}");
            threads = MAX_THREADS;
        }
        if stripe_size > 0 && probe.records_sampled < stripe_size.saturating_mul(threads) {
            let fitted = (probe.records_sampled / stripe_size).max(1);
            if fitted != threads {
                warn!("{threads} threads are more than {} reads need, using {fitted}", probe.records_sampled);
                threads = fitted;
            }
        }

        let config = Self {
            raw_fastq: cli.raw_fastq.clone(),
            adapters: cli.adapter.clone(),
            clean_fastq,
            dropped_fastq,
            tmp_dir: cli.tmp_dir.clone().unwrap_or_else(|| out_dir.clone()),
            out_dir,
            out_basename,
            threads,
            stripe_size,
            max_read_len,
            compression: cli.compression.min(9),
            params: FilterParams {
                max_n_rate: cli.base_n_rate,
                min_avg_quality: cli.average_quality,
                max_low_quality_rate: cli.low_quality_rate,
                min_base_quality: cli.per_base_quality,
                raw_system,
            },
            clean_system,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks made before any worker starts.
    pub fn validate(&self) -> Result<()> {
        let n_raw = self.raw_fastq.len();
        if !matches!(n_raw, 1 | 2) {
            return Err(QcError::InvalidParameter {
                parameter: "raw_fastq".to_string(),
                reason: format!("expected 1 or 2 files, got {n_raw}"),
            });
        }
        let pairs = [
            ("raw fastq", n_raw, "clean fastq", self.clean_fastq.len()),
            ("raw fastq", n_raw, "dropped fastq", self.dropped_fastq.len()),
            ("clean fastq", self.clean_fastq.len(), "dropped fastq", self.dropped_fastq.len()),
        ];
        for (left, left_count, right, right_count) in pairs {
            if left_count != right_count {
                return Err(QcError::MismatchedInputs { left, left_count, right, right_count });
            }
        }
        if !self.adapters.is_empty() && self.adapters.len() != n_raw {
            return Err(QcError::MismatchedInputs {
                left: "raw fastq",
                left_count: n_raw,
                right: "adapter lists",
                right_count: self.adapters.len(),
            });
        }
        for (name, value) in [("base_n_rate", self.params.max_n_rate), ("low_quality_rate", self.params.max_low_quality_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(QcError::InvalidParameter { parameter: name.to_string(), reason: format!("{value} is not within [0, 1]") });
            }
        }
        if self.threads == 0 || self.stripe_size == 0 {
            return Err(QcError::InvalidParameter {
                parameter: "thread/stripe_size".to_string(),
                reason: "must both be positive".to_string(),
            });
        }
        Ok(())
    }
}

//! Runs a whole filtering job: workers, merge, final statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::info;

use crate::config::RunConfig;
use crate::errors::{QcError, Result};
use crate::filter::adapter::AdapterIndex;
use crate::filter::ReadFilter;
use crate::merge::merge_all;
use crate::stats::{SharedStatistics, Statistics};
use crate::threading::{ScanJob, StripeLayout, StripeWorker, WorkerSummary};

/// Builds the shared job description for `config`, loading adapter lists.
pub fn build_job(config: &RunConfig) -> Result<ScanJob> {
    let adapters = config.adapters.iter().map(AdapterIndex::load).collect::<Result<Vec<_>>>()?;
    Ok(ScanJob {
        inputs: config.raw_fastq.clone(),
        clean_outputs: config.clean_fastq.clone(),
        dropped_outputs: config.dropped_fastq.clone(),
        tmp_dir: config.tmp_dir.clone(),
        filter: ReadFilter::new(config.params, adapters),
        clean_system: config.clean_system,
        max_read_len: config.max_read_len,
        compression: config.compression,
    })
}

/// Scans `job` with `workers` workers and merges their segments.
///
/// The first worker to fail raises a shared abort flag so its peers stop at
/// their next block boundary. The run fails once every worker has been joined
/// and temp segments are left in place.
pub fn run_job(job: ScanJob, workers: usize, stripe_size: usize) -> Result<Statistics> {
    let layouts = (0..workers).map(|i| StripeLayout::new(i, workers, stripe_size)).collect::<Result<Vec<_>>>()?;
    let job = Arc::new(job);
    let shared = SharedStatistics::new(job.n_ends(), job.max_read_len);
    let abort = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = layouts
        .into_iter()
        .map(|layout| {
            let job = job.clone();
            let shared = shared.clone();
            let abort = abort.clone();
            thread::spawn(move || StripeWorker::new(&job, layout).run(&shared, &abort))
        })
        .collect();

    let mut summaries: Vec<WorkerSummary> = Vec::with_capacity(workers);
    let mut first_error = None;
    for (i, h) in handles.into_iter().enumerate() {
        match h.join() {
            Ok(Ok(summary)) => summaries.push(summary),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(_) => {
                abort.store(true, Ordering::Relaxed);
                first_error.get_or_insert(QcError::WorkerPanicked(i));
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    for s in &summaries {
        info!("worker {}: {} processed, {} filtered", s.worker_index, s.processed, s.filtered);
    }

    info!("merging temp files...");
    let outputs: Vec<_> = job.clean_outputs.iter().chain(&job.dropped_outputs).cloned().collect();
    merge_all(&outputs, &job.tmp_dir, workers)?;
    info!("merge completed");

    let stats = shared.into_inner();
    debug_assert_eq!(stats.n_total, stats.n_clean + stats.n_filtered);
    Ok(stats)
}

/// Full run for a resolved configuration.
pub fn run(config: &RunConfig) -> Result<Statistics> {
    let start = Instant::now();
    info!(
        "filtering {} with {} thread(s), stripe size {}",
        config.raw_fastq.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "),
        config.threads,
        config.stripe_size
    );
    let job = build_job(config)?;
    let stats = run_job(job, config.threads, config.stripe_size)?;
    info!(
        "{} reads, {} clean, {} filtered in {:.1}s",
        stats.n_total,
        stats.n_clean,
        stats.n_filtered,
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

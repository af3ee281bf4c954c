//! Block-striped scanning of one record stream by several workers.
//!
//! Every worker opens its own handles on the inputs and walks the whole stream.
//! With stripe size `S` and `W` workers, worker `i` skips the first `i * S`
//! records, then alternates between processing `S` records and skipping the
//! `(W - 1) * S` records owned by its peers. Blocks are therefore dealt out
//! round-robin and every record is handled by exactly one worker, at the cost
//! of each worker decompressing the full input.
//!
//! A worker that fails raises the run's abort flag; its peers check the flag
//! at every block boundary and stop there.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::errors::{QcError, Result};
use crate::fastq::{compression_for, FastqRecord, Reader, Writer};
use crate::filter::ReadFilter;
use crate::quality::{self, QualitySystem};
use crate::stats::{SharedStatistics, Statistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLayout {
    pub worker_index: usize,
    pub worker_count: usize,
    pub stripe_size: usize,
}

impl StripeLayout {
    pub fn new(worker_index: usize, worker_count: usize, stripe_size: usize) -> Result<Self> {
        if worker_count == 0 || stripe_size == 0 {
            return Err(QcError::InvalidParameter {
                parameter: "stripe".to_string(),
                reason: format!("{worker_count} workers with stripe size {stripe_size}"),
            });
        }
        if worker_index >= worker_count {
            return Err(QcError::InvalidParameter {
                parameter: "worker_index".to_string(),
                reason: format!("{worker_index} is not below the worker count {worker_count}"),
            });
        }
        Ok(Self { worker_index, worker_count, stripe_size })
    }

    /// Records in front of this worker's first block.
    pub fn lead(&self) -> usize {
        self.worker_index * self.stripe_size
    }

    /// Records owned by the other workers between two of this worker's blocks.
    pub fn gap(&self) -> usize {
        (self.worker_count - 1) * self.stripe_size
    }

    /// Whether the record at zero-based stream position `index` belongs to this worker.
    pub fn owns(&self, index: usize) -> bool {
        (index / self.stripe_size) % self.worker_count == self.worker_index
    }
}

/// Everything a worker needs, shared read-only by all workers of a run.
pub struct ScanJob {
    /// One input per end.
    pub inputs: Vec<PathBuf>,
    /// Final clean output per end; temp names derive from these.
    pub clean_outputs: Vec<PathBuf>,
    pub dropped_outputs: Vec<PathBuf>,
    pub tmp_dir: PathBuf,
    pub filter: ReadFilter,
    pub clean_system: QualitySystem,
    pub max_read_len: usize,
    pub compression: u32,
}

impl ScanJob {
    pub fn n_ends(&self) -> usize {
        self.inputs.len()
    }

    pub fn raw_system(&self) -> QualitySystem {
        self.filter.params().raw_system
    }
}

/// `<tmp_dir>/<output file name>.<worker_index>.tmp`
pub fn temp_path(tmp_dir: &Path, output: &Path, worker_index: usize) -> PathBuf {
    let name = output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    tmp_dir.join(format!("{name}.{worker_index}.tmp"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_index: usize,
    pub processed: u64,
    pub filtered: u64,
    /// Stopped early because a peer failed; nothing was folded.
    pub aborted: bool,
}

struct EndWriters {
    clean: Writer,
    dropped: Writer,
}

pub struct StripeWorker<'a> {
    job: &'a ScanJob,
    layout: StripeLayout,
}

impl<'a> StripeWorker<'a> {
    pub fn new(job: &'a ScanJob, layout: StripeLayout) -> Self {
        Self { job, layout }
    }

    /// Scans this worker's stripe to the end of input, writes its temp
    /// segments and folds its statistics into `shared`.
    ///
    /// On failure `abort` is raised before the error is returned. When `abort`
    /// is found raised at a block boundary the worker closes its segments and
    /// returns without folding.
    pub fn run(self, shared: &SharedStatistics, abort: &AtomicBool) -> Result<WorkerSummary> {
        let index = self.layout.worker_index;
        let result = self.scan(shared, abort);
        if let Err(e) = &result {
            debug!("worker {index} failed: {e}");
            abort.store(true, Ordering::Relaxed);
        }
        result
    }

    fn scan(&self, shared: &SharedStatistics, abort: &AtomicBool) -> Result<WorkerSummary> {
        let job = self.job;
        let index = self.layout.worker_index;
        let mut readers = job.inputs.iter().map(Reader::open).collect::<Result<Vec<_>>>()?;
        let mut writers = Vec::with_capacity(job.n_ends());
        for end in 0..job.n_ends() {
            writers.push(EndWriters {
                clean: self.temp_writer(&job.clean_outputs[end])?,
                dropped: self.temp_writer(&job.dropped_outputs[end])?,
            });
        }

        let mut local = Statistics::new(job.n_ends(), job.max_read_len);
        let mut summary = WorkerSummary { worker_index: index, ..WorkerSummary::default() };
        debug!("worker {index} starting: {:?}", self.layout);

        let mut more = skip_all(&mut readers, self.layout.lead())?;
        while more {
            if abort.load(Ordering::Relaxed) {
                summary.aborted = true;
                break;
            }
            for _ in 0..self.layout.stripe_size {
                let Some(mut records) = next_all(&mut readers)? else {
                    more = false;
                    break;
                };
                let filtered = self.process(&mut records, &mut local, &mut writers)?;
                summary.processed += 1;
                summary.filtered += filtered as u64;
            }
            if more {
                more = skip_all(&mut readers, self.layout.gap())?;
            }
        }

        for w in writers {
            w.clean.finish()?;
            w.dropped.finish()?;
        }
        if summary.aborted {
            debug!("worker {index} stopped after {} records, a peer failed", summary.processed);
            return Ok(summary);
        }
        shared.fold(&local);
        debug!("worker {index} done: {} processed, {} filtered", summary.processed, summary.filtered);
        Ok(summary)
    }

    fn temp_writer(&self, output: &Path) -> Result<Writer> {
        let path = temp_path(&self.job.tmp_dir, output, self.layout.worker_index);
        Writer::create(path, compression_for(output, self.job.compression))
    }

    fn process(&self, records: &mut [FastqRecord], local: &mut Statistics, writers: &mut [EndWriters]) -> Result<bool> {
        let job = self.job;
        let outcome = job.filter.check(records);
        local.record(records, &outcome, job.raw_system())?;

        let filtered = outcome.is_filtered();
        for (rec, w) in records.iter_mut().zip(writers.iter_mut()) {
            quality::convert(&mut rec.qual, job.raw_system(), job.clean_system);
            let out = if filtered { &mut w.dropped } else { &mut w.clean };
            out.write_record(rec)?;
        }
        Ok(filtered)
    }
}

/// Next record from every end, `None` at a clean end of input.
fn next_all(readers: &mut [Reader]) -> Result<Option<Vec<FastqRecord>>> {
    let mut records = Vec::with_capacity(readers.len());
    for r in readers.iter_mut() {
        if let Some(rec) = r.next_record()? {
            records.push(rec);
        }
    }
    if records.is_empty() {
        Ok(None)
    } else if records.len() == readers.len() {
        Ok(Some(records))
    } else {
        Err(unpaired(readers))
    }
}

/// Skips `n` records on every end; `false` once input is exhausted.
fn skip_all(readers: &mut [Reader], n: usize) -> Result<bool> {
    if n == 0 {
        return Ok(true);
    }
    let mut skipped = Vec::with_capacity(readers.len());
    for r in readers.iter_mut() {
        skipped.push(r.skip_records(n)?);
    }
    if skipped.windows(2).any(|w| w[0] != w[1]) {
        return Err(unpaired(readers));
    }
    Ok(skipped.first().map_or(false, |&s| s == n))
}

fn unpaired(readers: &[Reader]) -> QcError {
    QcError::UnpairedInput {
        first: readers[0].path().to_path_buf(),
        second: readers.last().map(|r| r.path().to_path_buf()).unwrap_or_default(),
    }
}

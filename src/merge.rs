//! Joins the per-worker temp segments of each output file.
//!
//! Segments are appended in worker order, so a merged file holds all of worker
//! 0's blocks, then all of worker 1's, and so on. That is not the order of the
//! input stream once a worker owns more than one block; the layout is kept for
//! compatibility with existing outputs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::{QcError, Result};
use crate::threading::temp_path;

/// Concatenates the `worker_count` segments of `output` in worker order,
/// deleting each segment once it has been copied.
pub fn merge_segments(output: &Path, tmp_dir: &Path, worker_count: usize) -> Result<u64> {
    let mut out = BufWriter::new(File::create(output)?);
    let mut written = 0;
    for index in 0..worker_count {
        let segment = temp_path(tmp_dir, output, index);
        let mut input = File::open(&segment)?;
        written += io::copy(&mut input, &mut out)?;
        drop(input);
        fs::remove_file(&segment)?;
    }
    out.flush()?;
    debug!("merged {worker_count} segments into {} ({written} bytes)", output.display());
    Ok(written)
}

/// Merges every output file, each on its own thread.
pub fn merge_all(outputs: &[PathBuf], tmp_dir: &Path, worker_count: usize) -> Result<()> {
    let results = crossbeam::scope(|scope| {
        let handles: Vec<_> = outputs
            .iter()
            .map(|output| scope.spawn(move |_| merge_segments(output, tmp_dir, worker_count)))
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(i, h)| h.join().unwrap_or(Err(QcError::WorkerPanicked(i))))
            .collect::<Vec<_>>()
    })
    .map_err(|_| QcError::WorkerPanicked(0))?;

    for r in results {
        r?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_concatenates_in_worker_order_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("x.clean.fq");
        for (i, body) in ["a\n", "b\nc\n", ""].iter().enumerate() {
            fs::write(temp_path(dir.path(), &out, i), body).unwrap();
        }
        let n = merge_segments(&out, dir.path(), 3).unwrap();
        assert_eq!(n, 6);
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
        for i in 0..3 {
            assert!(!temp_path(dir.path(), &out, i).exists());
        }
    }

    #[test]
    fn test_merge_all_handles_several_files() {
        let dir = TempDir::new().unwrap();
        let outputs: Vec<PathBuf> = ["p.fq", "q.fq"].iter().map(|n| dir.path().join(n)).collect();
        for out in &outputs {
            for i in 0..2 {
                fs::write(temp_path(dir.path(), out, i), format!("{i}")).unwrap();
            }
        }
        merge_all(&outputs, dir.path(), 2).unwrap();
        for out in &outputs {
            assert_eq!(fs::read_to_string(out).unwrap(), "01");
        }
    }

    #[test]
    fn test_missing_segment_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("x.fq");
        fs::write(temp_path(dir.path(), &out, 0), "a").unwrap();
        assert!(matches!(merge_segments(&out, dir.path(), 2), Err(QcError::Io(_))));
    }
}

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::config::RunConfig;
use crate::filter::Reason;
use crate::quality::probe::ProbeReport;
use crate::stats::quantile::QualitySummary;
use crate::stats::{Population, Statistics, BASES, BASE_COLUMNS, FILTERED_TOTAL};

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 * 100.0 / whole as f64 }
}

fn reason_label(reason: Reason) -> &'static str {
    match reason {
        Reason::HighNRate => "High N rate",
        Reason::LowAverageQuality => "Low average quality",
        Reason::HighLowQualityRate => "High low-quality rate",
        Reason::Adapter => "Adapter",
    }
}

/// Name stem for end `end`: `base` for single-end, `base_1`/`base_2` for pairs.
fn end_stem(basename: &str, stats: &Statistics, end: usize) -> String {
    if stats.n_ends == 1 { basename.to_string() } else { format!("{basename}_{}", end + 1) }
}

pub fn write_summary<W: Write>(w: &mut W, stats: &Statistics) -> io::Result<()> {
    writeln!(w, "#Item\tValue\tPercent")?;
    writeln!(w, "Total reads\t{}\t100.00", stats.n_total)?;
    writeln!(w, "Clean reads\t{}\t{:.2}", stats.n_clean, percent(stats.n_clean, stats.n_total))?;
    writeln!(w, "Filtered reads\t{}\t{:.2}", stats.n_filtered, percent(stats.n_filtered, stats.n_total))?;
    for end in 0..stats.n_ends {
        let counts = &stats.filtered_read_info[end];
        let tag = format!("fastq_{}", end + 1);
        for reason in Reason::ALL {
            let n = counts[reason as usize];
            writeln!(w, "{tag} {}\t{n}\t{:.2}", reason_label(reason), percent(n, stats.n_total))?;
        }
        let n = counts[FILTERED_TOTAL];
        writeln!(w, "{tag} filtered\t{n}\t{:.2}", percent(n, stats.n_total))?;
        writeln!(w, "{tag} raw bases\t{}\t", stats.total_bases(end, Population::Raw))?;
        writeln!(w, "{tag} clean bases\t{}\t", stats.total_bases(end, Population::Clean))?;
    }
    Ok(())
}

/// Per-position base composition (percent) for one end, raw then clean.
pub fn write_base_distribution<W: Write>(w: &mut W, stats: &Statistics, end: usize) -> io::Result<()> {
    write!(w, "#Pos")?;
    for prefix in ["raw", "clean"] {
        for b in BASES {
            write!(w, "\t{prefix}_{}", b as char)?;
        }
    }
    writeln!(w)?;

    for (pos, counts) in stats.base_info[end].iter().enumerate() {
        let raw: u64 = counts[..5].iter().sum();
        if raw == 0 {
            break;
        }
        let clean: u64 = counts[5..].iter().sum();
        write!(w, "{}", pos + 1)?;
        for (i, &c) in counts.iter().enumerate().take(BASE_COLUMNS) {
            let whole = if i < 5 { raw } else { clean };
            write!(w, "\t{:.2}", percent(c, whole))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn write_quality_row<W: Write>(w: &mut W, label: &str, s: &QualitySummary) -> io::Result<()> {
    writeln!(w, "{label}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}", s.total, s.mean, s.q10, s.q25, s.median, s.q75, s.q90)
}

/// Per-position quality mean and quantiles for one end and population,
/// followed by the all-positions row.
pub fn write_quality_distribution<W: Write>(
    w: &mut W,
    stats: &Statistics,
    end: usize,
    population: Population,
) -> io::Result<()> {
    writeln!(w, "#Pos\tCount\tMean\tQ10\tQ25\tMedian\tQ75\tQ90")?;
    for (pos, s) in stats.quality_by_position(end, population).iter().enumerate() {
        write_quality_row(w, &(pos + 1).to_string(), s)?;
    }
    write_quality_row(w, "Total", &stats.overall_quality(end, population))
}

fn create(path: &Path) -> io::Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes every report for a finished run into `out_dir` and returns the paths.
pub fn write_reports(out_dir: &Path, basename: &str, stats: &Statistics) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let path = out_dir.join(format!("{basename}.summary.tsv"));
    let mut f = create(&path)?;
    write_summary(&mut f, stats)?;
    f.flush()?;
    written.push(path);

    for end in 0..stats.n_ends {
        let stem = end_stem(basename, stats, end);

        let path = out_dir.join(format!("{stem}.base_distribution.tsv"));
        let mut f = create(&path)?;
        write_base_distribution(&mut f, stats, end)?;
        f.flush()?;
        written.push(path);

        for (population, tag) in [(Population::Raw, "raw"), (Population::Clean, "clean")] {
            let path = out_dir.join(format!("{stem}.{tag}_quality.tsv"));
            let mut f = create(&path)?;
            write_quality_distribution(&mut f, stats, end, population)?;
            f.flush()?;
            written.push(path);
        }
    }

    let path = out_dir.join(format!("{basename}.stats.json"));
    let mut f = create(&path)?;
    serde_json::to_writer_pretty(&mut f, stats)?;
    f.flush()?;
    written.push(path);

    Ok(written)
}

/// Records what the probe saw and the settings the run resolved to, as
/// `<basename>.config.json`.
pub fn write_config(config: &RunConfig, probe: &ProbeReport) -> io::Result<PathBuf> {
    let path = config.out_dir.join(format!("{}.config.json", config.out_basename));
    let mut f = create(&path)?;
    serde_json::to_writer_pretty(&mut f, &json!({ "probe": probe, "config": config }))?;
    f.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastq::FastqRecord;
    use crate::filter::{FilterParams, ReadFilter};
    use crate::quality::QualitySystem;

    fn stats() -> Statistics {
        let filter = ReadFilter::new(FilterParams { raw_system: QualitySystem::Sanger, ..FilterParams::default() }, Vec::new());
        let mut stats = Statistics::new(1, 6);
        for seq in ["ACGT", "ACNN", "AAAA"] {
            let r = [FastqRecord::new(b"@r", seq.as_bytes(), b"+", b"5555")];
            let outcome = filter.check(&r);
            stats.record(&r, &outcome, QualitySystem::Sanger).unwrap();
        }
        stats
    }

    #[test]
    fn test_summary_lines() {
        let mut out = Vec::new();
        write_summary(&mut out, &stats()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total reads\t3\t100.00"));
        assert!(text.contains("Filtered reads\t1\t33.33"));
        assert!(text.contains("fastq_1 High N rate\t1\t33.33"));
        assert!(text.contains("fastq_1 clean bases\t8\t"));
    }

    #[test]
    fn test_base_distribution_rows() {
        let mut out = Vec::new();
        write_base_distribution(&mut out, &stats(), 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("#Pos\traw_A"));
        assert_eq!(lines[1], "1\t100.00\t0.00\t0.00\t0.00\t0.00\t100.00\t0.00\t0.00\t0.00\t0.00");
    }

    #[test]
    fn test_quality_distribution_has_total_row() {
        let mut out = Vec::new();
        write_quality_distribution(&mut out, &stats(), 0, Population::Clean).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().last().unwrap(), "Total\t8\t20.00\t20\t20\t20\t20\t20");
    }

    #[test]
    fn test_write_reports_creates_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = write_reports(dir.path(), "s", &stats()).unwrap();
        assert_eq!(paths.len(), 5);
        for p in &paths {
            assert!(p.exists(), "{}", p.display());
        }
        let json: serde_json::Value = serde_json::from_reader(File::open(dir.path().join("s.stats.json")).unwrap()).unwrap();
        assert_eq!(json["n_total"], 3);
    }

    #[test]
    fn test_write_config_records_probe_and_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let (clean_fastq, dropped_fastq) = crate::config::output_paths(dir.path(), "s", 1);
        let config = RunConfig {
            raw_fastq: vec![PathBuf::from("r.fq.gz")],
            adapters: Vec::new(),
            clean_fastq,
            dropped_fastq,
            out_dir: dir.path().to_path_buf(),
            out_basename: "s".to_string(),
            tmp_dir: dir.path().to_path_buf(),
            threads: 2,
            stripe_size: 100,
            max_read_len: 150,
            compression: 4,
            params: FilterParams::default(),
            clean_system: QualitySystem::Sanger,
        };
        let probe = ProbeReport {
            min_char: b'#',
            max_char: b'J',
            system: QualitySystem::Illumina18,
            records_sampled: 10,
            max_len: 150,
        };

        let path = write_config(&config, &probe).unwrap();
        assert_eq!(path, dir.path().join("s.config.json"));
        let json: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(json["probe"]["system"], "Illumina18");
        assert_eq!(json["config"]["threads"], 2);
        assert_eq!(json["config"]["params"]["min_base_quality"], 5);
        assert_eq!(json["config"]["clean_system"], "Sanger");
    }
}

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use fqclean::config::{Cli, RunConfig};
use fqclean::quality::probe::{probe, PROBE_RECORD_CAP};
use fqclean::{pipeline, report};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let start = Instant::now();

    let first = &cli.raw_fastq[0];
    let probed = probe(first).with_context(|| format!("failed to probe {}", first.display()))?;
    info!(
        "after checking {} reads (cap {PROBE_RECORD_CAP}), min quality code is '{}' and max is '{}', \
         the quality system is probably {}; the longest read has {} bases",
        probed.records_sampled,
        probed.min_char as char,
        probed.max_char as char,
        probed.system,
        probed.max_len
    );
    if cli.check_quality_system {
        return Ok(());
    }

    let config = RunConfig::resolve(&cli, &probed)?;
    info!("clean reads go to {}", config.clean_fastq.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "));
    info!("dropped reads go to {}", config.dropped_fastq.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "));

    let dumped = report::write_config(&config, &probed)
        .with_context(|| format!("failed to write the run configuration to {}", config.out_dir.display()))?;
    info!("wrote {}", dumped.display());

    let stats = pipeline::run(&config)?;
    let written = report::write_reports(&config.out_dir, &config.out_basename, &stats)
        .with_context(|| format!("failed to write reports to {}", config.out_dir.display()))?;
    for p in written {
        info!("wrote {}", p.display());
    }

    info!("finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

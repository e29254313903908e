use crate::cli::BenchArgs;
use crate::config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use forcecore::engine::progress::ProgressReporter;
use forcecore::workflows::benchmark::{self, BenchmarkReport, StepRecord};
use serde::Serialize;
use std::io;
use tracing::info;

/// One CSV line per (mode, step).
#[derive(Serialize, Debug)]
struct CsvRow {
    mode: String,
    step: u64,
    pair_energy: f64,
    dihedral_energy: f64,
    temperature: f64,
    pressure: f64,
    deviation: f64,
    elapsed_ms: f64,
}

impl From<&StepRecord> for CsvRow {
    fn from(r: &StepRecord) -> Self {
        Self {
            mode: r.mode.to_string(),
            step: r.step,
            pair_energy: r.pair_energy,
            dihedral_energy: r.dihedral_energy,
            temperature: r.temperature,
            pressure: r.pressure,
            deviation: r.deviation,
            elapsed_ms: r.elapsed_ms,
        }
    }
}

pub fn run(args: BenchArgs, threads: Option<usize>) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = config::build_config(&args, threads)?;
    info!(
        "System: {} particles at density {}, {} chains of {}; {} steps in modes {:?}",
        config.system.n_particles,
        config.system.density,
        config.system.n_chains,
        config.system.chain_length,
        config.run.steps,
        config.modes
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting force benchmark...");
    let report = benchmark::run(&config, &reporter)?;
    info!(
        "Workflow finished with {} record(s), max deviation {:e}.",
        report.records.len(),
        report.max_deviation
    );

    print_summary(&report);

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)?;
        write_records(&report.records, file)?;
        println!("Per-step records written to: {}", path.display());
        info!("Wrote {} record(s) to {:?}", report.records.len(), path);
    }
    Ok(())
}

fn print_summary(report: &BenchmarkReport) {
    let block = |b: Option<u32>| b.map_or_else(|| "-".to_string(), |b| b.to_string());
    println!("{:<6} {:>12} {:>16} {:>12}", "mode", "pair block", "dihedral block", "total ms");
    for s in &report.summaries {
        println!(
            "{:<6} {:>12} {:>16} {:>12.3}",
            s.mode.to_string(),
            block(s.pair_block_size),
            block(s.dihedral_block_size),
            s.total_ms
        );
    }
    if report.summaries.len() > 1 {
        println!("Max relative force deviation: {:.3e}", report.max_deviation);
    }
}

fn write_records<W: io::Write>(records: &[StepRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(CsvRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

use clap::{Args, Parser, Subcommand, ValueEnum};
use forcecore::core::forcefield::pair::ShiftMode;
use forcecore::engine::device::ExecutionMode;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The forcecore developers",
    version,
    about = "forcebench - runs the forcecore pair and dihedral engines on a generated system and cross-checks the host and accelerated backends.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log the duration of every compute span when it closes.
    #[arg(long, global = true)]
    pub profile: bool,

    /// Number of worker threads of the accelerated backend.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the force computes over a perturbed system in each execution mode and compare them.
    Bench(BenchArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Cpu,
    Gpu,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Cpu => ExecutionMode::Cpu,
            ModeArg::Gpu => ExecutionMode::Gpu,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftArg {
    NoShift,
    Shift,
    Xplor,
}

impl From<ShiftArg> for ShiftMode {
    fn from(mode: ShiftArg) -> Self {
        match mode {
            ShiftArg::NoShift => ShiftMode::NoShift,
            ShiftArg::Shift => ShiftMode::Shift,
            ShiftArg::Xplor => ShiftMode::Xplor,
        }
    }
}

/// Arguments for the `bench` subcommand.
#[derive(Args, Debug, Default)]
pub struct BenchArgs {
    // --- Inputs and Outputs ---
    /// Path to a run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Force-field coefficient file (TOML) applied on top of the built-in parameters.
    #[arg(short, long, value_name = "PATH")]
    pub forcefield: Option<PathBuf>,

    /// Write the per-step records to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    // --- System Overrides ---
    /// Number of particles in the generated system.
    #[arg(short = 'n', long, value_name = "INT")]
    pub particles: Option<usize>,

    /// Number density used to size the periodic box.
    #[arg(long, value_name = "FLOAT")]
    pub density: Option<f64>,

    /// Number of dihedral-carrying chains.
    #[arg(long, value_name = "INT")]
    pub chains: Option<usize>,

    /// Particles per chain (at least four).
    #[arg(long, value_name = "INT")]
    pub chain_length: Option<usize>,

    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Run Overrides ---
    #[arg(short, long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Execution modes to run, in order. The first one is the reference.
    #[arg(short, long = "mode", value_enum, value_name = "MODE")]
    pub modes: Vec<ModeArg>,

    /// Energy shift applied at the pair cutoff.
    #[arg(long, value_enum, value_name = "MODE")]
    pub shift_mode: Option<ShiftArg>,

    /// Default pair cutoff radius.
    #[arg(long, value_name = "FLOAT")]
    pub r_cut: Option<f64>,

    /// Neighbor list buffer distance.
    #[arg(long, value_name = "FLOAT")]
    pub r_buff: Option<f64>,

    /// Constant target temperature for velocity rescaling.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Largest relative force deviation tolerated between execution modes.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Keep the first candidate block size instead of tuning.
    #[arg(long)]
    pub no_tune: bool,
}

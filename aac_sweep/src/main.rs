use aac_sweep::{
    enumerate, run_sweep, write_plan, write_report, Container, InspectorKind, SourceAudio,
    SweepConfig,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use shared_utils::error_handler::{install_panic_handler, report_error};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::progress::enable_quiet_mode;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "aac-sweep")]
#[command(
    version,
    about = "AAC encoder configuration sweep and bit-rate diagnostics",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode, decode and measure every configuration, then print the report
    Run {
        #[arg(short, long, default_value = aac_sweep::sweep::DEFAULT_INPUT)]
        input: PathBuf,
        /// Deleted and recreated before the sweep
        #[arg(short, long, default_value = aac_sweep::sweep::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        #[arg(long)]
        keep_encoded: bool,
        #[arg(long, value_enum, default_value_t = InspectorKind::Afinfo)]
        inspector: InspectorKind,
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = Container::ALL)]
        containers: Vec<Container>,
        #[arg(long, default_value_t = aac_sweep::trial::DEFAULT_CHUNK_FRAMES)]
        chunk_frames: usize,
        /// Also export every trial record as JSON
        #[arg(long)]
        results_json: Option<PathBuf>,
        #[arg(short, long)]
        verbose: bool,
        #[arg(short, long, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// List the configurations a run would try, without encoding anything
    Plan {
        #[arg(short, long, default_value = aac_sweep::sweep::DEFAULT_INPUT)]
        input: PathBuf,
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = Container::ALL)]
        containers: Vec<Container>,
    },
}

fn log_level(verbose: bool, quiet: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Run {
            input,
            output_dir,
            keep_encoded,
            inspector,
            containers,
            chunk_frames,
            results_json,
            verbose: _,
            quiet: _,
        } => {
            let config = SweepConfig {
                input,
                output_dir,
                keep_encoded,
                inspector,
                containers,
                chunk_frames,
                results_json,
            };
            info!("🎧 AAC Encoder Sweep");
            info!("   Containers: {:?}", config.containers);
            info!("   Inspector: {:?}", config.inspector);
            if config.keep_encoded {
                info!("   📁 Keeping encoded files in {}", config.output_dir.display());
            }

            let outcome = run_sweep(&config)?;
            write_report(&mut stdout, &outcome.summary, &outcome.findings)
                .context("Failed to print report")?;
        }

        Commands::Plan { input, containers } => {
            let source = SourceAudio::open(&input)?;
            let plan = enumerate(&source.stem(), source.format(), &containers);
            write_plan(&mut stdout, &plan).context("Failed to print plan")?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let (verbose, quiet) = match &cli.command {
        Commands::Run { verbose, quiet, .. } => (*verbose, *quiet),
        Commands::Plan { .. } => (false, true),
    };
    if quiet {
        enable_quiet_mode();
    }

    if let Err(e) = init_logging(
        "aac_sweep",
        LogConfig::default().with_level(log_level(verbose, quiet)),
    ) {
        eprintln!("⚠️  Could not initialise logging: {:#}", e);
    }
    install_panic_handler();

    if let Err(e) = run(cli.command) {
        report_error(&*e);
        std::process::exit(1);
    }
}

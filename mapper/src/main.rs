//! Productmap CLI - map a supplier CSV into shop import units
//!
//! ```bash
//! productmap source/products.csv dist/products.csv
//! productmap source/products.csv dist/products.csv --imagepath="https://cdn.example/" --imagefield="Image Src"
//! productmap source/products.csv dist/products.csv --config-dir shop/config --row-limit 250 -v
//! ```

use clap::Parser;
use productmap::config::{ConfigPaths, DEFAULT_CONFIG_DIR};
use productmap::logging::{init_logging, LogConfig, LogFormat};
use productmap::{run, RunOptions, RunSummary, DEFAULT_ROW_LIMIT};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "productmap")]
#[command(about = "Map a source CSV into the destination product schema", long_about = None)]
struct Cli {
    /// Source CSV file the data is mapped from
    source: PathBuf,

    /// Destination file; units are written as <stem>_<n>.<ext> beside it
    destination: PathBuf,

    /// Prepended to every value of the image column
    #[arg(short = 'p', long)]
    imagepath: Option<String>,

    /// Destination column the image path is prepended to
    #[arg(short = 'f', long)]
    imagefield: Option<String>,

    /// Directory holding the JSON mapping resources
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Directory holding `ext:` text resources
    #[arg(long, default_value = productmap::cache::DEFAULT_STATICS_DIR)]
    statics_dir: PathBuf,

    /// Maximum data rows per output unit
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT)]
    row_limit: usize,

    /// Source delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format));

    let options = RunOptions {
        source: cli.source,
        destination: cli.destination,
        image_path: cli.imagepath,
        image_field: cli.imagefield,
        config: ConfigPaths::new(cli.config_dir, cli.statics_dir),
        row_limit: cli.row_limit,
        delimiter: cli.delimiter,
    };

    eprintln!("📄 Processing: {}", options.source.display());
    match run(&options) {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    eprintln!("   Accepted: {}", summary.accepted);
    if summary.rejected > 0 {
        eprintln!("   Rejected: {}", summary.rejected);
    }
    if summary.join_hits + summary.join_misses > 0 {
        eprintln!("   Joins: {} hit, {} missed", summary.join_hits, summary.join_misses);
    }
    if summary.skipped_mappings > 0 {
        eprintln!("   ⚠️  Skipped mappings: {}", summary.skipped_mappings);
    }
    eprintln!("   Rows written: {}", summary.rows_emitted);
    for unit in &summary.units {
        eprintln!("   💾 {}", unit.display());
    }
    eprintln!("\n✨ Mapped {} source data items.", summary.seen);
}

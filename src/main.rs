use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use locbatch::pipeline::{init_default_config, BatchPipeline, PipelineConfig};
use locbatch::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "locbatch")]
#[command(about = "Batch localization translator (remote batch jobs + per-language files)", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Source localization JSON (flat key -> string map)
    #[arg(value_name = "JSON")]
    input: Option<PathBuf>,

    /// Write job files only, skip upload/submit/poll
    #[arg(long)]
    build_only: bool,

    /// Submit the job files of a previously built run directory
    #[arg(long, value_name = "DIR")]
    submit_run: Option<PathBuf>,

    /// Merge downloaded results into cleaned + per-language files
    #[arg(long)]
    clean_results: bool,

    /// Batch directory root (default: batch_files)
    #[arg(long, value_name = "DIR")]
    batch_root: Option<PathBuf>,

    /// Config file path (default: search for locbatch.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between job status polls
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let cfg = PipelineConfig::from_args(args.config, args.batch_root, args.poll_interval)
        .context("build config")?;
    let pipeline = BatchPipeline::new(cfg, progress);

    if args.clean_results {
        pipeline.clean_all_runs()?;
        return Ok(());
    }

    if let Some(run_dir) = args.submit_run {
        pipeline.submit_run(&run_dir)?;
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  locbatch <en_us.json>           build + submit + poll + download\n  locbatch <en_us.json> --build-only\n  locbatch --submit-run <DIR>     submit an already built run\n  locbatch --clean-results        merge downloaded results into language files\n"
            );
            return Ok(());
        }
    };

    let run_dir = pipeline.build_run(&input)?;
    if args.build_only {
        return Ok(());
    }
    pipeline.submit_run(&run_dir)?;
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mediawiki2parquet::config::DEFAULT_COMPRESSION_LEVEL;
use mediawiki2parquet::convert::{convert_all, derive_targets, FileType, Job};
use mediawiki2parquet::writer::WriterOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mw", version, about = "MediaWiki dump tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert Wikipedia dumps to Parquet partitions
    Convert(ConvertArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Either a Wikipedia dump or a directory with dumps
    src: PathBuf,

    /// Either the name of the output file or a directory to store
    /// processed dumps
    dst: PathBuf,

    /// Compression codec for output files
    #[arg(long, default_value = "zstd")]
    compression_codec: String,

    /// Compression level for output files
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    compression_level: u32,

    /// How to interpret source files instead of sniffing them
    #[arg(long)]
    filetype: Option<FileType>,

    /// Number of worker threads (0 = hardware concurrency)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let result = match cli.command {
        Command::Convert(args) => run_convert(args),
    };

    if let Err(err) = result {
        eprintln!("ERR {err:#}");
        process::exit(1);
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    if args.compression_codec != "zstd" {
        bail!("unsupported compression codec: {}", args.compression_codec);
    }
    let opts = WriterOptions {
        codec: args.compression_codec,
        level: args.compression_level,
    };

    let meta = fs::metadata(&args.src)
        .with_context(|| format!("there is no such path: {}", args.src.display()))?;

    let (srcs, dsts, outdir) = if meta.is_dir() {
        let srcs = gather_source_files(&args.src)?;
        if srcs.is_empty() {
            bail!("no source files found in {}", args.src.display());
        }
        let dsts = derive_targets(&args.dst, &srcs);
        (srcs, dsts, args.dst.clone())
    } else if meta.is_file() {
        let outdir = args
            .dst
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (vec![args.src.clone()], vec![args.dst.clone()], outdir)
    } else {
        bail!(
            "source is neither a regular file nor a directory: {}",
            args.src.display()
        );
    };

    if !outdir.as_os_str().is_empty() {
        fs::create_dir_all(&outdir)
            .with_context(|| format!("failed to create output directory: {}", outdir.display()))?;
    }

    info!(partitions = srcs.len(), "starting conversion");
    let jobs = srcs
        .into_iter()
        .zip(dsts)
        .map(|(src, dst)| Job { src, dst })
        .collect();
    convert_all(jobs, args.threads, args.filetype, &opts)
}

/// Lists the regular files of a dump directory, sorted so duplicate-stem
/// part numbering is deterministic.
fn gather_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    let mut srcs = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to list directory: {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat file: {}", entry.path().display()))?;
        if file_type.is_file() {
            srcs.push(entry.path());
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular directory entry");
        }
    }
    srcs.sort();
    Ok(srcs)
}

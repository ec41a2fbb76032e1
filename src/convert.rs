//! Partition conversion: file-type sniffing, output-path derivation, and
//! the worker pool that drives one page reader + Parquet writer per job.

use crate::bz2::Bz2Source;
use crate::config::{PROGRESS_INTERVAL, XML_BUF_SIZE};
use crate::reader::PageReader;
use crate::writer::{PageWriter, WriterOptions};
use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use tracing::{info, warn};

/// Magic bytes of a bzip2 stream header.
const BZIP2_MAGIC: &[u8; 3] = b"BZh";

/// Supported formats of source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    Bzip2,
    Xml,
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bzip2" => Ok(FileType::Bzip2),
            "xml" => Ok(FileType::Xml),
            other => Err(format!("unknown file type: {other}")),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Unknown => write!(f, "unknown"),
            FileType::Bzip2 => write!(f, "bzip2"),
            FileType::Xml => write!(f, "xml"),
        }
    }
}

/// Guesses the file type from the leading magic bytes, rewinding the file
/// afterwards. Short files fall back to XML; any I/O error yields
/// `Unknown`.
pub fn guess_file_type(file: &mut File) -> FileType {
    let mut magic = [0u8; 3];
    let guessed = match file.read(&mut magic) {
        Ok(3) if &magic == BZIP2_MAGIC => FileType::Bzip2,
        Ok(_) => FileType::Xml,
        Err(_) => return FileType::Unknown,
    };
    if file.seek(SeekFrom::Start(0)).is_err() {
        return FileType::Unknown;
    }
    guessed
}

/// One unit of work: convert the dump at `src` into the Parquet file at
/// `dst`.
#[derive(Debug, Clone)]
pub struct Job {
    pub src: PathBuf,
    pub dst: PathBuf,
}

/// Derives one output filename per source file.
///
/// A `.bz2`/`.bzip2` suffix is stripped first, then the final extension is
/// replaced with `.part-<k>.parquet` where `<k>` is a zero-based counter
/// over duplicate stems, so `enwiki.xml` and `enwiki.json` in one batch
/// become `enwiki.part-0.parquet` and `enwiki.part-1.parquet`.
pub fn derive_targets(dst: &Path, srcs: &[PathBuf]) -> Vec<PathBuf> {
    let mut dups: HashMap<String, usize> = HashMap::new();

    srcs.iter()
        .map(|src| {
            let mut filename = PathBuf::from(src.file_name().unwrap_or_default());
            if matches!(
                filename.extension().and_then(|ext| ext.to_str()),
                Some("bz2") | Some("bzip2")
            ) {
                filename = PathBuf::from(filename.file_stem().unwrap_or_default());
            }

            let stem = filename
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            let count = *dups
                .entry(stem.clone())
                .and_modify(|count| *count += 1)
                .or_insert(0);

            dst.join(format!("{stem}.part-{count}.parquet"))
        })
        .collect()
}

fn convert_stream<R: BufRead>(source: R, dst: &Path, opts: &WriterOptions) -> Result<(u64, u64)> {
    let mut writer = PageWriter::create(dst, opts)?;
    let mut reader = PageReader::new(source);
    let spinner = ProgressBar::new_spinner();

    let mut pages = 0u64;
    while reader.advance() {
        writer.write_page(reader.current())?;
        pages += 1;
        if pages % PROGRESS_INTERVAL == 0 {
            spinner.tick();
        }
    }
    spinner.finish_and_clear();

    if reader.failed() {
        warn!(
            dst = %dst.display(),
            pages,
            "input abandoned after XML parse error, keeping pages read so far"
        );
    }

    let rows = writer.close()?;
    Ok((pages, rows))
}

/// Converts a single dump partition. Returns `(pages, rows)` written.
pub fn convert_file(
    src: &Path,
    dst: &Path,
    forced: Option<FileType>,
    opts: &WriterOptions,
) -> Result<(u64, u64)> {
    let mut file = File::open(src)
        .with_context(|| format!("failed to open source file: {}", src.display()))?;

    let filetype = forced.unwrap_or_else(|| guess_file_type(&mut file));
    match filetype {
        FileType::Bzip2 => convert_stream(
            BufReader::with_capacity(XML_BUF_SIZE, Bz2Source::new(file)),
            dst,
            opts,
        ),
        FileType::Xml => convert_stream(BufReader::with_capacity(XML_BUF_SIZE, file), dst, opts),
        FileType::Unknown => bail!("failed to detect file type: {}", src.display()),
    }
}

/// Converts all partitions with a pool of worker threads.
///
/// The queue is pre-loaded with every job and closed before any worker
/// starts; workers only consume. The pool size is the smaller of the
/// requested thread count (0 meaning hardware concurrency) and the number
/// of jobs, and the calling thread runs one worker in-line so a single-job
/// conversion spawns no threads at all. A failing job is logged and
/// abandoned without disturbing the other workers.
pub fn convert_all(
    jobs: Vec<Job>,
    threads: usize,
    forced: Option<FileType>,
    opts: &WriterOptions,
) -> Result<()> {
    if jobs.is_empty() {
        info!("nothing to do");
        return Ok(());
    }

    let nojobs = jobs.len();
    let (tx, rx) = unbounded();
    for job in jobs {
        tx.send(job).context("job queue closed unexpectedly")?;
    }
    drop(tx);

    let mut threads = if threads == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        threads
    };
    if threads > nojobs {
        threads = nojobs;
    }

    thread::scope(|scope| {
        for index in 1..threads {
            let rx = rx.clone();
            scope.spawn(move || run_worker(index, rx, forced, opts));
        }
        run_worker(0, rx, forced, opts);
    });

    Ok(())
}

fn run_worker(index: usize, queue: Receiver<Job>, forced: Option<FileType>, opts: &WriterOptions) {
    info!(worker = index, "worker started");
    while let Ok(job) = queue.recv() {
        info!(worker = index, src = %job.src.display(), "processing partition");
        match convert_file(&job.src, &job.dst, forced, opts) {
            Ok((pages, rows)) => {
                info!(worker = index, pages, rows, "partition converted");
            }
            Err(err) => {
                warn!(
                    worker = index,
                    src = %job.src.display(),
                    error = %err,
                    "partition failed"
                );
            }
        }
    }
    info!(worker = index, "worker exited");
}

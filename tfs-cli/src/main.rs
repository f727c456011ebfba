//! Command-line driver for TFS.
//!
//! The core (`tfs-core`) is a pure in-process library with no
//! persistence of its own, so this binary holds a single
//! [`Filesystem`] for the lifetime of one run and drives it either
//! from a line-oriented script on stdin (`repl`, the default) or from
//! one of the host-filesystem copy helpers described as external
//! collaborators of the core.

use std::fs;
use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use tfs_core::{flags, Filesystem};

#[derive(Parser)]
#[command(name = "tfs", about = "Drive the TFS in-memory toy filesystem")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read one operation per line from stdin against a fresh filesystem.
    Repl,
    /// Create `tfs_path` inside a fresh filesystem and fill it from `host_path`.
    CopyIn { host_path: PathBuf, tfs_path: String },
    /// Create `tfs_path` from stdin, then copy it out to `host_path`.
    CopyOut { tfs_path: String, host_path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => repl(),
        Command::CopyIn { host_path, tfs_path } => copy_in(&host_path, &tfs_path),
        Command::CopyOut { tfs_path, host_path } => copy_out(&tfs_path, &host_path),
    }
}

/// Reads host file bytes and writes them into a freshly created TFS
/// file, one `write` call per `BLOCK_SIZE`-ish chunk — mirroring how
/// the original image builder streamed host files in.
fn copy_in(host_path: &PathBuf, tfs_path: &str) -> Result<()> {
    let data = fs::read(host_path)
        .with_context(|| format!("reading host file {}", host_path.display()))?;

    let fs = Filesystem::init().context("initialising filesystem")?;
    let handle = fs
        .open(tfs_path, flags::CREATE)
        .map_err(|err| anyhow::anyhow!("open({tfs_path:?}, CREATE): {err}"))?;

    let mut written = 0;
    for chunk in data.chunks(tfs_core::BLOCK_SIZE) {
        let n = fs
            .write(handle, chunk)
            .map_err(|err| anyhow::anyhow!("write: {err}"))?;
        written += n;
        if n < chunk.len() {
            break;
        }
    }
    fs.close(handle).map_err(|err| anyhow::anyhow!("close: {err}"))?;

    log::info!("copied {written} bytes from {} into {tfs_path}", host_path.display());
    if written < data.len() {
        log::warn!("truncated at {written} of {} bytes ({tfs_path} hit MAX_BYTES)", data.len());
    }
    Ok(())
}

/// The copy-out helper contract of §6: the host file's contents must
/// be byte-for-byte identical to a sequence of `read` calls starting
/// at offset 0. Input comes from stdin so this subcommand is usable
/// standalone (there is no persistence to copy out of otherwise).
fn copy_out(tfs_path: &str, host_path: &PathBuf) -> Result<()> {
    let mut staged = Vec::new();
    io::stdin().lock().read_to_end_compat(&mut staged)?;

    let fs = Filesystem::init().context("initialising filesystem")?;
    let handle = fs
        .open(tfs_path, flags::CREATE)
        .map_err(|err| anyhow::anyhow!("open({tfs_path:?}, CREATE): {err}"))?;
    let mut offset = 0;
    while offset < staged.len() {
        let n = fs
            .write(handle, &staged[offset..])
            .map_err(|err| anyhow::anyhow!("write: {err}"))?;
        if n == 0 {
            break;
        }
        offset += n;
    }
    fs.close(handle).map_err(|err| anyhow::anyhow!("close: {err}"))?;

    let handle = fs
        .open(tfs_path, 0)
        .map_err(|err| anyhow::anyhow!("open({tfs_path:?}, 0): {err}"))?;
    let mut out = Vec::new();
    let mut buf = vec![0u8; tfs_core::BLOCK_SIZE];
    loop {
        let n = fs
            .read(handle, &mut buf)
            .map_err(|err| anyhow::anyhow!("read: {err}"))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    fs.close(handle).map_err(|err| anyhow::anyhow!("close: {err}"))?;

    fs::write(host_path, &out)
        .with_context(|| format!("writing host file {}", host_path.display()))?;
    log::info!("copied {} bytes from {tfs_path} to {}", out.len(), host_path.display());
    Ok(())
}

trait ReadToEndCompat {
    fn read_to_end_compat(&mut self, buf: &mut Vec<u8>) -> Result<usize>;
}

impl<R: io::Read> ReadToEndCompat for R {
    fn read_to_end_compat(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        io::Read::read_to_end(self, buf).context("reading stdin")
    }
}

/// A minimal line-oriented REPL, one filesystem per process run:
///
/// ```text
/// open <path> [CREATE] [APPEND] [TRUNC]
/// write <handle> <text>
/// read <handle> <len>
/// close <handle>
/// lookup <path>
/// quit
/// ```
fn repl() -> Result<()> {
    let fs = Filesystem::init().context("initialising filesystem")?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = words.first() else { continue };

        let result = match cmd {
            "open" => run_open(&fs, &words),
            "write" => run_write(&fs, &words),
            "read" => run_read(&fs, &words),
            "close" => run_close(&fs, &words),
            "lookup" => run_lookup(&fs, &words),
            "quit" => break,
            other => Err(anyhow::anyhow!("unknown command {other:?}")),
        };

        match result {
            Ok(output) => writeln!(stdout, "{output}")?,
            Err(err) => writeln!(stdout, "error: {err}")?,
        }
    }
    fs.destroy();
    Ok(())
}

fn run_open(fs: &Filesystem, words: &[&str]) -> Result<String> {
    let Some(&path) = words.get(1) else {
        bail!("usage: open <path> [CREATE] [APPEND] [TRUNC]")
    };
    let mut mask = 0u32;
    for &flag in &words[2..] {
        mask |= match flag {
            "CREATE" => flags::CREATE,
            "APPEND" => flags::APPEND,
            "TRUNC" => flags::TRUNC,
            other => bail!("unknown flag {other:?}"),
        };
    }
    let handle = fs.open(path, mask).map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(handle.to_string())
}

fn run_write(fs: &Filesystem, words: &[&str]) -> Result<String> {
    let (Some(&handle), Some(text)) = (words.get(1), words.get(2..).map(|rest| rest.join(" ")))
    else {
        bail!("usage: write <handle> <text>")
    };
    let handle: usize = handle.parse().context("parsing handle")?;
    let n = fs
        .write(handle, text.as_bytes())
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(n.to_string())
}

fn run_read(fs: &Filesystem, words: &[&str]) -> Result<String> {
    let (Some(&handle), Some(&len)) = (words.get(1), words.get(2)) else {
        bail!("usage: read <handle> <len>")
    };
    let handle: usize = handle.parse().context("parsing handle")?;
    let len: usize = len.parse().context("parsing length")?;
    let mut buf = vec![0u8; len];
    let n = fs
        .read(handle, &mut buf)
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

fn run_close(fs: &Filesystem, words: &[&str]) -> Result<String> {
    let Some(&handle) = words.get(1) else {
        bail!("usage: close <handle>")
    };
    let handle: usize = handle.parse().context("parsing handle")?;
    fs.close(handle).map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok("ok".to_string())
}

fn run_lookup(fs: &Filesystem, words: &[&str]) -> Result<String> {
    let Some(&path) = words.get(1) else {
        bail!("usage: lookup <path>")
    };
    let inumber = fs.lookup(path).map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(inumber.to_string())
}

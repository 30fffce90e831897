// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: fetch
//
//  Multi-URL, resumable, retryable distfile downloads.
//
//  Three fetcher backends are known, in fixed registration order:
//
//    curl  — external `curl`, resume via `-C -`
//    wget  — external `wget`, resume via `-c`   (arguments taken from Gentoo)
//    ureq  — in-process HTTP client, resume via a `Range: bytes=K-` header
//
//  The RUYI_OVERRIDE_FETCHER env var forces a backend by name; otherwise
//  the first available one wins. Selection is probed once per process run.
// ─────────────────────────────────────────────────────────────────────────────

use std::io::{Read, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{Error, Result};
use crate::log::Console;

pub const ENV_OVERRIDE_FETCHER: &str = "RUYI_OVERRIDE_FETCHER";

const DEFAULT_RETRIES: u32 = 3;
const CONNECT_TIMEOUT_SECS: u64 = 60;
const CHUNK_SIZE: usize = 64 * 1024;

fn is_url_ftp(url: &str) -> bool {
    url.to_lowercase().starts_with("ftp://")
}

// ─────────────────────────────────────────────────────────────────────────────
//  Backend selection
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Curl,
    Wget,
    Ureq,
}

/// Registration order; the first available backend is used when no
/// override is in effect.
const KNOWN_FETCHERS: &[FetcherKind] = &[FetcherKind::Curl, FetcherKind::Wget, FetcherKind::Ureq];

impl FetcherKind {
    pub fn name(self) -> &'static str {
        match self {
            FetcherKind::Curl => "curl",
            FetcherKind::Wget => "wget",
            FetcherKind::Ureq => "ureq",
        }
    }

    fn by_name(name: &str) -> Option<Self> {
        KNOWN_FETCHERS.iter().copied().find(|f| f.name() == name)
    }

    fn is_available(self) -> bool {
        match self {
            FetcherKind::Curl => which::which("curl").is_ok(),
            FetcherKind::Wget => which::which("wget").is_ok(),
            FetcherKind::Ureq => true,
        }
    }
}

/// Pick the fetcher backend for this process. The env override wins; an
/// unknown or unavailable override is an error, never a silent fallback.
pub fn select_fetcher(console: &Console) -> Result<FetcherKind> {
    if let Ok(name) = std::env::var(ENV_OVERRIDE_FETCHER) {
        console.debug(&format!("forcing fetcher '{name}'"));
        let kind =
            FetcherKind::by_name(&name).ok_or_else(|| Error::UnknownFetcher(name.clone()))?;
        if !kind.is_available() {
            return Err(Error::ExternalToolMissing {
                tool: name,
                hint: "the requested fetcher is unavailable on this system".to_owned(),
            });
        }
        return Ok(kind);
    }

    for kind in KNOWN_FETCHERS {
        if kind.is_available() {
            return Ok(*kind);
        }
    }

    // unreachable in practice: the in-process backend is always available
    Err(Error::Other("no fetcher is available on the system".to_owned()))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Attempt planning
// ─────────────────────────────────────────────────────────────────────────────

/// What to do with the destination before a download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPlan {
    /// No usable partial data; download from scratch.
    Fresh,
    /// Partial data present; ask the server to resume from this offset.
    Resume(u64),
    /// Destination already has the advertised size; skip straight to
    /// integrity verification.
    AlreadyComplete,
}

/// Inspect `dest` against the advertised size and decide how to proceed.
/// An oversized destination is deleted and restarted from scratch.
pub fn plan_attempt(dest: &Path, expected_size: Option<u64>, console: &Console) -> Result<AttemptPlan> {
    let meta = match std::fs::metadata(dest) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AttemptPlan::Fresh),
        Err(e) => return Err(e.into()),
    };

    let Some(want) = expected_size else {
        // no advertised size, cannot reason about partial data
        std::fs::remove_file(dest)?;
        return Ok(AttemptPlan::Fresh);
    };

    let have = meta.len();
    if have < want {
        console.debug(&format!(
            "{} appears incomplete: size {have} < {want}; resuming",
            dest.display()
        ));
        Ok(AttemptPlan::Resume(have))
    } else if have == want {
        Ok(AttemptPlan::AlreadyComplete)
    } else {
        console.warn(&format!(
            "file {} is corrupt: size too big ({have} > {want}); deleting",
            dest.display()
        ));
        std::fs::remove_file(dest)?;
        Ok(AttemptPlan::Fresh)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Download exactly one of `urls` to `dest`, or fail with `AllSourcesFailed`
/// after exhausting every URL × retry combination.
pub fn fetch(
    kind: FetcherKind,
    urls: &[String],
    dest: &Path,
    expected_size: Option<u64>,
    console: &Console,
) -> Result<()> {
    for url in urls {
        console.info(&format!("downloading {url}"));
        for attempt in 0..DEFAULT_RETRIES {
            if attempt > 0 {
                console.info(&format!(
                    "retrying download ({} of {DEFAULT_RETRIES} times)",
                    attempt + 1
                ));
            }

            let plan = plan_attempt(dest, expected_size, console)?;
            let resume = match plan {
                AttemptPlan::AlreadyComplete => return Ok(()),
                AttemptPlan::Fresh => false,
                AttemptPlan::Resume(_) => true,
            };

            match fetch_one(kind, url, dest, resume, expected_size, console) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    console.warn(&format!("download attempt failed: {e}"));
                }
            }
        }
    }

    Err(Error::AllSourcesFailed {
        dest: dest.display().to_string(),
        urls: urls.to_vec(),
    })
}

fn fetch_one(
    kind: FetcherKind,
    url: &str,
    dest: &Path,
    resume: bool,
    expected_size: Option<u64>,
    console: &Console,
) -> Result<()> {
    match kind {
        FetcherKind::Curl => fetch_one_curl(url, dest, resume),
        FetcherKind::Wget => fetch_one_wget(url, dest, resume),
        FetcherKind::Ureq => fetch_one_ureq(url, dest, resume, expected_size, console),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  External backends
// ─────────────────────────────────────────────────────────────────────────────

fn fetch_one_curl(url: &str, dest: &Path, resume: bool) -> Result<()> {
    let mut cmd = Command::new("curl");
    if resume {
        cmd.args(["-C", "-"]);
    }
    // Passive FTP mode must only be requested for actual ftp:// URLs;
    // some curl builds mis-handle the flag on HTTP transfers.
    if is_url_ftp(url) {
        cmd.arg("--ftp-pasv");
    }
    cmd.args(["-L", "--connect-timeout"])
        .arg(CONNECT_TIMEOUT_SECS.to_string())
        .arg("-o")
        .arg(dest)
        .arg(url);

    run_external(cmd, "curl")
}

fn fetch_one_wget(url: &str, dest: &Path, resume: bool) -> Result<()> {
    let mut cmd = Command::new("wget");
    if resume {
        cmd.arg("-c");
    }
    if is_url_ftp(url) {
        cmd.arg("--passive-ftp");
    }
    cmd.arg("-T")
        .arg(CONNECT_TIMEOUT_SECS.to_string())
        .arg("-O")
        .arg(dest)
        .arg(url);

    run_external(cmd, "wget")
}

fn run_external(mut cmd: Command, tool: &str) -> Result<()> {
    let status = cmd.status().map_err(|e| Error::ExternalToolMissing {
        tool: tool.to_owned(),
        hint: format!("failed to spawn: {e}"),
    })?;
    if !status.success() {
        return Err(Error::Other(format!(
            "{tool} exited with {}",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  In-process backend
// ─────────────────────────────────────────────────────────────────────────────

fn fetch_one_ureq(
    url: &str,
    dest: &Path,
    resume: bool,
    expected_size: Option<u64>,
    console: &Console,
) -> Result<()> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build();

    let start_from = if resume {
        std::fs::metadata(dest)?.len()
    } else {
        0
    };

    let mut req = agent.get(url);
    if resume {
        req = req.set("Range", &format!("bytes={start_from}-"));
    }

    let resp = match req.call() {
        Ok(r) => r,
        Err(ureq::Error::Status(code, _)) if resume => {
            // A server that refuses the Range request gets a full retry
            // without resume.
            console.debug(&format!("Range request answered {code}; restarting from scratch"));
            std::fs::remove_file(dest)?;
            return fetch_one_ureq(url, dest, false, expected_size, console);
        }
        Err(e) => return Err(Error::Other(format!("GET {url} failed: {e}"))),
    };

    // A 200 answer to a Range request carries the whole body; start over.
    let (mut out, mut completed) = if resume && resp.status() == 206 {
        let f = std::fs::OpenOptions::new().append(true).open(dest)?;
        (f, start_from)
    } else {
        let f = std::fs::File::create(dest)?;
        (f, 0)
    };

    let total_len = resp
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok())
        .map(|l| l + completed)
        .or(expected_size);

    let bar = make_progress_bar(dest, total_len, completed, console);

    let mut reader = resp.into_reader();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        completed += n as u64;
        if let Some(bar) = &bar {
            bar.set_position(completed);
        }
    }
    out.flush()?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(())
}

fn make_progress_bar(
    dest: &Path,
    total_len: Option<u64>,
    completed: u64,
    console: &Console,
) -> Option<ProgressBar> {
    if console.is_porcelain() {
        return None;
    }

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let bar = match total_len {
        Some(len) => {
            let b = ProgressBar::new(len);
            b.set_style(
                ProgressStyle::with_template(
                    "{msg} {bar:30.cyan/dim} {bytes}/{total_bytes} {bytes_per_sec} eta {eta}",
                )
                .ok()?,
            );
            b.set_position(completed);
            b
        }
        None => {
            // indeterminate mode: no Content-Length to go by
            let b = ProgressBar::new_spinner();
            b.set_style(ProgressStyle::with_template("{spinner} {msg} {bytes}").ok()?);
            b.enable_steady_tick(Duration::from_millis(100));
            b
        }
    };
    bar.set_message(name);
    Some(bar)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: error
//
//  One crate-wide error taxonomy. Low-level modules fail with precise typed
//  variants; the installer and CLI enrich with package context and map the
//  kind onto the process exit code:
//
//    1 — user error / environment problem / no match
//    2 — data-model error (bad manifest, missing distfile for host)
// ─────────────────────────────────────────────────────────────────────────────

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // ── user input ────────────────────────────────────────────────────────
    #[error("invalid atom '{0}'")]
    BadAtomSyntax(String),

    #[error("profile '{0}' not found\n  Hint: run `ruyi list profiles` for the full list")]
    UnknownProfile(String),

    #[error("no package matches '{0}' in the repository")]
    NoSuchPackage(String),

    #[error("no version of '{name}' satisfies '{atom}'")]
    NoSatisfyingVersion { atom: String, name: String },

    #[error("unknown config key '{0}'")]
    InvalidConfigKey(String),

    #[error("unknown config section '{0}'")]
    InvalidConfigSection(String),

    #[error("invalid value '{value}' for config key '{key}': expected {expected}")]
    InvalidConfigValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("malformed config file {path}: {reason}")]
    MalformedConfigFile { path: PathBuf, reason: String },

    // ── environment ───────────────────────────────────────────────────────
    #[error("external tool '{tool}' is required but not found on PATH\n  Hint: {hint}")]
    ExternalToolMissing { tool: String, hint: String },

    #[error("unknown fetcher '{0}' requested via RUYI_OVERRIDE_FETCHER")]
    UnknownFetcher(String),

    #[error("repo remote URL mismatch: configured '{configured}' but repo has '{actual}'")]
    RemoteUrlMismatch { configured: String, actual: String },

    #[error("cannot fast-forward branch '{branch}' of the metadata repo; refusing to merge or reset")]
    CannotFastForward { branch: String },

    #[error("failed to fetch '{dest}': all source URLs have failed\n  Tried: {}", urls.join(", "))]
    AllSourcesFailed { dest: String, urls: Vec<String> },

    #[error("don't know how to unpack file {0}")]
    UnrecognizedPackFormat(String),

    // ── integrity ─────────────────────────────────────────────────────────
    #[error("wrong {algo} checksum: want {want}, got {got}")]
    ChecksumMismatch {
        algo: String,
        want: String,
        got: String,
    },

    #[error("size mismatch for {path}: want {want}, got {got}")]
    SizeMismatch { path: PathBuf, want: u64, got: u64 },

    #[error("checksum algorithm '{0}' not supported")]
    UnsupportedChecksumAlgo(String),

    // ── policy ────────────────────────────────────────────────────────────
    #[error(
        "toolchain does not provide all quirks needed by the profile\n  needed:   {}\n  provided: {}",
        needed.join(", "),
        provided.join(", ")
    )]
    QuirksUnsatisfied {
        needed: Vec<String>,
        provided: Vec<String>,
    },

    #[error("target tuple '{0}' is already covered by another requested toolchain")]
    DuplicateTarget(String),

    #[error("package '{pkg}' declares no binary for host {host}")]
    NoBinaryForHost { pkg: String, host: String },

    #[error("distfile '{name}' is restricted from automatic fetching\n{reason}")]
    FetchRestricted { name: String, reason: String },

    #[error(
        "package '{pkg}' is not tracked as installed, but its directory {path} exists\n  Remove it manually if you are sure that is safe."
    )]
    UntrackedInstallDirPresent { pkg: String, path: PathBuf },

    // ── internal / data model ─────────────────────────────────────────────
    #[error("entity validation failed for '{etype}:{id}': {reason}")]
    EntityValidation {
        etype: String,
        id: String,
        reason: String,
    },

    #[error("don't know how to install package '{0}': it provides no binary or blob")]
    NotInstallable(String),

    #[error("cannot find a GCC include & lib directory under {0}")]
    MissingGccLibDir(PathBuf),

    #[error("bad package manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("the toolchain mux is not configured here\n  Hint: check out `ruyi venv` for making a virtual environment")]
    MuxNotInVenv,

    // ── passthrough ───────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Exit code the CLI should terminate with if this error reaches the top.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Manifest { .. }
            | Error::NoBinaryForHost { .. }
            | Error::NotInstallable(_)
            | Error::EntityValidation { .. }
            | Error::MissingGccLibDir(_) => 2,
            _ => 1,
        }
    }
}

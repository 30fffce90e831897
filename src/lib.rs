// ─────────────────────────────────────────────────────────────────────────────
//  ruyi  —  SDK and cross-toolchain package manager
//
//  Library crate behind the `ruyi` binary: package resolution, integrity-
//  checked distfile acquisition, archive extraction, the installation
//  ledger, and the virtual-environment synthesizer for cross-build
//  prefixes (with the shim multiplexer routing venv invocations back to
//  the real toolchain binaries).
// ─────────────────────────────────────────────────────────────────────────────

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod host;
pub mod install;
pub mod log;
pub mod mux;
pub mod pkg;
pub mod repo;
pub mod state;
pub mod unpack;
pub mod venv;

pub use error::{Error, Result};
pub use host::RuyiHost;

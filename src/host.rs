// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: host
//
//  Canonical (os, arch) identity of the machine packages run on, rendered
//  as "os/arch". Aliases from various ecosystems are folded onto the
//  canonical spelling so manifests only need one entry per host.
// ─────────────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuyiHost {
    pub os: String,
    pub arch: String,
}

impl RuyiHost {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
        }
    }

    /// Fold alias spellings onto the canonical one. Idempotent.
    pub fn canonicalize(&self) -> Self {
        Self {
            os: canonicalize_os(&self.os),
            arch: canonicalize_arch(&self.arch),
        }
    }

    /// Parse a host string. A bare "arch" with no slash implies "linux/arch".
    pub fn parse(s: &str) -> Self {
        match s.split_once('/') {
            Some((os, arch)) => Self::new(os, arch).canonicalize(),
            None => Self::new("linux", s).canonicalize(),
        }
    }

    /// The host this process is running on.
    pub fn native() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH).canonicalize()
    }
}

impl fmt::Display for RuyiHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

// Alias sources: Python's platform.machine() quirks and the Windows
// PROCESSOR_ARCHITECTURE values.
fn canonicalize_arch(arch: &str) -> String {
    match arch.to_lowercase().as_str() {
        "amd64" | "em64t" => "x86_64".to_owned(),
        "arm64" => "aarch64".to_owned(),
        "x86" => "i686".to_owned(),
        lower => lower.to_owned(),
    }
}

fn canonicalize_os(os: &str) -> String {
    match os {
        "win32" => "windows".to_owned(),
        other => other.to_owned(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arch_aliases_fold() {
        assert_eq!(RuyiHost::parse("linux/amd64").to_string(), "linux/x86_64");
        assert_eq!(RuyiHost::parse("linux/ARM64").to_string(), "linux/aarch64");
        assert_eq!(RuyiHost::parse("win32/x86").to_string(), "windows/i686");
    }

    #[test]
    fn bare_arch_implies_linux() {
        assert_eq!(RuyiHost::parse("riscv64").to_string(), "linux/riscv64");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let h = RuyiHost::parse("darwin/arm64");
        assert_eq!(h.canonicalize(), h);
    }
}

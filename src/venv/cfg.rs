// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: venv :: cfg
//
//  On-disk venv descriptor: `ruyi-venv.toml` holds the config section,
//  `ruyi-cache.v2.toml` the cached per-target toolchain facts the shim
//  multiplexer needs. Older venvs carry v0 (`ruyi-cache.toml`, single
//  target) or v1 (`ruyi-cache.v1.toml`, multi-target with shared flags)
//  caches; both upgrade to v2 through pure functions at load time.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::GlobalMode;
use crate::error::{Error, Result};

pub const VENV_CONFIG_NAME: &str = "ruyi-venv.toml";
pub const VENV_CACHE_V2_NAME: &str = "ruyi-cache.v2.toml";
pub const VENV_CACHE_V1_NAME: &str = "ruyi-cache.v1.toml";
pub const VENV_CACHE_V0_NAME: &str = "ruyi-cache.toml";

// ─────────────────────────────────────────────────────────────────────────────
//  Config section
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvConfigRoot {
    pub config: VenvConfigSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvConfigSection {
    pub profile: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sysroot: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
//  Cache schemas
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdMetadataEntry {
    pub dest: String,
    pub target_tuple: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvCacheV0 {
    pub target_tuple: String,
    pub toolchain_bindir: String,
    pub gcc_install_dir: Option<String>,
    pub profile_common_flags: String,
    pub qemu_bin: Option<String>,
    pub profile_emu_env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvCacheV1Target {
    pub toolchain_bindir: String,
    pub toolchain_sysroot: Option<String>,
    pub gcc_install_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvCacheV1 {
    pub profile_common_flags: String,
    pub profile_emu_env: Option<BTreeMap<String, String>>,
    pub qemu_bin: Option<String>,
    pub targets: BTreeMap<String, VenvCacheV1Target>,
    #[serde(default)]
    pub cmd_metadata_map: BTreeMap<String, CmdMetadataEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenvCacheV2Target {
    pub toolchain_bindir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_sysroot: Option<String>,
    pub toolchain_flags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcc_install_dir: Option<String>,
}

// scalar fields stay ahead of the table-valued ones for TOML emission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenvCacheV2 {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qemu_bin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_emu_env: Option<BTreeMap<String, String>>,
    pub targets: BTreeMap<String, VenvCacheV2Target>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cmd_metadata_map: BTreeMap<String, CmdMetadataEntry>,
}

/// The cache file root; exactly one of the versioned keys is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenvCacheRoot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_v2: Option<VenvCacheV2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cached_v1: Option<VenvCacheV1>,
    #[serde(default, rename = "cached", skip_serializing_if = "Option::is_none")]
    cached_v0: Option<VenvCacheV0>,
}

impl VenvCacheRoot {
    pub fn for_write(cache: VenvCacheV2) -> Self {
        Self {
            cached_v2: Some(cache),
            cached_v1: None,
            cached_v0: None,
        }
    }

    /// Resolve to the v2 shape, upgrading older versions as needed.
    pub fn into_v2(self, global_sysroot: Option<&str>) -> Result<VenvCacheV2> {
        if let Some(v2) = self.cached_v2 {
            return Ok(v2);
        }
        if let Some(v1) = self.cached_v1 {
            return Ok(upgrade_venv_cache_v1(v1));
        }
        if let Some(v0) = self.cached_v0 {
            return Ok(upgrade_venv_cache_v0(v0, global_sysroot));
        }
        Err(Error::Other("unsupported venv cache version".to_owned()))
    }
}

/// v1 → v2: the shared profile flags replicate onto every target.
pub fn upgrade_venv_cache_v1(v1: VenvCacheV1) -> VenvCacheV2 {
    let flags = v1.profile_common_flags;
    VenvCacheV2 {
        profile_emu_env: v1.profile_emu_env,
        qemu_bin: v1.qemu_bin,
        targets: v1
            .targets
            .into_iter()
            .map(|(tuple, t)| {
                (
                    tuple,
                    VenvCacheV2Target {
                        toolchain_bindir: t.toolchain_bindir,
                        toolchain_sysroot: t.toolchain_sysroot,
                        toolchain_flags: flags.clone(),
                        gcc_install_dir: t.gcc_install_dir,
                    },
                )
            })
            .collect(),
        cmd_metadata_map: v1.cmd_metadata_map,
    }
}

/// v0 → v2: the single target becomes a one-entry target map; the venv's
/// global sysroot (from the config section) fills the per-target slot.
pub fn upgrade_venv_cache_v0(v0: VenvCacheV0, global_sysroot: Option<&str>) -> VenvCacheV2 {
    let v1 = VenvCacheV1 {
        profile_common_flags: v0.profile_common_flags,
        profile_emu_env: v0.profile_emu_env,
        qemu_bin: v0.qemu_bin,
        targets: [(
            v0.target_tuple,
            VenvCacheV1Target {
                toolchain_bindir: v0.toolchain_bindir,
                toolchain_sysroot: global_sysroot.map(str::to_owned),
                gcc_install_dir: v0.gcc_install_dir,
            },
        )]
        .into_iter()
        .collect(),
        cmd_metadata_map: BTreeMap::new(),
    };
    upgrade_venv_cache_v1(v1)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Loaded venv view
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RuyiVenvConfig {
    pub venv_root: PathBuf,
    pub profile: String,
    pub sysroot: Option<PathBuf>,
    pub cache: VenvCacheV2,
}

impl RuyiVenvConfig {
    /// Locate the enclosing venv: an explicit RUYI_VENV root wins;
    /// otherwise look at argv[0]'s parent-of-parent for the venv config.
    pub fn probe_venv_root(mode: &GlobalMode) -> Option<PathBuf> {
        if let Some(explicit) = &mode.venv_root {
            return Some(explicit.clone());
        }

        // a bare command name carries no location information
        let argv0 = Path::new(&mode.argv0);
        let implied = argv0.parent()?.parent()?;
        if implied.as_os_str().is_empty() {
            return None;
        }
        implied
            .join(VENV_CONFIG_NAME)
            .exists()
            .then(|| implied.to_owned())
    }

    pub fn load_from_venv(mode: &GlobalMode) -> Result<Option<Self>> {
        let Some(venv_root) = Self::probe_venv_root(mode) else {
            return Ok(None);
        };
        Self::load_from_root(&venv_root).map(Some)
    }

    pub fn load_from_root(venv_root: &Path) -> Result<Self> {
        let cfg_path = venv_root.join(VENV_CONFIG_NAME);
        let cfg_text = std::fs::read_to_string(&cfg_path)?;
        let cfg: VenvConfigRoot =
            toml::from_str(&cfg_text).map_err(|e| Error::MalformedConfigFile {
                path: cfg_path,
                reason: e.to_string(),
            })?;

        let cache_text = [VENV_CACHE_V2_NAME, VENV_CACHE_V1_NAME, VENV_CACHE_V0_NAME]
            .iter()
            .find_map(|name| std::fs::read_to_string(venv_root.join(name)).ok())
            .ok_or(Error::MuxNotInVenv)?;
        let cache_root: VenvCacheRoot =
            toml::from_str(&cache_text).map_err(|e| Error::MalformedConfigFile {
                path: venv_root.join(VENV_CACHE_V2_NAME),
                reason: e.to_string(),
            })?;

        let sysroot = cfg.config.sysroot.clone();
        let cache = cache_root.into_v2(sysroot.as_deref().and_then(|p| p.to_str()))?;

        Ok(Self {
            venv_root: venv_root.to_owned(),
            profile: cfg.config.profile,
            sysroot,
            cache,
        })
    }

    pub fn resolve_cmd(&self, basename: &str) -> Option<&CmdMetadataEntry> {
        self.cache.cmd_metadata_map.get(basename)
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
    fn v0_upgrades_to_single_target_v2() {
        let text = r#"
[cached]
target_tuple = "riscv64-unknown-linux-gnu"
toolchain_bindir = "/tc/bin"
profile_common_flags = "-march=rv64gc -mabi=lp64d"
qemu_bin = "/emu/qemu-riscv64"
"#;
        let root: VenvCacheRoot = toml::from_str(text).unwrap();
        let v2 = root.into_v2(Some("/venv/sysroot")).unwrap();

        assert_eq!(v2.targets.len(), 1);
        let t = &v2.targets["riscv64-unknown-linux-gnu"];
        assert_eq!(t.toolchain_bindir, "/tc/bin");
        assert_eq!(t.toolchain_flags, "-march=rv64gc -mabi=lp64d");
        assert_eq!(t.toolchain_sysroot.as_deref(), Some("/venv/sysroot"));
        assert_eq!(v2.qemu_bin.as_deref(), Some("/emu/qemu-riscv64"));
    }

    #[test]
    fn v1_replicates_flags_to_every_target() {
        let text = r#"
[cached_v1]
profile_common_flags = "-march=rv64gc -mabi=lp64d"

[cached_v1.targets."riscv64-unknown-linux-gnu"]
toolchain_bindir = "/tc1/bin"

[cached_v1.targets."riscv32-unknown-elf"]
toolchain_bindir = "/tc2/bin"
"#;
        let root: VenvCacheRoot = toml::from_str(text).unwrap();
        let v2 = root.into_v2(None).unwrap();
        assert_eq!(v2.targets.len(), 2);
        for t in v2.targets.values() {
            assert_eq!(t.toolchain_flags, "-march=rv64gc -mabi=lp64d");
        }
    }

    #[test]
    fn v2_passes_through() {
        let v2 = VenvCacheV2 {
            profile_emu_env: None,
            qemu_bin: None,
            targets: [(
                "riscv64-unknown-linux-gnu".to_owned(),
                VenvCacheV2Target {
                    toolchain_bindir: "/tc/bin".to_owned(),
                    toolchain_sysroot: None,
                    toolchain_flags: "-mcpu=thead-c910 -mabi=lp64d".to_owned(),
                    gcc_install_dir: None,
                },
            )]
            .into_iter()
            .collect(),
            cmd_metadata_map: BTreeMap::new(),
        };

        let written = toml::to_string_pretty(&VenvCacheRoot::for_write(v2.clone())).unwrap();
        let reread: VenvCacheRoot = toml::from_str(&written).unwrap();
        assert_eq!(reread.into_v2(None).unwrap(), v2);
    }

    #[test]
    fn probe_prefers_explicit_env_root() {
        let mode = GlobalMode {
            argv0: "/nowhere/bin/riscv64-unknown-linux-gnu-gcc".to_owned(),
            self_exe: "/usr/bin/ruyi".into(),
            porcelain: false,
            debug: false,
            experimental: false,
            venv_root: Some("/explicit/venv".into()),
            telemetry_optout: false,
            force_allow_root: false,
        };
        assert_eq!(
            RuyiVenvConfig::probe_venv_root(&mode),
            Some(PathBuf::from("/explicit/venv"))
        );
    }

    #[test]
    fn probe_walks_up_from_argv0() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path();
        std::fs::create_dir_all(venv.join("bin")).unwrap();
        std::fs::write(venv.join(VENV_CONFIG_NAME), "[config]\nprofile = \"p\"\n").unwrap();

        let mode = GlobalMode {
            argv0: venv
                .join("bin/riscv64-unknown-linux-gnu-gcc")
                .display()
                .to_string(),
            self_exe: "/usr/bin/ruyi".into(),
            porcelain: false,
            debug: false,
            experimental: false,
            venv_root: None,
            telemetry_optout: false,
            force_allow_root: false,
        };
        assert_eq!(
            RuyiVenvConfig::probe_venv_root(&mode),
            Some(venv.to_owned())
        );

        let bare = GlobalMode {
            argv0: "gcc".to_owned(),
            venv_root: None,
            ..mode
        };
        assert_eq!(RuyiVenvConfig::probe_venv_root(&bare), None);
    }
}

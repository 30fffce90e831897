// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: profile
//
//  Arch-specific compiler-flag profiles, parsed from `profiles/<arch>.toml`
//  in the metadata repo. Each arch has a registered parser; RISC-V
//  (riscv32 / riscv64) is built in.
//
//  RISC-V file shape:
//
//      arch = "riscv64"
//
//      [generic_opts]
//      march = "rv64gc"
//      mabi  = "lp64d"
//
//      [flavor_specific_mcpus.xthead-cpu]
//      "sifive-u74" = "thead-c910"
//
//      [[profiles]]
//      id = "rv64gc-lp64d"
//      need_quirks = ["rv64"]
//
//  A "generic" profile is always emitted from generic_opts in addition to
//  the declared ones.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
//  Model
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub arch: String,
    pub need_quirks: BTreeSet<String>,
    knobs: ProfileKnobs,
}

#[derive(Debug, Clone)]
enum ProfileKnobs {
    Riscv(RiscvKnobs),
}

#[derive(Debug, Clone)]
struct RiscvKnobs {
    march: String,
    mabi: String,
    mcpu: Option<String>,
    /// quirk → (generic mcpu name → quirk-specific mcpu name)
    mcpu_map: BTreeMap<String, BTreeMap<String, String>>,
}

impl Profile {
    /// Whether a toolchain advertising `quirks` can serve this profile.
    pub fn check_quirks(&self, quirks: &[String]) -> bool {
        self.need_quirks.iter().all(|q| quirks.contains(q))
    }

    /// The common compiler flags for a toolchain with the given quirks.
    /// When an mcpu is configured (possibly rewritten through the
    /// quirk-specific map), `-mcpu` wins over `-march`.
    pub fn get_common_flags(&self, toolchain_quirks: &[String]) -> String {
        match &self.knobs {
            ProfileKnobs::Riscv(k) => {
                let mut mcpu = k.mcpu.clone();
                if let Some(cur) = &mcpu {
                    for (quirk, subs) in &k.mcpu_map {
                        if !toolchain_quirks.contains(quirk) {
                            continue;
                        }
                        if let Some(rewritten) = subs.get(cur) {
                            mcpu = Some(rewritten.clone());
                            break;
                        }
                    }
                }
                match mcpu {
                    Some(mcpu) => format!("-mcpu={mcpu} -mabi={}", k.mabi),
                    None => format!("-march={} -mabi={}", k.march, k.mabi),
                }
            }
        }
    }

    /// Whether an emulator program of `flavor` (advertising `flavor_quirks`)
    /// is acceptable for this profile.
    pub fn check_emulator_flavor(&self, _flavor: &str, flavor_quirks: &[String]) -> bool {
        self.need_quirks.iter().all(|q| flavor_quirks.contains(q))
    }

    /// Environment an emulator of `flavor` needs inside a venv of this
    /// profile.
    pub fn emu_env(
        &self,
        flavor: &str,
        sysroot: Option<&Path>,
    ) -> Option<BTreeMap<String, String>> {
        if flavor != "qemu-linux-user" {
            return None;
        }
        let sysroot = sysroot?;
        let mut env = BTreeMap::new();
        env.insert(
            "QEMU_LD_PREFIX".to_owned(),
            sysroot.display().to_string(),
        );
        Some(env)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  RISC-V parser
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RiscvArchDoc {
    arch: String,
    generic_opts: RiscvOpts,
    #[serde(default)]
    flavor_specific_mcpus: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    profiles: Vec<RiscvProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct RiscvOpts {
    march: String,
    mabi: String,
    mcpu: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RiscvProfileEntry {
    id: String,
    #[serde(default)]
    need_quirks: Vec<String>,
    march: Option<String>,
    mabi: Option<String>,
    mcpu: Option<String>,
}

fn parse_riscv_profiles(doc: RiscvArchDoc) -> Vec<Profile> {
    let mut out = Vec::new();

    let base = |entry: Option<&RiscvProfileEntry>| RiscvKnobs {
        march: entry
            .and_then(|e| e.march.clone())
            .unwrap_or_else(|| doc.generic_opts.march.clone()),
        mabi: entry
            .and_then(|e| e.mabi.clone())
            .unwrap_or_else(|| doc.generic_opts.mabi.clone()),
        mcpu: entry
            .and_then(|e| e.mcpu.clone())
            .or_else(|| doc.generic_opts.mcpu.clone()),
        mcpu_map: doc.flavor_specific_mcpus.clone(),
    };

    out.push(Profile {
        id: "generic".to_owned(),
        arch: doc.arch.clone(),
        need_quirks: BTreeSet::new(),
        knobs: ProfileKnobs::Riscv(base(None)),
    });

    for entry in &doc.profiles {
        out.push(Profile {
            id: entry.id.clone(),
            arch: doc.arch.clone(),
            need_quirks: entry.need_quirks.iter().cloned().collect(),
            knobs: ProfileKnobs::Riscv(base(Some(entry))),
        });
    }

    out
}

// ─────────────────────────────────────────────────────────────────────────────
//  Registry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileRegistry {
    pub fn load(profiles_root: &Path) -> Result<Self> {
        let mut registry = Self::default();

        let entries = match std::fs::read_dir(profiles_root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(registry),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            registry.load_arch_document(&text, &path)?;
        }

        Ok(registry)
    }

    fn load_arch_document(&mut self, text: &str, path: &Path) -> Result<()> {
        #[derive(Deserialize)]
        struct ArchProbe {
            arch: String,
        }
        let probe: ArchProbe =
            toml::from_str(text).map_err(|e| Error::MalformedConfigFile {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;

        let profiles = match probe.arch.as_str() {
            "riscv32" | "riscv64" => {
                let doc: RiscvArchDoc =
                    toml::from_str(text).map_err(|e| Error::MalformedConfigFile {
                        path: path.to_owned(),
                        reason: e.to_string(),
                    })?;
                parse_riscv_profiles(doc)
            }
            other => {
                return Err(Error::Other(format!(
                    "arch '{other}' has no registered profile parser"
                )))
            }
        };

        for p in profiles {
            self.profiles.insert(p.id.clone(), p);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RISCV64_DOC: &str = r#"
arch = "riscv64"

[generic_opts]
march = "rv64gc"
mabi = "lp64d"

[flavor_specific_mcpus.xthead-cpu]
"sifive-u74" = "thead-c910"

[[profiles]]
id = "rv64gc-lp64d"
need_quirks = ["rv64"]

[[profiles]]
id = "milkv-duo"
need_quirks = ["rv64", "xthead-cpu"]
march = "rv64gc_xtheadc"
mcpu = "sifive-u74"
"#;

    fn registry() -> ProfileRegistry {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("riscv64.toml"), RISCV64_DOC).unwrap();
        ProfileRegistry::load(dir.path()).unwrap()
    }

    #[test]
    fn generic_profile_is_always_present() {
        let reg = registry();
        let generic = reg.get("generic").unwrap();
        assert_eq!(generic.get_common_flags(&[]), "-march=rv64gc -mabi=lp64d");
        assert!(generic.need_quirks.is_empty());
    }

    #[test]
    fn declared_profile_inherits_generic_opts() {
        let reg = registry();
        let p = reg.get("rv64gc-lp64d").unwrap();
        assert_eq!(
            p.get_common_flags(&["rv64".to_owned()]),
            "-march=rv64gc -mabi=lp64d"
        );
        assert!(p.check_quirks(&["rv64".to_owned(), "vendor-x".to_owned()]));
        assert!(!p.check_quirks(&["vendor-x".to_owned()]));
    }

    #[test]
    fn mcpu_wins_and_is_rewritten_by_quirk() {
        let reg = registry();
        let p = reg.get("milkv-duo").unwrap();

        // plain toolchain: configured mcpu as-is
        assert_eq!(
            p.get_common_flags(&["rv64".to_owned()]),
            "-mcpu=sifive-u74 -mabi=lp64d"
        );
        // toolchain with the xthead quirk: mcpu rewritten through the map
        assert_eq!(
            p.get_common_flags(&["rv64".to_owned(), "xthead-cpu".to_owned()]),
            "-mcpu=thead-c910 -mabi=lp64d"
        );
    }

    #[test]
    fn emulator_flavor_check_uses_quirks() {
        let reg = registry();
        let p = reg.get("rv64gc-lp64d").unwrap();
        assert!(p.check_emulator_flavor("qemu-linux-user", &["rv64".to_owned()]));
        assert!(!p.check_emulator_flavor("qemu-linux-user", &[]));
    }

    #[test]
    fn qemu_user_flavor_gets_ld_prefix_env() {
        let reg = registry();
        let p = reg.get("generic").unwrap();
        let env = p
            .emu_env("qemu-linux-user", Some(Path::new("/venv/sysroot")))
            .unwrap();
        assert_eq!(env["QEMU_LD_PREFIX"], "/venv/sysroot");
        assert!(p.emu_env("qemu-system", Some(Path::new("/x"))).is_none());
    }

    #[test]
    fn unknown_arch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("m68k.toml"),
            "arch = \"m68k\"\n[generic_opts]\nmarch = \"x\"\nmabi = \"y\"\n",
        )
        .unwrap();
        assert!(ProfileRegistry::load(dir.path()).is_err());
    }
}

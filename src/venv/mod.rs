// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: venv
//
//  The virtual-environment synthesizer: stitches one or more resolved
//  toolchain packages (plus an optional emulator and extra command
//  packages) into a self-consistent cross-build prefix under a profile:
//
//      <dest>/bin/                     shims → the ruyi executable
//      <dest>/sysroot.<target>/        copied sysroot per target
//      <dest>/sysroot                  symlink to the primary's
//      <dest>/toolchain.<target>.cmake + unqualified symlink
//      <dest>/meson-cross.<target>.ini + unqualified symlink
//      <dest>/ruyi-venv.toml           config section
//      <dest>/ruyi-cache.v2.toml       per-target cache for the mux
//      <dest>/binfmt.conf              emulator binfmt_misc lines
//      <dest>/bin/ruyi-activate        shell activation script
// ─────────────────────────────────────────────────────────────────────────────

pub mod cfg;
pub mod templates;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::host::RuyiHost;
use crate::log::Console;
use crate::pkg::manifest::{EmulatorProgDecl, PackageManifest, ToolchainDecl};
use crate::pkg::resolve;
use crate::repo::profile::Profile;
use crate::repo::MetadataRepo;

use self::cfg::{
    CmdMetadataEntry, VenvCacheRoot, VenvCacheV2, VenvCacheV2Target, VenvConfigRoot,
    VenvConfigSection,
};
use self::templates::{ActivateContext, MesonBinary, ToolchainFileContext};

// ─────────────────────────────────────────────────────────────────────────────
//  Request & resolved target
// ─────────────────────────────────────────────────────────────────────────────

pub struct VenvRequest<'a> {
    pub host: &'a RuyiHost,
    pub profile_id: &'a str,
    pub dest: PathBuf,
    pub with_sysroot: bool,
    pub override_name: Option<String>,
    pub toolchain_atoms: &'a [String],
    pub emulator_atom: Option<&'a str>,
    pub sysroot_atom: Option<&'a str>,
    pub extra_cmd_atoms: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CcFlavor {
    Gcc,
    Clang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinutilsFlavor {
    Binutils,
    Llvm,
}

#[derive(Debug)]
struct ConfiguredTarget {
    target: String,
    toolchain_root: PathBuf,
    toolchain_sysroot: Option<PathBuf>,
    toolchain_flags: String,
    cc_flavor: CcFlavor,
    binutils_flavor: BinutilsFlavor,
    gcc_install_dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────────────────────

pub fn make_venv(cfg: &GlobalConfig, repo: &MetadataRepo, req: &VenvRequest<'_>) -> Result<()> {
    let console = cfg.console();
    let include_pre = cfg.include_prereleases();

    let profile = repo
        .profiles()?
        .get(req.profile_id)
        .ok_or_else(|| Error::UnknownProfile(req.profile_id.to_owned()))?
        .clone();

    // ── toolchains ────────────────────────────────────────────────────────
    let mut targets: Vec<ConfiguredTarget> = Vec::new();
    let mut target_arch = String::new();
    let mut warn_differing_arch = false;

    for tc_atom in req.toolchain_atoms {
        let tc_pm = resolve::resolve_atom(repo, tc_atom, include_pre)?;
        let tc = tc_pm
            .toolchain_metadata()
            .ok_or_else(|| Error::Other(format!("the package '{tc_atom}' is not a toolchain")))?;

        if !profile.check_quirks(&tc.quirks) {
            return Err(Error::QuirksUnsatisfied {
                needed: profile.need_quirks.iter().cloned().collect(),
                provided: tc.quirks.clone(),
            });
        }
        if targets.iter().any(|t| t.target == tc.target) {
            return Err(Error::DuplicateTarget(tc.target.clone()));
        }

        let toolchain_root = installed_root(cfg, req.host, &tc_pm)?;
        let cc_flavor = if tc.has_clang() {
            CcFlavor::Clang
        } else {
            CcFlavor::Gcc
        };
        let binutils_flavor = if tc.has_llvm() {
            BinutilsFlavor::Llvm
        } else {
            BinutilsFlavor::Binutils
        };

        let (toolchain_sysroot, gcc_install_dir) = if req.with_sysroot {
            source_sysroot(cfg, repo, req, &toolchain_root, tc, cc_flavor, include_pre)?
        } else {
            (None, None)
        };

        if target_arch.is_empty() {
            target_arch = tc.target_arch().to_owned();
        } else if target_arch != tc.target_arch() {
            warn_differing_arch = true;
        }

        let configured = ConfiguredTarget {
            target: tc.target.clone(),
            toolchain_root,
            toolchain_sysroot,
            toolchain_flags: profile.get_common_flags(&tc.quirks),
            cc_flavor,
            binutils_flavor,
            gcc_install_dir,
        };
        console.debug(&format!("configuration for {}: {configured:?}", tc.target));
        targets.push(configured);
    }

    if targets.is_empty() {
        return Err(Error::Other(
            "at least one toolchain atom is required for a venv".to_owned(),
        ));
    }
    if warn_differing_arch {
        console.warn("multiple toolchains specified with differing target architecture");
        console.info(&format!(
            "using the target architecture of the first toolchain: {target_arch}"
        ));
    }

    // ── emulator ──────────────────────────────────────────────────────────
    let mut emu_root: Option<PathBuf> = None;
    let mut emu_progs: Vec<EmulatorProgDecl> = Vec::new();
    if let Some(emu_atom) = req.emulator_atom {
        let emu_pm = resolve::resolve_atom(repo, emu_atom, include_pre)?;
        let em = emu_pm
            .emulator_metadata()
            .ok_or_else(|| Error::Other(format!("the package '{emu_atom}' is not an emulator")))?;

        let progs: Vec<EmulatorProgDecl> =
            em.progs_for_arch(&target_arch).into_iter().cloned().collect();
        if progs.is_empty() {
            return Err(Error::Other(format!(
                "the emulator package '{emu_atom}' does not support the target architecture {target_arch}"
            )));
        }
        // every selected program entry must satisfy the profile
        for prog in &progs {
            let quirks = em.flavor_quirks(&prog.flavor);
            if !profile.check_emulator_flavor(&prog.flavor, quirks) {
                return Err(Error::QuirksUnsatisfied {
                    needed: profile.need_quirks.iter().cloned().collect(),
                    provided: quirks.to_vec(),
                });
            }
        }

        emu_root = Some(installed_root(cfg, req.host, &emu_pm)?);
        emu_progs = progs;
    }

    // ── extra commands ────────────────────────────────────────────────────
    let mut extra_cmds: BTreeMap<String, (String, String)> = BTreeMap::new(); // name → (dest, provider)
    for cmd_atom in req.extra_cmd_atoms {
        let cmd_pm = resolve::resolve_atom(repo, cmd_atom, include_pre)?;
        let Some(commands) = cmd_pm
            .binary_metadata()
            .and_then(|bm| bm.commands_for_host(&req.host.to_string()))
            .filter(|c| !c.is_empty())
        else {
            console.warn(&format!(
                "the package '{cmd_atom}' provides no command for host {}, ignoring",
                req.host
            ));
            continue;
        };

        let cmd_root = installed_root(cfg, req.host, &cmd_pm)?;
        let canon_root = std::fs::canonicalize(&cmd_root)?;
        for (cmd, rel_path) in commands {
            let resolved = std::fs::canonicalize(cmd_root.join(rel_path))?;
            if !resolved.starts_with(&canon_root) {
                return Err(Error::Other(format!(
                    "command '{cmd}' resolves outside of its providing package"
                )));
            }
            if let Some((_, old_provider)) = extra_cmds.get(cmd) {
                console.warn(&format!(
                    "command '{cmd}' from {old_provider} is shadowed by {}",
                    cmd_pm.display_name()
                ));
            }
            extra_cmds.insert(
                cmd.clone(),
                (resolved.display().to_string(), cmd_pm.display_name()),
            );
        }
    }

    match &req.override_name {
        Some(name) => console.info(&format!(
            "creating a Ruyi virtual environment '{name}' at {}",
            req.dest.display()
        )),
        None => console.info(&format!(
            "creating a Ruyi virtual environment at {}",
            req.dest.display()
        )),
    }

    let maker = VenvMaker {
        cfg,
        profile,
        targets,
        venv_root: req.dest.clone(),
        emu_root,
        emu_progs,
        extra_cmds,
        override_name: req.override_name.clone(),
    };
    maker.provision()?;

    console.ok(&format!(
        "virtual environment ready; activate it with `. {}/bin/ruyi-activate`",
        req.dest.display()
    ));
    Ok(())
}

fn installed_root(
    cfg: &GlobalConfig,
    host: &RuyiHost,
    pm: &PackageManifest,
) -> Result<PathBuf> {
    cfg.lookup_binary_install_dir(host, &pm.name_for_installation())
        .ok_or_else(|| {
            Error::Other(format!(
                "package {} is not installed for host {host}\n  Hint: run `ruyi install {}` first",
                pm.name_for_installation(),
                pm.display_name()
            ))
        })
}

/// Sysroot sourcing policy: prefer the toolchain's own included sysroot;
/// otherwise take the sysroot package's. A Clang toolchain additionally
/// needs the GCC lib/include directory out of the sysroot provider.
fn source_sysroot(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    req: &VenvRequest<'_>,
    toolchain_root: &Path,
    tc: &ToolchainDecl,
    cc_flavor: CcFlavor,
    include_pre: bool,
) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    if let Some(rel) = &tc.included_sysroot {
        return Ok((Some(toolchain_root.join(rel)), None));
    }

    let Some(sysroot_atom) = req.sysroot_atom else {
        return Err(Error::Other(
            "sysroot is requested but the toolchain package does not include one, and no sysroot package was given"
                .to_owned(),
        ));
    };

    let provider_pm = resolve::resolve_atom(repo, sysroot_atom, include_pre)?;
    let provider_tc = provider_pm.toolchain_metadata().ok_or_else(|| {
        Error::Other(format!("the package '{sysroot_atom}' is not a toolchain"))
    })?;
    let provider_root = installed_root(cfg, req.host, &provider_pm)?;
    let rel = provider_tc.included_sysroot.as_ref().ok_or_else(|| {
        Error::Other(format!(
            "sysroot is requested but the package '{sysroot_atom}' does not contain one"
        ))
    })?;
    let sysroot_dir = provider_root.join(rel);

    // Clang needs the GCC include & lib directory from the provider
    let gcc_install_dir = if cc_flavor == CcFlavor::Clang {
        Some(find_gcc_install_dir(&provider_root, &provider_tc.target)?)
    } else {
        None
    };

    Ok((Some(sysroot_dir), gcc_install_dir))
}

/// Probe `<root>/lib/gcc/<target>/*`, requiring exactly one directory.
fn find_gcc_install_dir(install_root: &Path, target_tuple: &str) -> Result<PathBuf> {
    let search_root = install_root.join("lib/gcc").join(target_tuple);
    let mut dirs: Vec<PathBuf> = match std::fs::read_dir(&search_root) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    };
    if dirs.len() != 1 {
        return Err(Error::MissingGccLibDir(search_root));
    }
    Ok(dirs.remove(0))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Materialization
// ─────────────────────────────────────────────────────────────────────────────

struct VenvMaker<'a> {
    cfg: &'a GlobalConfig,
    profile: Profile,
    targets: Vec<ConfiguredTarget>,
    venv_root: PathBuf,
    emu_root: Option<PathBuf>,
    emu_progs: Vec<EmulatorProgDecl>,
    extra_cmds: BTreeMap<String, (String, String)>,
    override_name: Option<String>,
}

impl VenvMaker<'_> {
    fn console(&self) -> &Console {
        self.cfg.console()
    }

    fn bindir(&self) -> PathBuf {
        self.venv_root.join("bin")
    }

    fn sysroot_destdir(&self, target: Option<&str>) -> Option<PathBuf> {
        let t = match target {
            Some(t) => self.targets.iter().find(|x| x.target == t)?,
            None => self.targets.first()?,
        };
        t.toolchain_sysroot.as_ref()?;
        let name = match target {
            Some(t) => format!("sysroot.{t}"),
            None => "sysroot".to_owned(),
        };
        Some(self.venv_root.join(name))
    }

    fn provision(&self) -> Result<()> {
        std::fs::create_dir(&self.venv_root)?;
        std::fs::create_dir(self.bindir())?;

        let venv_cfg = VenvConfigRoot {
            config: VenvConfigSection {
                profile: self.profile.id.clone(),
                sysroot: self.sysroot_destdir(None),
            },
        };
        write_toml(&self.venv_root.join(cfg::VENV_CONFIG_NAME), &venv_cfg)?;

        for (i, tgt) in self.targets.iter().enumerate() {
            self.provision_target(tgt, i == 0)?;
        }

        for cmd in self.extra_cmds.keys() {
            self.shim(&self.bindir().join(cmd))?;
        }

        let activate = templates::render_activate(&ActivateContext {
            venv_root: self.venv_root.display().to_string(),
            venv_name: self
                .override_name
                .clone()
                .unwrap_or_else(|| self.profile.id.clone()),
        })?;
        let activate_path = self.bindir().join("ruyi-activate");
        std::fs::write(&activate_path, activate)?;
        make_executable(&activate_path)?;

        let (qemu_bin, profile_emu_env) = self.provision_emulator()?;

        let cache = self.make_cache(qemu_bin, profile_emu_env)?;
        write_toml(
            &self.venv_root.join(cfg::VENV_CACHE_V2_NAME),
            &VenvCacheRoot::for_write(cache),
        )?;

        Ok(())
    }

    fn provision_emulator(
        &self,
    ) -> Result<(Option<String>, Option<BTreeMap<String, String>>)> {
        let Some(emu_root) = &self.emu_root else {
            return Ok((None, None));
        };

        let mut binfmt_lines = Vec::new();
        let mut qemu_bin = None;
        let mut emu_env = None;

        for prog in &self.emu_progs {
            let prog_path = emu_root.join(&prog.path);
            if let Some(binfmt) = &prog.binfmt_misc {
                binfmt_lines.push(binfmt.replace("$BIN", &prog_path.display().to_string()));
            }
            if prog.is_qemu() && qemu_bin.is_none() {
                qemu_bin = Some(prog_path.display().to_string());
                emu_env = self.profile.emu_env(
                    &prog.flavor,
                    self.sysroot_destdir(None).as_deref(),
                );
                self.console().debug("symlinking the ruyi-qemu wrapper");
                self.shim(&self.bindir().join("ruyi-qemu"))?;
            }
        }

        if !binfmt_lines.is_empty() {
            let mut body = binfmt_lines.join("\n");
            body.push('\n');
            std::fs::write(self.venv_root.join("binfmt.conf"), body)?;
        }

        Ok((qemu_bin, emu_env))
    }

    fn make_cache(
        &self,
        qemu_bin: Option<String>,
        profile_emu_env: Option<BTreeMap<String, String>>,
    ) -> Result<VenvCacheV2> {
        let mut cache_targets = BTreeMap::new();
        let mut cmd_map: BTreeMap<String, CmdMetadataEntry> = BTreeMap::new();

        for tgt in &self.targets {
            let bindir = tgt.toolchain_root.join("bin");
            cache_targets.insert(
                tgt.target.clone(),
                VenvCacheV2Target {
                    toolchain_bindir: bindir.display().to_string(),
                    toolchain_sysroot: self
                        .sysroot_destdir(Some(&tgt.target))
                        .map(|p| p.display().to_string()),
                    toolchain_flags: tgt.toolchain_flags.clone(),
                    gcc_install_dir: tgt
                        .gcc_install_dir
                        .as_ref()
                        .map(|p| p.display().to_string()),
                },
            );

            for cmd in binaries_to_shim(&bindir, self.console())? {
                cmd_map.insert(
                    cmd.clone(),
                    CmdMetadataEntry {
                        dest: bindir.join(&cmd).display().to_string(),
                        target_tuple: tgt.target.clone(),
                    },
                );
            }
        }

        for (cmd, (dest, provider)) in &self.extra_cmds {
            if cmd_map.contains_key(cmd) {
                self.console().warn(&format!(
                    "extra command {cmd} (from {provider}) overrides a toolchain command"
                ));
            }
            cmd_map.insert(
                cmd.clone(),
                CmdMetadataEntry {
                    dest: dest.clone(),
                    target_tuple: String::new(),
                },
            );
        }

        Ok(VenvCacheV2 {
            profile_emu_env,
            qemu_bin,
            targets: cache_targets,
            cmd_metadata_map: cmd_map,
        })
    }

    fn provision_target(&self, tgt: &ConfiguredTarget, is_primary: bool) -> Result<()> {
        let console = self.console();
        let target = &tgt.target;

        if let (Some(sysroot_src), Some(sysroot_dest)) = (
            tgt.toolchain_sysroot.as_ref(),
            self.sysroot_destdir(Some(target)),
        ) {
            console.debug(&format!("copying sysroot for {target}"));
            copy_tree(sysroot_src, &sysroot_dest)?;

            if is_primary {
                if let Some(primary) = self.sysroot_destdir(None) {
                    console.debug("symlinking primary sysroot into place");
                    symlink(Path::new(&format!("sysroot.{target}")), &primary)?;
                }
            }
        }

        console.debug(&format!("symlinking {target} binaries into venv"));
        let toolchain_bindir = tgt.toolchain_root.join("bin");
        for cmd in binaries_to_shim(&toolchain_bindir, console)? {
            self.shim(&self.bindir().join(cmd))?;
        }

        if tgt.binutils_flavor == BinutilsFlavor::Llvm {
            self.compat_symlinks(target, LLVM_BINUTILS_ALIASES)?;
        }
        if tgt.cc_flavor == CcFlavor::Clang {
            self.compat_symlinks(target, CLANG_GCC_ALIASES)?;
        }

        // CMake toolchain file & Meson cross file
        let bindir = self.bindir();
        let (cc, cxx) = match tgt.cc_flavor {
            CcFlavor::Clang => (bindir.join("clang"), bindir.join("clang++")),
            CcFlavor::Gcc => (
                bindir.join(format!("{target}-gcc")),
                bindir.join(format!("{target}-g++")),
            ),
        };

        let binaries = MESON_TOOLS
            .iter()
            .map(|tool| MesonBinary {
                name: (*tool).to_owned(),
                path: match tgt.binutils_flavor {
                    BinutilsFlavor::Binutils => {
                        bindir.join(format!("{target}-{tool}")).display().to_string()
                    }
                    BinutilsFlavor::Llvm => {
                        bindir.join(format!("llvm-{tool}")).display().to_string()
                    }
                },
            })
            .collect();

        let ctx = ToolchainFileContext {
            processor: self.profile.arch.clone(),
            cc: cc.display().to_string(),
            cxx: cxx.display().to_string(),
            sysroot: self
                .sysroot_destdir(Some(target))
                .map(|p| p.display().to_string()),
            venv_root: self.venv_root.display().to_string(),
            binaries,
        };

        let cmake_path = self.venv_root.join(format!("toolchain.{target}.cmake"));
        std::fs::write(&cmake_path, templates::render_toolchain_cmake(&ctx)?)?;

        let meson_path = self.venv_root.join(format!("meson-cross.{target}.ini"));
        std::fs::write(&meson_path, templates::render_meson_cross(&ctx)?)?;

        if is_primary {
            console.debug(&format!(
                "making cmake & meson file symlinks to primary target {target}"
            ));
            symlink(
                Path::new(&format!("toolchain.{target}.cmake")),
                &self.venv_root.join("toolchain.cmake"),
            )?;
            symlink(
                Path::new(&format!("meson-cross.{target}.ini")),
                &self.venv_root.join("meson-cross.ini"),
            )?;
        }

        Ok(())
    }

    /// Symlink the ruyi executable into the venv under `dest`'s basename.
    fn shim(&self, dest: &Path) -> Result<()> {
        match symlink(&self.cfg.mode.self_exe, dest) {
            Ok(()) => Ok(()),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                self.console().debug(&format!(
                    "shim {} already present, keeping the first",
                    dest.display()
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn compat_symlinks(&self, target: &str, aliases: &[(&str, &str)]) -> Result<()> {
        for (compat, real) in aliases {
            let link = self.bindir().join(format!("{target}-{compat}"));
            match symlink(Path::new(real), &link) {
                Ok(()) => {}
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Alias tables & shim filtering
// ─────────────────────────────────────────────────────────────────────────────

const LLVM_BINUTILS_ALIASES: &[(&str, &str)] = &[
    ("addr2line", "llvm-addr2line"),
    ("ar", "llvm-ar"),
    ("as", "llvm-as"),
    ("c++filt", "llvm-cxxfilt"),
    ("gcc-ar", "llvm-ar"),
    ("gcc-nm", "llvm-nm"),
    ("gcc-ranlib", "llvm-ranlib"),
    ("ld", "ld.lld"),
    ("nm", "llvm-nm"),
    ("objcopy", "llvm-objcopy"),
    ("objdump", "llvm-objdump"),
    ("ranlib", "llvm-ranlib"),
    ("readelf", "llvm-readelf"),
    ("size", "llvm-size"),
    ("strings", "llvm-strings"),
    ("strip", "llvm-strip"),
];

const CLANG_GCC_ALIASES: &[(&str, &str)] = &[
    ("c++", "clang++"),
    ("cc", "clang"),
    ("cpp", "clang-cpp"),
    ("g++", "clang++"),
    ("gcc", "clang"),
];

const MESON_TOOLS: &[&str] = &["ar", "nm", "objcopy", "objdump", "ranlib", "readelf", "strip"];

/// Executables in a toolchain bindir that deserve a shim, in sorted order.
fn binaries_to_shim(bindir: &Path, console: &Console) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(bindir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !is_executable(&entry.path()) {
            console.debug(&format!("skipping non-executable {name} in src bindir"));
            continue;
        }
        if should_ignore_symlinking(&name) {
            console.debug(&format!("skipping command {name} explicitly"));
            continue;
        }
        out.push(name);
    }
    out.sort();
    Ok(out)
}

fn should_ignore_symlinking(name: &str) -> bool {
    is_command_specific_to_ct_ng(name) || is_command_versioned_cc(name)
}

/// crosstool-NG helper commands never get shims.
fn is_command_specific_to_ct_ng(name: &str) -> bool {
    name.ends_with("populate") || name.ends_with("ct-ng.config")
}

/// "<…->gcc-13.1.0", "clang-17" and friends: versioned CC names.
fn is_command_versioned_cc(name: &str) -> bool {
    let Some((stem, ver)) = name.rsplit_once('-') else {
        return false;
    };
    if ver.is_empty() || !ver.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return false;
    }
    let base = stem.rsplit('-').next().unwrap_or(stem);
    matches!(base, "cc" | "gcc" | "c++" | "g++" | "cpp" | "clang" | "clang++")
}

// ─────────────────────────────────────────────────────────────────────────────
//  Filesystem helpers
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst)?;
    Ok(())
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(p)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

#[cfg(unix)]
fn make_executable(p: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(p, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_p: &Path) -> Result<()> {
    Ok(())
}

/// Copy a sysroot tree, preserving symlinks and tolerating dangling ones.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Other(e.to_string()))?;
        let out = dst.join(rel);

        let ftype = entry.file_type();
        if ftype.is_symlink() {
            let link_target = std::fs::read_link(entry.path())?;
            symlink(&link_target, &out)?;
        } else if ftype.is_dir() {
            std::fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

fn write_toml<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = toml::to_string_pretty(value)
        .map_err(|e| Error::Other(format!("failed to serialize {}: {e}", path.display())))?;
    std::fs::write(path, text)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

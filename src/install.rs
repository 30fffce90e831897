// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: install
//
//  The install / extract / uninstall pipelines. Install works through a
//  temp directory next to the final install root and finishes with one
//  atomic rename, so an interrupted or failed install never leaves a
//  half-populated root — only a `.ruyi-tmp*` directory for later cleanup.
//  The ledger is written only after the rename succeeds.
// ─────────────────────────────────────────────────────────────────────────────

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::fetch::{self, FetcherKind};
use crate::host::RuyiHost;
use crate::pkg::distfile::Distfile;
use crate::pkg::manifest::{DistfileDecl, PackageManifest};
use crate::pkg::resolve::{self, InstalledStore};
use crate::repo::MetadataRepo;
use crate::state::InstallationLedger;
use crate::unpack;

/// Whether a directory exists and has at least one entry.
fn is_root_likely_populated(root: &Path) -> bool {
    std::fs::read_dir(root)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false)
}

fn warn_known_issues(cfg: &GlobalConfig, repo: &MetadataRepo, pm: &PackageManifest) {
    if !pm.has_known_issues() {
        return;
    }
    let console = cfg.console();
    console.warn(&format!(
        "package {} has known issue(s)",
        pm.display_name()
    ));
    for line in repo.render_known_issues(pm, &cfg.lang_code()) {
        console.info(&line);
    }
}

fn distfile<'a>(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    decl: &'a DistfileDecl,
) -> Result<Distfile<'a>> {
    let urls = repo.get_distfile_urls(decl)?;
    let reason = repo.render_fetch_restriction(decl, &cfg.lang_code());
    Ok(Distfile::new(decl, urls, &cfg.distfiles_dir(), reason))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Install
// ─────────────────────────────────────────────────────────────────────────────

pub fn install_atoms(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    ledger: &mut InstallationLedger,
    atom_strs: &[String],
    host: &RuyiHost,
    fetch_only: bool,
    reinstall: bool,
) -> Result<()> {
    let console = cfg.console();
    console.debug(&format!("about to install for host {host}: {atom_strs:?}"));
    let fetcher = fetch::select_fetcher(console)?;

    for atom_str in atom_strs {
        let pm = resolve::resolve_atom(repo, atom_str, cfg.include_prereleases())?;
        warn_known_issues(cfg, repo, &pm);

        if pm.binary_metadata().is_some() {
            install_binary_pkg(cfg, repo, ledger, &pm, host, fetcher, fetch_only, reinstall)?;
        } else if pm.blob_metadata().is_some() {
            install_blob_pkg(cfg, repo, ledger, &pm, fetcher, fetch_only, reinstall)?;
        } else if fetch_only && pm.source_metadata().is_some() {
            // fetching a source-only package is allowed for later extraction
            fetch_source_pkg(cfg, repo, &pm, fetcher)?;
        } else {
            return Err(Error::NotInstallable(pm.display_name()));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn install_binary_pkg(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    ledger: &mut InstallationLedger,
    pm: &PackageManifest,
    host: &RuyiHost,
    fetcher: FetcherKind,
    fetch_only: bool,
    reinstall: bool,
) -> Result<()> {
    let host_str = host.to_string();
    let install_root = cfg.binary_install_root(host, &pm.name_for_installation());

    let distfile_names = pm
        .binary_metadata()
        .and_then(|bm| bm.distfile_names_for_host(&host_str))
        .map(<[String]>::to_vec)
        .ok_or_else(|| Error::NoBinaryForHost {
            pkg: pm.display_name(),
            host: host_str.clone(),
        })?;

    install_pkg_common(
        cfg,
        repo,
        ledger,
        pm,
        &host_str,
        &install_root,
        &distfile_names,
        fetcher,
        fetch_only,
        reinstall,
        false,
    )
}

fn install_blob_pkg(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    ledger: &mut InstallationLedger,
    pm: &PackageManifest,
    fetcher: FetcherKind,
    fetch_only: bool,
    reinstall: bool,
) -> Result<()> {
    let install_root = cfg.blob_install_root(&pm.name_for_installation());
    let distfile_names = pm
        .blob_metadata()
        .map(|bm| bm.distfiles.clone())
        .unwrap_or_default();

    install_pkg_common(
        cfg,
        repo,
        ledger,
        pm,
        "", // blobs are host-agnostic
        &install_root,
        &distfile_names,
        fetcher,
        fetch_only,
        reinstall,
        true,
    )
}

#[allow(clippy::too_many_arguments)]
fn install_pkg_common(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    ledger: &mut InstallationLedger,
    pm: &PackageManifest,
    host_str: &str,
    install_root: &Path,
    distfile_names: &[String],
    fetcher: FetcherKind,
    fetch_only: bool,
    reinstall: bool,
    as_blob: bool,
) -> Result<()> {
    let console = cfg.console();
    let pkg_name = pm.name_for_installation();

    let mut installed =
        ledger.is_installed(&pm.repo_id, &pm.category, &pm.name, &pm.ver, host_str)?;
    // a populated directory counts even when the ledger lost track of it
    if !installed && is_root_likely_populated(install_root) {
        installed = true;
    }

    if installed {
        if !reinstall {
            console.info(&format!("skipping already installed package {pkg_name}"));
            return Ok(());
        }
        console.warn(&format!(
            "package {pkg_name} seems already installed; purging and re-installing"
        ));
        ledger.remove(&pm.repo_id, &pm.category, &pm.name, &pm.ver, host_str)?;
        if install_root.exists() {
            std::fs::remove_dir_all(install_root)?;
        }
    }

    let parent = install_root
        .parent()
        .ok_or_else(|| Error::Other("install root has no parent".to_owned()))?;
    std::fs::create_dir_all(parent)?;

    // same filesystem as the final root, so the rename below is atomic
    let tmp = tempfile::Builder::new()
        .prefix(".ruyi-tmp")
        .tempdir_in(parent)?;

    let dfs = pm.distfiles();
    for df_name in distfile_names {
        let decl = dfs
            .get(df_name.as_str())
            .ok_or_else(|| Error::Manifest {
                path: pkg_name.clone().into(),
                reason: format!("undeclared distfile '{df_name}'"),
            })?;
        unpack::resolve_method(decl.unpack_method(), &decl.name)?;

        let df = distfile(cfg, repo, decl)?;
        df.ensure(fetcher, console)?;

        if fetch_only {
            console.debug("skipping extraction in fetch-only mode");
            continue;
        }

        console.info(&format!("extracting {df_name} for package {pkg_name}"));
        if as_blob {
            df.unpack_or_symlink(tmp.path())?;
        } else {
            df.unpack(tmp.path())?;
        }
    }

    std::fs::rename(tmp.path(), install_root)?;
    std::mem::forget(tmp); // the directory moved; nothing left to clean up

    if !fetch_only {
        ledger.record(
            &pm.repo_id,
            &pm.category,
            &pm.name,
            &pm.ver,
            host_str,
            install_root,
        )?;
    }

    console.ok(&format!(
        "package {pkg_name} installed to {}",
        install_root.display()
    ));
    Ok(())
}

fn fetch_source_pkg(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    pm: &PackageManifest,
    fetcher: FetcherKind,
) -> Result<()> {
    let dfs = pm.distfiles();
    let names = pm
        .source_metadata()
        .map(|sm| sm.distfiles.clone())
        .unwrap_or_default();
    for df_name in &names {
        let decl = dfs
            .get(df_name.as_str())
            .ok_or_else(|| Error::Manifest {
                path: pm.name_for_installation().into(),
                reason: format!("undeclared distfile '{df_name}'"),
            })?;
        distfile(cfg, repo, decl)?.ensure(fetcher, cfg.console())?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Extract
// ─────────────────────────────────────────────────────────────────────────────

pub fn extract_atoms(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    atom_strs: &[String],
    host: &RuyiHost,
    dest_dir: Option<&Path>,
    extract_without_subdir: bool,
    fetch_only: bool,
) -> Result<()> {
    let console = cfg.console();
    let fetcher = fetch::select_fetcher(console)?;
    let host_str = host.to_string();

    for atom_str in atom_strs {
        let pm = resolve::resolve_atom(repo, atom_str, cfg.include_prereleases())?;
        warn_known_issues(cfg, repo, &pm);

        let pkg_name = pm.name_for_installation();
        let distfile_names: Vec<String> = if let Some(bm) = pm.binary_metadata() {
            bm.distfile_names_for_host(&host_str)
                .map(<[String]>::to_vec)
                .ok_or_else(|| Error::NoBinaryForHost {
                    pkg: pm.display_name(),
                    host: host_str.clone(),
                })?
        } else if let Some(sm) = pm.source_metadata() {
            sm.distfiles.clone()
        } else {
            return Err(Error::NotInstallable(pm.display_name()));
        };

        // fetch-only never touches the destination, so the subdir flag has
        // nothing to apply to
        let dest: Option<PathBuf> = if fetch_only {
            None
        } else if extract_without_subdir {
            Some(dest_dir.map(Path::to_owned).unwrap_or_else(|| ".".into()))
        } else {
            Some(match dest_dir {
                Some(d) => d.join(&pkg_name),
                None => PathBuf::from(&pkg_name),
            })
        };

        if let Some(dest) = &dest {
            std::fs::create_dir_all(dest)?;
        }

        let dfs = pm.distfiles();
        for df_name in &distfile_names {
            let decl = dfs
                .get(df_name.as_str())
                .ok_or_else(|| Error::Manifest {
                    path: pkg_name.clone().into(),
                    reason: format!("undeclared distfile '{df_name}'"),
                })?;
            unpack::resolve_method(decl.unpack_method(), &decl.name)?;

            let df = distfile(cfg, repo, decl)?;
            df.ensure(fetcher, console)?;

            if let Some(dest) = &dest {
                console.info(&format!("extracting {df_name} for package {pkg_name}"));
                df.unpack(dest)?;
            }
        }

        if let Some(dest) = &dest {
            console.ok(&format!(
                "package {pkg_name} has been extracted to {}",
                dest.display()
            ));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Uninstall
// ─────────────────────────────────────────────────────────────────────────────

pub fn uninstall_atoms(
    cfg: &GlobalConfig,
    repo: &MetadataRepo,
    ledger: &mut InstallationLedger,
    atom_strs: &[String],
    host: &RuyiHost,
    assume_yes: bool,
) -> Result<()> {
    let console = cfg.console();
    let installed_view = InstalledStore::new(ledger.list_all()?, repo);

    let mut to_remove: Vec<PackageManifest> = Vec::new();
    for atom_str in atom_strs {
        let pm = resolve::resolve_atom(&installed_view, atom_str, cfg.include_prereleases())?;
        to_remove.push(pm);
    }

    if to_remove.is_empty() {
        console.info("no packages to uninstall");
        return Ok(());
    }

    console.info("the following packages will be uninstalled:");
    for pm in &to_remove {
        console.info(&format!("  - {} ({})", pm.display_name(), pm.ver));
    }
    if !assume_yes && !confirm("Proceed?")? {
        console.info("uninstallation aborted");
        return Ok(());
    }

    let host_str = host.to_string();
    for pm in &to_remove {
        let (root, record_host) = if pm.binary_metadata().is_some() {
            (
                cfg.binary_install_root(host, &pm.name_for_installation()),
                host_str.as_str(),
            )
        } else {
            (cfg.blob_install_root(&pm.name_for_installation()), "")
        };

        let tracked =
            ledger.is_installed(&pm.repo_id, &pm.category, &pm.name, &pm.ver, record_host)?;

        if !tracked {
            if !root.exists() {
                console.info(&format!(
                    "skipping not-installed package {}",
                    pm.name_for_installation()
                ));
                continue;
            }
            // possibly user data in there; refuse to guess
            return Err(Error::UntrackedInstallDirPresent {
                pkg: pm.name_for_installation(),
                path: root,
            });
        }

        console.info(&format!("uninstalling package {}", pm.name_for_installation()));
        ledger.remove(&pm.repo_id, &pm.category, &pm.name, &pm.ver, record_host)?;
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        console.ok(&format!("package {} uninstalled", pm.name_for_installation()));
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes"))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;
    use crate::config::{AppDirs, GlobalMode, UserConfig};

    fn test_config(base: &Path) -> GlobalConfig {
        let dirs = AppDirs {
            cache: base.join("cache"),
            config: base.join("config"),
            data: base.join("data"),
            state: base.join("state"),
        };
        let mode = GlobalMode {
            argv0: "ruyi".to_owned(),
            self_exe: base.join("ruyi"),
            porcelain: false,
            debug: false,
            experimental: false,
            venv_root: None,
            telemetry_optout: true,
            force_allow_root: false,
        };
        GlobalConfig::new(mode, dirs, UserConfig::default())
    }

    fn build_pkg_tar() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "gcc-13.1.0/bin/gcc", &b"#!gcc"[..])
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn write_repo_manifest(repo_root: &Path, tarball: &[u8], sha256: &str) {
        let dir = repo_root.join("manifests/toolchain/gcc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("13.1.0.toml"),
            format!(
                r#"
format = "v1"
kind = ["binary", "toolchain"]

[metadata]
desc = "test gcc"
vendor = {{ name = "test" }}

[[distfiles]]
name = "gcc.tar"
size = {}
[distfiles.checksums]
sha256 = "{sha256}"

[[binary]]
host = "linux/x86_64"
distfiles = ["gcc.tar"]

[toolchain]
target = "riscv64-unknown-linux-gnu"
quirks = ["rv64"]
components = [{{ name = "gcc", version = "13.1.0" }}]
"#,
                tarball.len()
            ),
        )
        .unwrap();
    }

    fn setup(base: &Path, corrupt_cache: bool) -> (GlobalConfig, MetadataRepo) {
        let cfg = test_config(base);
        let repo_root = base.join("repo");
        let tarball = build_pkg_tar();
        let sha = checksum::compute(&tarball[..], &["sha256"]).unwrap()["sha256"].clone();
        write_repo_manifest(&repo_root, &tarball, &sha);

        // preseed the distfile cache so no network is involved
        std::fs::create_dir_all(cfg.distfiles_dir()).unwrap();
        if corrupt_cache {
            // right size, wrong bytes; with no fetch URLs this cannot recover
            let mut bad = tarball.clone();
            bad[0] ^= 0xff;
            std::fs::write(cfg.distfiles_dir().join("gcc.tar"), bad).unwrap();
        } else {
            std::fs::write(cfg.distfiles_dir().join("gcc.tar"), &tarball).unwrap();
        }

        let repo = MetadataRepo::new(repo_root, "file:///dev/null/pkgs.git".to_owned(), "main".into());
        (cfg, repo)
    }

    #[test]
    fn install_then_uninstall_round_trip() {
        let base = tempfile::tempdir().unwrap();
        let (cfg, repo) = setup(base.path(), false);
        let mut ledger = cfg.open_ledger();
        let host = RuyiHost::parse("linux/x86_64");

        install_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            false,
            false,
        )
        .unwrap();

        let root = cfg.binary_install_root(&host, "gcc-13.1.0");
        assert!(root.join("bin/gcc").is_file());
        assert!(ledger
            .is_installed("pkgs", "toolchain", "gcc", "13.1.0", "linux/x86_64")
            .unwrap());

        // installing again is a no-op
        install_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            false,
            false,
        )
        .unwrap();

        uninstall_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            true,
        )
        .unwrap();
        assert!(!root.exists());
        assert_eq!(ledger.list_all().unwrap().len(), 0);
    }

    #[test]
    fn failed_install_leaves_no_root_and_no_record() {
        let base = tempfile::tempdir().unwrap();
        let (cfg, repo) = setup(base.path(), true);
        let mut ledger = cfg.open_ledger();
        let host = RuyiHost::parse("linux/x86_64");

        let result = install_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            false,
            false,
        );
        assert!(result.is_err());

        let root = cfg.binary_install_root(&host, "gcc-13.1.0");
        assert!(!root.exists(), "no half-populated install root");
        assert_eq!(ledger.list_all().unwrap().len(), 0);
    }

    #[test]
    fn untracked_install_dir_blocks_uninstall() {
        let base = tempfile::tempdir().unwrap();
        let (cfg, repo) = setup(base.path(), false);
        let mut ledger = cfg.open_ledger();
        let host = RuyiHost::parse("linux/x86_64");

        // the ledger knows about an aarch64 install, so the atom matches,
        // but the x86_64 directory exists without any record backing it
        let other_root = cfg.binary_install_root(&RuyiHost::parse("linux/aarch64"), "gcc-13.1.0");
        ledger
            .record(
                "pkgs",
                "toolchain",
                "gcc",
                "13.1.0",
                "linux/aarch64",
                &other_root,
            )
            .unwrap();

        let untracked_root = cfg.binary_install_root(&host, "gcc-13.1.0");
        std::fs::create_dir_all(untracked_root.join("bin")).unwrap();

        let err = uninstall_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UntrackedInstallDirPresent { .. }));
        assert!(untracked_root.exists(), "the directory must be left alone");
    }

    #[test]
    fn fetch_only_skips_extraction_and_recording() {
        let base = tempfile::tempdir().unwrap();
        let (cfg, repo) = setup(base.path(), false);
        let mut ledger = cfg.open_ledger();
        let host = RuyiHost::parse("linux/x86_64");

        install_atoms(
            &cfg,
            &repo,
            &mut ledger,
            &["gcc".to_owned()],
            &host,
            true,
            false,
        )
        .unwrap();

        let root = cfg.binary_install_root(&host, "gcc-13.1.0");
        assert!(!root.join("bin").exists(), "nothing extracted");
        assert_eq!(ledger.list_all().unwrap().len(), 0);
    }

    #[test]
    fn extract_into_subdir_by_default() {
        let base = tempfile::tempdir().unwrap();
        let (cfg, repo) = setup(base.path(), false);
        let host = RuyiHost::parse("linux/x86_64");

        let dest = base.path().join("work");
        extract_atoms(
            &cfg,
            &repo,
            &["gcc".to_owned()],
            &host,
            Some(&dest),
            false,
            false,
        )
        .unwrap();
        assert!(dest.join("gcc-13.1.0/bin/gcc").is_file());

        let flat = base.path().join("flat");
        extract_atoms(
            &cfg,
            &repo,
            &["gcc".to_owned()],
            &host,
            Some(&flat),
            true,
            false,
        )
        .unwrap();
        assert!(flat.join("bin/gcc").is_file());
    }
}

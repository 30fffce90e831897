// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: cli
//
//  The command-line surface (clap derive). Human output goes through the
//  Console; --porcelain swaps every human line for one JSON object per
//  line with a stable "ty" tag.
//
//  Exit codes:
//    0    success
//    1    user error / environment problem / no match
//    2    data-model error (bad manifest, missing distfile for host)
//    127  shim fallback failure (see mux)
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

use crate::config::{GlobalConfig, GlobalMode};
use crate::error::Error;
use crate::host::RuyiHost;
use crate::install;
use crate::pkg::canonical::dump_canonical;
use crate::pkg::manifest::{PackageKind, PackageManifest, PackageManifestData};
use crate::pkg::resolve;
use crate::pkg::ProvidesPackageManifests;
use crate::repo::entity::TraverseOptions;
use crate::repo::MetadataRepo;
use crate::checksum;
use crate::venv::{make_venv, VenvRequest};

// re-exported so main.rs stays a thin dispatcher
pub use crate::mux::mux_main;

// ─────────────────────────────────────────────────────────────────────────────
//  CLI definition
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "ruyi",
    version = env!("CARGO_PKG_VERSION"),
    about   = "RuyiSDK package manager for heterogeneous hardware",
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Machine-readable output: one JSON object per line
    #[arg(long, global = true)]
    porcelain: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// List packages (or profiles) known to the package repository
    List(ListArgs),
    /// Install packages by atom
    Install(InstallArgs),
    /// Fetch and extract a package into a working directory
    Extract(ExtractArgs),
    /// Uninstall previously installed packages
    Uninstall(UninstallArgs),
    /// Sync the package repository and show available updates
    Update,
    /// Create a virtual environment for cross-compilation
    Venv(VenvArgs),
    /// Query the hardware-entity taxonomy
    Entity(EntityArgs),
    /// Repo-administration helpers
    Admin(AdminArgs),
    /// Read package repository news
    News(NewsArgs),
    /// Manage this installation of ruyi
    #[command(name = "self")]
    SelfCmd(SelfArgs),
}

// ── list ──────────────────────────────────────────────────────────────────────

#[derive(Args)]
struct ListArgs {
    #[command(subcommand)]
    command: Option<ListCmd>,

    /// Only packages in this exact category
    #[arg(long)]
    category_is: Option<String>,

    /// Only packages whose category contains this substring
    #[arg(long)]
    category_contains: Option<String>,

    /// Only packages whose name contains this substring
    #[arg(long)]
    name_contains: Option<String>,

    /// Only packages related to this entity ("type:id")
    #[arg(long)]
    related_to_entity: Option<String>,

    /// Only installed (true) or only non-installed (false) packages
    #[arg(long)]
    is_installed: Option<bool>,
}

#[derive(Subcommand)]
enum ListCmd {
    /// List all compiler-flag profiles
    Profiles,
}

// ── install / extract / uninstall ────────────────────────────────────────────

#[derive(Args)]
struct InstallArgs {
    /// Package atoms, e.g. gnu-plct, gcc(>=13), slug:plct-riscv64
    #[arg(required = true)]
    atoms: Vec<String>,

    /// Fetch distfiles only, do not install
    #[arg(long, short = 'f')]
    fetch_only: bool,

    /// Purge and reinstall if already installed
    #[arg(long)]
    reinstall: bool,

    /// Override the host to install for (e.g. linux/riscv64)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Package atoms to extract
    #[arg(required = true)]
    atoms: Vec<String>,

    /// Destination directory (default: current directory)
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Extract directly into the destination, without a package subdirectory
    #[arg(long)]
    extract_without_subdir: bool,

    /// Fetch distfiles only, do not extract
    #[arg(long, short = 'f')]
    fetch_only: bool,

    /// Override the host to extract for
    #[arg(long)]
    host: Option<String>,
}

#[derive(Args)]
struct UninstallArgs {
    /// Package atoms to uninstall
    #[arg(required = true)]
    atoms: Vec<String>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    assume_yes: bool,

    /// Override the host the packages were installed for
    #[arg(long)]
    host: Option<String>,
}

// ── venv ──────────────────────────────────────────────────────────────────────

#[derive(Args)]
struct VenvArgs {
    /// Profile id, e.g. rv64gc-lp64d
    profile: String,

    /// Destination directory for the new venv
    dest: PathBuf,

    /// Name of the venv (shown in the shell prompt)
    #[arg(long, short = 'n')]
    name: Option<String>,

    /// Toolchain atom(s) to configure, e.g. -t gnu-plct
    #[arg(long, short = 't', required = true)]
    toolchain: Vec<String>,

    /// Emulator atom to configure, e.g. -e qemu-user-riscv
    #[arg(long, short = 'e')]
    emulator: Option<String>,

    /// Do not provision a sysroot
    #[arg(long)]
    without_sysroot: bool,

    /// Take the sysroot from this toolchain package instead
    #[arg(long)]
    sysroot_from: Option<String>,

    /// Additional binary package(s) whose commands should be available
    #[arg(long)]
    extra_commands_from: Vec<String>,

    /// Override the host the toolchains were installed for
    #[arg(long)]
    host: Option<String>,
}

// ── entity / admin / news / self ─────────────────────────────────────────────

#[derive(Args)]
struct EntityArgs {
    #[command(subcommand)]
    command: EntityCmd,
}

#[derive(Subcommand)]
enum EntityCmd {
    /// List entities, optionally of one type
    List {
        /// Entity type, e.g. device
        entity_type: Option<String>,
    },
    /// Describe one entity ("type:id")
    Describe {
        /// Entity reference, e.g. device:sipeed-lpi4a
        entity_ref: String,

        /// Also show related entities
        #[arg(long)]
        related: bool,

        /// Follow relations transitively
        #[arg(long)]
        transitive: bool,
    },
}

#[derive(Args)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCmd,
}

#[derive(Subcommand)]
enum AdminCmd {
    /// Compute distfile declarations for the given files
    Checksum {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Rewrite package manifests in canonical form
    FormatManifest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct NewsArgs {
    #[command(subcommand)]
    command: NewsCmd,
}

#[derive(Subcommand)]
enum NewsCmd {
    /// List news items
    List {
        /// Only unread items
        #[arg(long)]
        new: bool,
    },
    /// Read a news item (by ordinal or id) and mark it as read
    Read {
        /// Ordinal or id of the item to read
        item: String,
    },
}

#[derive(Args)]
struct SelfArgs {
    #[command(subcommand)]
    command: SelfCmd2,
}

#[derive(Subcommand)]
enum SelfCmd2 {
    /// Remove ruyi-managed data from this system
    Uninstall {
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        assume_yes: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────────────────────

pub fn cli_main(argv0: String, args: Vec<String>) -> i32 {
    let cli = match Cli::try_parse_from(std::iter::once(argv0.clone()).chain(args)) {
        Ok(c) => c,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    let mode = GlobalMode::from_env(argv0, cli.porcelain);
    let cfg = match GlobalConfig::load(mode) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e}", "✗".red().bold());
            return e.exit_code();
        }
    };

    if let Err(e) = refuse_root(&cfg) {
        cfg.console().error(&e.to_string());
        return 1;
    }

    match dispatch(&cfg, cli.command) {
        Ok(()) => 0,
        Err(e) => {
            cfg.console().error(&format!("{e:#}"));
            e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1)
        }
    }
}

#[cfg(unix)]
fn refuse_root(cfg: &GlobalConfig) -> crate::error::Result<()> {
    let euid = unsafe { libc::geteuid() };
    if euid == 0 && !cfg.mode.force_allow_root {
        return Err(Error::Other(
            "refusing to run as root\n  Hint: set RUYI_FORCE_ALLOW_ROOT=1 if you really mean it"
                .to_owned(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn refuse_root(_cfg: &GlobalConfig) -> crate::error::Result<()> {
    Ok(())
}

fn dispatch(cfg: &GlobalConfig, cmd: Cmd) -> anyhow::Result<()> {
    match cmd {
        Cmd::List(args) => cmd_list(cfg, args),
        Cmd::Install(args) => cmd_install(cfg, args),
        Cmd::Extract(args) => cmd_extract(cfg, args),
        Cmd::Uninstall(args) => cmd_uninstall(cfg, args),
        Cmd::Update => cmd_update(cfg),
        Cmd::Venv(args) => cmd_venv(cfg, args),
        Cmd::Entity(args) => cmd_entity(cfg, args),
        Cmd::Admin(args) => cmd_admin(cfg, args),
        Cmd::News(args) => cmd_news(cfg, args),
        Cmd::SelfCmd(args) => cmd_self(cfg, args),
    }
}

fn host_or_native(explicit: &Option<String>) -> RuyiHost {
    match explicit {
        Some(s) => RuyiHost::parse(s),
        None => RuyiHost::native(),
    }
}

/// Open the metadata repo, cloning it on first use.
fn open_repo(cfg: &GlobalConfig) -> anyhow::Result<MetadataRepo> {
    let repo = cfg.open_repo();
    if !repo.root().exists() {
        repo.ensure_git_repo(cfg.console())?;
    }
    Ok(repo)
}

// ─────────────────────────────────────────────────────────────────────────────
//  list
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PorcelainPkgVersionV1 {
    semver: String,
    remarks: Vec<String>,
}

#[derive(Serialize)]
struct PorcelainPkgListV1 {
    ty: &'static str,
    category: String,
    name: String,
    vers: Vec<PorcelainPkgVersionV1>,
}

fn cmd_list(cfg: &GlobalConfig, args: ListArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;

    if let Some(ListCmd::Profiles) = args.command {
        for p in repo.profiles()?.iter() {
            if p.need_quirks.is_empty() {
                println!("{}", p.id);
            } else {
                let quirks: Vec<&str> = p.need_quirks.iter().map(String::as_str).collect();
                println!("{} (needs quirks: {})", p.id, quirks.join(", "));
            }
        }
        return Ok(());
    }

    let mut ledger = cfg.open_ledger();
    let installed: BTreeSet<(String, String, String)> = ledger
        .list_all()?
        .into_iter()
        .map(|r| (r.category, r.name, r.version))
        .collect();
    let native_host = RuyiHost::native().to_string();

    // group manifests by package
    let mut pkgs: Vec<PackageManifest> = repo.iter_pkg_manifests()?;
    pkgs.sort_by(|a, b| {
        (a.category.as_str(), a.name.as_str())
            .cmp(&(b.category.as_str(), b.name.as_str()))
            .then_with(|| b.semver().cmp(a.semver()))
    });

    let console = cfg.console();
    let mut current: Option<(String, String)> = None;
    let mut group: Vec<PackageManifest> = Vec::new();
    let mut groups: Vec<Vec<PackageManifest>> = Vec::new();
    for pm in pkgs {
        let key = (pm.category.clone(), pm.name.clone());
        if current.as_ref() != Some(&key) {
            if !group.is_empty() {
                groups.push(std::mem::take(&mut group));
            }
            current = Some(key);
        }
        group.push(pm);
    }
    if !group.is_empty() {
        groups.push(group);
    }

    for group in groups {
        let first = &group[0];
        if !list_filters_match(&repo, &mut ledger, &args, first)? {
            continue;
        }

        let mut latest_seen = false;
        let mut latest_pre_seen = false;
        let mut vers = Vec::new();
        for pm in &group {
            let mut remarks: Vec<String> = Vec::new();
            if pm.is_prerelease() {
                if !latest_pre_seen && !latest_seen {
                    remarks.push("latest-prerelease".to_owned());
                    latest_pre_seen = true;
                } else {
                    remarks.push("prerelease".to_owned());
                }
            } else if !latest_seen {
                remarks.push("latest".to_owned());
                latest_seen = true;
            }
            if pm.has_kind(PackageKind::Binary)
                && pm
                    .binary_metadata()
                    .and_then(|bm| bm.distfile_names_for_host(&native_host))
                    .is_none()
            {
                remarks.push("no binary for current host".to_owned());
            }
            if pm.has_known_issues() {
                remarks.push("has known issue".to_owned());
            }
            if installed.contains(&(pm.category.clone(), pm.name.clone(), pm.ver.clone())) {
                remarks.push("installed".to_owned());
            }
            vers.push((pm.ver.clone(), remarks));
        }

        if console.is_porcelain() {
            console.porcelain_record(&PorcelainPkgListV1 {
                ty: "pkglistoutput-v1",
                category: first.category.clone(),
                name: first.name.clone(),
                vers: vers
                    .into_iter()
                    .map(|(semver, remarks)| PorcelainPkgVersionV1 { semver, remarks })
                    .collect(),
            });
        } else {
            println!(
                "{} {}",
                first.display_name().bold(),
                format!("({})", first.desc()).dimmed()
            );
            for (ver, remarks) in vers {
                if remarks.is_empty() {
                    println!("  {ver}");
                } else {
                    println!("  {ver} {}", format!("({})", remarks.join(", ")).dimmed());
                }
            }
        }
    }
    Ok(())
}

fn list_filters_match(
    repo: &MetadataRepo,
    ledger: &mut crate::state::InstallationLedger,
    args: &ListArgs,
    pm: &PackageManifest,
) -> anyhow::Result<bool> {
    if let Some(cat) = &args.category_is {
        if &pm.category != cat {
            return Ok(false);
        }
    }
    if let Some(frag) = &args.category_contains {
        if !pm.category.contains(frag.as_str()) {
            return Ok(false);
        }
    }
    if let Some(frag) = &args.name_contains {
        if !pm.name.contains(frag.as_str()) {
            return Ok(false);
        }
    }
    if let Some(entity_ref) = &args.related_to_entity {
        let related = repo.entity_store()?.is_entity_related_to(
            &format!("pkg:{}/{}", pm.category, pm.name),
            entity_ref,
            true,
            false,
        )?;
        if !related {
            return Ok(false);
        }
    }
    if let Some(want_installed) = args.is_installed {
        let any_installed = ledger
            .list_all()?
            .iter()
            .any(|r| r.category == pm.category && r.name == pm.name);
        if any_installed != want_installed {
            return Ok(false);
        }
    }
    Ok(true)
}

// ─────────────────────────────────────────────────────────────────────────────
//  install / extract / uninstall / update
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_install(cfg: &GlobalConfig, args: InstallArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let mut ledger = cfg.open_ledger();
    let host = host_or_native(&args.host);
    install::install_atoms(
        cfg,
        &repo,
        &mut ledger,
        &args.atoms,
        &host,
        args.fetch_only,
        args.reinstall,
    )?;
    Ok(())
}

fn cmd_extract(cfg: &GlobalConfig, args: ExtractArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let host = host_or_native(&args.host);
    install::extract_atoms(
        cfg,
        &repo,
        &args.atoms,
        &host,
        args.dest.as_deref(),
        args.extract_without_subdir,
        args.fetch_only,
    )?;
    Ok(())
}

fn cmd_uninstall(cfg: &GlobalConfig, args: UninstallArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let mut ledger = cfg.open_ledger();
    let host = host_or_native(&args.host);
    install::uninstall_atoms(cfg, &repo, &mut ledger, &args.atoms, &host, args.assume_yes)?;
    Ok(())
}

fn cmd_update(cfg: &GlobalConfig) -> anyhow::Result<()> {
    let console = cfg.console();
    let repo = open_repo(cfg)?;
    repo.sync(console, cfg.is_repo_auto_managed())?;

    // unread news hint
    let mut read_status = cfg.open_news_read_status();
    let news = repo.news_store(&mut read_status)?;
    let unread = news.list(true).len();
    if unread > 0 {
        console.info(&format!(
            "there are {unread} unread news item(s); run `ruyi news list --new` to read"
        ));
    }

    // upgradable packages
    let mut ledger = cfg.open_ledger();
    let records = ledger.list_all()?;
    let ups = resolve::iter_upgradable(&records, &repo, cfg.include_prereleases())?;
    if ups.is_empty() {
        console.ok("all installed packages are up to date");
        return Ok(());
    }
    console.info("the following packages can be upgraded:");
    for (rec, newer) in ups {
        console.info(&format!(
            "  - {}/{} {} -> {}",
            rec.category, rec.name, rec.version, newer.ver
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  venv
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_venv(cfg: &GlobalConfig, args: VenvArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let host = host_or_native(&args.host);
    make_venv(
        cfg,
        &repo,
        &VenvRequest {
            host: &host,
            profile_id: &args.profile,
            dest: args.dest,
            with_sysroot: !args.without_sysroot,
            override_name: args.name,
            toolchain_atoms: &args.toolchain,
            emulator_atom: args.emulator.as_deref(),
            sysroot_atom: args.sysroot_from.as_deref(),
            extra_cmd_atoms: &args.extra_commands_from,
        },
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  entity
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_entity(cfg: &GlobalConfig, args: EntityArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let store = repo.entity_store()?;
    let console = cfg.console();

    match args.command {
        EntityCmd::List { entity_type } => {
            for entity in store.iter(entity_type.as_deref()) {
                match entity.display_name() {
                    Some(dn) => println!("{}  {}", entity.ref_str(), dn.dimmed()),
                    None => println!("{}", entity.ref_str()),
                }
            }
        }
        EntityCmd::Describe {
            entity_ref,
            related,
            transitive,
        } => {
            let entity = store
                .get_by_ref(&entity_ref)?
                .ok_or_else(|| Error::Other(format!("entity '{entity_ref}' not found")))?;

            println!("{}", entity.ref_str().bold());
            if let Some(dn) = entity.display_name() {
                println!("  {dn}");
            }
            if let Some(data) = entity.data() {
                let pretty = serde_json::to_string_pretty(data)
                    .context("rendering entity data")?;
                for line in pretty.lines() {
                    println!("  {}", line.dimmed());
                }
            }

            if related {
                console.info("related entities:");
                let opts = TraverseOptions {
                    forward: true,
                    reverse: true,
                    types: None,
                    transitive,
                };
                for rel in store.traverse(entity, opts) {
                    println!("  {}", rel.ref_str());
                }
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  admin
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_admin(cfg: &GlobalConfig, args: AdminArgs) -> anyhow::Result<()> {
    let console = cfg.console();
    match args.command {
        AdminCmd::Checksum { files } => {
            for path in &files {
                let f = std::fs::File::open(path)
                    .with_context(|| format!("cannot open {}", path.display()))?;
                let size = f.metadata()?.len();
                let sums = checksum::compute(f, &["sha256", "sha512"])?;

                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                println!("[[distfiles]]");
                println!("name = \"{name}\"");
                println!("size = {size}");
                println!("[distfiles.checksums]");
                for (algo, digest) in &sums {
                    println!("{algo} = \"{digest}\"");
                }
                println!();
            }
        }
        AdminCmd::FormatManifest { files } => {
            for path in &files {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                let data: PackageManifestData = toml::from_str(&text)
                    .map_err(|e| Error::Manifest {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                let mut out = std::fs::File::create(path)?;
                out.write_all(dump_canonical(&data).as_bytes())?;
                console.ok(&format!("formatted {}", path.display()));
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  news
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_news(cfg: &GlobalConfig, args: NewsArgs) -> anyhow::Result<()> {
    let repo = open_repo(cfg)?;
    let console = cfg.console();
    let mut read_status = cfg.open_news_read_status();
    let store = repo.news_store(&mut read_status)?;
    let lang = cfg.lang_code();

    match args.command {
        NewsCmd::List { new } => {
            let items = store.list(new);
            if items.is_empty() {
                console.info("no news to display");
                return Ok(());
            }
            if console.is_porcelain() {
                for item in items {
                    console.porcelain_record(&item.to_porcelain());
                }
                return Ok(());
            }
            println!(
                "{:<4} {:<30} {}",
                "NO.".bold(),
                "ID".bold(),
                "TITLE".bold()
            );
            println!("{}", "─".repeat(70).dimmed());
            for item in items {
                let title = item
                    .content_for_lang(&lang)
                    .map(|c| c.title.clone())
                    .unwrap_or_else(|| item.id.clone());
                let marker = if item.is_read { " " } else { "*" };
                println!("{marker}{:<3} {:<30} {title}", item.ordinal, item.id);
            }
        }
        NewsCmd::Read { item } => {
            let news_item = store
                .get(&item)
                .ok_or_else(|| Error::Other(format!("no such news item '{item}'")))?;
            let content = news_item
                .content_for_lang(&lang)
                .ok_or_else(|| Error::Other(format!("news item '{item}' has no content")))?;

            if console.is_porcelain() {
                console.porcelain_record(&news_item.to_porcelain());
            } else {
                println!("{}", content.title.bold());
                println!();
                println!("{}", content.body);
            }
            read_status.mark_read(&[news_item.id.clone()])?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  self
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_self(cfg: &GlobalConfig, args: SelfArgs) -> anyhow::Result<()> {
    let console = cfg.console();
    match args.command {
        SelfCmd2::Uninstall { assume_yes } => {
            if cfg.cfg.installation.externally_managed {
                return Err(Error::Other(
                    "this ruyi installation is externally managed; use your system package manager to remove it"
                        .to_owned(),
                )
                .into());
            }

            console.warn("this removes all ruyi-managed packages, caches and state");
            if !assume_yes {
                print!("Proceed? [y/N] ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
                if !matches!(line.trim(), "y" | "Y" | "yes" | "Yes") {
                    console.info("aborted");
                    return Ok(());
                }
            }

            for dir in [&cfg.dirs.data, &cfg.dirs.cache, &cfg.dirs.state] {
                if dir.exists() {
                    std::fs::remove_dir_all(dir)?;
                }
            }
            console.ok("ruyi-managed data removed; delete the ruyi binary itself to finish");
        }
    }
    Ok(())
}

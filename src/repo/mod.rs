// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo
//
//  The metadata repository: a Git working tree holding package manifests,
//  compiler-flag profiles, the hardware-entity taxonomy, localized
//  messages, news, and device-provisioning plugins.
//
//  On-disk layout of the working tree:
//
//      config.toml                          mirrors, telemetry endpoints
//      manifests/<cat>/<name>/<ver>.toml
//      profiles/<arch>.toml
//      entities/_schemas/<type>.jsonschema
//      entities/<type>/<id>.toml
//      messages/<lang>/<msgid>.txt
//      plugins/<plugin-id>/mod.star
//      news/<YYYY-MM-DD>-<slug>[.<lang>].md
//
//  Sync policy: fetch then fast-forward only. The local branch is never
//  merged or reset; a diverged history is surfaced to the user instead.
// ─────────────────────────────────────────────────────────────────────────────

pub mod config;
pub mod entity;
pub mod messages;
pub mod news;
pub mod plugin;
pub mod profile;

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::log::Console;
use crate::pkg::manifest::{DistfileDecl, PackageManifest, RestrictKind};
use crate::pkg::ProvidesPackageManifests;
use crate::state::NewsReadStatus;

use self::config::RepoConfig;
use self::entity::EntityStore;
use self::messages::MessageStore;
use self::news::NewsStore;
use self::profile::ProfileRegistry;

pub struct MetadataRepo {
    root: PathBuf,
    remote: String,
    branch: String,
    repo_id: String,

    manifests: OnceCell<Vec<PackageManifest>>,
    config: OnceCell<RepoConfig>,
    messages: OnceCell<MessageStore>,
    entities: OnceCell<EntityStore>,
    profiles: OnceCell<ProfileRegistry>,
}

impl std::fmt::Debug for MetadataRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRepo")
            .field("root", &self.root)
            .field("remote", &self.remote)
            .field("branch", &self.branch)
            .finish()
    }
}

/// "https://example.org/ruyisdk/packages-index.git" → "packages-index"
fn repo_id_from_remote(remote: &str) -> String {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty())
        .unwrap_or("ruyisdk")
        .to_owned()
}

impl MetadataRepo {
    pub fn new(root: PathBuf, remote: String, branch: String) -> Self {
        let repo_id = repo_id_from_remote(&remote);
        Self {
            root,
            remote,
            branch,
            repo_id,
            manifests: OnceCell::new(),
            config: OnceCell::new(),
            messages: OnceCell::new(),
            entities: OnceCell::new(),
            profiles: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    // ── git plumbing ──────────────────────────────────────────────────────

    /// Open the working tree, cloning it first if absent.
    pub fn ensure_git_repo(&self, console: &Console) -> Result<git2::Repository> {
        if self.root.exists() {
            return Ok(git2::Repository::open(&self.root)?);
        }

        console.info(&format!(
            "cloning package metadata from {} (branch {})",
            self.remote, self.branch
        ));
        let repo = git2::build::RepoBuilder::new()
            .branch(&self.branch)
            .clone(&self.remote, &self.root)?;
        Ok(repo)
    }

    /// Fetch and fast-forward the configured branch. A drifted remote URL
    /// is rewritten only when `allow_remote_rewrite`; a history that does
    /// not fast-forward is an error, never a merge or reset.
    pub fn sync(&self, console: &Console, allow_remote_rewrite: bool) -> Result<()> {
        let repo = self.ensure_git_repo(console)?;

        {
            let remote = repo.find_remote("origin")?;
            let actual = remote.url().unwrap_or_default().to_owned();
            if actual != self.remote {
                if !allow_remote_rewrite {
                    return Err(Error::RemoteUrlMismatch {
                        configured: self.remote.clone(),
                        actual,
                    });
                }
                console.warn(&format!(
                    "updating repo remote URL: {actual} -> {}",
                    self.remote
                ));
                repo.remote_set_url("origin", &self.remote)?;
            }
        }

        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&[self.branch.as_str()], None, None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            console.debug("repo is already up to date");
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            return Err(Error::CannotFastForward {
                branch: self.branch.clone(),
            });
        }

        let refname = format!("refs/heads/{}", self.branch);
        match repo.find_reference(&refname) {
            Ok(mut reference) => {
                reference.set_target(fetch_commit.id(), "ruyi: fast-forward")?;
            }
            Err(_) => {
                repo.reference(&refname, fetch_commit.id(), true, "ruyi: fast-forward")?;
            }
        }
        repo.set_head(&refname)?;
        repo.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))?;

        console.ok("package metadata synced");
        Ok(())
    }

    // ── lazily-loaded stores ──────────────────────────────────────────────

    pub fn config(&self) -> Result<&RepoConfig> {
        if self.config.get().is_none() {
            let cfg = RepoConfig::load(&self.root.join("config.toml"))?;
            let _ = self.config.set(cfg);
        }
        Ok(self.config.get().unwrap())
    }

    pub fn messages(&self) -> Result<&MessageStore> {
        if self.messages.get().is_none() {
            let store = MessageStore::load(&self.root.join("messages"))?;
            let _ = self.messages.set(store);
        }
        Ok(self.messages.get().unwrap())
    }

    pub fn entity_store(&self) -> Result<&EntityStore> {
        if self.entities.get().is_none() {
            let store = EntityStore::load(&self.root.join("entities"))?;
            let _ = self.entities.set(store);
        }
        Ok(self.entities.get().unwrap())
    }

    pub fn profiles(&self) -> Result<&ProfileRegistry> {
        if self.profiles.get().is_none() {
            let registry = ProfileRegistry::load(&self.root.join("profiles"))?;
            let _ = self.profiles.set(registry);
        }
        Ok(self.profiles.get().unwrap())
    }

    pub fn news_store(&self, read_status: &mut NewsReadStatus) -> Result<NewsStore> {
        NewsStore::load(&self.root.join("news"), &read_status.all()?)
    }

    pub fn plugin_ids(&self) -> Result<Vec<String>> {
        plugin::iter_plugin_ids(&self.root)
    }

    /// Look up a named value exported by one of this repo's plugins,
    /// evaluated through the supplied host. Unknown plugin ids resolve to
    /// None without consulting the evaluator.
    pub fn get_from_plugin(
        &self,
        host: &dyn plugin::PluginHost,
        plugin_id: &str,
        key: &str,
    ) -> Result<Option<plugin::PluginValue>> {
        if !self.plugin_ids()?.iter().any(|id| id == plugin_id) {
            return Ok(None);
        }
        host.get_from_plugin(plugin_id, key)
    }

    /// Invoke a plugin function value with positional arguments. Callers
    /// validate the returned value before use.
    pub fn eval_plugin_fn(
        &self,
        host: &dyn plugin::PluginHost,
        plugin_id: &str,
        fn_key: &str,
        args: &[plugin::PluginValue],
    ) -> Result<plugin::PluginValue> {
        host.eval_plugin_fn(plugin_id, fn_key, args)
    }

    // ── manifests ─────────────────────────────────────────────────────────

    fn manifests(&self) -> Result<&[PackageManifest]> {
        if self.manifests.get().is_none() {
            let loaded = self.load_manifests()?;
            let _ = self.manifests.set(loaded);
        }
        Ok(self.manifests.get().unwrap())
    }

    fn load_manifests(&self) -> Result<Vec<PackageManifest>> {
        let manifests_root = self.root.join("manifests");
        if !manifests_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in WalkDir::new(&manifests_root)
            .min_depth(3)
            .max_depth(3)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }

            // manifests/<category>/<name>/<ver>.toml
            let ver = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let name = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let category = path
                .parent()
                .and_then(|p| p.parent())
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or_default();

            let text = std::fs::read_to_string(path)?;
            out.push(PackageManifest::from_toml_str(
                &self.repo_id,
                category,
                name,
                ver,
                &text,
            )?);
        }
        Ok(out)
    }

    // ── distfile URL resolution ───────────────────────────────────────────

    /// All URLs a distfile may be downloaded from: the declared URLs in
    /// declaration order, then `<mirror base>/<name>` for every mirror in
    /// repo-config order. `restrict = ["mirror"]` suppresses the latter.
    pub fn get_distfile_urls(&self, decl: &DistfileDecl) -> Result<Vec<String>> {
        let mut urls: Vec<String> = decl.urls.clone().unwrap_or_default();

        if !decl.is_restricted(RestrictKind::Mirror) {
            for base in self.config()?.mirror_bases() {
                urls.push(format!("{}/{}", base.trim_end_matches('/'), decl.name));
            }
        }
        Ok(urls)
    }

    /// Render the fetch-restriction notice of a distfile, if it has one.
    pub fn render_fetch_restriction(&self, decl: &DistfileDecl, lang: &str) -> Option<String> {
        let fr = decl.fetch_restriction.as_ref()?;
        self.messages().ok()?.render(&fr.msgid, lang, &fr.params)
    }

    /// Render a package's known-issue notices through the message store;
    /// unknown msgids fall back to the raw id.
    pub fn render_known_issues(&self, pm: &PackageManifest, lang: &str) -> Vec<String> {
        let mut params = BTreeMap::new();
        params.insert("package".to_owned(), pm.display_name());
        params.insert("version".to_owned(), pm.ver.clone());

        pm.known_issue_msgids()
            .iter()
            .map(|msgid| {
                self.messages()
                    .ok()
                    .and_then(|m| m.render(msgid, lang, &params))
                    .unwrap_or_else(|| msgid.clone())
            })
            .collect()
    }
}

impl ProvidesPackageManifests for MetadataRepo {
    fn iter_pkg_manifests(&self) -> Result<Vec<PackageManifest>> {
        Ok(self.manifests()?.to_vec())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
format = "v1"
kind = ["binary"]

[metadata]
desc = "demo"
vendor = { name = "demo" }

[[distfiles]]
name = "demo-VER.tar.gz"
size = 10
[distfiles.checksums]
sha256 = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"

[[binary]]
host = "linux/x86_64"
distfiles = ["demo-VER.tar.gz"]
"#;

    fn write_manifest(root: &Path, category: &str, name: &str, ver: &str) {
        let dir = root.join("manifests").join(category).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{ver}.toml")),
            MANIFEST.replace("VER", ver),
        )
        .unwrap();
    }

    fn plain_repo(root: &Path) -> MetadataRepo {
        MetadataRepo::new(
            root.to_owned(),
            "https://example.org/ruyisdk/packages-index.git".to_owned(),
            "main".to_owned(),
        )
    }

    #[test]
    fn repo_id_derivation() {
        assert_eq!(
            repo_id_from_remote("https://example.org/org/packages-index.git"),
            "packages-index"
        );
        assert_eq!(repo_id_from_remote(""), "ruyisdk");
    }

    #[test]
    fn manifest_iteration_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "toolchain", "gcc", "12.1.0");
        write_manifest(dir.path(), "toolchain", "gcc", "13.1.0");
        write_manifest(dir.path(), "emulator", "qemu", "8.0.0");

        let repo = plain_repo(dir.path());
        assert_eq!(repo.iter_pkg_manifests().unwrap().len(), 3);
        assert_eq!(
            repo.iter_pkg_vers("gcc", Some("toolchain")).unwrap().len(),
            2
        );

        let latest = repo
            .get_pkg_latest_ver("gcc", None, false)
            .unwrap()
            .unwrap();
        assert_eq!(latest.ver, "13.1.0");
        assert_eq!(latest.repo_id, "packages-index");
    }

    #[test]
    fn distfile_urls_combine_declared_and_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
            [[mirrors]]
            id = "main"
            urls = ["https://a.example/dist/", "https://b.example/dist"]
            "#,
        )
        .unwrap();

        let repo = plain_repo(dir.path());
        let decl = DistfileDecl {
            name: "x.tar.gz".to_owned(),
            size: 1,
            checksums: Default::default(),
            urls: Some(vec!["https://primary.example/x.tar.gz".to_owned()]),
            restrict: None,
            fetch_restriction: None,
            strip_components: 1,
            unpack: None,
        };

        assert_eq!(
            repo.get_distfile_urls(&decl).unwrap(),
            vec![
                "https://primary.example/x.tar.gz".to_owned(),
                "https://a.example/dist/x.tar.gz".to_owned(),
                "https://b.example/dist/x.tar.gz".to_owned(),
            ]
        );

        let mut restricted = decl.clone();
        restricted.restrict = Some(vec![RestrictKind::Mirror]);
        assert_eq!(
            repo.get_distfile_urls(&restricted).unwrap(),
            vec!["https://primary.example/x.tar.gz".to_owned()]
        );
    }

    // ── git behavior, against a local upstream ────────────────────────────

    fn init_upstream(path: &Path) -> git2::Repository {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        git2::Repository::init_opts(path, &opts).unwrap()
    }

    fn commit_file(repo: &git2::Repository, name: &str, content: &str, msg: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@example.org").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parents)
            .unwrap();
    }

    fn quiet() -> Console {
        Console::new(false, false)
    }

    #[test]
    fn clone_then_fast_forward_sync() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let upstream = init_upstream(upstream_dir.path());
        commit_file(&upstream, "config.toml", "", "initial");

        let local_dir = tempfile::tempdir().unwrap();
        let local_path = local_dir.path().join("packages-index");
        let remote_url = upstream_dir.path().display().to_string();
        let repo = MetadataRepo::new(local_path.clone(), remote_url, "main".to_owned());

        // first ensure clones
        repo.ensure_git_repo(&quiet()).unwrap();
        assert!(local_path.join("config.toml").exists());

        // an upstream commit fast-forwards in
        commit_file(&upstream, "news-flag", "x", "second");
        repo.sync(&quiet(), true).unwrap();
        assert!(local_path.join("news-flag").exists());

        // syncing again is a no-op
        repo.sync(&quiet(), true).unwrap();
    }

    #[test]
    fn diverged_history_refuses_to_sync() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let upstream = init_upstream(upstream_dir.path());
        commit_file(&upstream, "config.toml", "", "initial");

        let local_dir = tempfile::tempdir().unwrap();
        let local_path = local_dir.path().join("packages-index");
        let remote_url = upstream_dir.path().display().to_string();
        let repo = MetadataRepo::new(local_path.clone(), remote_url, "main".to_owned());
        repo.ensure_git_repo(&quiet()).unwrap();

        // local commit + different upstream commit → no fast-forward
        let local_git = git2::Repository::open(&local_path).unwrap();
        commit_file(&local_git, "local-edit", "l", "local work");
        commit_file(&upstream, "upstream-edit", "u", "upstream work");

        assert!(matches!(
            repo.sync(&quiet(), true),
            Err(Error::CannotFastForward { .. })
        ));
    }

    #[test]
    fn remote_url_drift_is_guarded() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let upstream = init_upstream(upstream_dir.path());
        commit_file(&upstream, "config.toml", "", "initial");

        let local_dir = tempfile::tempdir().unwrap();
        let local_path = local_dir.path().join("packages-index");
        let remote_url = upstream_dir.path().display().to_string();

        let repo = MetadataRepo::new(local_path.clone(), remote_url, "main".to_owned());
        repo.ensure_git_repo(&quiet()).unwrap();

        // same path, now configured with a different remote
        let drifted = MetadataRepo::new(
            local_path,
            "https://elsewhere.example/pkgs.git".to_owned(),
            "main".to_owned(),
        );
        assert!(matches!(
            drifted.sync(&quiet(), false),
            Err(Error::RemoteUrlMismatch { .. })
        ));
    }
}

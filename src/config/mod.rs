// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: config
//
//  Global configuration: XDG-derived directories, the parsed user
//  config.toml, and the per-process "global mode" snapshot (argv0,
//  porcelain/debug switches, explicit venv root, fetcher override).
//
//  There are exactly three pieces of shared state in the whole program:
//  this config object, the installation ledger, and the distfile cache
//  directory. All three are passed explicitly; nothing here is a global.
// ─────────────────────────────────────────────────────────────────────────────

pub mod schema;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::host::RuyiHost;
use crate::log::Console;
use crate::repo::MetadataRepo;
use crate::state::{InstallationLedger, NewsReadStatus};

pub const APP_NAME: &str = "ruyi";

pub const DEFAULT_REPO_REMOTE: &str = "https://github.com/ruyisdk/packages-index.git";
pub const DEFAULT_REPO_BRANCH: &str = "main";

/// Values accepted as "true" in boolean environment variables.
const TRUTHY_ENV_VALUES: &[&str] = &["1", "true", "x", "y", "yes"];

pub fn is_env_truthy(value: &str) -> bool {
    let lower = value.to_lowercase();
    TRUTHY_ENV_VALUES.iter().any(|v| *v == lower)
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name).map(|v| is_env_truthy(&v)).unwrap_or(false)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Global mode — per-invocation process facts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GlobalMode {
    /// argv[0] exactly as invoked; decides CLI vs. shim-mux operation.
    pub argv0: String,
    /// Resolved path of this executable, used as the symlink target of shims.
    pub self_exe: PathBuf,
    pub porcelain: bool,
    pub debug: bool,
    pub experimental: bool,
    /// Explicit venv root from RUYI_VENV, if any.
    pub venv_root: Option<PathBuf>,
    pub telemetry_optout: bool,
    pub force_allow_root: bool,
}

impl GlobalMode {
    pub fn from_env(argv0: String, porcelain_flag: bool) -> Self {
        let self_exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from(&argv0));
        Self {
            argv0,
            self_exe,
            porcelain: porcelain_flag,
            debug: env_truthy("RUYI_DEBUG"),
            experimental: env_truthy("RUYI_EXPERIMENTAL"),
            venv_root: std::env::var_os("RUYI_VENV").map(PathBuf::from),
            telemetry_optout: env_truthy("RUYI_TELEMETRY_OPTOUT"),
            force_allow_root: env_truthy("RUYI_FORCE_ALLOW_ROOT"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  User config.toml schema
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(default)]
    pub installation: InstallationConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallationConfig {
    /// When true, `ruyi self uninstall` refuses to remove the binary.
    #[serde(default)]
    pub externally_managed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagesConfig {
    /// Equivalent to passing a prerelease-permitting flag everywhere.
    #[serde(default)]
    pub prereleases: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    pub remote: Option<String>,
    pub branch: Option<String>,
    /// Overrides the metadata repo's cache location.
    pub local: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// "on" | "local" | "off"
    pub mode: Option<String>,
    pub pm_telemetry_url: Option<String>,
    pub upload_consent: Option<toml::value::Datetime>,
}

// ─────────────────────────────────────────────────────────────────────────────
//  Directory layout (XDG base dirs)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppDirs {
    pub cache: PathBuf,
    pub config: PathBuf,
    pub data: PathBuf,
    pub state: PathBuf,
}

impl AppDirs {
    pub fn probe() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("cannot determine home directory".to_owned()))?;
        let cache = dirs::cache_dir().unwrap_or_else(|| home.join(".cache"));
        let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        let data = dirs::data_dir().unwrap_or_else(|| home.join(".local/share"));
        let state = dirs::state_dir().unwrap_or_else(|| home.join(".local/state"));
        Ok(Self {
            cache: cache.join(APP_NAME),
            config: config.join(APP_NAME),
            data: data.join(APP_NAME),
            state: state.join(APP_NAME),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  GlobalConfig
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GlobalConfig {
    pub mode: GlobalMode,
    pub dirs: AppDirs,
    pub cfg: UserConfig,
    console: Console,
}

impl GlobalConfig {
    pub fn load(mode: GlobalMode) -> Result<Self> {
        let dirs = AppDirs::probe()?;
        let cfg = Self::load_user_config(&dirs.config.join("config.toml"))?;
        Ok(Self::new(mode, dirs, cfg))
    }

    pub fn new(mode: GlobalMode, dirs: AppDirs, cfg: UserConfig) -> Self {
        let console = Console::new(mode.porcelain, mode.debug);
        Self {
            mode,
            dirs,
            cfg,
            console,
        }
    }

    /// Language code for localized repo content, from $LANG ("en_US.UTF-8"
    /// → "en_US"), defaulting to en_US.
    pub fn lang_code(&self) -> String {
        std::env::var("LANG")
            .ok()
            .and_then(|l| l.split('.').next().map(str::to_owned))
            .filter(|l| !l.is_empty() && l != "C" && l != "POSIX")
            .unwrap_or_else(|| "en_US".to_owned())
    }

    fn load_user_config(path: &Path) -> Result<UserConfig> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(UserConfig::default())
            }
            Err(e) => return Err(e.into()),
        };

        // Validate section/key/value shape first for precise diagnostics,
        // then deserialize into the typed view.
        let value: toml::Value =
            text.parse().map_err(|e: toml::de::Error| Error::MalformedConfigFile {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        schema::validate_config_document(&value)?;

        toml::from_str(&text).map_err(|e| Error::MalformedConfigFile {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn include_prereleases(&self) -> bool {
        self.cfg.packages.prereleases
    }

    pub fn repo_remote(&self) -> &str {
        self.cfg
            .repo
            .remote
            .as_deref()
            .unwrap_or(DEFAULT_REPO_REMOTE)
    }

    pub fn repo_branch(&self) -> &str {
        self.cfg
            .repo
            .branch
            .as_deref()
            .unwrap_or(DEFAULT_REPO_BRANCH)
    }

    /// Where the metadata repo working tree lives. An explicit `repo.local`
    /// wins over the managed cache location.
    pub fn packages_index_dir(&self) -> PathBuf {
        match &self.cfg.repo.local {
            Some(p) => PathBuf::from(p),
            None => self.dirs.cache.join("packages-index"),
        }
    }

    /// Rewriting a drifted remote URL is only allowed while the repo lives
    /// in its managed default location.
    pub fn is_repo_auto_managed(&self) -> bool {
        self.cfg.repo.local.is_none()
    }

    pub fn distfiles_dir(&self) -> PathBuf {
        self.dirs.cache.join("distfiles")
    }

    pub fn binary_install_root(&self, host: &RuyiHost, name_for_installation: &str) -> PathBuf {
        self.dirs
            .data
            .join("binaries")
            .join(host.to_string().replace('/', "-"))
            .join(name_for_installation)
    }

    pub fn blob_install_root(&self, name_for_installation: &str) -> PathBuf {
        self.dirs.data.join("blobs").join(name_for_installation)
    }

    /// Find the install root of an already-installed binary package, or None.
    pub fn lookup_binary_install_dir(
        &self,
        host: &RuyiHost,
        name_for_installation: &str,
    ) -> Option<PathBuf> {
        let p = self.binary_install_root(host, name_for_installation);
        p.is_dir().then_some(p)
    }

    pub fn open_repo(&self) -> MetadataRepo {
        MetadataRepo::new(
            self.packages_index_dir(),
            self.repo_remote().to_owned(),
            self.repo_branch().to_owned(),
        )
    }

    pub fn open_ledger(&self) -> InstallationLedger {
        InstallationLedger::new(self.dirs.state.clone())
    }

    pub fn open_news_read_status(&self) -> NewsReadStatus {
        NewsReadStatus::new(self.dirs.state.join("news.read.txt"))
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
    fn truthy_env_values() {
        for v in ["1", "true", "TRUE", "x", "Y", "yes", "Yes"] {
            assert!(is_env_truthy(v), "{v} should be truthy");
        }
        for v in ["0", "false", "no", "", "on"] {
            assert!(!is_env_truthy(v), "{v} should not be truthy");
        }
    }

    #[test]
    fn user_config_parses_all_sections() {
        let cfg: UserConfig = toml::from_str(
            r#"
            [installation]
            externally_managed = true

            [packages]
            prereleases = true

            [repo]
            remote = "https://example.org/r.git"
            branch = "dev"

            [telemetry]
            mode = "local"
            "#,
        )
        .unwrap();
        assert!(cfg.installation.externally_managed);
        assert!(cfg.packages.prereleases);
        assert_eq!(cfg.repo.branch.as_deref(), Some("dev"));
        assert_eq!(cfg.telemetry.mode.as_deref(), Some("local"));
    }
}

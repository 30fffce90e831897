// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: state
//
//  Persistent process-local state under the XDG state dir:
//
//    installs.json    — the installation ledger, loaded lazily and written
//                       atomically (tmp file + fsync + rename over)
//    news.read.txt    — one news id per line
//
//  Ledger keys: "{repo_id}:{category}/{name} {version}[ host={host}]".
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
//  Installation ledger
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub repo_id: String,
    pub category: String,
    pub name: String,
    pub version: String,
    /// Canonical host string for binary packages, empty for blobs.
    pub host: String,
    pub install_path: PathBuf,
    /// Unix timestamp of the successful install.
    pub install_time: u64,
}

impl InstallRecord {
    pub fn key(&self) -> String {
        ledger_key(
            &self.repo_id,
            &self.category,
            &self.name,
            &self.version,
            &self.host,
        )
    }
}

pub fn ledger_key(repo_id: &str, category: &str, name: &str, version: &str, host: &str) -> String {
    if host.is_empty() {
        format!("{repo_id}:{category}/{name} {version}")
    } else {
        format!("{repo_id}:{category}/{name} {version} host={host}")
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct InstallationLedger {
    root: PathBuf,
    cache: Option<BTreeMap<String, InstallRecord>>,
}

impl InstallationLedger {
    pub fn new(state_root: PathBuf) -> Self {
        Self {
            root: state_root,
            cache: None,
        }
    }

    fn installs_path(&self) -> PathBuf {
        self.root.join("installs.json")
    }

    fn load(&mut self) -> Result<&mut BTreeMap<String, InstallRecord>> {
        if self.cache.is_none() {
            let map = match std::fs::read_to_string(self.installs_path()) {
                Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(e.into()),
            };
            self.cache = Some(map);
        }
        Ok(self.cache.as_mut().unwrap())
    }

    fn save(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let Some(map) = &self.cache else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(map)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let tmp = self.installs_path().with_extension("json.tmp");
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, self.installs_path())?;
        Ok(())
    }

    /// Record a successful installation.
    pub fn record(
        &mut self,
        repo_id: &str,
        category: &str,
        name: &str,
        version: &str,
        host: &str,
        install_path: &Path,
    ) -> Result<()> {
        let rec = InstallRecord {
            repo_id: repo_id.to_owned(),
            category: category.to_owned(),
            name: name.to_owned(),
            version: version.to_owned(),
            host: host.to_owned(),
            install_path: install_path.to_owned(),
            install_time: now_secs(),
        };
        let key = rec.key();
        self.load()?.insert(key, rec);
        self.save()
    }

    /// Drop a record; returns whether one was present.
    pub fn remove(
        &mut self,
        repo_id: &str,
        category: &str,
        name: &str,
        version: &str,
        host: &str,
    ) -> Result<bool> {
        let key = ledger_key(repo_id, category, name, version, host);
        let removed = self.load()?.remove(&key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn get(
        &mut self,
        repo_id: &str,
        category: &str,
        name: &str,
        version: &str,
        host: &str,
    ) -> Result<Option<InstallRecord>> {
        let key = ledger_key(repo_id, category, name, version, host);
        Ok(self.load()?.get(&key).cloned())
    }

    pub fn is_installed(
        &mut self,
        repo_id: &str,
        category: &str,
        name: &str,
        version: &str,
        host: &str,
    ) -> Result<bool> {
        Ok(self.get(repo_id, category, name, version, host)?.is_some())
    }

    pub fn list_all(&mut self) -> Result<Vec<InstallRecord>> {
        Ok(self.load()?.values().cloned().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  News read status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct NewsReadStatus {
    path: PathBuf,
    ids: Option<BTreeSet<String>>,
}

impl NewsReadStatus {
    pub fn new(path: PathBuf) -> Self {
        Self { path, ids: None }
    }

    fn load(&mut self) -> Result<&mut BTreeSet<String>> {
        if self.ids.is_none() {
            let set = match std::fs::read_to_string(&self.path) {
                Ok(text) => text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned)
                    .collect(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
                Err(e) => return Err(e.into()),
            };
            self.ids = Some(set);
        }
        Ok(self.ids.as_mut().unwrap())
    }

    pub fn contains(&mut self, id: &str) -> Result<bool> {
        Ok(self.load()?.contains(id))
    }

    pub fn all(&mut self) -> Result<BTreeSet<String>> {
        Ok(self.load()?.clone())
    }

    pub fn mark_read(&mut self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let set = self.load()?;
        for id in ids {
            set.insert(id.clone());
        }
        let body: String = self
            .ids
            .as_ref()
            .unwrap()
            .iter()
            .map(|id| format!("{id}\n"))
            .collect();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

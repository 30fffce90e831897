// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: resolve
//
//  Latest-version selection under constraints and the pre-release policy,
//  plus the installed-only store view used when matching uninstall atoms,
//  and the upgradable-package iteration behind `ruyi update`.
// ─────────────────────────────────────────────────────────────────────────────

use semver::Version;

use crate::error::Result;
use crate::state::InstallRecord;

use super::atom::Atom;
use super::manifest::PackageManifest;
use super::version::is_prerelease;
use super::ProvidesPackageManifests;

/// Resolve one atom string against a store under the given policy.
pub fn resolve_atom<S: ProvidesPackageManifests + ?Sized>(
    store: &S,
    atom_str: &str,
    include_prerelease: bool,
) -> Result<PackageManifest> {
    Atom::parse(atom_str)?.match_in(store, include_prerelease)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Installed-only view
// ─────────────────────────────────────────────────────────────────────────────

/// A `ProvidesPackageManifests` view restricted to packages present in the
/// installation ledger, so e.g. uninstall atoms cannot match something
/// that was never installed.
pub struct InstalledStore<'a, S: ProvidesPackageManifests> {
    records: Vec<InstallRecord>,
    backing: &'a S,
}

impl<'a, S: ProvidesPackageManifests> InstalledStore<'a, S> {
    pub fn new(records: Vec<InstallRecord>, backing: &'a S) -> Self {
        Self { records, backing }
    }

    pub fn records(&self) -> &[InstallRecord] {
        &self.records
    }
}

impl<S: ProvidesPackageManifests> ProvidesPackageManifests for InstalledStore<'_, S> {
    fn iter_pkg_manifests(&self) -> Result<Vec<PackageManifest>> {
        let mut out = Vec::new();
        for rec in &self.records {
            if let Some(pm) = self
                .backing
                .get_pkg(&rec.name, &rec.category, &rec.version)?
            {
                out.push(pm);
            }
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Upgradable iteration
// ─────────────────────────────────────────────────────────────────────────────

/// For each installed package, the newer manifest the repo offers, if any.
pub fn iter_upgradable<S: ProvidesPackageManifests + ?Sized>(
    records: &[InstallRecord],
    repo: &S,
    include_prerelease: bool,
) -> Result<Vec<(InstallRecord, PackageManifest)>> {
    let mut out = Vec::new();
    for rec in records {
        let Ok(installed_ver) = Version::parse(&rec.version) else {
            continue;
        };

        // an explicitly installed pre-release still upgrades to later
        // pre-releases of the same package
        let latest = repo.get_pkg_latest_ver(
            &rec.name,
            Some(&rec.category),
            include_prerelease || is_prerelease(&installed_ver),
        )?;
        if let Some(latest) = latest {
            if *latest.semver() > installed_ver {
                out.push((rec.clone(), latest));
            }
        }
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg  —  package domain: manifests, atoms, distfiles, resolution
// ─────────────────────────────────────────────────────────────────────────────

pub mod atom;
pub mod canonical;
pub mod distfile;
pub mod manifest;
pub mod resolve;
pub mod version;

pub use atom::Atom;
pub use manifest::{PackageKind, PackageManifest};

use crate::error::Result;

/// Anything that can hand out package manifests: the metadata repo, or the
/// installed-only view used when matching uninstall atoms.
pub trait ProvidesPackageManifests {
    /// Every manifest in the store, in no particular order.
    fn iter_pkg_manifests(&self) -> Result<Vec<PackageManifest>>;

    /// All versions of one package, optionally category-qualified.
    fn iter_pkg_vers(&self, name: &str, category: Option<&str>) -> Result<Vec<PackageManifest>> {
        Ok(self
            .iter_pkg_manifests()?
            .into_iter()
            .filter(|pm| {
                pm.name == name && category.map(|c| pm.category == c).unwrap_or(true)
            })
            .collect())
    }

    /// Exact-version lookup.
    fn get_pkg(&self, name: &str, category: &str, ver: &str) -> Result<Option<PackageManifest>> {
        Ok(self
            .iter_pkg_vers(name, Some(category))?
            .into_iter()
            .find(|pm| pm.ver == ver))
    }

    /// Exact-slug lookup.
    fn get_pkg_by_slug(&self, slug: &str) -> Result<Option<PackageManifest>> {
        Ok(self
            .iter_pkg_manifests()?
            .into_iter()
            .find(|pm| pm.slug() == Some(slug)))
    }

    /// Latest version of a package under the pre-release policy.
    fn get_pkg_latest_ver(
        &self,
        name: &str,
        category: Option<&str>,
        include_prerelease: bool,
    ) -> Result<Option<PackageManifest>> {
        Ok(self
            .iter_pkg_vers(name, category)?
            .into_iter()
            .filter(|pm| include_prerelease || !pm.is_prerelease())
            .max_by(|a, b| a.semver().cmp(b.semver())))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Test support
// ─────────────────────────────────────────────────────────────────────────────

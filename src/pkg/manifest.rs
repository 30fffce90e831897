// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: manifest
//
//  Typed package manifests (format "v1"). Category and name come from the
//  storage path, the version from the filename; the TOML body declares
//  metadata, distfiles and the kind-specific sections.
//
//  Invariants enforced at construction:
//    • a manifest declares `binary` xor `source`, never both
//    • every distfile name referenced by a kind section exists in distfiles[]
//    • every distfile carries at least one checksum in a supported
//      algorithm, hex-encoded at the expected length
//    • the version parses as a semantic version
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::checksum;
use crate::error::{Error, Result};
use crate::unpack::UnpackMethod;

use super::version::is_prerelease;

// ─────────────────────────────────────────────────────────────────────────────
//  Declarations (the TOML shape)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Binary,
    Blob,
    Source,
    Toolchain,
    Emulator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifestData {
    pub format: String,
    pub metadata: PackageMetadataDecl,
    #[serde(default)]
    pub kind: Vec<PackageKind>,
    #[serde(default)]
    pub distfiles: Vec<DistfileDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<BinaryHostDecl>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<BlobDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emulator: Option<EmulatorDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisionable: Option<ProvisionableDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadataDecl {
    pub desc: String,
    pub vendor: VendorDecl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<ServiceLevelDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorDecl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eula: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevelDecl {
    pub level: String,
    /// Message ids into the repo message store, one per known issue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictKind {
    Fetch,
    Mirror,
}

/// Message shown when a fetch-restricted distfile has to be obtained
/// manually; the msgid resolves through the repo message store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRestrictionDecl {
    pub msgid: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

fn default_strip_components() -> usize {
    1
}

fn is_default_strip(n: &usize) -> bool {
    *n == 1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistfileDecl {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict: Option<Vec<RestrictKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_restriction: Option<FetchRestrictionDecl>,
    #[serde(
        default = "default_strip_components",
        skip_serializing_if = "is_default_strip"
    )]
    pub strip_components: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpack: Option<UnpackMethod>,
}

impl DistfileDecl {
    pub fn unpack_method(&self) -> UnpackMethod {
        self.unpack.unwrap_or(UnpackMethod::Auto)
    }

    pub fn is_restricted(&self, kind: RestrictKind) -> bool {
        self.restrict
            .as_ref()
            .map(|r| r.contains(&kind))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryHostDecl {
    pub host: String,
    pub distfiles: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDecl {
    pub distfiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDecl {
    pub distfiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainComponent {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainDecl {
    pub target: String,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub components: Vec<ToolchainComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_sysroot: Option<String>,
}

impl ToolchainDecl {
    pub fn component_version(&self, name: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.version.as_str())
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.component_version(name).is_some()
    }

    pub fn has_clang(&self) -> bool {
        self.has_component("clang")
    }

    pub fn has_llvm(&self) -> bool {
        self.has_component("llvm")
    }

    pub fn has_gcc(&self) -> bool {
        self.has_component("gcc")
    }

    pub fn has_binutils(&self) -> bool {
        self.has_component("binutils")
    }

    /// Whether this toolchain provides every quirk in `needed`.
    pub fn satisfies_quirks(&self, needed: &[String]) -> bool {
        needed.iter().all(|q| self.quirks.contains(q))
    }

    /// Architecture half of the target tuple, e.g. "riscv64" of
    /// "riscv64-unknown-linux-gnu".
    pub fn target_arch(&self) -> &str {
        self.target.split('-').next().unwrap_or(&self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorFlavorDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub supported_arches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorProgDecl {
    pub path: String,
    pub flavor: String,
    #[serde(default)]
    pub supported_arches: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binfmt_misc: Option<String>,
}

impl EmulatorProgDecl {
    pub fn is_qemu(&self) -> bool {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("qemu-"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorDecl {
    #[serde(default)]
    pub flavors: Vec<EmulatorFlavorDecl>,
    #[serde(default)]
    pub program: Vec<EmulatorProgDecl>,
}

impl EmulatorDecl {
    pub fn progs_for_arch(&self, arch: &str) -> Vec<&EmulatorProgDecl> {
        self.program
            .iter()
            .filter(|p| p.supported_arches.iter().any(|a| a == arch))
            .collect()
    }

    pub fn flavor_quirks(&self, flavor: &str) -> &[String] {
        self.flavors
            .iter()
            .find(|f| f.name == flavor)
            .map(|f| f.quirks.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionableDecl {
    pub strategy: String,
    #[serde(default)]
    pub partition_map: BTreeMap<String, String>,
}

// ─────────────────────────────────────────────────────────────────────────────
//  The bound manifest
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed manifest attached to the identity of the repo it came from.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub repo_id: String,
    pub category: String,
    pub name: String,
    pub ver: String,
    semver: Version,
    data: PackageManifestData,
}

impl PackageManifest {
    pub fn new(
        repo_id: &str,
        category: &str,
        name: &str,
        ver: &str,
        data: PackageManifestData,
    ) -> Result<Self> {
        let semver = Version::parse(ver).map_err(|e| Error::Manifest {
            path: format!("{category}/{name}/{ver}").into(),
            reason: format!("bad version '{ver}': {e}"),
        })?;
        let pm = Self {
            repo_id: repo_id.to_owned(),
            category: category.to_owned(),
            name: name.to_owned(),
            ver: ver.to_owned(),
            semver,
            data,
        };
        pm.validate()?;
        Ok(pm)
    }

    pub fn from_toml_str(
        repo_id: &str,
        category: &str,
        name: &str,
        ver: &str,
        text: &str,
    ) -> Result<Self> {
        let data: PackageManifestData = toml::from_str(text).map_err(|e| Error::Manifest {
            path: format!("{category}/{name}/{ver}.toml").into(),
            reason: e.to_string(),
        })?;
        Self::new(repo_id, category, name, ver, data)
    }

    fn bad(&self, reason: String) -> Error {
        Error::Manifest {
            path: format!("{}/{}/{}.toml", self.category, self.name, self.ver).into(),
            reason,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.data.format != "v1" {
            return Err(self.bad(format!("unknown manifest format '{}'", self.data.format)));
        }

        if self.data.binary.is_some() && self.data.source.is_some() {
            return Err(self.bad("package declares both binary and source".to_owned()));
        }

        for df in &self.data.distfiles {
            if df.checksums.is_empty() {
                return Err(self.bad(format!("distfile '{}' carries no checksum", df.name)));
            }
            for (algo, hexstr) in &df.checksums {
                let Some(want_len) = checksum::expected_hex_len(algo) else {
                    return Err(self.bad(format!(
                        "distfile '{}' uses unsupported checksum algorithm '{algo}'",
                        df.name
                    )));
                };
                let valid = hexstr.len() == want_len
                    && hexstr.bytes().all(|b| b.is_ascii_hexdigit());
                if !valid {
                    return Err(self.bad(format!(
                        "distfile '{}' has a malformed {algo} checksum",
                        df.name
                    )));
                }
            }
        }

        let declared: Vec<&str> = self.data.distfiles.iter().map(|d| d.name.as_str()).collect();
        let check_refs = |refs: &[String], section: &str| -> Result<()> {
            for r in refs {
                if !declared.contains(&r.as_str()) {
                    return Err(self.bad(format!(
                        "{section} references undeclared distfile '{r}'"
                    )));
                }
            }
            Ok(())
        };

        if let Some(binary) = &self.data.binary {
            for hd in binary {
                check_refs(&hd.distfiles, &format!("binary[{}]", hd.host))?;
            }
        }
        if let Some(blob) = &self.data.blob {
            check_refs(&blob.distfiles, "blob")?;
        }
        if let Some(source) = &self.data.source {
            check_refs(&source.distfiles, "source")?;
        }

        Ok(())
    }

    // ── identity ──────────────────────────────────────────────────────────

    pub fn semver(&self) -> &Version {
        &self.semver
    }

    pub fn is_prerelease(&self) -> bool {
        is_prerelease(&self.semver)
    }

    /// "category/name" as shown to users.
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Directory name the package installs under: "<name>-<ver>".
    pub fn name_for_installation(&self) -> String {
        format!("{}-{}", self.name, self.ver)
    }

    pub fn slug(&self) -> Option<&str> {
        self.data.metadata.slug.as_deref()
    }

    pub fn desc(&self) -> &str {
        &self.data.metadata.desc
    }

    pub fn vendor_name(&self) -> &str {
        &self.data.metadata.vendor.name
    }

    pub fn data(&self) -> &PackageManifestData {
        &self.data
    }

    // ── kinds ─────────────────────────────────────────────────────────────

    pub fn has_kind(&self, k: PackageKind) -> bool {
        self.data.kind.contains(&k)
    }

    pub fn kinds(&self) -> &[PackageKind] {
        &self.data.kind
    }

    // ── distfiles ─────────────────────────────────────────────────────────

    pub fn distfiles(&self) -> BTreeMap<&str, &DistfileDecl> {
        self.data
            .distfiles
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect()
    }

    // ── kind-specific metadata ────────────────────────────────────────────

    pub fn binary_metadata(&self) -> Option<BinaryMetadata<'_>> {
        if !self.has_kind(PackageKind::Binary) {
            return None;
        }
        self.data.binary.as_deref().map(BinaryMetadata)
    }

    pub fn blob_metadata(&self) -> Option<&BlobDecl> {
        if !self.has_kind(PackageKind::Blob) {
            return None;
        }
        self.data.blob.as_ref()
    }

    pub fn source_metadata(&self) -> Option<&SourceDecl> {
        if !self.has_kind(PackageKind::Source) {
            return None;
        }
        self.data.source.as_ref()
    }

    pub fn toolchain_metadata(&self) -> Option<&ToolchainDecl> {
        if !self.has_kind(PackageKind::Toolchain) {
            return None;
        }
        self.data.toolchain.as_ref()
    }

    pub fn emulator_metadata(&self) -> Option<&EmulatorDecl> {
        if !self.has_kind(PackageKind::Emulator) {
            return None;
        }
        self.data.emulator.as_ref()
    }

    pub fn provisionable_metadata(&self) -> Option<&ProvisionableDecl> {
        self.data.provisionable.as_ref()
    }

    // ── service level ─────────────────────────────────────────────────────

    pub fn has_known_issues(&self) -> bool {
        self.data
            .metadata
            .service_level
            .as_ref()
            .map(|sl| !sl.known_issues.is_empty())
            .unwrap_or(false)
    }

    pub fn known_issue_msgids(&self) -> &[String] {
        self.data
            .metadata
            .service_level
            .as_ref()
            .map(|sl| sl.known_issues.as_slice())
            .unwrap_or(&[])
    }
}

/// View over the per-host binary declarations.
#[derive(Debug, Clone, Copy)]
pub struct BinaryMetadata<'a>(&'a [BinaryHostDecl]);

impl<'a> BinaryMetadata<'a> {
    pub fn distfile_names_for_host(&self, host: &str) -> Option<&'a [String]> {
        self.0
            .iter()
            .find(|hd| hd.host == host)
            .map(|hd| hd.distfiles.as_slice())
    }

    pub fn commands_for_host(&self, host: &str) -> Option<&'a BTreeMap<String, String>> {
        self.0
            .iter()
            .find(|hd| hd.host == host)
            .map(|hd| &hd.commands)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: distfile
//
//  One downloadable artifact: ensure it exists in the distfile cache with
//  the declared size and checksums, then unpack it somewhere. The cache is
//  shared process-wide, so `ensure` holds a per-distfile advisory file
//  lock for its whole duration; concurrent installs of packages sharing a
//  distfile serialize on it instead of clobbering each other.
// ─────────────────────────────────────────────────────────────────────────────

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::checksum;
use crate::error::{Error, Result};
use crate::fetch::{self, FetcherKind};
use crate::log::Console;
use crate::unpack;

use super::manifest::{DistfileDecl, RestrictKind};

const INTEGRITY_RETRIES: u32 = 3;

pub struct Distfile<'a> {
    decl: &'a DistfileDecl,
    urls: Vec<String>,
    dest: PathBuf,
    /// Human-readable reason shown when the distfile is fetch-restricted,
    /// typically rendered from the repo message store.
    restrict_reason: Option<String>,
}

impl<'a> Distfile<'a> {
    pub fn new(
        decl: &'a DistfileDecl,
        urls: Vec<String>,
        distfiles_dir: &Path,
        restrict_reason: Option<String>,
    ) -> Self {
        Self {
            dest: distfiles_dir.join(&decl.name),
            decl,
            urls,
            restrict_reason,
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Make sure the cached file exists and passes integrity checks,
    /// fetching (or re-fetching) as needed.
    pub fn ensure(&self, fetcher: FetcherKind, console: &Console) -> Result<()> {
        if let Some(parent) = self.dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // serialize concurrent ensures of the same distfile
        let lock_path = self.dest.with_file_name(format!("{}.lock", self.decl.name));
        let lock_file = File::create(&lock_path)?;
        lock_file.lock_exclusive()?;
        let result = self.ensure_locked(fetcher, console);
        let _ = fs2::FileExt::unlock(&lock_file);
        result
    }

    fn ensure_locked(&self, fetcher: FetcherKind, console: &Console) -> Result<()> {
        console.debug(&format!("checking {}", self.dest.display()));

        if self.dest.exists() && self.verify_or_remove(console)? {
            console.debug(&format!("file {} passed checks", self.dest.display()));
            return Ok(());
        }

        if self.decl.is_restricted(RestrictKind::Fetch) {
            return Err(Error::FetchRestricted {
                name: self.decl.name.clone(),
                reason: self
                    .restrict_reason
                    .clone()
                    .unwrap_or_else(|| {
                        "  obtain the file manually and place it in the distfile cache".to_owned()
                    }),
            });
        }

        let mut last_err = None;
        for _ in 0..INTEGRITY_RETRIES {
            fetch::fetch(
                fetcher,
                &self.urls,
                &self.dest,
                Some(self.decl.size),
                console,
            )?;

            match self.verify_or_remove(console) {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    // corrupt download was deleted; go around again
                    last_err = Some(Error::Other(format!(
                        "{} failed integrity checks",
                        self.dest.display()
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Other(format!("failed to ensure distfile {}", self.decl.name))
        }))
    }

    /// Verify size and checksums; a failing file is deleted and reported
    /// as `false` so the caller can re-fetch.
    fn verify_or_remove(&self, console: &Console) -> Result<bool> {
        let meta = std::fs::metadata(&self.dest)?;
        if meta.len() != self.decl.size {
            console.warn(&format!(
                "file {} is corrupt: size {} != {}; deleting",
                self.dest.display(),
                meta.len(),
                self.decl.size
            ));
            std::fs::remove_file(&self.dest)?;
            return Ok(false);
        }

        match checksum::check(File::open(&self.dest)?, &self.decl.checksums) {
            Ok(()) => Ok(true),
            Err(e @ Error::ChecksumMismatch { .. }) => {
                console.warn(&format!(
                    "file {} is corrupt: {e}; deleting",
                    self.dest.display()
                ));
                std::fs::remove_file(&self.dest)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn unpack(&self, root: &Path) -> Result<()> {
        unpack::unpack(
            &self.dest,
            root,
            self.decl.strip_components,
            self.decl.unpack_method(),
        )
    }

    /// Blob variant: raw files get symlinked into place instead of copied.
    pub fn unpack_or_symlink(&self, root: &Path) -> Result<()> {
        unpack::unpack_or_symlink(
            &self.dest,
            root,
            self.decl.strip_components,
            self.decl.unpack_method(),
            Some(&self.decl.name),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn decl_for(data: &[u8], name: &str) -> DistfileDecl {
        let digest = checksum::compute(data, &["sha256"]).unwrap();
        DistfileDecl {
            name: name.to_owned(),
            size: data.len() as u64,
            checksums: digest,
            urls: None,
            restrict: None,
            fetch_restriction: None,
            strip_components: 1,
            unpack: None,
        }
    }

    fn quiet() -> Console {
        Console::new(false, false)
    }

    #[test]
    fn cached_file_short_circuits_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"cached-bytes";
        std::fs::write(dir.path().join("a.bin"), data).unwrap();

        let decl = decl_for(data, "a.bin");
        // no URLs: success proves nothing was fetched
        let df = Distfile::new(&decl, Vec::new(), dir.path(), None);
        df.ensure(FetcherKind::Ureq, &quiet()).unwrap();
    }

    #[test]
    fn corrupt_cached_file_is_deleted_before_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"good-bytes";
        // same size, wrong content
        std::fs::write(dir.path().join("a.bin"), b"bad!-bytes").unwrap();

        let decl = decl_for(data, "a.bin");
        let df = Distfile::new(&decl, Vec::new(), dir.path(), None);
        // refetch must fail (no URLs), but the corrupt file must be gone
        assert!(df.ensure(FetcherKind::Ureq, &quiet()).is_err());
        assert!(!dir.path().join("a.bin").exists());
    }

    #[test]
    fn fetch_restriction_blocks_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut decl = decl_for(b"x", "restricted.bin");
        decl.restrict = Some(vec![RestrictKind::Fetch]);

        let df = Distfile::new(
            &decl,
            vec!["https://example.org/x".to_owned()],
            dir.path(),
            Some("  see vendor page".to_owned()),
        );
        assert!(matches!(
            df.ensure(FetcherKind::Ureq, &quiet()),
            Err(Error::FetchRestricted { .. })
        ));
    }

    #[test]
    fn fetch_restriction_accepts_preseeded_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"preseeded";
        std::fs::write(dir.path().join("restricted.bin"), data).unwrap();

        let mut decl = decl_for(data, "restricted.bin");
        decl.restrict = Some(vec![RestrictKind::Fetch]);

        let df = Distfile::new(&decl, Vec::new(), dir.path(), None);
        df.ensure(FetcherKind::Ureq, &quiet()).unwrap();
    }

    fn build_checksums(data: &[u8]) -> BTreeMap<String, String> {
        checksum::compute(data, &["sha256"]).unwrap()
    }

    #[test]
    fn unpack_uses_declared_strip_components() {
        let dir = tempfile::tempdir().unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg-1.0/file.txt", &b"data"[..])
            .unwrap();
        let tarball = builder.into_inner().unwrap();

        std::fs::write(dir.path().join("pkg.tar"), &tarball).unwrap();
        let decl = DistfileDecl {
            name: "pkg.tar".to_owned(),
            size: tarball.len() as u64,
            checksums: build_checksums(&tarball),
            urls: None,
            restrict: None,
            fetch_restriction: None,
            strip_components: 1,
            unpack: None,
        };

        let df = Distfile::new(&decl, Vec::new(), dir.path(), None);
        let out = dir.path().join("out");
        df.unpack(&out).unwrap();
        assert!(out.join("file.txt").is_file());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: unpack
//
//  Archive extraction into a target prefix. All codecs run in-process:
//  tarballs stream through the matching decompressor with path components
//  stripped on the fly, zip entries have their paths stripped the same
//  way, .deb goes through the ar(1) outer archive to its inner data.tar.*,
//  and bare compressed files decompress to a sibling basename in `dest`.
// ─────────────────────────────────────────────────────────────────────────────

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
//  Methods
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnpackMethod {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "tar.auto")]
    TarAuto,

    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "gz")]
    Gz,
    #[serde(rename = "bz2")]
    Bz2,
    #[serde(rename = "lz4")]
    Lz4,
    #[serde(rename = "xz")]
    Xz,
    #[serde(rename = "zst")]
    Zst,

    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "tar.bz2")]
    TarBz2,
    #[serde(rename = "tar.lz4")]
    TarLz4,
    #[serde(rename = "tar.xz")]
    TarXz,
    #[serde(rename = "tar.zst")]
    TarZst,

    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "deb")]
    Deb,
}

/// Case-insensitive suffix table used by `auto` and `tar.auto`.
const SUFFIX_TABLE: &[(&str, UnpackMethod)] = &[
    (".tar.gz", UnpackMethod::TarGz),
    (".tar.bz2", UnpackMethod::TarBz2),
    (".tar.lz4", UnpackMethod::TarLz4),
    (".tar.xz", UnpackMethod::TarXz),
    (".tar.zst", UnpackMethod::TarZst),
    (".tar", UnpackMethod::Tar),
    (".deb", UnpackMethod::Deb),
    (".zip", UnpackMethod::Zip),
    (".gz", UnpackMethod::Gz),
    (".bz2", UnpackMethod::Bz2),
    (".lz4", UnpackMethod::Lz4),
    (".xz", UnpackMethod::Xz),
    (".zst", UnpackMethod::Zst),
];

/// Derive the unpack method from a filename suffix.
pub fn determine_unpack_method(filename: &str) -> Result<UnpackMethod> {
    let lower = filename.to_lowercase();
    for (suffix, method) in SUFFIX_TABLE {
        if lower.ends_with(suffix) {
            return Ok(*method);
        }
    }
    Err(Error::UnrecognizedPackFormat(filename.to_owned()))
}

/// Resolve `auto` / `tar.auto` against the actual filename before any work
/// happens, so an unrecognized format fails before fetching.
pub fn resolve_method(method: UnpackMethod, filename: &str) -> Result<UnpackMethod> {
    match method {
        UnpackMethod::Auto => determine_unpack_method(filename),
        UnpackMethod::TarAuto => match determine_unpack_method(filename) {
            Ok(
                m @ (UnpackMethod::Tar
                | UnpackMethod::TarGz
                | UnpackMethod::TarBz2
                | UnpackMethod::TarLz4
                | UnpackMethod::TarXz
                | UnpackMethod::TarZst),
            ) => Ok(m),
            _ => Ok(UnpackMethod::Tar),
        },
        m => Ok(m),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry points
// ─────────────────────────────────────────────────────────────────────────────

/// Extract `file` into `dest` with the given method.
pub fn unpack(file: &Path, dest: &Path, strip_components: usize, method: UnpackMethod) -> Result<()> {
    let method = resolve_method(method, &file_name_of(file))?;
    std::fs::create_dir_all(dest)?;

    match method {
        UnpackMethod::Auto | UnpackMethod::TarAuto => unreachable!("resolved above"),

        UnpackMethod::Tar => unpack_tar(File::open(file)?, dest, strip_components),
        UnpackMethod::TarGz => unpack_tar(
            flate2::read::GzDecoder::new(File::open(file)?),
            dest,
            strip_components,
        ),
        UnpackMethod::TarBz2 => unpack_tar(
            bzip2::read::BzDecoder::new(File::open(file)?),
            dest,
            strip_components,
        ),
        UnpackMethod::TarLz4 => unpack_tar(
            lz4_flex::frame::FrameDecoder::new(File::open(file)?),
            dest,
            strip_components,
        ),
        UnpackMethod::TarXz => unpack_tar(
            xz2::read::XzDecoder::new(File::open(file)?),
            dest,
            strip_components,
        ),
        UnpackMethod::TarZst => unpack_tar(
            zstd::stream::read::Decoder::new(File::open(file)?)
                .map_err(|e| Error::Other(format!("zstd init failed: {e}")))?,
            dest,
            strip_components,
        ),

        UnpackMethod::Zip => unpack_zip(file, dest, strip_components),
        UnpackMethod::Deb => unpack_deb(file, dest, strip_components),

        UnpackMethod::Gz => {
            decompress_single(flate2::read::GzDecoder::new(File::open(file)?), file, dest, ".gz")
        }
        UnpackMethod::Bz2 => {
            decompress_single(bzip2::read::BzDecoder::new(File::open(file)?), file, dest, ".bz2")
        }
        UnpackMethod::Lz4 => decompress_single(
            lz4_flex::frame::FrameDecoder::new(File::open(file)?),
            file,
            dest,
            ".lz4",
        ),
        UnpackMethod::Xz => {
            decompress_single(xz2::read::XzDecoder::new(File::open(file)?), file, dest, ".xz")
        }
        UnpackMethod::Zst => decompress_single(
            zstd::stream::read::Decoder::new(File::open(file)?)
                .map_err(|e| Error::Other(format!("zstd init failed: {e}")))?,
            file,
            dest,
            ".zst",
        ),

        UnpackMethod::Raw => {
            let out = dest.join(file_name_of(file));
            std::fs::copy(file, out)?;
            Ok(())
        }
    }
}

/// Blob variant: a `raw` distfile with a fallback name becomes a symlink
/// into the distfile cache instead of a copy.
pub fn unpack_or_symlink(
    file: &Path,
    dest: &Path,
    strip_components: usize,
    method: UnpackMethod,
    symlink_fallback_name: Option<&str>,
) -> Result<()> {
    let resolved = resolve_method(method, &file_name_of(file))?;
    if resolved == UnpackMethod::Raw {
        if let Some(name) = symlink_fallback_name {
            std::fs::create_dir_all(dest)?;
            let link = dest.join(name);
            return make_symlink(file, &link);
        }
    }
    unpack(file, dest, strip_components, method)
}

#[cfg(unix)]
fn make_symlink(src: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(src: &Path, link: &Path) -> Result<()> {
    std::fs::copy(src, link)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tar
// ─────────────────────────────────────────────────────────────────────────────

fn unpack_tar<R: Read>(reader: R, dest: &Path, strip_components: usize) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_unpack_xattrs(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        let Some(stripped) = strip_path(&path, strip_components) else {
            continue;
        };

        let out = dest.join(&stripped);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&out)?;
    }
    Ok(())
}

/// Drop the first `n` components of a relative path; None when nothing is
/// left (the entry lies entirely within the stripped prefix).
fn strip_path(path: &Path, n: usize) -> Option<PathBuf> {
    let comps: Vec<Component<'_>> = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if comps.len() <= n {
        return None;
    }
    Some(comps[n..].iter().collect())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Zip
// ─────────────────────────────────────────────────────────────────────────────

fn unpack_zip(file: &Path, dest: &Path, strip_components: usize) -> Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(file)?)
        .map_err(|e| Error::Other(format!("failed to open ZIP {}: {e}", file.display())))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Other(format!("ZIP read error: {e}")))?;

        let Some(raw) = entry.enclosed_name().map(|p| p.to_owned()) else {
            continue;
        };
        let Some(stripped) = strip_path(&raw, strip_components) else {
            continue;
        };

        let out = dest.join(&stripped);
        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = File::create(&out)?;
        io::copy(&mut entry, &mut f)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out, std::fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Deb  (ar outer archive, inner data.tar.*)
// ─────────────────────────────────────────────────────────────────────────────

fn unpack_deb(file: &Path, dest: &Path, strip_components: usize) -> Result<()> {
    let mut archive = ar::Archive::new(File::open(file)?);

    while let Some(entry) = archive.next_entry() {
        let entry = entry?;
        let name = String::from_utf8_lossy(entry.header().identifier()).to_string();
        if !name.starts_with("data.tar") {
            continue;
        }

        return match determine_unpack_method(&name)? {
            UnpackMethod::Tar => unpack_tar(entry, dest, strip_components),
            UnpackMethod::TarGz | UnpackMethod::Gz => {
                unpack_tar(flate2::read::GzDecoder::new(entry), dest, strip_components)
            }
            UnpackMethod::TarBz2 | UnpackMethod::Bz2 => {
                unpack_tar(bzip2::read::BzDecoder::new(entry), dest, strip_components)
            }
            UnpackMethod::TarXz | UnpackMethod::Xz => {
                unpack_tar(xz2::read::XzDecoder::new(entry), dest, strip_components)
            }
            UnpackMethod::TarZst | UnpackMethod::Zst => unpack_tar(
                zstd::stream::read::Decoder::new(entry)
                    .map_err(|e| Error::Other(format!("zstd init failed: {e}")))?,
                dest,
                strip_components,
            ),
            UnpackMethod::TarLz4 | UnpackMethod::Lz4 => unpack_tar(
                lz4_flex::frame::FrameDecoder::new(entry),
                dest,
                strip_components,
            ),
            _ => Err(Error::UnrecognizedPackFormat(name)),
        };
    }

    Err(Error::Other(format!(
        "no data.tar.* member found in {}",
        file.display()
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Single-file decompressors
// ─────────────────────────────────────────────────────────────────────────────

fn decompress_single<R: Read>(mut reader: R, src: &Path, dest: &Path, suffix: &str) -> Result<()> {
    let name = file_name_of(src);
    let lower = name.to_lowercase();
    let out_name = if lower.ends_with(suffix) {
        name[..name.len() - suffix.len()].to_owned()
    } else {
        name
    };

    let mut out = File::create(dest.join(out_name))?;
    io::copy(&mut reader, &mut out)?;
    Ok(())
}

fn file_name_of(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn auto_table_is_case_insensitive() {
        assert_eq!(
            determine_unpack_method("a.TAR.GZ").unwrap(),
            UnpackMethod::TarGz
        );
        assert_eq!(determine_unpack_method("b.Zip").unwrap(), UnpackMethod::Zip);
        assert_eq!(determine_unpack_method("c.deb").unwrap(), UnpackMethod::Deb);
        assert!(matches!(
            determine_unpack_method("noext"),
            Err(Error::UnrecognizedPackFormat(_))
        ));
    }

    #[test]
    fn tar_strip_components_removes_the_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("pkg.tar");
        std::fs::write(
            &tarball,
            build_tar(&[
                ("pkg-1.0/bin/tool", b"#!/bin/sh\n"),
                ("pkg-1.0/share/doc.txt", b"doc"),
            ]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        unpack(&tarball, &dest, 1, UnpackMethod::Tar).unwrap();

        assert!(dest.join("bin/tool").is_file());
        assert!(dest.join("share/doc.txt").is_file());
        assert!(!dest.join("pkg-1.0").exists());
    }

    #[test]
    fn tar_entries_shorter_than_strip_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("pkg.tar");
        std::fs::write(&tarball, build_tar(&[("onlyname", b"x")])).unwrap();

        let dest = dir.path().join("out");
        unpack(&tarball, &dest, 1, UnpackMethod::Tar).unwrap();
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn gz_emits_sibling_basename() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("blob.bin.gz");
        let mut enc =
            flate2::write::GzEncoder::new(File::create(&src).unwrap(), Default::default());
        enc.write_all(b"payload").unwrap();
        enc.finish().unwrap();

        let dest = dir.path().join("out");
        unpack(&src, &dest, 1, UnpackMethod::Gz).unwrap();
        assert_eq!(std::fs::read(dest.join("blob.bin")).unwrap(), b"payload");
    }

    #[test]
    fn raw_copies_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("firmware.img");
        std::fs::write(&src, b"raw-bytes").unwrap();

        let dest = dir.path().join("out");
        unpack(&src, &dest, 1, UnpackMethod::Raw).unwrap();
        assert_eq!(std::fs::read(dest.join("firmware.img")).unwrap(), b"raw-bytes");
    }

    #[cfg(unix)]
    #[test]
    fn raw_blob_becomes_symlink_with_fallback_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("image-20240301.img");
        std::fs::write(&src, b"img").unwrap();

        let dest = dir.path().join("out");
        unpack_or_symlink(&src, &dest, 1, UnpackMethod::Raw, Some("image.img")).unwrap();

        let link = dest.join("image.img");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(&link).unwrap(), b"img");
    }

    #[test]
    fn zip_strip_components() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("pkg.zip");
        {
            let mut w = zip::ZipWriter::new(File::create(&src).unwrap());
            let opts = zip::write::FileOptions::default();
            w.start_file("pkg-1.0/bin/tool", opts).unwrap();
            w.write_all(b"tool").unwrap();
            w.finish().unwrap();
        }

        let dest = dir.path().join("out");
        unpack(&src, &dest, 1, UnpackMethod::Zip).unwrap();
        assert_eq!(std::fs::read(dest.join("bin/tool")).unwrap(), b"tool");
    }
}

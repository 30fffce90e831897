// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: atom
//
//  User-facing package specifiers, four shapes:
//
//    name               latest version of the package ("cat/name" allowed)
//    name(expr,…)       latest version satisfying every range expression
//    name:bare          same as `name` with the prefix dropped
//    slug:SLUG          exact match on a manifest's declared slug
//
//  Pre-release versions are only eligible when the caller's policy says so.
// ─────────────────────────────────────────────────────────────────────────────

use semver::VersionReq;

use crate::error::{Error, Result};

use super::manifest::PackageManifest;
use super::version::parse_expr;
use super::ProvidesPackageManifests;

#[derive(Debug, Clone)]
pub enum Atom {
    Name {
        category: Option<String>,
        name: String,
    },
    Expr {
        category: Option<String>,
        name: String,
        exprs: Vec<VersionReq>,
        raw: String,
    },
    Slug(String),
}

fn split_category(name: &str) -> (Option<String>, String) {
    match name.split_once('/') {
        Some((cat, rest)) => (Some(cat.to_owned()), rest.to_owned()),
        None => (None, name.to_owned()),
    }
}

fn is_plain_name(s: &str) -> bool {
    !s.is_empty() && !s.contains([':', '(', ')'])
}

impl Atom {
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(slug) = s.strip_prefix("slug:") {
            if slug.is_empty() {
                return Err(Error::BadAtomSyntax(s.to_owned()));
            }
            return Ok(Atom::Slug(slug.to_owned()));
        }

        if let Some(name) = s.strip_prefix("name:") {
            if !is_plain_name(name) {
                return Err(Error::BadAtomSyntax(s.to_owned()));
            }
            let (category, name) = split_category(name);
            return Ok(Atom::Name { category, name });
        }

        // a '(' before any ':' with a matching trailing ')' is the expr shape
        let paren = s.find('(');
        let colon = s.find(':');
        if let Some(p) = paren {
            if colon.map(|c| p < c).unwrap_or(true) {
                let Some(body) = s[p..].strip_prefix('(').and_then(|t| t.strip_suffix(')'))
                else {
                    return Err(Error::BadAtomSyntax(s.to_owned()));
                };
                let name_part = &s[..p];
                if !is_plain_name(name_part) || body.is_empty() {
                    return Err(Error::BadAtomSyntax(s.to_owned()));
                }
                let exprs = body
                    .split(',')
                    .map(parse_expr)
                    .collect::<Result<Vec<_>>>()
                    .map_err(|_| Error::BadAtomSyntax(s.to_owned()))?;
                let (category, name) = split_category(name_part);
                return Ok(Atom::Expr {
                    category,
                    name,
                    exprs,
                    raw: s.to_owned(),
                });
            }
        }

        if is_plain_name(s) {
            let (category, name) = split_category(s);
            return Ok(Atom::Name { category, name });
        }

        Err(Error::BadAtomSyntax(s.to_owned()))
    }

    /// Resolve this atom against a package store under the given
    /// pre-release policy.
    pub fn match_in<S: ProvidesPackageManifests + ?Sized>(
        &self,
        store: &S,
        include_prerelease: bool,
    ) -> Result<PackageManifest> {
        match self {
            Atom::Name { category, name } => {
                let vers = store.iter_pkg_vers(name, category.as_deref())?;
                if vers.is_empty() {
                    return Err(Error::NoSuchPackage(self.to_string()));
                }
                pick_latest(vers, name, &self.to_string(), include_prerelease)
            }

            Atom::Expr {
                category,
                name,
                exprs,
                raw,
            } => {
                let vers = store.iter_pkg_vers(name, category.as_deref())?;
                if vers.is_empty() {
                    return Err(Error::NoSuchPackage(raw.clone()));
                }
                let matching: Vec<PackageManifest> = vers
                    .into_iter()
                    .filter(|pm| exprs.iter().all(|req| req.matches(pm.semver())))
                    .collect();
                pick_latest(matching, name, raw, include_prerelease)
            }

            Atom::Slug(slug) => {
                let pm = store
                    .get_pkg_by_slug(slug)?
                    .ok_or_else(|| Error::NoSuchPackage(self.to_string()))?;
                if pm.is_prerelease() && !include_prerelease {
                    return Err(Error::NoSatisfyingVersion {
                        atom: self.to_string(),
                        name: pm.name.clone(),
                    });
                }
                Ok(pm)
            }
        }
    }
}

fn pick_latest(
    candidates: Vec<PackageManifest>,
    name: &str,
    atom: &str,
    include_prerelease: bool,
) -> Result<PackageManifest> {
    candidates
        .into_iter()
        .filter(|pm| include_prerelease || !pm.is_prerelease())
        .max_by(|a, b| a.semver().cmp(b.semver()))
        .ok_or_else(|| Error::NoSatisfyingVersion {
            atom: atom.to_owned(),
            name: name.to_owned(),
        })
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Name {
                category: Some(c),
                name,
            } => write!(f, "{c}/{name}"),
            Atom::Name {
                category: None,
                name,
            } => write!(f, "{name}"),
            Atom::Expr { raw, .. } => write!(f, "{raw}"),
            Atom::Slug(slug) => write!(f, "slug:{slug}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::testing::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_shapes() {
        assert!(matches!(
            Atom::parse("gcc").unwrap(),
            Atom::Name { category: None, .. }
        ));
        assert!(matches!(
            Atom::parse("toolchain/gcc").unwrap(),
            Atom::Name {
                category: Some(_),
                ..
            }
        ));
        assert!(matches!(Atom::parse("name:gcc").unwrap(), Atom::Name { .. }));
        assert!(matches!(
            Atom::parse("slug:plct-riscv64").unwrap(),
            Atom::Slug(_)
        ));
        match Atom::parse("gcc(>=12,<13.2)").unwrap() {
            Atom::Expr { name, exprs, .. } => {
                assert_eq!(name, "gcc");
                assert_eq!(exprs.len(), 2);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "gcc(", "gcc)", "gcc()", "a:b:c", "slug:", "gcc(>=12"] {
            assert!(
                matches!(Atom::parse(bad), Err(Error::BadAtomSyntax(_))),
                "should reject {bad:?}"
            );
        }
    }

    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.add("toolchain", "gcc", "12.1.0", None);
        s.add("toolchain", "gcc", "13.1.0", Some("plct-riscv64"));
        s.add("toolchain", "gcc", "13.2.0-alpha.1", None);
        s
    }

    #[test]
    fn name_atom_picks_latest_stable() {
        let pm = Atom::parse("gcc").unwrap().match_in(&store(), false).unwrap();
        assert_eq!(pm.ver, "13.1.0");
    }

    #[test]
    fn name_atom_picks_latest_prerelease_when_allowed() {
        let pm = Atom::parse("gcc").unwrap().match_in(&store(), true).unwrap();
        assert_eq!(pm.ver, "13.2.0-alpha.1");
    }

    #[test]
    fn expr_atom_honors_every_expression() {
        for allow_pre in [false, true] {
            let pm = Atom::parse("gcc(>=12,<13.2)")
                .unwrap()
                .match_in(&store(), allow_pre)
                .unwrap();
            assert_eq!(pm.ver, "13.1.0", "allow_pre={allow_pre}");
        }
    }

    #[test]
    fn slug_atom_matches_exactly() {
        let pm = Atom::parse("slug:plct-riscv64")
            .unwrap()
            .match_in(&store(), false)
            .unwrap();
        assert_eq!(pm.ver, "13.1.0");
    }

    #[test]
    fn slug_hit_on_prerelease_is_suppressed() {
        let mut s = MemoryStore::new();
        s.add("toolchain", "llvm", "18.0.0-rc1", Some("exp-llvm"));
        let atom = Atom::parse("slug:exp-llvm").unwrap();
        assert!(matches!(
            atom.match_in(&s, false),
            Err(Error::NoSatisfyingVersion { .. })
        ));
        assert_eq!(atom.match_in(&s, true).unwrap().ver, "18.0.0-rc1");
    }

    #[test]
    fn unknown_package_is_distinguished_from_no_version() {
        let s = store();
        assert!(matches!(
            Atom::parse("clang").unwrap().match_in(&s, false),
            Err(Error::NoSuchPackage(_))
        ));
        assert!(matches!(
            Atom::parse("gcc(>=99)").unwrap().match_in(&s, false),
            Err(Error::NoSatisfyingVersion { .. })
        ));
    }

    #[test]
    fn category_qualification_filters() {
        let mut s = store();
        s.add("emulator", "gcc", "99.0.0", None); // same name, other category
        let pm = Atom::parse("toolchain/gcc")
            .unwrap()
            .match_in(&s, false)
            .unwrap();
        assert_eq!(pm.ver, "13.1.0");
    }
}

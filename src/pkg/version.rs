// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: pkg :: version
//
//  Semantic-version policy helpers. A pre-release tag whose sole content is
//  "ruyi.<digits>" is a datestamp, not a pre-release: 1.2.0-ruyi.20240301
//  counts as a stable release.
// ─────────────────────────────────────────────────────────────────────────────

use semver::{Version, VersionReq};

use crate::error::{Error, Result};

/// Whether this version is a pre-release under the datestamp rule.
pub fn is_prerelease(v: &Version) -> bool {
    if v.pre.is_empty() {
        return false;
    }
    !is_datestamp(v.pre.as_str())
}

fn is_datestamp(pre: &str) -> bool {
    match pre.strip_prefix("ruyi.") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Parse one constraint expression of an atom (`==`, `>=`, `<=`, `>`, `<`,
/// `~`, `^`, `*`) into a `VersionReq`. The `==` spelling maps onto
/// VersionReq's `=`.
pub fn parse_expr(expr: &str) -> Result<VersionReq> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(Error::BadAtomSyntax(expr.to_owned()));
    }

    let normalized = match expr.strip_prefix("==") {
        Some(rest) => format!("={rest}"),
        None => expr.to_owned(),
    };

    normalized
        .parse()
        .map_err(|_| Error::BadAtomSyntax(expr.to_owned()))
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn plain_releases_are_not_prereleases() {
        assert!(!is_prerelease(&v("13.1.0")));
    }

    #[test]
    fn alpha_tags_are_prereleases() {
        assert!(is_prerelease(&v("13.2.0-alpha.1")));
    }

    #[test]
    fn ruyi_datestamps_are_stable() {
        assert!(!is_prerelease(&v("1.2.0-ruyi.20240301")));
    }

    #[test]
    fn ruyi_datestamp_with_extra_parts_is_still_prerelease() {
        assert!(is_prerelease(&v("1.2.0-ruyi.20240301.rc1")));
        assert!(is_prerelease(&v("1.2.0-ruyi.x")));
    }

    #[test]
    fn expr_spellings_parse() {
        for e in ["==1.2.3", ">=12", "<13.2", "~1.2", "^0.3", "*"] {
            parse_expr(e).unwrap();
        }
        assert!(parse_expr("").is_err());
        assert!(parse_expr("!!1").is_err());
    }

    #[test]
    fn double_equals_means_exact() {
        let req = parse_expr("==1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));
    }

    #[test]
    fn ranges_do_not_admit_prereleases() {
        let req = parse_expr("<13.2").unwrap();
        assert!(req.matches(&v("13.1.0")));
        assert!(!req.matches(&v("13.2.0-alpha.1")));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: config :: schema
//
//  Shape validation for the user config.toml: every section, key and value
//  type is checked up front so a typo fails with the exact offending key
//  instead of a generic deserialization message.
// ─────────────────────────────────────────────────────────────────────────────

use toml::Value;

use crate::error::{Error, Result};

pub const SECTION_INSTALLATION: &str = "installation";
pub const SECTION_PACKAGES: &str = "packages";
pub const SECTION_REPO: &str = "repo";
pub const SECTION_TELEMETRY: &str = "telemetry";

/// Expected value shape of a config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Str,
    Datetime,
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Bool => "a boolean",
            ValueKind::Str => "a string",
            ValueKind::Datetime => "an RFC 3339 datetime",
        }
    }

    fn matches(self, v: &Value) -> bool {
        match self {
            ValueKind::Bool => v.is_bool(),
            ValueKind::Str => v.is_str(),
            ValueKind::Datetime => v.is_datetime(),
        }
    }
}

/// Look up the expected type of `section.key`.
pub fn expected_kind(section: &str, key: &str) -> Result<ValueKind> {
    let kind = match (section, key) {
        (SECTION_INSTALLATION, "externally_managed") => ValueKind::Bool,
        (SECTION_PACKAGES, "prereleases") => ValueKind::Bool,
        (SECTION_REPO, "remote" | "branch" | "local") => ValueKind::Str,
        (SECTION_TELEMETRY, "mode" | "pm_telemetry_url") => ValueKind::Str,
        (SECTION_TELEMETRY, "upload_consent") => ValueKind::Datetime,
        (
            SECTION_INSTALLATION | SECTION_PACKAGES | SECTION_REPO | SECTION_TELEMETRY,
            other,
        ) => {
            return Err(Error::InvalidConfigKey(format!("{section}.{other}")));
        }
        (other, _) => return Err(Error::InvalidConfigSection(other.to_owned())),
    };
    Ok(kind)
}

/// Validate a parsed config.toml document against the schema.
pub fn validate_config_document(doc: &Value) -> Result<()> {
    let table = doc
        .as_table()
        .ok_or_else(|| Error::InvalidConfigSection("(root)".to_owned()))?;

    for (section, body) in table {
        let section_table = body
            .as_table()
            .ok_or_else(|| Error::InvalidConfigSection(section.clone()))?;

        for (key, value) in section_table {
            let kind = expected_kind(section, key)?;
            if !kind.matches(value) {
                return Err(Error::InvalidConfigValue {
                    key: format!("{section}.{key}"),
                    value: value.to_string(),
                    expected: kind.describe(),
                });
            }
            if section == SECTION_TELEMETRY && key == "mode" {
                let mode = value.as_str().unwrap_or_default();
                if !matches!(mode, "on" | "local" | "off") {
                    return Err(Error::InvalidConfigValue {
                        key: "telemetry.mode".to_owned(),
                        value: mode.to_owned(),
                        expected: "one of: on, local, off",
                    });
                }
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        s.parse().unwrap()
    }

    #[test]
    fn accepts_known_keys() {
        let doc = parse(
            r#"
            [packages]
            prereleases = true
            [telemetry]
            mode = "off"
            upload_consent = 2024-03-01T00:00:00Z
            "#,
        );
        validate_config_document(&doc).unwrap();
    }

    #[test]
    fn rejects_unknown_section() {
        let doc = parse("[nonsense]\nfoo = 1\n");
        assert!(matches!(
            validate_config_document(&doc),
            Err(Error::InvalidConfigSection(s)) if s == "nonsense"
        ));
    }

    #[test]
    fn rejects_unknown_key() {
        let doc = parse("[repo]\nmirror = \"x\"\n");
        assert!(matches!(
            validate_config_document(&doc),
            Err(Error::InvalidConfigKey(k)) if k == "repo.mirror"
        ));
    }

    #[test]
    fn rejects_bad_value_type() {
        let doc = parse("[packages]\nprereleases = \"yes\"\n");
        assert!(matches!(
            validate_config_document(&doc),
            Err(Error::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn rejects_bad_telemetry_mode() {
        let doc = parse("[telemetry]\nmode = \"sometimes\"\n");
        assert!(matches!(
            validate_config_document(&doc),
            Err(Error::InvalidConfigValue { .. })
        ));
    }
}

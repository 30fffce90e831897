// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: config
//
//  The repo-level config.toml (not user-editable): mirror declarations and
//  optional telemetry endpoints under keyed sections.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub mirrors: Vec<MirrorDecl>,
    #[serde(default)]
    pub telemetry: BTreeMap<String, TelemetryEndpointDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorDecl {
    pub id: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryEndpointDecl {
    pub url: String,
}

impl RepoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text).map_err(|e| Error::MalformedConfigFile {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// All mirror base URLs, in mirror-config order.
    pub fn mirror_bases(&self) -> impl Iterator<Item = &str> {
        self.mirrors
            .iter()
            .flat_map(|m| m.urls.iter().map(String::as_str))
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
    fn parses_mirrors_in_order() {
        let cfg: RepoConfig = toml::from_str(
            r#"
            [[mirrors]]
            id = "main"
            urls = ["https://a.example/dist/", "https://b.example/dist/"]

            [[mirrors]]
            id = "backup"
            urls = ["https://c.example/dist/"]

            [telemetry.pm]
            url = "https://t.example/pm"
            "#,
        )
        .unwrap();

        let bases: Vec<&str> = cfg.mirror_bases().collect();
        assert_eq!(
            bases,
            vec![
                "https://a.example/dist/",
                "https://b.example/dist/",
                "https://c.example/dist/"
            ]
        );
        assert_eq!(cfg.telemetry["pm"].url, "https://t.example/pm");
    }
}

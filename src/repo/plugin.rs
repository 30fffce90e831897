// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: plugin
//
//  Contract for the device-provisioning plugin host. The metadata repo can
//  carry scripted plugins under `plugins/<plugin-id>/mod.star`; the
//  evaluation substrate lives outside this crate and is plugged in through
//  the `PluginHost` trait. The core only defines the value surface and
//  validates everything a plugin returns before use:
//
//    flash_fn    → integer exit code
//    pretend_fn  → list of strings
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Values crossing the plugin boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<PluginValue>),
    Map(BTreeMap<String, PluginValue>),
    /// An opaque callable the host can invoke by key.
    Function(String),
}

/// The evaluation substrate: any deterministic, side-effect-restricted
/// evaluator satisfying this trait can host plugins.
pub trait PluginHost {
    /// Look up a named value exported by a plugin.
    fn get_from_plugin(&self, plugin_id: &str, key: &str) -> Result<Option<PluginValue>>;

    /// Invoke a function value with positional arguments.
    fn eval_plugin_fn(
        &self,
        plugin_id: &str,
        fn_key: &str,
        args: &[PluginValue],
    ) -> Result<PluginValue>;
}

/// Default host used when no evaluator is wired in: lookups come back
/// empty and invocation is an error.
pub struct NullPluginHost;

impl PluginHost for NullPluginHost {
    fn get_from_plugin(&self, _plugin_id: &str, _key: &str) -> Result<Option<PluginValue>> {
        Ok(None)
    }

    fn eval_plugin_fn(
        &self,
        plugin_id: &str,
        fn_key: &str,
        _args: &[PluginValue],
    ) -> Result<PluginValue> {
        Err(Error::Other(format!(
            "no plugin evaluator is available to run {plugin_id}:{fn_key}"
        )))
    }
}

/// Plugin ids present in a repo working tree (`plugins/<id>/mod.star`).
pub fn iter_plugin_ids(repo_root: &Path) -> Result<Vec<String>> {
    let plugins_root = repo_root.join("plugins");
    let entries = match std::fs::read_dir(&plugins_root) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut ids = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.join("mod.star").is_file() {
            if let Some(id) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(id.to_owned());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Return-value validation
// ─────────────────────────────────────────────────────────────────────────────

/// A `flash_fn` must return an integer exit code.
pub fn expect_exit_code(v: &PluginValue) -> Result<i32> {
    match v {
        PluginValue::Int(n) if i32::try_from(*n).is_ok() => Ok(*n as i32),
        other => Err(Error::Other(format!(
            "plugin returned {other:?} where an integer exit code was expected"
        ))),
    }
}

/// A `pretend_fn` must return a list of strings.
pub fn expect_string_list(v: &PluginValue) -> Result<Vec<String>> {
    let PluginValue::List(items) = v else {
        return Err(Error::Other(format!(
            "plugin returned {v:?} where a list of strings was expected"
        )));
    };
    items
        .iter()
        .map(|item| match item {
            PluginValue::Str(s) => Ok(s.clone()),
            other => Err(Error::Other(format!(
                "plugin returned non-string list element {other:?}"
            ))),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_code_validation() {
        assert_eq!(expect_exit_code(&PluginValue::Int(0)).unwrap(), 0);
        assert!(expect_exit_code(&PluginValue::Str("0".into())).is_err());
        assert!(expect_exit_code(&PluginValue::Int(i64::MAX)).is_err());
    }

    #[test]
    fn string_list_validation() {
        let ok = PluginValue::List(vec![
            PluginValue::Str("dd if=a of=b".into()),
            PluginValue::Str("sync".into()),
        ]);
        assert_eq!(expect_string_list(&ok).unwrap().len(), 2);

        let bad = PluginValue::List(vec![PluginValue::Int(1)]);
        assert!(expect_string_list(&bad).is_err());
        assert!(expect_string_list(&PluginValue::Str("x".into())).is_err());
    }

    #[test]
    fn plugin_discovery_requires_entrypoint() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("plugins/img-flasher")).unwrap();
        std::fs::write(root.join("plugins/img-flasher/mod.star"), "").unwrap();
        std::fs::create_dir_all(root.join("plugins/broken")).unwrap();

        assert_eq!(iter_plugin_ids(root).unwrap(), vec!["img-flasher".to_owned()]);
    }

    #[test]
    fn null_host_refuses_invocation() {
        let host = NullPluginHost;
        assert!(host.get_from_plugin("x", "y").unwrap().is_none());
        assert!(host.eval_plugin_fn("x", "flash_fn", &[]).is_err());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: messages
//
//  Localized message store parsed from `messages/<lang>/<msgid>.txt` in the
//  metadata repo. Templates are simple `{param}` substitutions. Language
//  resolution: exact code, then same region, then same language, then the
//  en_US/en and zh_CN/zh fallback chains, then the lexicographically first
//  available code.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Default)]
pub struct MessageStore {
    /// lang code → (msgid → template)
    by_lang: BTreeMap<String, BTreeMap<String, String>>,
}

impl MessageStore {
    pub fn load(messages_root: &Path) -> Result<Self> {
        let mut by_lang = BTreeMap::new();

        let entries = match std::fs::read_dir(messages_root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        for lang_dir in entries.flatten() {
            if !lang_dir.path().is_dir() {
                continue;
            }
            let lang = lang_dir.file_name().to_string_lossy().to_string();
            let mut msgs = BTreeMap::new();

            for file in std::fs::read_dir(lang_dir.path())?.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let Some(msgid) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                msgs.insert(msgid.to_owned(), std::fs::read_to_string(&path)?);
            }

            by_lang.insert(lang, msgs);
        }

        Ok(Self { by_lang })
    }

    pub fn is_empty(&self) -> bool {
        self.by_lang.is_empty()
    }

    /// Render a message, or None when the id is unknown in every language.
    pub fn render(
        &self,
        msgid: &str,
        lang: &str,
        params: &BTreeMap<String, String>,
    ) -> Option<String> {
        let avail: Vec<&str> = self
            .by_lang
            .iter()
            .filter(|(_, msgs)| msgs.contains_key(msgid))
            .map(|(l, _)| l.as_str())
            .collect();
        let resolved = match_lang_code(lang, &avail)?;
        let template = self.by_lang.get(resolved)?.get(msgid)?;
        Some(substitute(template, params))
    }
}

/// Replace `{param}` placeholders; unknown placeholders are left alone.
fn substitute(template: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = template.to_owned();
    for (k, v) in params {
        out = out.replace(&format!("{{{k}}}"), v);
    }
    out
}

fn split_lang(code: &str) -> (&str, Option<&str>) {
    match code.split_once('_') {
        Some((lang, region)) => (lang, Some(region)),
        None => (code, None),
    }
}

/// Pick the best available language code for a request.
pub fn match_lang_code<'a>(req: &str, avail: &[&'a str]) -> Option<&'a str> {
    if avail.is_empty() {
        return None;
    }
    if avail.len() == 1 {
        return Some(avail[0]);
    }
    if let Some(exact) = avail.iter().copied().find(|a| *a == req) {
        return Some(exact);
    }

    let (req_lang, req_region) = split_lang(req);

    if let Some(region) = req_region {
        if let Some(hit) = avail
            .iter()
            .copied()
            .find(|a| split_lang(a).1 == Some(region))
        {
            return Some(hit);
        }
    }
    if let Some(hit) = avail.iter().copied().find(|a| split_lang(a).0 == req_lang) {
        return Some(hit);
    }

    for (lang, preferred_region) in [("en", "US"), ("zh", "CN")] {
        let candidates: Vec<&'a str> = avail
            .iter()
            .copied()
            .filter(|a| split_lang(a).0 == lang)
            .collect();
        if candidates.is_empty() {
            continue;
        }
        if let Some(hit) = candidates
            .iter()
            .copied()
            .find(|a| split_lang(a).1 == Some(preferred_region))
        {
            return Some(hit);
        }
        if let Some(hit) = candidates
            .iter()
            .copied()
            .find(|a| split_lang(a).1.is_none())
        {
            return Some(hit);
        }
        return candidates.into_iter().min();
    }

    avail.iter().copied().min()
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lang_fallback_chain() {
        let avail = ["en_US", "zh_CN", "de_DE"];
        assert_eq!(match_lang_code("zh_CN", &avail), Some("zh_CN"));
        assert_eq!(match_lang_code("zh_TW", &avail), Some("zh_CN"));
        assert_eq!(match_lang_code("fr_FR", &avail), Some("en_US"));
        assert_eq!(match_lang_code("de", &avail), Some("de_DE"));
    }

    #[test]
    fn single_available_lang_always_wins() {
        assert_eq!(match_lang_code("ja_JP", &["zh_CN"]), Some("zh_CN"));
    }

    #[test]
    fn renders_with_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let en = dir.path().join("en_US");
        std::fs::create_dir_all(&en).unwrap();
        std::fs::write(en.join("eula-note.txt"), "Please accept the EULA for {name}.\n")
            .unwrap();

        let store = MessageStore::load(dir.path()).unwrap();
        let mut params = BTreeMap::new();
        params.insert("name".to_owned(), "xuantie-gcc".to_owned());

        assert_eq!(
            store.render("eula-note", "en_US", &params).unwrap(),
            "Please accept the EULA for xuantie-gcc.\n"
        );
        assert!(store.render("nonexistent", "en_US", &params).is_none());
    }

    #[test]
    fn missing_messages_dir_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::load(&dir.path().join("nope")).unwrap();
        assert!(store.is_empty());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: repo :: entity
//
//  Typed, schema-validated hardware taxonomy. For every schema in
//  `entities/_schemas/<type>.jsonschema`, all `entities/<type>/<id>.toml`
//  files are loaded, validated, and cross-referenced: the `related` refs
//  of each entity feed a forward index, and a reverse index is derived
//  from them.
//
//  A schema may declare `unique_among_type_during_traversal = true` at its
//  top level; during one traversal only the first reached entity of such a
//  type is followed, so "device → cpu(uniq) → uarch" does not enumerate
//  unrelated uarches that happen to share the cpu.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Entity {
    etype: String,
    id: String,
    data: serde_json::Value,
    related_refs: Vec<String>,
}

impl Entity {
    pub fn entity_type(&self) -> &str {
        &self.etype
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// "type:id"
    pub fn ref_str(&self) -> String {
        format!("{}:{}", self.etype, self.id)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.data
            .get(&self.etype)
            .and_then(|d| d.get("display_name"))
            .and_then(|v| v.as_str())
    }

    /// The type-keyed payload table of the entity.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.get(&self.etype)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn related_refs(&self) -> &[String] {
        &self.related_refs
    }
}

/// Split a "type:id" ref, failing on malformed input.
pub fn parse_ref(r: &str) -> Result<(&str, &str)> {
    r.split_once(':')
        .filter(|(t, i)| !t.is_empty() && !i.is_empty())
        .ok_or_else(|| Error::Other(format!("invalid entity reference: '{r}'")))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseOptions<'a> {
    pub forward: bool,
    pub reverse: bool,
    /// Only yield entities of these types; recursion is not affected.
    pub types: Option<&'a BTreeSet<String>>,
    pub transitive: bool,
}

#[derive(Debug, Default)]
pub struct EntityStore {
    /// type → id → entity
    entities: BTreeMap<String, BTreeMap<String, Entity>>,
    /// types whose schema declares traversal uniqueness
    unique_types: BTreeSet<String>,
    /// ref → refs it points at
    forward: BTreeMap<String, Vec<String>>,
    /// ref → refs pointing at it
    reverse: BTreeMap<String, Vec<String>>,
}

impl EntityStore {
    pub fn load(entities_root: &Path) -> Result<Self> {
        let mut store = Self::default();

        let schemas_root = entities_root.join("_schemas");
        let schema_entries = match std::fs::read_dir(&schemas_root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e.into()),
        };

        for entry in schema_entries.flatten() {
            let path = entry.path();
            let Some(fname) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(etype) = fname.strip_suffix(".jsonschema") else {
                continue;
            };

            let schema_text = std::fs::read_to_string(&path)?;
            let schema: serde_json::Value =
                serde_json::from_str(&schema_text).map_err(|e| Error::EntityValidation {
                    etype: etype.to_owned(),
                    id: "_schema".to_owned(),
                    reason: format!("bad schema: {e}"),
                })?;

            if schema
                .get("unique_among_type_during_traversal")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                store.unique_types.insert(etype.to_owned());
            }

            let compiled = jsonschema::JSONSchema::compile(&schema).map_err(|e| {
                Error::EntityValidation {
                    etype: etype.to_owned(),
                    id: "_schema".to_owned(),
                    reason: format!("schema does not compile: {e}"),
                }
            })?;

            store.load_entities_of_type(entities_root, etype, &compiled)?;
        }

        store.build_indices();
        Ok(store)
    }

    fn load_entities_of_type(
        &mut self,
        entities_root: &Path,
        etype: &str,
        schema: &jsonschema::JSONSchema,
    ) -> Result<()> {
        let mut by_id = BTreeMap::new();

        let type_dir = entities_root.join(etype);
        let entries = match std::fs::read_dir(&type_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entities.insert(etype.to_owned(), by_id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
            else {
                continue;
            };

            let text = std::fs::read_to_string(&path)?;
            let toml_value: toml::Value =
                text.parse().map_err(|e: toml::de::Error| Error::EntityValidation {
                    etype: etype.to_owned(),
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
            let json_value =
                serde_json::to_value(&toml_value).map_err(|e| Error::EntityValidation {
                    etype: etype.to_owned(),
                    id: id.clone(),
                    reason: e.to_string(),
                })?;

            if let Err(errors) = schema.validate(&json_value) {
                let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
                return Err(Error::EntityValidation {
                    etype: etype.to_owned(),
                    id,
                    reason: reasons.join("; "),
                });
            }

            let related_refs = json_value
                .get("related")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_owned))
                        .collect()
                })
                .unwrap_or_default();

            by_id.insert(
                id.clone(),
                Entity {
                    etype: etype.to_owned(),
                    id,
                    data: json_value,
                    related_refs,
                },
            );
        }

        self.entities.insert(etype.to_owned(), by_id);
        Ok(())
    }

    fn build_indices(&mut self) {
        for by_id in self.entities.values() {
            for entity in by_id.values() {
                let src = entity.ref_str();
                for dst in &entity.related_refs {
                    self.forward
                        .entry(src.clone())
                        .or_default()
                        .push(dst.clone());
                    self.reverse
                        .entry(dst.clone())
                        .or_default()
                        .push(src.clone());
                }
            }
        }
    }

    // ── lookups ───────────────────────────────────────────────────────────

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn get(&self, etype: &str, id: &str) -> Option<&Entity> {
        self.entities.get(etype)?.get(id)
    }

    pub fn get_by_ref(&self, r: &str) -> Result<Option<&Entity>> {
        let (etype, id) = parse_ref(r)?;
        Ok(self.get(etype, id))
    }

    pub fn iter(&self, etype: Option<&str>) -> Vec<&Entity> {
        match etype {
            Some(t) => self
                .entities
                .get(t)
                .map(|m| m.values().collect())
                .unwrap_or_default(),
            None => self
                .entities
                .values()
                .flat_map(|m| m.values())
                .collect(),
        }
    }

    // ── traversal ─────────────────────────────────────────────────────────

    fn neighbors(&self, r: &str, opts: &TraverseOptions<'_>) -> Vec<&str> {
        let mut out = Vec::new();
        if opts.forward {
            if let Some(refs) = self.forward.get(r) {
                out.extend(refs.iter().map(String::as_str));
            }
        }
        if opts.reverse {
            if let Some(refs) = self.reverse.get(r) {
                out.extend(refs.iter().map(String::as_str));
            }
        }
        out
    }

    /// Yield entities related to `start`, honoring direction, type filter,
    /// transitivity, and per-type traversal uniqueness. Cycles are broken
    /// with a visited set on (type, id).
    pub fn traverse(&self, start: &Entity, opts: TraverseOptions<'_>) -> Vec<&Entity> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut uniq_seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        visited.insert(start.ref_str());
        self.traverse_inner(&start.ref_str(), &opts, &mut visited, &mut uniq_seen, &mut out);
        out
    }

    fn traverse_inner<'s>(
        &'s self,
        current: &str,
        opts: &TraverseOptions<'_>,
        visited: &mut HashSet<String>,
        uniq_seen: &mut HashSet<&'s str>,
        out: &mut Vec<&'s Entity>,
    ) {
        for nref in self.neighbors(current, opts) {
            if visited.contains(nref) {
                continue;
            }
            let Ok(Some(entity)) = self.get_by_ref(nref) else {
                continue;
            };
            visited.insert(entity.ref_str());

            if self.unique_types.contains(entity.entity_type()) {
                if uniq_seen.contains(entity.entity_type()) {
                    continue;
                }
                uniq_seen.insert(entity.entity_type());
            }

            let type_ok = opts
                .types
                .map(|t| t.contains(entity.entity_type()))
                .unwrap_or(true);
            if type_ok {
                out.push(entity);
            }

            if opts.transitive {
                self.traverse_inner(&entity.ref_str(), opts, visited, uniq_seen, out);
            }
        }
    }

    /// Reachability between two refs. `unidirectional` restricts the walk
    /// to forward edges.
    pub fn is_entity_related_to(
        &self,
        src_ref: &str,
        dst_ref: &str,
        transitive: bool,
        unidirectional: bool,
    ) -> Result<bool> {
        let Some(src) = self.get_by_ref(src_ref)? else {
            return Ok(false);
        };
        // validate the dst ref shape even if absent from the store
        let _ = parse_ref(dst_ref)?;

        let opts = TraverseOptions {
            forward: true,
            reverse: !unidirectional,
            types: None,
            transitive,
        };
        Ok(self
            .traverse(src, opts)
            .iter()
            .any(|e| e.ref_str() == dst_ref))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PERMISSIVE_SCHEMA: &str = r#"{ "type": "object" }"#;
    const UNIQ_SCHEMA: &str =
        r#"{ "type": "object", "unique_among_type_during_traversal": true }"#;

    fn write_entity(root: &Path, etype: &str, id: &str, body: &str) {
        let dir = root.join(etype);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{id}.toml")), body).unwrap();
    }

    fn write_schema(root: &Path, etype: &str, schema: &str) {
        let dir = root.join("_schemas");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{etype}.jsonschema")), schema).unwrap();
    }

    /// device:d1 → cpu:c1 (uniq) → uarch:u1; cpu:c1 ← device:d2 (a sibling)
    fn sample_store() -> (tempfile::TempDir, EntityStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write_schema(root, "device", PERMISSIVE_SCHEMA);
        write_schema(root, "cpu", UNIQ_SCHEMA);
        write_schema(root, "uarch", PERMISSIVE_SCHEMA);

        write_entity(
            root,
            "device",
            "d1",
            "related = [\"cpu:c1\"]\n[device]\ndisplay_name = \"Board One\"\n",
        );
        write_entity(root, "device", "d2", "related = [\"cpu:c1\"]\n[device]\n");
        write_entity(root, "cpu", "c1", "related = [\"uarch:u1\"]\n[cpu]\n");
        write_entity(root, "uarch", "u1", "[uarch]\n");

        let store = EntityStore::load(root).unwrap();
        (dir, store)
    }

    #[test]
    fn loads_and_indexes() {
        let (_dir, store) = sample_store();
        assert_eq!(store.iter(None).len(), 4);
        assert_eq!(store.iter(Some("device")).len(), 2);

        let d1 = store.get("device", "d1").unwrap();
        assert_eq!(d1.display_name(), Some("Board One"));
        assert_eq!(d1.related_refs(), &["cpu:c1".to_owned()]);
    }

    #[test]
    fn schema_violation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_schema(
            root,
            "device",
            r#"{ "type": "object", "required": ["device"] }"#,
        );
        write_entity(root, "device", "bad", "related = []\n");

        assert!(matches!(
            EntityStore::load(root),
            Err(Error::EntityValidation { .. })
        ));
    }

    #[test]
    fn forward_traversal_is_direct_by_default() {
        let (_dir, store) = sample_store();
        let d1 = store.get("device", "d1").unwrap();
        let related = store.traverse(
            d1,
            TraverseOptions {
                forward: true,
                ..Default::default()
            },
        );
        let refs: Vec<String> = related.iter().map(|e| e.ref_str()).collect();
        assert_eq!(refs, vec!["cpu:c1".to_owned()]);
    }

    #[test]
    fn transitive_traversal_reaches_the_uarch() {
        let (_dir, store) = sample_store();
        let d1 = store.get("device", "d1").unwrap();
        let related = store.traverse(
            d1,
            TraverseOptions {
                forward: true,
                transitive: true,
                ..Default::default()
            },
        );
        let refs: Vec<String> = related.iter().map(|e| e.ref_str()).collect();
        assert_eq!(refs, vec!["cpu:c1".to_owned(), "uarch:u1".to_owned()]);
    }

    #[test]
    fn uniq_type_stops_sibling_enumeration() {
        let (_dir, store) = sample_store();
        let d1 = store.get("device", "d1").unwrap();
        // both directions + transitive would walk d1 → c1 → d2 without the
        // uniqueness rule; c1 is uniq so the walk must not fan back out
        // through another cpu
        let related = store.traverse(
            d1,
            TraverseOptions {
                forward: true,
                reverse: true,
                transitive: true,
                ..Default::default()
            },
        );
        let refs: Vec<String> = related.iter().map(|e| e.ref_str()).collect();
        // c1 itself is reached once; its neighbors u1 and d2 follow
        assert!(refs.contains(&"cpu:c1".to_owned()));
        assert_eq!(
            refs.iter().filter(|r| r.starts_with("cpu:")).count(),
            1,
            "uniq cpu must be counted once"
        );
    }

    #[test]
    fn relatedness_queries() {
        let (_dir, store) = sample_store();
        assert!(store
            .is_entity_related_to("device:d1", "uarch:u1", true, true)
            .unwrap());
        assert!(!store
            .is_entity_related_to("device:d1", "uarch:u1", false, true)
            .unwrap());
        // d1 and d2 relate only through the reverse edge of c1
        assert!(store
            .is_entity_related_to("device:d1", "device:d2", true, false)
            .unwrap());
        assert!(!store
            .is_entity_related_to("device:d1", "device:d2", true, true)
            .unwrap());
    }

    #[test]
    fn bad_ref_shape_is_an_error() {
        let (_dir, store) = sample_store();
        assert!(store.get_by_ref("no-colon-here").is_err());
    }
}

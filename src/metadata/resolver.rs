//! Cascading metadata resolution.
//!
//! A repository's metadata is a mapping in which some values are
//! *queryable*: mappings whose keys are drawn only from `tag`, `type`
//! (or its synonym `group`) and `all`. Reading a queryable value resolves
//! it against the current tag:
//!
//! 1. `tag[<tag>]`
//! 2. `tag[<aliased tag>]` (complex aliases only)
//! 3. `type[<group>]`, where the group is `tags[<tag>]` or `normal`
//! 4. `type[<aliased group>]` (complex aliases only)
//! 5. `all`
//!
//! When every level present is a list the result is the de-duplicated
//! union `all, parent group, group, parent tag, tag` in first-seen order.
//! When every level is a mapping the same five levels are deep-merged in
//! that order. Anything else takes the first non-nil value in the
//! precedence order above.
//!
//! # Example
//!
//! ```
//! use dockwright::metadata::{Metadata, Value};
//!
//! let data: serde_yaml::Value = serde_yaml::from_str(r#"
//! tags: { latest: stable }
//! env:
//!   tag: { latest: ["A=1"] }
//!   type: { stable: ["B=2"] }
//!   all: ["C=3"]
//! "#).unwrap();
//!
//! let meta = Metadata::root(Value::from(data), "latest");
//! assert_eq!(meta.get("env").to_plain_string(), "C=3 B=2 A=1");
//! ```

use crate::config::{deep_merge, Config};
use crate::error::{Error, Result};
use crate::metadata::value::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Keys that make a mapping queryable.
pub const QUERY_KEYS: &[&str] = &["tag", "type", "group", "all"];

/// Group of a tag that has no entry in the `tags` table.
pub const DEFAULT_GROUP: &str = "normal";

/// Whether `value` is a queryable node.
pub fn is_queryable(value: &Value) -> bool {
    match value {
        Value::Mapping(map) => {
            !map.is_empty() && map.keys().all(|k| QUERY_KEYS.contains(&k.as_str()))
        }
        _ => false,
    }
}

/// Root-level data shared by every node and tag expansion of one repository.
#[derive(Debug)]
pub struct RootData {
    data: Value,
    tags: Map,
    aliases: Map,
    defaults: Option<Arc<Config>>,
}

impl RootData {
    fn new(data: Value, defaults: Option<Arc<Config>>) -> Self {
        let table = |key: &str| {
            data.get(key)
                .and_then(Value::as_mapping)
                .cloned()
                .unwrap_or_default()
        };
        let tags = table("tags");
        let aliases = table("aliases");
        Self {
            data,
            tags,
            aliases,
            defaults,
        }
    }

    /// The full root mapping.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Group a tag belongs to. Only a non-empty scalar names a group.
    pub fn group_of(&self, tag: &str) -> String {
        self.tags
            .get(tag)
            .filter(|v| matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_)))
            .map(Value::to_plain_string)
            .filter(|group| !group.is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string())
    }

    /// Alias target of a tag, or the tag itself.
    pub fn alias_of(&self, tag: &str) -> String {
        self.aliases
            .get(tag)
            .filter(|v| !v.is_nil())
            .map(Value::to_plain_string)
            .unwrap_or_else(|| tag.to_string())
    }

    /// Every tag named by `tags` or `aliases`.
    pub fn known_tags(&self) -> BTreeSet<String> {
        self.tags.keys().chain(self.aliases.keys()).cloned().collect()
    }

    /// Whether any queryable top-level node has tag-specific data for `tag`.
    fn has_tag_data(&self, tag: &str) -> bool {
        self.data.as_mapping().is_some_and(|map| {
            map.values().filter(|v| is_queryable(v)).any(|v| {
                v.get("tag")
                    .and_then(|t| t.get(tag))
                    .is_some_and(|d| !d.is_nil())
            })
        })
    }
}

/// A metadata node scoped to one tag.
///
/// The root node wraps the repository's merged configuration. Nested nodes
/// (from [`Metadata::node`]) keep a handle to the same root so they resolve
/// against the same `tags` and `aliases` tables.
#[derive(Debug, Clone)]
pub struct Metadata {
    data: Value,
    root: Arc<RootData>,
    tag: String,
    is_root: bool,
}

impl Metadata {
    /// Create a root node.
    pub fn root(data: Value, tag: &str) -> Self {
        Self::root_with_defaults(data, tag, None)
    }

    /// Create a root node that falls back to `defaults` for unknown keys.
    pub fn root_with_defaults(data: Value, tag: &str, defaults: Option<Arc<Config>>) -> Self {
        let root = Arc::new(RootData::new(data.clone(), defaults));
        Self {
            data,
            root,
            tag: tag.to_string(),
            is_root: true,
        }
    }

    /// Create a nested node.
    ///
    /// # Errors
    ///
    /// Returns `MissingRootMetadata` when no root is supplied; a nested node
    /// cannot resolve fallbacks on its own.
    pub fn nested(key: &str, data: Value, root: Option<&Arc<RootData>>, tag: &str) -> Result<Self> {
        let root = root.ok_or_else(|| Error::MissingRootMetadata {
            key: key.to_string(),
        })?;
        Ok(Self {
            data,
            root: Arc::clone(root),
            tag: tag.to_string(),
            is_root: false,
        })
    }

    /// The same node resolved for a different tag. Root data is shared.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            data: self.data.clone(),
            root: Arc::clone(&self.root),
            tag: tag.to_string(),
            is_root: self.is_root,
        }
    }

    /// Shared root data.
    pub fn root_data(&self) -> &Arc<RootData> {
        &self.root
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// This node's unresolved data.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The tag this node resolves for.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Group of the current tag.
    pub fn group(&self) -> String {
        self.root.group_of(&self.tag)
    }

    /// Alias target of the current tag (the tag itself when not aliased).
    pub fn aliased_tag(&self) -> String {
        self.root.alias_of(&self.tag)
    }

    /// Group of the alias target.
    pub fn aliased_group(&self) -> String {
        self.root.group_of(&self.aliased_tag())
    }

    /// Whether the current tag points at a different tag.
    pub fn is_alias(&self) -> bool {
        self.aliased_tag() != self.tag
    }

    /// Whether the current tag is an alias that still carries its own
    /// tag-specific data somewhere in the root metadata.
    ///
    /// Every queryable top-level node is scanned, including ones unrelated
    /// to the build inputs.
    pub fn is_complex_alias(&self) -> bool {
        self.is_alias() && self.root.has_tag_data(&self.tag)
    }

    /// Every tag named by the root `tags` and `aliases` tables.
    pub fn tags(&self) -> BTreeSet<String> {
        self.root.known_tags()
    }

    /// Unresolved value of `key` in this node.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Resolve `key` to a concrete value.
    ///
    /// Unknown keys fall back to the process defaults on the root node and
    /// are nil everywhere else.
    pub fn get(&self, key: &str) -> Value {
        match self.raw(key) {
            Some(value) => self.resolve(value),
            None if self.is_root => self
                .root
                .defaults
                .as_ref()
                .map(|d| self.resolve(d.get(key)))
                .unwrap_or_default(),
            None => Value::Nil,
        }
    }

    /// Resolve `key` to a string, if it resolves to a scalar.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Value::Nil | Value::List(_) | Value::Mapping(_) => None,
            other => Some(other.to_plain_string()),
        }
    }

    /// Resolve `key` as a flag. Nil, empty and false are all false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_truthy()
    }

    /// Nested node for `key`, resolving against the same root.
    pub fn node(&self, key: &str) -> Result<Metadata> {
        let data = self.raw(key).cloned().unwrap_or_default();
        Metadata::nested(key, data, Some(&self.root), &self.tag)
    }

    /// Every key of this node, resolved. On the root node default keys
    /// are included.
    pub fn to_value(&self) -> Value {
        let mut keys: BTreeSet<String> = self
            .data
            .as_mapping()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        if self.is_root {
            if let Some(defaults) = &self.root.defaults {
                keys.extend(defaults.keys().map(str::to_string));
            }
        }
        Value::Mapping(keys.into_iter().map(|k| (k.clone(), self.get(&k))).collect())
    }

    /// Resolve a value, descending into plain mappings.
    pub fn resolve(&self, value: &Value) -> Value {
        if is_queryable(value) {
            let resolved = self.resolve_query(value);
            return self.resolve(&resolved);
        }
        match value {
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_query(&self, node: &Value) -> Value {
        let complex = self.is_complex_alias();
        let (parent_tag, parent_group) = if complex {
            (Some(self.aliased_tag()), Some(self.aliased_group()))
        } else {
            (None, None)
        };
        let group = self.group();

        let tag = by_tag(node, &self.tag);
        let parent_tag = parent_tag.as_deref().and_then(|t| by_tag(node, t));
        let group = by_group(node, &group);
        let parent_group = parent_group.as_deref().and_then(|g| by_group(node, g));
        let all = node.get("all").filter(|v| !v.is_nil());

        // Merge order, lowest precedence first.
        let levels: Vec<&Value> = [all, parent_group, group, parent_tag, tag]
            .into_iter()
            .flatten()
            .collect();

        if levels.is_empty() {
            return Value::Nil;
        }

        if levels.iter().all(|v| matches!(v, Value::List(_))) {
            let mut union: Vec<Value> = Vec::new();
            for item in levels.iter().filter_map(|v| v.as_list()).flatten() {
                if !union.contains(item) {
                    union.push(item.clone());
                }
            }
            return Value::List(union);
        }

        if levels.iter().all(|v| matches!(v, Value::Mapping(_))) {
            return levels
                .iter()
                .fold(Value::mapping(), |acc, level| deep_merge(&acc, level));
        }

        levels.last().map(|v| (*v).clone()).unwrap_or_default()
    }
}

fn by_tag<'a>(node: &'a Value, tag: &str) -> Option<&'a Value> {
    node.get("tag")
        .and_then(|t| t.get(tag))
        .filter(|v| !v.is_nil())
}

fn by_group<'a>(node: &'a Value, group: &str) -> Option<&'a Value> {
    node.get("type")
        .and_then(|t| t.get(group))
        .or_else(|| node.get("group").and_then(|t| t.get(group)))
        .filter(|v| !v.is_nil())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(s).unwrap())
    }

    fn strings(value: &Value) -> Vec<String> {
        value
            .as_list()
            .unwrap()
            .iter()
            .map(Value::to_plain_string)
            .collect()
    }

    #[test]
    fn queryable_requires_only_query_keys() {
        assert!(is_queryable(&yaml("tag: {}\ntype: {}\nall: ~")));
        assert!(is_queryable(&yaml("all: x")));
        assert!(is_queryable(&yaml("group: {a: b}")));
        assert!(!is_queryable(&yaml("tag: {}\nother: 1")));
        assert!(!is_queryable(&yaml("{}")));
        assert!(!is_queryable(&yaml("[tag]")));
    }

    #[test]
    fn lists_union_in_precedence_order() {
        let meta = Metadata::root(
            yaml(
                r#"
tags: { latest: stable }
env:
  tag: { latest: ["A=1"] }
  type: { stable: ["B=2"] }
  all: ["C=3"]
"#,
            ),
            "latest",
        );
        assert_eq!(strings(&meta.get("env")), vec!["C=3", "B=2", "A=1"]);
    }

    #[test]
    fn list_union_drops_duplicates_keeping_first() {
        let meta = Metadata::root(
            yaml(
                r#"
packages:
  tag: { latest: [curl, git] }
  all: [git, bash]
"#,
            ),
            "latest",
        );
        assert_eq!(strings(&meta.get("packages")), vec!["git", "bash", "curl"]);
    }

    #[test]
    fn mappings_deep_merge_with_tag_winning() {
        let meta = Metadata::root(
            yaml(
                r#"
tags: { latest: stable }
versions:
  all: { ruby: "2.3", node: { major: 6, minor: 1 } }
  type: { stable: { node: { minor: 2 } } }
  tag: { latest: { ruby: "2.4" } }
"#,
            ),
            "latest",
        );
        let versions = meta.get("versions");
        assert_eq!(versions.get("ruby"), Some(&Value::from("2.4")));
        let node = versions.get("node").unwrap();
        assert_eq!(node.get("major").unwrap().to_plain_string(), "6");
        assert_eq!(node.get("minor").unwrap().to_plain_string(), "2");
    }

    #[test]
    fn scalars_take_most_specific_level() {
        let data = yaml(
            r#"
tags: { latest: stable, edge: stable }
from:
  tag: { latest: "alpine:3.4" }
  type: { stable: "alpine:3.3" }
  all: "alpine:3.2"
"#,
        );
        let meta = Metadata::root(data, "latest");
        assert_eq!(meta.get_str("from").as_deref(), Some("alpine:3.4"));
        assert_eq!(
            meta.with_tag("edge").get_str("from").as_deref(),
            Some("alpine:3.3")
        );
        assert_eq!(
            meta.with_tag("other").get_str("from").as_deref(),
            Some("alpine:3.2")
        );
    }

    #[test]
    fn mixed_kinds_use_precedence() {
        let meta = Metadata::root(
            yaml(
                r#"
entrypoint:
  tag: { latest: ["/bin/app", "--serve"] }
  all: "/bin/sh"
"#,
            ),
            "latest",
        );
        assert_eq!(meta.get("entrypoint").as_list().unwrap().len(), 2);
        assert_eq!(
            meta.with_tag("other").get("entrypoint"),
            Value::from("/bin/sh")
        );
    }

    #[test]
    fn group_synonym_is_accepted() {
        let meta = Metadata::root(
            yaml(
                r#"
tags: { latest: stable }
from:
  group: { stable: "alpine:3.3" }
"#,
            ),
            "latest",
        );
        assert_eq!(meta.get_str("from").as_deref(), Some("alpine:3.3"));
    }

    #[test]
    fn unset_group_is_normal() {
        let meta = Metadata::root(
            yaml(
                r#"
from:
  type: { normal: "alpine:edge" }
"#,
            ),
            "latest",
        );
        assert_eq!(meta.group(), "normal");
        assert_eq!(meta.get_str("from").as_deref(), Some("alpine:edge"));
    }

    #[test]
    fn non_scalar_group_falls_back_to_normal() {
        let meta = Metadata::root(
            yaml("tags: { latest: {}, blank: '', none: ~, list: [a], named: stable }"),
            "latest",
        );
        assert_eq!(meta.group(), DEFAULT_GROUP);
        assert_eq!(meta.with_tag("blank").group(), DEFAULT_GROUP);
        assert_eq!(meta.with_tag("none").group(), DEFAULT_GROUP);
        assert_eq!(meta.with_tag("list").group(), DEFAULT_GROUP);
        assert_eq!(meta.with_tag("named").group(), "stable");
    }

    #[test]
    fn nothing_present_is_nil() {
        let meta = Metadata::root(yaml("env:\n  tag: {}\n  type: {}\n  all: ~"), "latest");
        assert!(meta.get("env").is_nil());
    }

    #[test]
    fn alias_detection() {
        let data = yaml(
            r#"
aliases: { edge: latest, same: same }
"#,
        );
        let meta = Metadata::root(data, "edge");
        assert!(meta.is_alias());
        assert!(!meta.is_complex_alias());
        assert_eq!(meta.aliased_tag(), "latest");
        assert!(!meta.with_tag("same").is_alias());
        assert!(!meta.with_tag("latest").is_alias());
    }

    #[test]
    fn complex_alias_when_any_queryable_node_has_tag_data() {
        let data = yaml(
            r#"
aliases: { edge: latest }
unrelated:
  tag: { edge: anything }
"#,
        );
        let meta = Metadata::root(data, "edge");
        assert!(meta.is_complex_alias());
    }

    #[test]
    fn complex_alias_inherits_parent_levels() {
        let data = yaml(
            r#"
tags: { latest: stable }
aliases: { edge: latest }
env:
  tag: { latest: ["P=1"], edge: ["E=1"] }
  type: { stable: ["S=1"] }
  all: ["A=1"]
from:
  tag: { latest: "alpine:3.4" }
"#,
        );
        let meta = Metadata::root(data, "edge");
        assert!(meta.is_complex_alias());
        assert_eq!(strings(&meta.get("env")), vec!["A=1", "S=1", "P=1", "E=1"]);
        assert_eq!(meta.get_str("from").as_deref(), Some("alpine:3.4"));
    }

    #[test]
    fn simple_alias_ignores_parent_levels() {
        let data = yaml(
            r#"
aliases: { edge: latest }
from:
  tag: { latest: "alpine:3.4" }
  all: "alpine:3.2"
"#,
        );
        let meta = Metadata::root(data, "edge");
        assert_eq!(meta.get_str("from").as_deref(), Some("alpine:3.2"));
    }

    #[test]
    fn tags_union_aliases() {
        let meta = Metadata::root(
            yaml("tags: { latest: stable, old: stable }\naliases: { edge: latest, latest: latest }"),
            "latest",
        );
        let tags: Vec<_> = meta.tags().into_iter().collect();
        assert_eq!(tags, vec!["edge", "latest", "old"]);
    }

    #[test]
    fn root_falls_back_to_defaults() {
        let defaults = Arc::new(Config::defaults());
        let meta = Metadata::root_with_defaults(yaml("user: acme"), "latest", Some(defaults));
        assert_eq!(meta.get_str("user").as_deref(), Some("acme"));
        assert_eq!(meta.get_str("local_prefix").as_deref(), Some("local"));
    }

    #[test]
    fn nested_node_unknown_key_is_nil() {
        let defaults = Arc::new(Config::defaults());
        let meta = Metadata::root_with_defaults(yaml("releases: {}"), "latest", Some(defaults));
        let node = meta.node("releases").unwrap();
        assert!(!node.is_root());
        assert!(node.get("local_prefix").is_nil());
    }

    #[test]
    fn nested_node_resolves_against_root_tables() {
        let meta = Metadata::root(
            yaml(
                r#"
tags: { latest: stable }
releases:
  alpine:
    type: { stable: "3.4" }
    all: "3.2"
"#,
            ),
            "latest",
        );
        let releases = meta.node("releases").unwrap();
        assert_eq!(releases.get_str("alpine").as_deref(), Some("3.4"));
        assert_eq!(
            meta.get("releases").get("alpine"),
            Some(&Value::from("3.4"))
        );
    }

    #[test]
    fn nested_without_root_is_an_error() {
        let err = Metadata::nested("env", Value::mapping(), None, "latest").unwrap_err();
        assert!(matches!(err, Error::MissingRootMetadata { .. }));
    }

    #[test]
    fn get_bool_treats_empty_as_false() {
        let meta = Metadata::root(
            yaml("a: true\nb: ''\nc: []\nd: ~\ne: false\nf: yes-please"),
            "latest",
        );
        assert!(meta.get_bool("a"));
        assert!(!meta.get_bool("b"));
        assert!(!meta.get_bool("c"));
        assert!(!meta.get_bool("d"));
        assert!(!meta.get_bool("e"));
        assert!(!meta.get_bool("missing"));
        assert!(meta.get_bool("f"));
    }

    #[test]
    fn to_value_resolves_every_key() {
        let meta = Metadata::root(
            yaml("tags: { latest: stable }\nfrom:\n  type: { stable: img }"),
            "latest",
        );
        let value = meta.to_value();
        assert_eq!(value.get("from"), Some(&Value::from("img")));
    }
}

//! Deep merge for configuration values.
//!
//! Global and per-repository override files are layered over the built-in
//! defaults with these rules:
//!
//! - Mappings are merged recursively
//! - Lists are replaced entirely (not merged)
//! - Null values in the overlay delete the corresponding key from the base
//! - Scalars in the overlay replace scalars in the base
//!
//! The metadata resolver has its own accumulating merge for queryable
//! nodes; see [`crate::metadata::resolver`].

use crate::metadata::Value;

/// Deep merge two values. The overlay takes precedence at every conflict.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                if overlay_value.is_nil() {
                    result.remove(key);
                } else if let Some(base_value) = base_map.get(key) {
                    result.insert(key.clone(), deep_merge(base_value, overlay_value));
                } else {
                    result.insert(key.clone(), overlay_value.clone());
                }
            }

            Value::Mapping(result)
        }

        (_, overlay) => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(s).unwrap())
    }

    #[test]
    fn deep_merge_replaces_at_conflict_point() {
        let base = yaml(
            r#"
env:
  tag:
    latest: [A=1]
  all: [C=3]
"#,
        );
        let overlay = yaml(
            r#"
env:
  all: [D=4]
"#,
        );

        let result = deep_merge(&base, &overlay);

        assert_eq!(result.get("env").unwrap().get("all"), Some(&yaml("[D=4]")));
        assert!(result.get("env").unwrap().get("tag").is_some());
    }

    #[test]
    fn lists_are_replaced_not_merged() {
        let base = yaml("build_types: [normal, simple, scratch]");
        let overlay = yaml("build_types: [normal]");

        let result = deep_merge(&base, &overlay);
        let types = result.get("build_types").unwrap().as_list().unwrap();

        assert_eq!(types.len(), 1);
        assert_eq!(types[0], Value::from("normal"));
    }

    #[test]
    fn null_removes_inherited_value() {
        let base = yaml("maintainer: someone\nuser: local");
        let overlay = yaml("maintainer: ~");

        let result = deep_merge(&base, &overlay);

        assert!(result.get("maintainer").is_none());
        assert_eq!(result.get("user"), Some(&Value::from("local")));
    }

    #[test]
    fn scalar_overlay_replaces_mapping_base() {
        let base = yaml("env:\n  all: [A=1]");
        let overlay = yaml("env: disabled");

        let result = deep_merge(&base, &overlay);
        assert_eq!(result.get("env"), Some(&Value::from("disabled")));
    }
}

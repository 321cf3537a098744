//! Slash-delimited path addressing into a configuration tree.
//!
//! A path like `action/1/choose/0/sequence/1` descends a parsed
//! script/automation definition one segment at a time: non-numeric segments
//! are object key lookups, numeric segments index into sequences. Resolution
//! is deterministic -- the same `(config, path)` pair always yields the same
//! result.
//!
//! One quirk is preserved on purpose: applying index `0` to a value that is
//! not a sequence is an identity no-op. Some config shapes (a choose
//! branch's `sequence`, for one) may be a bare object standing in for a
//! singleton list, and callers rely on `.../0` not failing there. Only a
//! *nonzero* index against a non-sequence is an error. This exception can
//! mask genuine addressing bugs; see DESIGN.md.

use serde_json::Value;

use crate::error::CoreError;

/// Returns `true` when `path` addresses the trigger section of an
/// automation: the literal `trigger` or anything below `trigger/`.
pub fn is_trigger_path(path: &str) -> bool {
    path == "trigger" || path.starts_with("trigger/")
}

/// Resolves `path` against `config` by sequential descent.
///
/// Empty segments (leading/trailing slashes) are skipped, so a builder
/// prefix like `action/1/sequence/` resolves to the same node as
/// `action/1/sequence`.
///
/// Errors are propagated to the caller, never swallowed: a missing key is
/// [`CoreError::KeyNotFound`], a nonzero index on a non-sequence is
/// [`CoreError::InvalidIndexOnNonArray`], an index past the end of a
/// sequence is [`CoreError::IndexOutOfBounds`].
pub fn resolve<'a>(config: &'a Value, path: &str) -> Result<&'a Value, CoreError> {
    let mut current = config;
    for token in path.split('/').filter(|t| !t.is_empty()) {
        current = step(current, token, path)?;
    }
    Ok(current)
}

/// One descent step. Shared by the immutable and mutable walks.
fn step<'a>(current: &'a Value, token: &str, full_path: &str) -> Result<&'a Value, CoreError> {
    match token.parse::<usize>() {
        Ok(index) => match current {
            Value::Array(items) => items.get(index).ok_or_else(|| CoreError::IndexOutOfBounds {
                index,
                len: items.len(),
                path: full_path.to_string(),
            }),
            // Index 0 on a non-sequence: identity no-op (singleton shape).
            _ if index == 0 => Ok(current),
            _ => Err(CoreError::InvalidIndexOnNonArray {
                index,
                path: full_path.to_string(),
            }),
        },
        Err(_) => current
            .get(token)
            .ok_or_else(|| CoreError::KeyNotFound {
                key: token.to_string(),
                path: full_path.to_string(),
            }),
    }
}

fn step_mut<'a>(
    current: &'a mut Value,
    token: &str,
    full_path: &str,
) -> Result<&'a mut Value, CoreError> {
    match token.parse::<usize>() {
        Ok(index) => match current {
            Value::Array(items) => {
                let len = items.len();
                items.get_mut(index).ok_or(CoreError::IndexOutOfBounds {
                    index,
                    len,
                    path: full_path.to_string(),
                })
            }
            _ if index == 0 => Ok(current),
            _ => Err(CoreError::InvalidIndexOnNonArray {
                index,
                path: full_path.to_string(),
            }),
        },
        Err(_) => current.get_mut(token).ok_or_else(|| CoreError::KeyNotFound {
            key: token.to_string(),
            path: full_path.to_string(),
        }),
    }
}

/// Replaces or removes the config slot addressed by `path`.
///
/// `Some(value)` writes the new value into the slot; `None` removes it --
/// splicing array elements out and dropping object keys. This is the pure
/// counterpart of the editor's per-node update callback: selection events
/// carry a path, and mutation goes through here instead of a captured
/// closure.
pub fn update_at(root: &mut Value, path: &str, value: Option<Value>) -> Result<(), CoreError> {
    let tokens: Vec<&str> = path.split('/').filter(|t| !t.is_empty()).collect();
    let Some((last, parents)) = tokens.split_last() else {
        // Whole-tree replacement; removal of the root is not meaningful.
        return match value {
            Some(v) => {
                *root = v;
                Ok(())
            }
            None => Err(CoreError::NotASequence {
                path: path.to_string(),
            }),
        };
    };

    let mut current = root;
    for token in parents {
        current = step_mut(current, token, path)?;
    }

    match last.parse::<usize>() {
        Ok(index) => match current {
            Value::Array(items) => {
                if index >= items.len() {
                    return Err(CoreError::IndexOutOfBounds {
                        index,
                        len: items.len(),
                        path: path.to_string(),
                    });
                }
                match value {
                    Some(v) => items[index] = v,
                    None => {
                        items.remove(index);
                    }
                }
                Ok(())
            }
            // The identity exception makes `.../0` address the value itself.
            _ if index == 0 => match value {
                Some(v) => {
                    *current = v;
                    Ok(())
                }
                None => Err(CoreError::NotASequence {
                    path: path.to_string(),
                }),
            },
            _ => Err(CoreError::InvalidIndexOnNonArray {
                index,
                path: path.to_string(),
            }),
        },
        Err(_) => {
            let Value::Object(map) = current else {
                return Err(CoreError::KeyNotFound {
                    key: (*last).to_string(),
                    path: path.to_string(),
                });
            };
            match value {
                Some(v) => {
                    map.insert((*last).to_string(), v);
                    Ok(())
                }
                None => match map.remove(*last) {
                    Some(_) => Ok(()),
                    None => Err(CoreError::KeyNotFound {
                        key: (*last).to_string(),
                        path: path.to_string(),
                    }),
                },
            }
        }
    }
}

/// Splices an empty action `{}` into the sequence addressed by `seq_path`
/// at position `index`. Backs the editor's "add node after" affordance.
pub fn insert_at(root: &mut Value, seq_path: &str, index: usize) -> Result<(), CoreError> {
    let mut current = root;
    for token in seq_path.split('/').filter(|t| !t.is_empty()) {
        current = step_mut(current, token, seq_path)?;
    }
    let Value::Array(items) = current else {
        return Err(CoreError::NotASequence {
            path: seq_path.to_string(),
        });
    };
    if index > items.len() {
        return Err(CoreError::IndexOutOfBounds {
            index,
            len: items.len(),
            path: seq_path.to_string(),
        });
    }
    items.insert(index, Value::Object(serde_json::Map::new()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_object_then_index() {
        let config = json!({"a": [{"b": 1}]});
        assert_eq!(*resolve(&config, "a/0/b").unwrap(), json!(1));
    }

    #[test]
    fn resolve_nonzero_index_on_non_array_errors() {
        let config = json!({"a": {"b": 1}});
        match resolve(&config, "a/1") {
            Err(CoreError::InvalidIndexOnNonArray { index: 1, .. }) => {}
            other => panic!("expected InvalidIndexOnNonArray, got {:?}", other),
        }
    }

    #[test]
    fn resolve_index_zero_on_non_array_is_identity() {
        let config = json!({"a": {"b": 1}});
        assert_eq!(*resolve(&config, "a/0").unwrap(), json!({"b": 1}));
        // The identity no-op composes: a/0/b still lands on b.
        assert_eq!(*resolve(&config, "a/0/b").unwrap(), json!(1));
    }

    #[test]
    fn resolve_missing_key_errors() {
        let config = json!({"a": 1});
        match resolve(&config, "b") {
            Err(CoreError::KeyNotFound { key, .. }) => assert_eq!(key, "b"),
            other => panic!("expected KeyNotFound, got {:?}", other),
        }
    }

    #[test]
    fn resolve_out_of_bounds_errors() {
        let config = json!({"a": [1, 2]});
        match resolve(&config, "a/5") {
            Err(CoreError::IndexOutOfBounds { index: 5, len: 2, .. }) => {}
            other => panic!("expected IndexOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn resolve_skips_empty_segments() {
        let config = json!({"action": [{"service": "light.turn_on"}]});
        assert_eq!(
            resolve(&config, "action/0/").unwrap(),
            resolve(&config, "action/0").unwrap()
        );
        assert_eq!(*resolve(&config, "").unwrap(), config);
    }

    #[test]
    fn trigger_paths() {
        assert!(is_trigger_path("trigger"));
        assert!(is_trigger_path("trigger/0"));
        assert!(!is_trigger_path("triggered"));
        assert!(!is_trigger_path("action/0"));
    }

    #[test]
    fn update_replaces_array_element() {
        let mut config = json!({"action": [{"delay": 1}, {"delay": 2}]});
        update_at(&mut config, "action/1", Some(json!({"delay": 5}))).unwrap();
        assert_eq!(config, json!({"action": [{"delay": 1}, {"delay": 5}]}));
    }

    #[test]
    fn update_none_splices_array_element() {
        let mut config = json!({"action": [{"delay": 1}, {"delay": 2}, {"delay": 3}]});
        update_at(&mut config, "action/1", None).unwrap();
        assert_eq!(config, json!({"action": [{"delay": 1}, {"delay": 3}]}));
    }

    #[test]
    fn update_sets_and_removes_object_key() {
        let mut config = json!({"action": [{"service": "x"}]});
        update_at(&mut config, "action/0/service", Some(json!("y"))).unwrap();
        assert_eq!(config["action"][0]["service"], json!("y"));
        update_at(&mut config, "action/0/service", None).unwrap();
        assert_eq!(config["action"][0], json!({}));
    }

    #[test]
    fn insert_splices_empty_action() {
        let mut config = json!({"action": [{"delay": 1}]});
        insert_at(&mut config, "action", 1).unwrap();
        assert_eq!(config["action"], json!([{"delay": 1}, {}]));
    }

    #[test]
    fn insert_into_non_sequence_errors() {
        let mut config = json!({"action": {"delay": 1}});
        match insert_at(&mut config, "action", 0) {
            Err(CoreError::NotASequence { .. }) => {}
            other => panic!("expected NotASequence, got {:?}", other),
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// A chain of path segments: alternating object keys and sequence
        /// positions, nesting a payload at the end.
        fn segment() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-z]{1,6}".prop_map(|s| s),
                (0usize..4).prop_map(|n| n.to_string()),
            ]
        }

        /// Builds a config tree whose only leaf sits at the end of `segments`.
        fn nest(segments: &[String], payload: Value) -> Value {
            segments.iter().rev().fold(payload, |inner, seg| {
                match seg.parse::<usize>() {
                    Ok(n) => {
                        let mut items = vec![Value::Null; n + 1];
                        items[n] = inner;
                        Value::Array(items)
                    }
                    Err(_) => {
                        let mut map = serde_json::Map::new();
                        map.insert(seg.clone(), inner);
                        Value::Object(map)
                    }
                }
            })
        }

        proptest! {
            #[test]
            fn resolve_is_deterministic_and_idempotent(
                segments in proptest::collection::vec(segment(), 1..6),
                payload in 0i64..1000,
            ) {
                let config = nest(&segments, json!(payload));
                let path = segments.join("/");
                let first = resolve(&config, &path).unwrap().clone();
                let second = resolve(&config, &path).unwrap().clone();
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first, json!(payload));
            }

            #[test]
            fn nonzero_index_on_scalar_always_errors(
                key in "[a-z]{1,6}",
                index in 1usize..10,
            ) {
                let config = json!({ key.as_str(): {"value": 1} });
                let path = format!("{}/{}", key, index);
                match resolve(&config, &path) {
                    Err(CoreError::InvalidIndexOnNonArray { index: got, .. }) => {
                        prop_assert_eq!(got, index);
                    }
                    other => prop_assert!(false, "expected InvalidIndexOnNonArray, got {:?}", other),
                }
            }
        }
    }
}

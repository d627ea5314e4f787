//! Store-side scripted mutations.
//!
//! # Responsibility
//! - Name the fixed set of server-executed procedures the repository issues.
//! - Expose each procedure as script source plus named parameters.
//!
//! # Invariants
//! - The repository never applies a script itself; only a store does.
//! - Removing the last namespace (or workspace) turns the update into a delete.
//! - A counter only ever adds to a number; any other stored value fails the
//!   script and leaves the document untouched.

use crate::model::raw_doc::{Document, SOURCE_NAMESPACES, SOURCE_UPDATED_AT, SOURCE_WORKSPACES};
use crate::store::{StoreError, StoreResult, SCRIPT_EXCEPTION};
use serde_json::{json, Number, Value};

const REMOVE_NAMESPACE_SOURCE: &str = r#"
if (!ctx._source.containsKey('namespaces')) {
  ctx.op = "delete";
} else {
  ctx._source['namespaces'].removeAll(Collections.singleton(params['namespace']));
  if (ctx._source['namespaces'].empty) {
    ctx.op = "delete";
  }
}
"#;

const REMOVE_WORKSPACE_SOURCE: &str = r#"
if (!ctx._source.containsKey('workspaces')) {
  ctx.op = "delete";
} else {
  ctx._source['workspaces'].removeAll(Collections.singleton(params['workspace']));
  if (ctx._source['workspaces'].empty) {
    ctx.op = "delete";
  }
}
"#;

const INCREMENT_COUNTER_SOURCE: &str = r#"
if (ctx._source[params.type][params.counterFieldName] == null) {
  ctx._source[params.type][params.counterFieldName] = params.count;
}
else {
  ctx._source[params.type][params.counterFieldName] += params.count;
}
ctx._source.updated_at = params.time;
"#;

/// Procedure executed by the store against one document's source.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreScript {
    RemoveNamespace {
        namespace: String,
    },
    RemoveWorkspace {
        workspace: String,
    },
    IncrementCounter {
        type_name: String,
        counter_field: String,
        count: i64,
        time: String,
    },
}

/// Effect of running a script on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOp {
    Updated,
    Delete,
    Noop,
}

impl StoreScript {
    /// Script language the source text is written in.
    pub fn lang(&self) -> &'static str {
        "painless"
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::RemoveNamespace { .. } => REMOVE_NAMESPACE_SOURCE,
            Self::RemoveWorkspace { .. } => REMOVE_WORKSPACE_SOURCE,
            Self::IncrementCounter { .. } => INCREMENT_COUNTER_SOURCE,
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Self::RemoveNamespace { namespace } => json!({ "namespace": namespace }),
            Self::RemoveWorkspace { workspace } => json!({ "workspace": workspace }),
            Self::IncrementCounter {
                type_name,
                counter_field,
                count,
                time,
            } => json!({
                "type": type_name,
                "counterFieldName": counter_field,
                "count": count,
                "time": time,
            }),
        }
    }

    /// Runs the procedure natively against a stored source.
    ///
    /// On error `source` is unchanged.
    pub fn apply(&self, source: &mut Document) -> StoreResult<ScriptOp> {
        match self {
            Self::RemoveNamespace { namespace } => {
                Ok(remove_tag(source, SOURCE_NAMESPACES, namespace))
            }
            Self::RemoveWorkspace { workspace } => {
                Ok(remove_tag(source, SOURCE_WORKSPACES, workspace))
            }
            Self::IncrementCounter {
                type_name,
                counter_field,
                count,
                time,
            } => {
                let current = source
                    .get(type_name)
                    .and_then(|attributes| attributes.get(counter_field));
                let next = increment(current, *count).ok_or_else(|| {
                    StoreError::response(
                        400,
                        SCRIPT_EXCEPTION,
                        format!("cannot increment non-numeric field [{type_name}.{counter_field}]"),
                    )
                })?;

                let attributes = source
                    .entry(type_name.clone())
                    .or_insert_with(|| Value::Object(Document::new()));
                if !attributes.is_object() {
                    *attributes = Value::Object(Document::new());
                }
                if let Value::Object(attributes) = attributes {
                    attributes.insert(counter_field.clone(), next);
                }
                source.insert(SOURCE_UPDATED_AT.to_string(), Value::String(time.clone()));
                Ok(ScriptOp::Updated)
            }
        }
    }
}

/// Adds `count` to a stored counter; integers stay integers, other numbers
/// add as floats. `None` for a non-numeric value.
fn increment(current: Option<&Value>, count: i64) -> Option<Value> {
    match current {
        None | Some(Value::Null) => Some(json!(count)),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(current) => Some(json!(current.saturating_add(count))),
            None => {
                let sum = number.as_f64()? + count as f64;
                Number::from_f64(sum).map(Value::Number)
            }
        },
        Some(_) => None,
    }
}

fn remove_tag(source: &mut Document, key: &str, tag: &str) -> ScriptOp {
    let Some(Value::Array(values)) = source.get_mut(key) else {
        return ScriptOp::Delete;
    };

    let before = values.len();
    values.retain(|value| value.as_str() != Some(tag));
    if values.is_empty() {
        ScriptOp::Delete
    } else if values.len() == before {
        ScriptOp::Noop
    } else {
        ScriptOp::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::{ScriptOp, StoreScript};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> crate::model::raw_doc::Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn remove_namespace_deletes_when_set_becomes_empty() {
        let script = StoreScript::RemoveNamespace {
            namespace: "ns1".to_string(),
        };

        let mut shared = doc(json!({ "type": "t", "namespaces": ["ns1", "ns2"] }));
        assert_eq!(script.apply(&mut shared).unwrap(), ScriptOp::Updated);
        assert_eq!(shared["namespaces"], json!(["ns2"]));

        let mut last = doc(json!({ "type": "t", "namespaces": ["ns1"] }));
        assert_eq!(script.apply(&mut last).unwrap(), ScriptOp::Delete);

        let mut untagged = doc(json!({ "type": "t" }));
        assert_eq!(script.apply(&mut untagged).unwrap(), ScriptOp::Delete);

        let mut other = doc(json!({ "type": "t", "namespaces": ["ns3"] }));
        assert_eq!(script.apply(&mut other).unwrap(), ScriptOp::Noop);
    }

    #[test]
    fn increment_counter_initializes_then_adds() {
        let script = StoreScript::IncrementCounter {
            type_name: "stats".to_string(),
            counter_field: "hits".to_string(),
            count: 1,
            time: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let mut source = doc(json!({ "type": "stats", "stats": {} }));

        script.apply(&mut source).unwrap();
        script.apply(&mut source).unwrap();
        assert_eq!(source["stats"]["hits"], json!(2));
        assert_eq!(source["updated_at"], json!("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn increment_counter_adds_to_floats_and_rejects_non_numbers() {
        let script = StoreScript::IncrementCounter {
            type_name: "stats".to_string(),
            counter_field: "hits".to_string(),
            count: 2,
            time: "2024-01-01T00:00:00.000Z".to_string(),
        };

        let mut fractional = doc(json!({ "type": "stats", "stats": { "hits": 1.5 } }));
        assert_eq!(script.apply(&mut fractional).unwrap(), ScriptOp::Updated);
        assert_eq!(fractional["stats"]["hits"], json!(3.5));

        let mut cleared = doc(json!({ "type": "stats", "stats": { "hits": null } }));
        script.apply(&mut cleared).unwrap();
        assert_eq!(cleared["stats"]["hits"], json!(2));

        let original = doc(json!({ "type": "stats", "stats": { "hits": "ten" } }));
        let mut text = original.clone();
        let err = script.apply(&mut text).unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.error_type(), Some("script_exception"));
        assert_eq!(text, original);
    }

    #[test]
    fn params_expose_named_arguments() {
        let script = StoreScript::RemoveWorkspace {
            workspace: "w1".to_string(),
        };
        assert_eq!(script.params(), json!({ "workspace": "w1" }));
        assert!(script.source().contains("workspaces"));
        assert_eq!(script.lang(), "painless");
    }
}

//! In-process evaluation of `SearchQuery` over stored sources.
//!
//! # Responsibility
//! - Decide whether a raw source matches a query and compute its score.
//! - Order hits and project sources onto requested paths.
//!
//! # Invariants
//! - Matching is case-insensitive; a trailing `*` in a term is a prefix marker.
//! - Hit order is deterministic: sort key, then score, then `(index, id)`.

use crate::model::raw_doc::{
    Document, SOURCE_NAMESPACE, SOURCE_NAMESPACES, SOURCE_REFERENCES, SOURCE_TYPE,
    SOURCE_WORKSPACES,
};
use crate::namespace::ALL_NAMESPACES_STRING;
use crate::search::{NamespaceRule, SearchOperator, SearchQuery, SortOrder};
use serde_json::Value;
use std::cmp::Ordering;

/// Returns the hit score when `source` matches `query`.
pub fn evaluate(query: &SearchQuery, source: &Document) -> Option<f64> {
    let type_name = source.get(SOURCE_TYPE)?.as_str()?;

    let clause = query
        .type_clauses
        .iter()
        .find(|clause| clause.type_name == type_name)?;
    if !namespace_matches(&clause.rule, source) {
        return None;
    }
    if let Some(workspaces) = &query.workspaces {
        if !string_list(source, SOURCE_WORKSPACES)
            .iter()
            .any(|workspace| workspaces.iter().any(|wanted| wanted == workspace))
        {
            return None;
        }
    }
    if let Some(reference) = &query.has_reference {
        let references = source.get(SOURCE_REFERENCES).and_then(Value::as_array);
        let found = references.is_some_and(|references| {
            references.iter().any(|candidate| {
                candidate.get("type").and_then(Value::as_str) == Some(reference.type_name.as_str())
                    && candidate.get("id").and_then(Value::as_str) == Some(reference.id.as_str())
            })
        });
        if !found {
            return None;
        }
    }
    for filter in &query.filters {
        if filter.type_name != type_name {
            return None;
        }
        let value = source
            .get(type_name)
            .and_then(|attributes| attributes.get(&filter.attribute));
        if value != Some(&filter.value) {
            return None;
        }
    }

    match &query.search {
        None => Some(1.0),
        Some(search) => score_search(query, type_name, source, search),
    }
}

/// Orders two hits by the query's sort clause, then by score.
pub fn compare_hits(
    query: &SearchQuery,
    (left_score, left): (f64, &Document),
    (right_score, right): (f64, &Document),
) -> Ordering {
    if let Some(sort) = &query.sort {
        let ordering = match (lookup_path(left, &sort.path), lookup_path(right, &sort.path)) {
            (Some(left), Some(right)) => {
                let ordering = compare_values(left, right);
                match sort.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    right_score.partial_cmp(&left_score).unwrap_or(Ordering::Equal)
}

/// Sort values reported on a hit.
pub fn sort_values(query: &SearchQuery, source: &Document) -> Option<Vec<Value>> {
    let sort = query.sort.as_ref()?;
    Some(vec![lookup_path(source, &sort.path)
        .cloned()
        .unwrap_or(Value::Null)])
}

/// Projects `source` onto dotted `includes` paths.
pub fn filter_source(source: &Document, includes: Option<&[String]>) -> Document {
    let Some(includes) = includes else {
        return source.clone();
    };

    let mut projected = Document::new();
    for path in includes {
        if let Some(value) = lookup_path(source, path) {
            let segments: Vec<&str> = path.split('.').collect();
            insert_path(&mut projected, &segments, value.clone());
        }
    }
    projected
}

fn insert_path(target: &mut Document, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = target
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if let Value::Object(nested) = entry {
                insert_path(nested, rest, value);
            }
        }
    }
}

fn lookup_path<'a>(source: &'a Document, path: &str) -> Option<&'a Value> {
    if let Some(value) = source.get(path) {
        return Some(value);
    }
    let mut segments = path.split('.');
    let mut current = source.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn namespace_matches(rule: &NamespaceRule, source: &Document) -> bool {
    match rule {
        NamespaceRule::Any => true,
        NamespaceRule::SingleIn(ids) => {
            let stored = source
                .get(SOURCE_NAMESPACE)
                .and_then(Value::as_str)
                .map(str::to_string);
            ids.contains(&stored)
        }
        NamespaceRule::MultiIn(wanted) => string_list(source, SOURCE_NAMESPACES)
            .iter()
            .any(|stored| *stored == ALL_NAMESPACES_STRING || wanted.iter().any(|w| w == stored)),
    }
}

fn string_list<'a>(source: &'a Document, key: &str) -> Vec<&'a str> {
    source
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn score_search(
    query: &SearchQuery,
    type_name: &str,
    source: &Document,
    search: &str,
) -> Option<f64> {
    let mut texts = Vec::new();
    if query.search_paths.is_empty() {
        if let Some(attributes) = source.get(type_name) {
            collect_strings(attributes, &mut texts);
        }
    } else {
        for path in &query.search_paths {
            if let Some(value) = lookup_path(source, path) {
                collect_strings(value, &mut texts);
            }
        }
    }
    let texts: Vec<String> = texts.iter().map(|text| text.to_lowercase()).collect();

    let terms: Vec<String> = search
        .split_whitespace()
        .map(|term| term.to_lowercase())
        .collect();
    let matched = terms
        .iter()
        .filter(|term| term_matches(term, &texts))
        .count();

    let accepted = match query.search_operator {
        SearchOperator::Or => matched > 0,
        SearchOperator::And => matched == terms.len(),
    };
    accepted.then_some(matched as f64)
}

fn term_matches(term: &str, texts: &[String]) -> bool {
    let needle = term.trim_end_matches('*');
    if needle.is_empty() {
        return true;
    }
    texts.iter().any(|text| text.contains(needle))
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(values) => values.iter().for_each(|value| collect_strings(value, out)),
        Value::Object(map) => map.values().for_each(|value| collect_strings(value, out)),
        _ => {}
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate, filter_source};
    use crate::search::{
        AttributeFilter, NamespaceRule, ReferenceFilter, SearchOperator, SearchQuery, TypeClause,
    };
    use serde_json::json;

    fn doc(value: serde_json::Value) -> crate::model::raw_doc::Document {
        value.as_object().cloned().unwrap()
    }

    fn query(type_name: &str, rule: NamespaceRule) -> SearchQuery {
        SearchQuery {
            type_clauses: vec![TypeClause {
                type_name: type_name.to_string(),
                rule,
            }],
            ..SearchQuery::default()
        }
    }

    #[test]
    fn single_namespace_rule_checks_stored_namespace() {
        let in_ns1 = doc(json!({ "type": "dashboard", "namespace": "ns1", "dashboard": {} }));
        let in_default = doc(json!({ "type": "dashboard", "dashboard": {} }));

        let default_only = query("dashboard", NamespaceRule::SingleIn(vec![None]));
        assert!(evaluate(&default_only, &in_default).is_some());
        assert!(evaluate(&default_only, &in_ns1).is_none());

        let ns1 = query("dashboard", NamespaceRule::SingleIn(vec![Some("ns1".to_string())]));
        assert!(evaluate(&ns1, &in_ns1).is_some());
    }

    #[test]
    fn multi_namespace_rule_accepts_wildcard_documents() {
        let everywhere = doc(json!({ "type": "space-obj", "namespaces": ["*"] }));
        let rule = NamespaceRule::MultiIn(vec!["ns9".to_string()]);
        assert!(evaluate(&query("space-obj", rule), &everywhere).is_some());
    }

    #[test]
    fn search_operators_and_prefix_terms() {
        let source = doc(json!({ "type": "t", "t": { "title": "Sales Overview", "n": 3 } }));
        let mut q = query("t", NamespaceRule::Any);

        q.search = Some("sal* missing".to_string());
        assert_eq!(evaluate(&q, &source), Some(1.0));

        q.search_operator = SearchOperator::And;
        assert_eq!(evaluate(&q, &source), None);

        q.search = Some("*".to_string());
        assert!(evaluate(&q, &source).is_some());

        q.search = Some("nomatch-xyz".to_string());
        q.search_operator = SearchOperator::Or;
        assert_eq!(evaluate(&q, &source), None);
    }

    #[test]
    fn reference_and_attribute_filters() {
        let source = doc(json!({
            "type": "t",
            "t": { "status": "open" },
            "references": [{ "name": "ref", "type": "index-pattern", "id": "p1" }]
        }));
        let mut q = query("t", NamespaceRule::Any);
        q.has_reference = Some(ReferenceFilter::new("index-pattern", "p1"));
        q.filters = vec![AttributeFilter::new("t", "status", json!("open"))];
        assert!(evaluate(&q, &source).is_some());

        q.filters = vec![AttributeFilter::new("t", "status", json!("closed"))];
        assert!(evaluate(&q, &source).is_none());
    }

    #[test]
    fn filter_source_projects_nested_paths() {
        let source = doc(json!({ "type": "t", "t": { "a": 1, "b": 2 }, "namespaces": ["x"] }));
        let includes = vec!["type".to_string(), "t.a".to_string(), "missing".to_string()];
        let projected = filter_source(&source, Some(includes.as_slice()));
        assert_eq!(
            serde_json::Value::Object(projected),
            json!({ "type": "t", "t": { "a": 1 } })
        );
    }
}

//! Builders converting retrieval constraints into Qdrant filters.
//!
//! qdrant-client specifics:
//! - `Condition` is a wrapper with `condition_one_of: Option<ConditionOneOf>`;
//!   the enum must be set explicitly.
//! - `FieldCondition.r#match` expects a `Match` wrapping `MatchValue`.
//! - `MatchValue::Text` performs a full-text match against a text-indexed
//!   payload field.

use qdrant_client::qdrant::{
    condition, r#match::MatchValue, Condition, FieldCondition, Filter, Match, MinShould,
};
use tracing::trace;
use uuid::Uuid;

/// Equality filter for a single `doc_id`.
pub fn doc_id_filter(doc_id: Uuid) -> Filter {
    Filter {
        must: vec![keyword_eq("doc_id", doc_id.to_string())],
        ..Default::default()
    }
}

/// Any-of filter over document ids. `None` when the list is empty, which a
/// caller treats as "no filter".
pub fn doc_filter(doc_ids: &[Uuid]) -> Option<Filter> {
    if doc_ids.is_empty() {
        return None;
    }
    let should: Vec<Condition> = doc_ids
        .iter()
        .map(|id| keyword_eq("doc_id", id.to_string()))
        .collect();
    Some(Filter {
        min_should: Some(MinShould {
            conditions: should.clone(),
            min_count: 1,
        }),
        should,
        ..Default::default()
    })
}

/// Full-text recall filter: any query token must match the `content` text
/// index; combined with the optional document filter.
///
/// Returns `None` when the query yields no usable tokens.
pub fn content_terms_filter(query: &str, doc_ids: Option<&[Uuid]>) -> Option<Filter> {
    let tokens: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect();
    trace!("filters::content_terms_filter tokens={}", tokens.len());
    if tokens.is_empty() {
        return None;
    }

    let should: Vec<Condition> = tokens
        .into_iter()
        .map(|t| {
            Condition {
                condition_one_of: Some(condition::ConditionOneOf::Field(FieldCondition {
                    key: "content".to_string(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::Text(t)),
                    }),
                    ..Default::default()
                })),
            }
        })
        .collect();

    let mut filter = Filter {
        min_should: Some(MinShould {
            conditions: should.clone(),
            min_count: 1,
        }),
        should,
        ..Default::default()
    };

    if let Some(ids) = doc_ids {
        if let Some(doc) = doc_filter(ids) {
            // Nest the doc filter as a must condition so both constraints hold.
            filter.must.push(Condition {
                condition_one_of: Some(condition::ConditionOneOf::Filter(doc)),
            });
        }
    }

    Some(filter)
}

/// Builds a single keyword-equality `Condition` for a field.
fn keyword_eq(key: impl Into<String>, value: String) -> Condition {
    Condition {
        condition_one_of: Some(condition::ConditionOneOf::Field(FieldCondition {
            key: key.into(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Keyword(value)),
            }),
            ..Default::default()
        })),
    }
}

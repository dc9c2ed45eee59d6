use serde_json::{Map, Value, json};

use super::SearchRequest;

/// Builds the search body for `request`: a best-fields match over title and
/// description, one `term` clause per filter, newest first. With neither
/// query text nor filters the body matches everything.
pub fn build_search_query(request: &SearchRequest) -> Value {
    let mut must = Vec::new();

    if !request.query.is_empty() {
        must.push(json!({
            "multi_match": {
                "query": request.query,
                "fields": ["title^2", "description"],
                "type": "best_fields",
            }
        }));
    }

    for (field, value) in &request.filters {
        let mut term = Map::new();
        term.insert(field.clone(), value.clone());
        must.push(json!({ "term": term }));
    }

    let query = if must.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "must": must } })
    };

    json!({
        "query": query,
        "sort": [{ "created_at": { "order": "desc" } }],
    })
}

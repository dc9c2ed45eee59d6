use serde_json::{Value, json};

fn settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 0,
        "analysis": {
            "analyzer": {
                "standard": { "type": "standard" }
            }
        }
    })
}

fn title_field() -> Value {
    json!({
        "type": "text",
        "analyzer": "standard",
        "fields": { "keyword": { "type": "keyword" } }
    })
}

pub fn series_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": title_field(),
                "description": { "type": "text", "analyzer": "standard" },
                "category_id": { "type": "keyword" },
                "language": { "type": "keyword" },
                "type": { "type": "keyword" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },
                "indexed_at": { "type": "date" }
            }
        },
        "settings": settings()
    })
}

pub fn episode_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "series_id": { "type": "keyword" },
                "uploader_id": { "type": "keyword" },
                "title": title_field(),
                "description": { "type": "text", "analyzer": "standard" },
                "duration_seconds": { "type": "integer" },
                "publish_date": { "type": "date" },
                "transcript_url": { "type": "keyword" },
                "mime_type": { "type": "keyword" },
                "size_bytes": { "type": "long" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },
                "indexed_at": { "type": "date" }
            }
        },
        "settings": settings()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shard_without_replicas() {
        for mapping in [series_mapping(), episode_mapping()] {
            assert_eq!(mapping["settings"]["number_of_shards"], 1);
            assert_eq!(mapping["settings"]["number_of_replicas"], 0);
            assert_eq!(mapping["mappings"]["properties"]["title"]["fields"]["keyword"]["type"], "keyword");
        }
    }

    #[test]
    fn episode_mapping_has_numeric_fields() {
        let props = &episode_mapping()["mappings"]["properties"];
        assert_eq!(props["duration_seconds"]["type"], "integer");
        assert_eq!(props["size_bytes"]["type"], "long");
        assert_eq!(props["series_id"]["type"], "keyword");
    }
}

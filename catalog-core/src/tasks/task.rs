use crate::error::{CatalogError, Result};
use catalog_model::{Episode, EpisodeAsset, Series};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Broker-assigned identifier for an enqueued task.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of task types. The wire names are stable identifiers;
/// renaming one strands tasks already sitting in the broker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "search:index_series")]
    IndexSeries,
    #[serde(rename = "search:index_episode")]
    IndexEpisode,
    #[serde(rename = "search:delete_series")]
    DeleteSeries,
    #[serde(rename = "search:delete_episode")]
    DeleteEpisode,
    #[serde(rename = "import:content")]
    ImportContent,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::IndexSeries,
        TaskKind::IndexEpisode,
        TaskKind::DeleteSeries,
        TaskKind::DeleteEpisode,
        TaskKind::ImportContent,
    ];

    /// Kinds served by the search indexer.
    pub const INDEXING: [TaskKind; 4] = [
        TaskKind::IndexSeries,
        TaskKind::IndexEpisode,
        TaskKind::DeleteSeries,
        TaskKind::DeleteEpisode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::IndexSeries => "search:index_series",
            TaskKind::IndexEpisode => "search:index_episode",
            TaskKind::DeleteSeries => "search:delete_series",
            TaskKind::DeleteEpisode => "search:delete_episode",
            TaskKind::ImportContent => "import:content",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                CatalogError::InvalidPayload(format!("unknown task type {s:?}"))
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexSeriesPayload {
    pub series: Series,
}

/// Snapshot of an episode and the assets it had at enqueue time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEpisodePayload {
    pub episode: Episode,
    #[serde(default)]
    pub assets: Vec<EpisodeAsset>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSeriesPayload {
    pub series_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEpisodePayload {
    pub episode_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportContentPayload {
    pub source_type: String,
    pub source_url: String,
    pub series_id: String,
}

/// Typed payload per task kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskPayload {
    IndexSeries(IndexSeriesPayload),
    IndexEpisode(IndexEpisodePayload),
    DeleteSeries(DeleteSeriesPayload),
    DeleteEpisode(DeleteEpisodePayload),
    ImportContent(ImportContentPayload),
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::IndexSeries(_) => TaskKind::IndexSeries,
            TaskPayload::IndexEpisode(_) => TaskKind::IndexEpisode,
            TaskPayload::DeleteSeries(_) => TaskKind::DeleteSeries,
            TaskPayload::DeleteEpisode(_) => TaskKind::DeleteEpisode,
            TaskPayload::ImportContent(_) => TaskKind::ImportContent,
        }
    }

    /// Compact JSON body of the payload, without the kind tag.
    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            TaskPayload::IndexSeries(p) => serde_json::to_string(p),
            TaskPayload::IndexEpisode(p) => serde_json::to_string(p),
            TaskPayload::DeleteSeries(p) => serde_json::to_string(p),
            TaskPayload::DeleteEpisode(p) => serde_json::to_string(p),
            TaskPayload::ImportContent(p) => serde_json::to_string(p),
        };
        Ok(encoded?)
    }

    pub fn decode(kind: TaskKind, body: &str) -> Result<Self> {
        Ok(match kind {
            TaskKind::IndexSeries => TaskPayload::IndexSeries(parse(kind, body)?),
            TaskKind::IndexEpisode => {
                TaskPayload::IndexEpisode(parse(kind, body)?)
            }
            TaskKind::DeleteSeries => {
                TaskPayload::DeleteSeries(parse(kind, body)?)
            }
            TaskKind::DeleteEpisode => {
                TaskPayload::DeleteEpisode(parse(kind, body)?)
            }
            TaskKind::ImportContent => {
                TaskPayload::ImportContent(parse(kind, body)?)
            }
        })
    }

    /// Identifier of the entity the task targets, for log context.
    pub fn subject(&self) -> String {
        match self {
            TaskPayload::IndexSeries(p) => p.series.id.to_string(),
            TaskPayload::IndexEpisode(p) => p.episode.id.to_string(),
            TaskPayload::DeleteSeries(p) => p.series_id.clone(),
            TaskPayload::DeleteEpisode(p) => p.episode_id.clone(),
            TaskPayload::ImportContent(p) => p.series_id.clone(),
        }
    }
}

fn parse<T: DeserializeOwned>(kind: TaskKind, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| {
        CatalogError::InvalidPayload(format!("{kind}: {err}"))
    })
}

/// Envelope stored by the broker: `{id, type, payload}` plus delivery
/// bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub payload: String,
    /// Number of failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TaskMessage {
    pub fn new(payload: &TaskPayload) -> Result<Self> {
        Ok(Self {
            id: TaskId::new(),
            kind: payload.kind(),
            payload: payload.encode()?,
            attempts: 0,
            enqueued_at: Utc::now(),
            last_error: None,
        })
    }

    pub fn decode(&self) -> Result<TaskPayload> {
        TaskPayload::decode(self.kind, &self.payload)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| {
            CatalogError::InvalidPayload(format!("task envelope: {err}"))
        })
    }
}

/// Receipt returned to producers once a task is durably stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub kind: TaskKind,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn from_message(message: &TaskMessage) -> Self {
        Self {
            id: message.id,
            kind: message.kind,
            enqueued_at: message.enqueued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_are_stable() {
        let names: Vec<&str> = TaskKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "search:index_series",
                "search:index_episode",
                "search:delete_series",
                "search:delete_episode",
                "import:content",
            ]
        );
        for kind in TaskKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), kind);
        }
    }

    #[test]
    fn payload_body_is_compact_json_without_tag() {
        let payload = TaskPayload::DeleteEpisode(DeleteEpisodePayload {
            episode_id: "e-1".into(),
        });
        assert_eq!(payload.encode().unwrap(), r#"{"episode_id":"e-1"}"#);
    }

    #[test]
    fn malformed_body_is_a_payload_error() {
        let err = TaskPayload::decode(TaskKind::ImportContent, r#"{"source_type":1}"#)
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPayload(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn envelope_uses_type_field() {
        let message = TaskMessage::new(&TaskPayload::DeleteSeries(
            DeleteSeriesPayload {
                series_id: "s-1".into(),
            },
        ))
        .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "search:delete_series");
        assert_eq!(value["payload"], r#"{"series_id":"s-1"}"#);
        assert_eq!(value["attempts"], 0);
    }

    #[test]
    fn unknown_type_in_envelope_is_rejected() {
        let raw = r#"{"id":"0192b7a0-0000-7000-8000-000000000000","type":"search:reindex_all","payload":"{}","enqueued_at":"2024-01-01T00:00:00Z"}"#;
        assert!(TaskMessage::from_json(raw).is_err());
    }
}

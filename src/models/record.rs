//! Record types: local records, remote records, and their wire shapes.
//!
//! K_i: A local `FeedbackRecord` has no server id. A `RemoteFeedbackRecord`
//! always does, which is what makes update and delete possible.
//! K_i: The server speaks question ids, users speak question names. The
//! mapping happens only in `to_server_payload` / `from_server`.

use super::{FeedbackError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Status of a single annotator response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Draft,
    Submitted,
    Discarded,
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSchema {
    pub value: Value,
}

/// One annotator's responses to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Question name → answer
    #[serde(default)]
    pub values: BTreeMap<String, ValueSchema>,
    pub status: ResponseStatus,
}

impl ResponseSchema {
    pub fn submitted<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            user_id: None,
            values: values
                .into_iter()
                .map(|(k, value)| (k.into(), ValueSchema { value }))
                .collect(),
            status: ResponseStatus::Submitted,
        }
    }
}

/// Model or heuristic suggestion for a question, keyed by question name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSchema {
    pub question_name: String,
    pub value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Result of unifying several responses to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedValue {
    pub value: Value,
    pub strategy: String,
}

/// A record that lives only in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Field name → text
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<ResponseSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<SuggestionSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Question name → unified answer, filled by `unify_responses`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unified_responses: BTreeMap<String, UnifiedValue>,
}

impl FeedbackRecord {
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_response(mut self, response: ResponseSchema) -> Self {
        self.responses.push(response);
        self
    }

    pub fn with_suggestion(mut self, suggestion: SuggestionSchema) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Build a record from a raw JSON mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| FeedbackError::validation(format!("Invalid record mapping: {e}")))
    }

    /// Payload for `POST /datasets/{id}/records`.
    pub fn to_server_payload(
        &self,
        question_name_to_id: &HashMap<String, Uuid>,
    ) -> Result<RecordPayload> {
        Ok(RecordPayload {
            fields: self.fields.clone(),
            metadata: (!self.metadata.is_empty()).then(|| self.metadata.clone()),
            external_id: self.external_id.clone(),
            responses: self.responses.clone(),
            suggestions: suggestions_payload(&self.suggestions, question_name_to_id)?,
        })
    }
}

fn suggestions_payload(
    suggestions: &[SuggestionSchema],
    question_name_to_id: &HashMap<String, Uuid>,
) -> Result<Vec<SuggestionPayload>> {
    suggestions
        .iter()
        .map(|s| {
            let question_id = question_name_to_id.get(&s.question_name).ok_or_else(|| {
                FeedbackError::validation(format!(
                    "Suggestion references unknown question `{}`",
                    s.question_name
                ))
            })?;
            Ok(SuggestionPayload {
                question_id: *question_id,
                value: s.value.clone(),
                kind: s.kind.clone(),
                score: s.score,
                agent: s.agent.clone(),
            })
        })
        .collect()
}

/// A record fetched from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFeedbackRecord {
    pub id: Uuid,
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub responses: Vec<ResponseSchema>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionSchema>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteFeedbackRecord {
    /// Resolve a wire record, turning suggestion question ids into names.
    pub fn from_server(
        record: ServerRecord,
        question_id_to_name: &HashMap<Uuid, String>,
    ) -> Result<Self> {
        let suggestions = record
            .suggestions
            .into_iter()
            .map(|s| {
                let question_name = question_id_to_name.get(&s.question_id).ok_or_else(|| {
                    FeedbackError::ParseError(format!(
                        "Record {} has a suggestion for unknown question {}",
                        record.id, s.question_id
                    ))
                })?;
                Ok(SuggestionSchema {
                    question_name: question_name.clone(),
                    value: s.value,
                    kind: s.kind,
                    score: s.score,
                    agent: s.agent,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: record.id,
            fields: record.fields,
            metadata: record.metadata.unwrap_or_default(),
            responses: record
                .responses
                .into_iter()
                .map(|r| ResponseSchema {
                    user_id: r.user_id,
                    values: r.values.unwrap_or_default(),
                    status: r.status,
                })
                .collect(),
            suggestions,
            external_id: record.external_id,
            inserted_at: record.inserted_at,
            updated_at: record.updated_at,
        })
    }

    /// Payload for `PATCH /datasets/{id}/records`.
    pub fn to_server_payload(
        &self,
        question_name_to_id: &HashMap<String, Uuid>,
    ) -> Result<RecordUpdatePayload> {
        Ok(RecordUpdatePayload {
            id: self.id,
            metadata: self.metadata.clone(),
            suggestions: suggestions_payload(&self.suggestions, question_name_to_id)?,
        })
    }

    /// Drop the server identity.
    pub fn to_local(&self) -> FeedbackRecord {
        FeedbackRecord {
            fields: self.fields.clone(),
            metadata: self.metadata.clone(),
            responses: self.responses.clone(),
            suggestions: self.suggestions.clone(),
            external_id: self.external_id.clone(),
            unified_responses: BTreeMap::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionPayload {
    pub question_id: Uuid,
    pub value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// New record as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPayload {
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub responses: Vec<ResponseSchema>,
    pub suggestions: Vec<SuggestionPayload>,
}

/// Existing record update as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdatePayload {
    pub id: Uuid,
    pub metadata: Map<String, Value>,
    pub suggestions: Vec<SuggestionPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub values: Option<BTreeMap<String, ValueSchema>>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSuggestion {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub question_id: Uuid,
    pub value: Value,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub agent: Option<String>,
}

/// Record as returned by `GET /datasets/{id}/records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: Uuid,
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub responses: Vec<ServerResponse>,
    #[serde(default)]
    pub suggestions: Vec<ServerSuggestion>,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of records plus the total matching the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsPage {
    pub items: Vec<ServerRecord>,
    pub total: usize,
}

//! The remote API surface the dataset layer consumes.
//!
//! Epistemic foundation:
//! - K_i: Every remote effect goes through `FeedbackApi`, so the dataset layer
//!   never touches HTTP directly and can be driven by an in-memory double
//! - B_i: Each call may fail → `Result<_, ApiError>`
//! - I^B: Timeouts, retries and backoff belong to the implementation

use crate::models::{
    ApiError, MetadataProperty, RecordPayload, RecordUpdatePayload, RecordsPage, RemoteField,
    RemoteMetadataProperty, RemoteQuestion, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dataset identity as returned by `GET /api/v1/datasets/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetModel {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub guidelines: Option<String>,
    #[serde(default = "default_true")]
    pub allow_extra_metadata: bool,
    pub workspace_id: Uuid,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Workspace a dataset belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
}

impl std::fmt::Display for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Workspace(id={}, name={})", self.id, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsMetrics {
    pub count: usize,
}

/// Response of `GET /api/v1/datasets/{id}/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetrics {
    pub records: RecordsMetrics,
}

/// Mutable attributes of an existing metadata property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPropertyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub visible_for_annotators: bool,
}

/// Parameters of one page query against the records endpoint.
///
/// K_i: `None` means "do not send the key at all", which the server treats
/// differently from an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordsQuery {
    pub offset: usize,
    pub limit: usize,
    pub response_status: Option<Vec<String>>,
    pub metadata_filters: Option<Vec<String>>,
    pub sort_by: Option<Vec<String>>,
}

impl RecordsQuery {
    /// Query pairs in wire order; list parameters repeat their key.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("include", "responses".to_string()),
            ("include", "suggestions".to_string()),
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ];
        let lists = [
            ("response_status", &self.response_status),
            ("metadata", &self.metadata_filters),
            ("sort_by", &self.sort_by),
        ];
        for (key, values) in lists {
            if let Some(values) = values {
                pairs.extend(values.iter().map(|v| (key, v.clone())));
            }
        }
        pairs
    }
}

/// Remote operations on feedback datasets.
#[async_trait]
pub trait FeedbackApi: Send + Sync {
    /// Base URL of the server, used to build dataset links.
    fn base_url(&self) -> &str;

    /// User behind the credentials, resolved when the client connected.
    fn current_user(&self) -> &User;

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<DatasetModel, ApiError>;

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Workspace, ApiError>;

    async fn list_fields(&self, dataset_id: Uuid) -> Result<Vec<RemoteField>, ApiError>;

    async fn list_questions(&self, dataset_id: Uuid) -> Result<Vec<RemoteQuestion>, ApiError>;

    async fn get_metrics(&self, dataset_id: Uuid) -> Result<DatasetMetrics, ApiError>;

    async fn get_records(
        &self,
        dataset_id: Uuid,
        query: &RecordsQuery,
    ) -> Result<RecordsPage, ApiError>;

    async fn add_records(
        &self,
        dataset_id: Uuid,
        records: Vec<RecordPayload>,
    ) -> Result<(), ApiError>;

    async fn update_records(
        &self,
        dataset_id: Uuid,
        records: Vec<RecordUpdatePayload>,
    ) -> Result<(), ApiError>;

    async fn delete_records(&self, dataset_id: Uuid, record_ids: Vec<Uuid>) -> Result<(), ApiError>;

    async fn list_metadata_properties(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<RemoteMetadataProperty>, ApiError>;

    async fn add_metadata_property(
        &self,
        dataset_id: Uuid,
        property: &MetadataProperty,
    ) -> Result<RemoteMetadataProperty, ApiError>;

    async fn update_metadata_property(
        &self,
        property_id: Uuid,
        update: &MetadataPropertyUpdate,
    ) -> Result<RemoteMetadataProperty, ApiError>;

    async fn delete_metadata_property(
        &self,
        property_id: Uuid,
    ) -> Result<RemoteMetadataProperty, ApiError>;

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_skip_absent_lists() {
        let query = RecordsQuery {
            offset: 10,
            limit: 0,
            ..Default::default()
        };
        let pairs = query.to_query_pairs();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.contains(&("limit", "0".to_string())));
    }

    #[test]
    fn test_query_pairs_repeat_list_keys() {
        let query = RecordsQuery {
            offset: 0,
            limit: 50,
            response_status: Some(vec!["submitted".into(), "draft".into()]),
            metadata_filters: Some(vec!["genre:rock".into()]),
            sort_by: Some(vec!["inserted_at:desc".into()]),
        };
        let status: Vec<_> = query
            .to_query_pairs()
            .into_iter()
            .filter(|(k, _)| *k == "response_status")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(status, vec!["submitted", "draft"]);
        assert!(query.to_query_pairs().contains(&("metadata", "genre:rock".to_string())));
    }
}

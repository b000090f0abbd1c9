// tests/common/mod.rs
#![allow(dead_code)]

use argilla_remote::client::{
    DatasetMetrics, DatasetModel, FeedbackApi, MetadataPropertyUpdate, RecordsMetrics,
    RecordsQuery, Workspace,
};
use argilla_remote::models::{
    ApiError, BatchConfig, Field, MetadataProperty, Question, RecordPayload, RecordUpdatePayload,
    RecordsPage, RemoteField, RemoteMetadataProperty, RemoteQuestion, ResponseStatus,
    ServerRecord, ServerResponse, User, UserRole,
};
use argilla_remote::RemoteFeedbackDataset;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use uuid::Uuid;

/// One call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetDataset,
    GetWorkspace,
    ListFields,
    ListQuestions,
    GetMetrics,
    GetRecords(RecordsQuery),
    AddRecords(Vec<RecordPayload>),
    UpdateRecords(Vec<RecordUpdatePayload>),
    DeleteRecords(Vec<Uuid>),
    ListMetadataProperties,
    AddMetadataProperty(String),
    UpdateMetadataProperty(Uuid, MetadataPropertyUpdate),
    DeleteMetadataProperty(Uuid),
    DeleteDataset,
}

impl Call {
    fn op(&self) -> &'static str {
        match self {
            Call::GetDataset => "get_dataset",
            Call::GetWorkspace => "get_workspace",
            Call::ListFields => "list_fields",
            Call::ListQuestions => "list_questions",
            Call::GetMetrics => "get_metrics",
            Call::GetRecords(_) => "get_records",
            Call::AddRecords(_) => "add_records",
            Call::UpdateRecords(_) => "update_records",
            Call::DeleteRecords(_) => "delete_records",
            Call::ListMetadataProperties => "list_metadata_properties",
            Call::AddMetadataProperty(_) => "add_metadata_property",
            Call::UpdateMetadataProperty(..) => "update_metadata_property",
            Call::DeleteMetadataProperty(_) => "delete_metadata_property",
            Call::DeleteDataset => "delete_dataset",
        }
    }
}

#[derive(Default)]
struct MockState {
    records: Vec<ServerRecord>,
    metadata_properties: Vec<RemoteMetadataProperty>,
    calls: Vec<Call>,
    counts: HashMap<&'static str, usize>,
    /// op → 1-based call number that fails
    failures: HashMap<&'static str, usize>,
}

/// In-memory Argilla server for a single dataset.
pub struct MockApi {
    user: User,
    pub dataset_id: Uuid,
    pub workspace_id: Uuid,
    fields: Vec<RemoteField>,
    questions: Vec<RemoteQuestion>,
    state: Mutex<MockState>,
}

impl MockApi {
    /// Dataset with a `text` field, a `sentiment` label question and a
    /// `quality` rating question.
    pub fn new(role: UserRole) -> Self {
        Self {
            user: User {
                id: Uuid::new_v4(),
                username: "tester".into(),
                role,
            },
            dataset_id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            fields: vec![RemoteField {
                id: Uuid::new_v4(),
                field: Field::text("text"),
            }],
            questions: vec![
                RemoteQuestion {
                    id: Uuid::new_v4(),
                    question: Question::label("sentiment", ["positive", "negative"]),
                },
                RemoteQuestion {
                    id: Uuid::new_v4(),
                    question: Question::rating("quality", 1..=5),
                },
            ],
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn owner() -> Self {
        Self::new(UserRole::Owner)
    }

    pub fn with_records(self, n: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let start = state.records.len();
            state.records.extend((start..start + n).map(server_record));
        }
        self
    }

    /// Append `n` records that carry one response with `status`.
    pub fn with_answered_records(self, n: usize, status: ResponseStatus) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let start = state.records.len();
            state.records.extend((start..start + n).map(|i| {
                let mut record = server_record(i);
                record.responses.push(ServerResponse {
                    id: None,
                    values: None,
                    status,
                    user_id: None,
                });
                record
            }));
        }
        self
    }

    pub fn with_metadata_property(self, property: MetadataProperty) -> Self {
        self.state.lock().unwrap().metadata_properties.push(RemoteMetadataProperty {
            id: Uuid::new_v4(),
            property,
        });
        self
    }

    /// Make the `nth` (1-based) call of `op` fail with a 500.
    pub fn fail_on(self, op: &'static str, nth: usize) -> Self {
        self.state.lock().unwrap().failures.insert(op, nth);
        self
    }

    pub fn question_id(&self, name: &str) -> Uuid {
        self.questions
            .iter()
            .find(|q| q.name() == name)
            .map(|q| q.id)
            .unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op() == op).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn metadata_property_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .metadata_properties
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        let count = {
            let count = state.counts.entry(op).or_insert(0);
            *count += 1;
            *count
        };
        state.calls.push(call);
        if state.failures.get(op) == Some(&count) {
            return Err(ApiError::Status {
                status: 500,
                detail: format!("{op} failed"),
            });
        }
        Ok(())
    }
}

pub fn server_record(i: usize) -> ServerRecord {
    ServerRecord {
        id: Uuid::new_v4(),
        fields: BTreeMap::from([("text".to_string(), format!("record {i}"))]),
        metadata: None,
        external_id: Some(format!("ext-{i}")),
        responses: Vec::new(),
        suggestions: Vec::new(),
        inserted_at: Some(Utc::now()),
        updated_at: None,
    }
}

fn matches_status(record: &ServerRecord, statuses: &[String]) -> bool {
    statuses.iter().any(|status| match status.as_str() {
        "pending" => record.responses.is_empty(),
        other => record.responses.iter().any(|r| {
            let name = match r.status {
                ResponseStatus::Draft => "draft",
                ResponseStatus::Submitted => "submitted",
                ResponseStatus::Discarded => "discarded",
            };
            name == other
        }),
    })
}

#[async_trait]
impl FeedbackApi for MockApi {
    fn base_url(&self) -> &str {
        "http://localhost:6900"
    }

    fn current_user(&self) -> &User {
        &self.user
    }

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<DatasetModel, ApiError> {
        self.record(Call::GetDataset)?;
        if dataset_id != self.dataset_id {
            return Err(ApiError::NotFound(format!("dataset {dataset_id}")));
        }
        Ok(DatasetModel {
            id: self.dataset_id,
            name: "feedback".into(),
            guidelines: Some("Label the sentiment".into()),
            allow_extra_metadata: true,
            workspace_id: self.workspace_id,
            inserted_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Workspace, ApiError> {
        self.record(Call::GetWorkspace)?;
        Ok(Workspace {
            id: workspace_id,
            name: "admin".into(),
        })
    }

    async fn list_fields(&self, _dataset_id: Uuid) -> Result<Vec<RemoteField>, ApiError> {
        self.record(Call::ListFields)?;
        Ok(self.fields.clone())
    }

    async fn list_questions(&self, _dataset_id: Uuid) -> Result<Vec<RemoteQuestion>, ApiError> {
        self.record(Call::ListQuestions)?;
        Ok(self.questions.clone())
    }

    async fn get_metrics(&self, _dataset_id: Uuid) -> Result<DatasetMetrics, ApiError> {
        self.record(Call::GetMetrics)?;
        Ok(DatasetMetrics {
            records: RecordsMetrics {
                count: self.record_count(),
            },
        })
    }

    async fn get_records(
        &self,
        _dataset_id: Uuid,
        query: &RecordsQuery,
    ) -> Result<RecordsPage, ApiError> {
        self.record(Call::GetRecords(query.clone()))?;
        let state = self.state.lock().unwrap();
        let matching: Vec<&ServerRecord> = state
            .records
            .iter()
            .filter(|r| {
                query
                    .response_status
                    .as_ref()
                    .is_none_or(|statuses| matches_status(r, statuses))
            })
            .collect();
        Ok(RecordsPage {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect(),
        })
    }

    async fn add_records(
        &self,
        _dataset_id: Uuid,
        records: Vec<RecordPayload>,
    ) -> Result<(), ApiError> {
        self.record(Call::AddRecords(records.clone()))?;
        let mut state = self.state.lock().unwrap();
        state.records.extend(records.into_iter().map(|payload| ServerRecord {
            id: Uuid::new_v4(),
            fields: payload.fields,
            metadata: payload.metadata,
            external_id: payload.external_id,
            responses: Vec::new(),
            suggestions: Vec::new(),
            inserted_at: Some(Utc::now()),
            updated_at: None,
        }));
        Ok(())
    }

    async fn update_records(
        &self,
        _dataset_id: Uuid,
        records: Vec<RecordUpdatePayload>,
    ) -> Result<(), ApiError> {
        self.record(Call::UpdateRecords(records.clone()))?;
        let mut state = self.state.lock().unwrap();
        for update in records {
            if let Some(record) = state.records.iter_mut().find(|r| r.id == update.id) {
                record.metadata = Some(update.metadata);
            }
        }
        Ok(())
    }

    async fn delete_records(
        &self,
        _dataset_id: Uuid,
        record_ids: Vec<Uuid>,
    ) -> Result<(), ApiError> {
        self.record(Call::DeleteRecords(record_ids.clone()))?;
        self.state
            .lock()
            .unwrap()
            .records
            .retain(|r| !record_ids.contains(&r.id));
        Ok(())
    }

    async fn list_metadata_properties(
        &self,
        _dataset_id: Uuid,
    ) -> Result<Vec<RemoteMetadataProperty>, ApiError> {
        self.record(Call::ListMetadataProperties)?;
        Ok(self.state.lock().unwrap().metadata_properties.clone())
    }

    async fn add_metadata_property(
        &self,
        _dataset_id: Uuid,
        property: &MetadataProperty,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.record(Call::AddMetadataProperty(property.name.clone()))?;
        let remote = RemoteMetadataProperty {
            id: Uuid::new_v4(),
            property: property.clone(),
        };
        self.state.lock().unwrap().metadata_properties.push(remote.clone());
        Ok(remote)
    }

    async fn update_metadata_property(
        &self,
        property_id: Uuid,
        update: &MetadataPropertyUpdate,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.record(Call::UpdateMetadataProperty(property_id, update.clone()))?;
        let mut state = self.state.lock().unwrap();
        let property = state
            .metadata_properties
            .iter_mut()
            .find(|p| p.id == property_id)
            .ok_or_else(|| ApiError::NotFound(format!("metadata property {property_id}")))?;
        property.property.title = update.title.clone();
        property.property.visible_for_annotators = update.visible_for_annotators;
        Ok(property.clone())
    }

    async fn delete_metadata_property(
        &self,
        property_id: Uuid,
    ) -> Result<RemoteMetadataProperty, ApiError> {
        self.record(Call::DeleteMetadataProperty(property_id))?;
        let mut state = self.state.lock().unwrap();
        let index = state
            .metadata_properties
            .iter()
            .position(|p| p.id == property_id)
            .ok_or_else(|| ApiError::NotFound(format!("metadata property {property_id}")))?;
        Ok(state.metadata_properties.remove(index))
    }

    async fn delete_dataset(&self, _dataset_id: Uuid) -> Result<(), ApiError> {
        self.record(Call::DeleteDataset)
    }
}

/// Connect a dataset to `api` and forget the calls made while loading it.
pub async fn dataset(api: &Arc<MockApi>, batching: BatchConfig) -> RemoteFeedbackDataset {
    let dyn_api: Arc<dyn FeedbackApi> = api.clone();
    let dataset = RemoteFeedbackDataset::from_server(dyn_api, api.dataset_id, batching)
        .await
        .unwrap();
    api.clear_calls();
    dataset
}

pub fn batching(push: usize, delete: usize, fetch: usize) -> BatchConfig {
    BatchConfig {
        push_batch_size: push,
        delete_batch_size: delete,
        fetch_page_size: fetch,
    }
}

/// Counts WARN events seen while its guard is alive.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Install a thread-local subscriber that counts warnings.
pub fn count_warnings() -> (WarnCounter, DefaultGuard) {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}

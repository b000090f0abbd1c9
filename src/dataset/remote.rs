//! Dataset facade over a server-hosted feedback dataset.
//!
//! Epistemic foundation:
//! - K_i: Identity and schema are loaded once by `from_server` and shared,
//!   read-only, by every copy of the dataset
//! - K_i: Filtering and sorting produce a new dataset; the original keeps its view
//! - B_i: Metadata properties can change server-side → always fetched live
//! - I^B: Operations the server cannot do are run on a pulled local copy,
//!   announced with a warning

use crate::client::{FeedbackApi, MetadataPropertyUpdate, Workspace, auth};
use crate::dataset::export::HubExporter;
use crate::dataset::local::FeedbackDataset;
use crate::dataset::records::{RecordsCursor, RecordsOverrides, RemoteFeedbackRecords};
use crate::dataset::training::{TrainingData, TrainingTask};
use crate::dataset::unification::UnificationStrategy;
use crate::dataset::validation::RecordsInput;
use crate::models::{
    BatchConfig, Config, FeedbackError, MetadataFilter, MetadataProperty, OneOrMany,
    RemoteFeedbackRecord, RemoteField, RemoteMetadataProperty, RemoteQuestion,
    ResponseStatusFilter, Result, SortBy,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity, schema and transport shared by a dataset and all its copies.
pub(crate) struct DatasetCore {
    pub(crate) api: Arc<dyn FeedbackApi>,
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) workspace: Workspace,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) fields: Vec<RemoteField>,
    pub(crate) questions: Vec<RemoteQuestion>,
    pub(crate) guidelines: Option<String>,
    pub(crate) allow_extra_metadata: bool,
    pub(crate) batching: BatchConfig,
    pub(crate) show_progress: bool,
}

impl DatasetCore {
    pub(crate) fn question_id_to_name(&self) -> HashMap<Uuid, String> {
        self.questions
            .iter()
            .map(|q| (q.id, q.name().to_string()))
            .collect()
    }

    pub(crate) fn question_name_to_id(&self) -> HashMap<String, Uuid> {
        self.questions
            .iter()
            .map(|q| (q.name().to_string(), q.id))
            .collect()
    }
}

/// A feedback dataset whose records live on the server.
#[derive(Clone)]
pub struct RemoteFeedbackDataset {
    core: Arc<DatasetCore>,
    records: RemoteFeedbackRecords,
}

impl std::fmt::Debug for RemoteFeedbackDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFeedbackDataset")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("records", &self.records)
            .finish()
    }
}

impl RemoteFeedbackDataset {
    /// Load dataset `id` from the server behind `api`, with progress bars enabled.
    pub async fn from_server(
        api: Arc<dyn FeedbackApi>,
        id: Uuid,
        batching: BatchConfig,
    ) -> Result<Self> {
        Self::load(api, id, batching, true).await
    }

    /// Load dataset `id` using the `[batching]` and `[output]` sections of `config`.
    pub async fn from_config(api: Arc<dyn FeedbackApi>, id: Uuid, config: &Config) -> Result<Self> {
        Self::load(api, id, config.batching, config.output.show_progress).await
    }

    async fn load(
        api: Arc<dyn FeedbackApi>,
        id: Uuid,
        batching: BatchConfig,
        show_progress: bool,
    ) -> Result<Self> {
        batching.validate()?;

        let model = api.get_dataset(id).await.map_err(|e| {
            FeedbackError::remote(format!("Failed while fetching dataset {id} from Argilla"), e)
        })?;
        let workspace_id = model.workspace_id;
        let workspace = api.get_workspace(workspace_id).await.map_err(|e| {
            FeedbackError::remote(format!("Failed while fetching workspace {workspace_id}"), e)
        })?;
        let fields = api
            .list_fields(id)
            .await
            .map_err(|e| FeedbackError::remote("Failed while fetching the dataset fields", e))?;
        let questions = api
            .list_questions(id)
            .await
            .map_err(|e| FeedbackError::remote("Failed while fetching the dataset questions", e))?;

        debug!(
            dataset_id = %id,
            fields = fields.len(),
            questions = questions.len(),
            "Loaded remote dataset"
        );

        let core = Arc::new(DatasetCore {
            api,
            id,
            name: model.name,
            workspace,
            created_at: model.inserted_at,
            updated_at: model.updated_at,
            fields,
            questions,
            guidelines: model.guidelines,
            allow_extra_metadata: model.allow_extra_metadata,
            batching,
            show_progress,
        });
        let records = RemoteFeedbackRecords::unfiltered(Arc::clone(&core));
        Ok(Self { core, records })
    }

    /// Copy sharing identity and schema, still exposing this dataset's view.
    fn create_from_dataset(&self) -> Self {
        self.clone()
    }

    fn with_records(mut self, records: RemoteFeedbackRecords) -> Self {
        self.records = records;
        self
    }

    pub(crate) fn core(&self) -> &Arc<DatasetCore> {
        &self.core
    }

    /// Whether bulk writes may draw progress bars at all.
    pub fn shows_progress(&self) -> bool {
        self.core.show_progress
    }

    pub fn batching(&self) -> BatchConfig {
        self.core.batching
    }

    fn api(&self) -> &dyn FeedbackApi {
        self.core.api.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identity and schema
    // ─────────────────────────────────────────────────────────────────────

    /// The current records view.
    pub fn records(&self) -> &RemoteFeedbackRecords {
        &self.records
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn workspace(&self) -> &Workspace {
        &self.core.workspace
    }

    /// Annotation UI link for this dataset.
    pub fn url(&self) -> String {
        format!(
            "{}/dataset/{}/annotation-mode",
            self.api().base_url().trim_end_matches('/'),
            self.core.id
        )
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.core.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.core.updated_at
    }

    pub fn fields(&self) -> &[RemoteField] {
        &self.core.fields
    }

    pub fn questions(&self) -> &[RemoteQuestion] {
        &self.core.questions
    }

    pub fn question_by_name(&self, name: &str) -> Option<&RemoteQuestion> {
        self.core.questions.iter().find(|q| q.name() == name)
    }

    pub fn guidelines(&self) -> Option<&str> {
        self.core.guidelines.as_deref()
    }

    pub fn allow_extra_metadata(&self) -> bool {
        self.core.allow_extra_metadata
    }

    pub fn question_id_to_name(&self) -> HashMap<Uuid, String> {
        self.core.question_id_to_name()
    }

    pub fn question_name_to_id(&self) -> HashMap<String, Uuid> {
        self.core.question_name_to_id()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Collection access, forwarded to the records view
    // ─────────────────────────────────────────────────────────────────────

    pub async fn len(&self) -> Result<usize> {
        self.records.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.records.is_empty().await
    }

    pub async fn get(&self, index: usize) -> Result<Option<RemoteFeedbackRecord>> {
        self.records.get(index).await
    }

    pub async fn slice(&self, range: Range<usize>) -> Result<Vec<RemoteFeedbackRecord>> {
        self.records.slice(range).await
    }

    pub fn cursor(&self) -> RecordsCursor {
        self.records.cursor()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Filter and sort
    // ─────────────────────────────────────────────────────────────────────

    /// New dataset whose view is sorted by `sort`; filters carry over.
    pub async fn sort_by(&self, sort: Vec<SortBy>) -> Result<Self> {
        let new_dataset = self.create_from_dataset();
        let overrides = RecordsOverrides {
            sort_by: (!sort.is_empty()).then_some(sort),
            ..Default::default()
        };
        let records = RemoteFeedbackRecords::derive(&new_dataset, overrides).await?;
        Ok(new_dataset.with_records(records))
    }

    /// New dataset whose view keeps only matching records; the sort carries
    /// over, and an empty argument keeps the filters already on that axis.
    pub async fn filter_by(
        &self,
        response_status: Vec<ResponseStatusFilter>,
        metadata_filters: Vec<MetadataFilter>,
    ) -> Result<Self> {
        if response_status.is_empty() && metadata_filters.is_empty() {
            return Err(FeedbackError::validation(
                "At least one of `response_status` or `metadata_filters` must be provided",
            ));
        }

        let new_dataset = self.create_from_dataset();
        let overrides = RecordsOverrides {
            response_status: (!response_status.is_empty()).then_some(response_status),
            metadata_filters: (!metadata_filters.is_empty()).then_some(metadata_filters),
            sort_by: None,
        };
        let records = RemoteFeedbackRecords::derive(&new_dataset, overrides).await?;
        Ok(new_dataset.with_records(records))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Record writes
    // ─────────────────────────────────────────────────────────────────────

    pub async fn add_records(
        &self,
        records: impl Into<RecordsInput>,
        show_progress: bool,
    ) -> Result<()> {
        self.records.add(records, show_progress).await
    }

    pub async fn update_records(
        &self,
        records: impl Into<OneOrMany<RemoteFeedbackRecord>>,
        show_progress: bool,
    ) -> Result<()> {
        self.records.update(records, show_progress).await
    }

    pub async fn delete_records(
        &self,
        records: impl Into<OneOrMany<RemoteFeedbackRecord>>,
    ) -> Result<()> {
        self.records.delete(&records.into().into_vec()).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local materialization
    // ─────────────────────────────────────────────────────────────────────

    /// Copy schema and up to `max_records` records (all when `None`) into a
    /// local dataset.
    pub async fn pull(&self, max_records: Option<usize>) -> Result<FeedbackDataset> {
        let metadata_properties = self
            .metadata_properties()
            .await?
            .iter()
            .map(RemoteMetadataProperty::to_local)
            .collect();

        let mut local = FeedbackDataset::new(
            self.core.fields.iter().map(RemoteField::to_local).collect(),
            self.core.questions.iter().map(RemoteQuestion::to_local).collect(),
        )?
        .with_metadata_properties(metadata_properties)?
        .with_guidelines(self.core.guidelines.clone())
        .with_allow_extra_metadata(self.core.allow_extra_metadata);

        let total = self.records.len().await?;
        if total == 0 {
            warn!(
                dataset_id = %self.core.id,
                "The dataset is empty, so no records will be added to the local instance"
            );
            return Ok(local);
        }

        let limit = max_records.filter(|&max| max > 0).unwrap_or(total);
        let records: Vec<_> = self
            .records
            .collect(Some(limit))
            .await?
            .iter()
            .map(RemoteFeedbackRecord::to_local)
            .collect();
        if !records.is_empty() {
            local.add_records(records)?;
        }

        info!(dataset_id = %self.core.id, records = local.len(), "Pulled dataset");
        Ok(local)
    }

    /// Pulls, then unifies responses on the local copy.
    pub async fn unify_responses(
        &self,
        question: &str,
        strategy: UnificationStrategy,
    ) -> Result<FeedbackDataset> {
        warn!(
            "A local `FeedbackDataset` is returned because `unify_responses` is not supported for \
             `RemoteFeedbackDataset`; `pull().unify_responses(..)` is applied"
        );
        let mut local = self.pull(None).await?;
        local.unify_responses(question, strategy)?;
        Ok(local)
    }

    /// Pulls, then prepares training data from the local copy.
    pub async fn prepare_for_training(
        &self,
        task: &TrainingTask,
        train_size: f64,
    ) -> Result<TrainingData> {
        warn!(
            "A local `FeedbackDataset` is used because `prepare_for_training` is not supported for \
             `RemoteFeedbackDataset`; `pull().prepare_for_training(..)` is applied"
        );
        let local = self.pull(None).await?;
        local.prepare_for_training(task, train_size)
    }

    /// Pulls, then pushes the local copy through `exporter`.
    pub async fn push_to_huggingface(
        &self,
        repo_id: &str,
        exporter: &dyn HubExporter,
        generate_card: bool,
    ) -> Result<()> {
        warn!(
            "The dataset is first pulled locally and pushed to Hugging Face after because \
             `push_to_huggingface` is not supported for `RemoteFeedbackDataset`"
        );
        let local = self.pull(None).await?;
        local.push_to_huggingface(repo_id, exporter, generate_card).await
    }

    /// Remote datasets are already on the server; nothing to push.
    pub fn push_to_argilla(&self) -> &Self {
        warn!(
            "Already pushed datasets cannot be pushed to Argilla again because they are synced \
             automatically"
        );
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Metadata properties
    // ─────────────────────────────────────────────────────────────────────

    /// Metadata properties as currently defined on the server.
    pub async fn metadata_properties(&self) -> Result<Vec<RemoteMetadataProperty>> {
        self.api()
            .list_metadata_properties(self.core.id)
            .await
            .map_err(|e| {
                FeedbackError::remote(
                    "Failed while fetching the metadata properties from Argilla",
                    e,
                )
            })
    }

    /// Add `property`, which must not share a name with an existing one.
    pub async fn add_metadata_property(
        &self,
        property: MetadataProperty,
    ) -> Result<RemoteMetadataProperty> {
        auth::require_elevated(self.api(), "add metadata property")?;

        let existing = self.metadata_properties().await?;
        if existing.iter().any(|p| p.name() == property.name) {
            return Err(FeedbackError::validation(format!(
                "Metadata property `{}` already exists in the dataset",
                property.name
            )));
        }

        let added = self
            .api()
            .add_metadata_property(self.core.id, &property)
            .await
            .map_err(|e| {
                FeedbackError::remote(
                    format!(
                        "Failed while adding the metadata property `{}` to the dataset in Argilla",
                        property.name
                    ),
                    e,
                )
            })?;
        info!(dataset_id = %self.core.id, property = %added.name(), "Added metadata property");
        Ok(added)
    }

    /// Push title and visibility of each property, one request per property.
    /// The first failure stops the rest.
    pub async fn update_metadata_properties(
        &self,
        properties: impl Into<OneOrMany<RemoteMetadataProperty>>,
    ) -> Result<()> {
        auth::require_elevated(self.api(), "update metadata properties")?;

        for property in properties.into().into_vec() {
            let update = MetadataPropertyUpdate {
                title: property.property.title.clone(),
                visible_for_annotators: property.property.visible_for_annotators,
            };
            self.api()
                .update_metadata_property(property.id, &update)
                .await
                .map_err(|e| {
                    FeedbackError::remote(
                        format!(
                            "Failed while updating the metadata property `{}` in Argilla",
                            property.name()
                        ),
                        e,
                    )
                })?;
            debug!(property = %property.name(), "Updated metadata property");
        }
        Ok(())
    }

    /// Delete properties by name.
    ///
    /// Every name is checked first; if any is unknown nothing is deleted.
    /// Returns `One` when exactly one property was deleted, `Many` otherwise.
    pub async fn delete_metadata_properties(
        &self,
        names: impl Into<OneOrMany<String>>,
    ) -> Result<OneOrMany<MetadataProperty>> {
        auth::require_elevated(self.api(), "delete metadata properties")?;

        let names = names.into().into_vec();
        if names.is_empty() {
            return Err(FeedbackError::validation("No metadata property names given"));
        }

        let existing = self.metadata_properties().await?;
        let existing_names: Vec<String> = existing.iter().map(|p| p.name().to_string()).collect();
        let mut unknown: Vec<String> = Vec::new();
        for name in &names {
            if !existing_names.contains(name) && !unknown.contains(name) {
                unknown.push(name.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(FeedbackError::UnknownMetadataNames {
                unknown,
                existing: existing_names,
            });
        }

        let mut deleted = Vec::new();
        for property in existing.iter().filter(|p| names.iter().any(|n| n == p.name())) {
            self.api()
                .delete_metadata_property(property.id)
                .await
                .map_err(|e| {
                    FeedbackError::remote(
                        format!(
                            "Failed while deleting the metadata property `{}` from Argilla",
                            property.name()
                        ),
                        e,
                    )
                })?;
            debug!(property = %property.name(), "Deleted metadata property");
            deleted.push(property.to_local());
        }

        Ok(OneOrMany::from_vec(deleted))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dataset lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Delete the dataset on the server.
    pub async fn delete(&self) -> Result<()> {
        auth::require_elevated(self.api(), "delete dataset")?;

        self.api().delete_dataset(self.core.id).await.map_err(|e| {
            FeedbackError::remote("Failed while deleting the `FeedbackDataset` from Argilla", e)
        })?;
        info!(dataset_id = %self.core.id, name = %self.core.name, "Deleted dataset");
        Ok(())
    }
}

impl std::fmt::Display for RemoteFeedbackDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.core.fields.iter().map(RemoteField::name).collect();
        let questions: Vec<&str> = self.core.questions.iter().map(RemoteQuestion::name).collect();
        writeln!(f, "RemoteFeedbackDataset(")?;
        writeln!(f, "   id={}", self.core.id)?;
        writeln!(f, "   name={}", self.core.name)?;
        writeln!(f, "   workspace={}", self.core.workspace)?;
        writeln!(f, "   url={}", self.url())?;
        writeln!(f, "   fields={fields:?}")?;
        writeln!(f, "   questions={questions:?}")?;
        writeln!(f, "   guidelines={}", self.core.guidelines.as_deref().unwrap_or("None"))?;
        write!(f, ")")
    }
}

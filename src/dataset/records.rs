//! Filtered, sorted, paginated view over the records of one remote dataset.
//!
//! Epistemic foundation:
//! - K_i: The server is the source of truth, nothing here caches records
//! - K_i: A view never changes after construction; a new filter or sort
//!   produces a new view
//! - K_i: Every metadata name a view references exists on the dataset,
//!   checked before the view is handed out
//! - B_i: Every remote call may fail → wrapped with the operation that made it
//! - I^B: Batches already sent stay sent when a later batch fails

use crate::client::{FeedbackApi, RecordsQuery, auth};
use crate::dataset::remote::{DatasetCore, RemoteFeedbackDataset};
use crate::dataset::validation::{self, RecordSchema, RecordsInput};
use crate::models::{
    FeedbackError, MetadataFilter, MetadataProperty, OneOrMany, RecordsPage, RemoteFeedbackRecord,
    ResponseStatusFilter, Result, SortBy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One parsed page of records.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub items: Vec<RemoteFeedbackRecord>,
    /// Records matching the view's filters, regardless of offset/limit
    pub total: usize,
}

/// Filter/sort values to layer onto an existing view.
///
/// `None` keeps whatever the view already has for that axis.
#[derive(Debug, Clone, Default)]
pub struct RecordsOverrides {
    pub response_status: Option<Vec<ResponseStatusFilter>>,
    pub metadata_filters: Option<Vec<MetadataFilter>>,
    pub sort_by: Option<Vec<SortBy>>,
}

/// Records of a remote dataset, as seen through a set of filters and a sort.
#[derive(Clone)]
pub struct RemoteFeedbackRecords {
    dataset: Arc<DatasetCore>,
    response_status: Vec<ResponseStatusFilter>,
    metadata_filters: Vec<MetadataFilter>,
    sort_by: Vec<SortBy>,
}

impl std::fmt::Debug for RemoteFeedbackRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFeedbackRecords")
            .field("dataset_id", &self.dataset.id)
            .field("response_status", &self.response_status)
            .field("metadata_filters", &self.metadata_filters)
            .field("sort_by", &self.sort_by)
            .finish()
    }
}

impl RemoteFeedbackRecords {
    /// View without filters or sort. Needs no validation and no I/O.
    pub(crate) fn unfiltered(dataset: Arc<DatasetCore>) -> Self {
        Self {
            dataset,
            response_status: Vec::new(),
            metadata_filters: Vec::new(),
            sort_by: Vec::new(),
        }
    }

    /// Build a view over `dataset` with the given filters and sort.
    ///
    /// Metadata names used by filters or `metadata.<name>` sort keys are
    /// checked against the dataset's live metadata properties first.
    pub async fn new(
        dataset: &RemoteFeedbackDataset,
        response_status: Vec<ResponseStatusFilter>,
        metadata_filters: Vec<MetadataFilter>,
        sort_by: Vec<SortBy>,
    ) -> Result<Self> {
        let mut unique_status: Vec<ResponseStatusFilter> =
            Vec::with_capacity(response_status.len());
        for status in response_status {
            if !unique_status.contains(&status) {
                unique_status.push(status);
            }
        }

        let records = Self {
            dataset: Arc::clone(dataset.core()),
            response_status: unique_status,
            metadata_filters,
            sort_by,
        };
        records.validate_metadata_names().await?;
        Ok(records)
    }

    /// New view bound to `new_dataset`, taking unspecified axes from the view
    /// `new_dataset` currently exposes.
    pub async fn derive(
        new_dataset: &RemoteFeedbackDataset,
        overrides: RecordsOverrides,
    ) -> Result<Self> {
        let current = new_dataset.records();
        Self::new(
            new_dataset,
            overrides
                .response_status
                .unwrap_or_else(|| current.response_status().to_vec()),
            overrides
                .metadata_filters
                .unwrap_or_else(|| current.metadata_filters().to_vec()),
            overrides.sort_by.unwrap_or_else(|| current.sort_by().to_vec()),
        )
        .await
    }

    pub fn dataset_id(&self) -> Uuid {
        self.dataset.id
    }

    pub fn response_status(&self) -> &[ResponseStatusFilter] {
        &self.response_status
    }

    pub fn metadata_filters(&self) -> &[MetadataFilter] {
        &self.metadata_filters
    }

    pub fn sort_by(&self) -> &[SortBy] {
        &self.sort_by
    }

    fn api(&self) -> &dyn FeedbackApi {
        self.dataset.api.as_ref()
    }

    /// Whether any response-status or metadata filter is active.
    pub fn has_filters(&self) -> bool {
        !self.response_status.is_empty() || !self.metadata_filters.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Query-string projections
    // ─────────────────────────────────────────────────────────────────────

    pub fn response_status_query_strings(&self) -> Option<Vec<String>> {
        (!self.response_status.is_empty())
            .then(|| self.response_status.iter().map(|s| s.as_str().to_string()).collect())
    }

    pub fn metadata_filters_query_strings(&self) -> Option<Vec<String>> {
        (!self.metadata_filters.is_empty())
            .then(|| self.metadata_filters.iter().map(MetadataFilter::query_string).collect())
    }

    pub fn sort_by_query_strings(&self) -> Option<Vec<String>> {
        (!self.sort_by.is_empty()).then(|| self.sort_by.iter().map(SortBy::query_string).collect())
    }

    fn query(&self, offset: usize, limit: usize) -> RecordsQuery {
        RecordsQuery {
            offset,
            limit,
            response_status: self.response_status_query_strings(),
            metadata_filters: self.metadata_filters_query_strings(),
            sort_by: self.sort_by_query_strings(),
        }
    }

    async fn validate_metadata_names(&self) -> Result<()> {
        let mut names: Vec<&str> = self.metadata_filters.iter().map(MetadataFilter::name).collect();
        names.extend(self.sort_by.iter().filter_map(SortBy::metadata_name));
        if names.is_empty() {
            return Ok(());
        }

        let existing: Vec<String> = self
            .api()
            .list_metadata_properties(self.dataset.id)
            .await
            .map_err(|e| {
                FeedbackError::remote(
                    "Failed while validating the metadata names against Argilla",
                    e,
                )
            })?
            .into_iter()
            .map(|p| p.property.name)
            .collect();

        let mut unknown: Vec<String> = Vec::new();
        for name in names {
            if !existing.iter().any(|e| e == name) && !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(FeedbackError::UnknownMetadataNames { unknown, existing })
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Number of records matching this view.
    ///
    /// Filtered views ask the records endpoint for an empty page and read its
    /// total; unfiltered views read the dataset metrics.
    pub async fn len(&self) -> Result<usize> {
        let result = if self.has_filters() {
            self.api()
                .get_records(self.dataset.id, &self.query(0, 0))
                .await
                .map(|page| page.total)
        } else {
            self.api()
                .get_metrics(self.dataset.id)
                .await
                .map(|metrics| metrics.records.count)
        };

        result.map_err(|e| {
            FeedbackError::remote(
                "Failed while getting the metrics from the current dataset in Argilla",
                e,
            )
        })
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Fetch one page. Every other read is built on this.
    pub async fn fetch_page(&self, offset: usize, limit: usize) -> Result<FetchedPage> {
        let RecordsPage { items, total } = self
            .api()
            .get_records(self.dataset.id, &self.query(offset, limit))
            .await
            .map_err(|e| FeedbackError::remote("Failed while fetching records from Argilla", e))?;

        debug!(
            dataset_id = %self.dataset.id,
            offset,
            limit,
            returned = items.len(),
            total,
            "Fetched records page"
        );

        let id_to_name = self.dataset.question_id_to_name();
        let items = items
            .into_iter()
            .map(|record| RemoteFeedbackRecord::from_server(record, &id_to_name))
            .collect::<Result<Vec<_>>>()?;

        Ok(FetchedPage { items, total })
    }

    /// Record at `index` in view order, if there is one.
    pub async fn get(&self, index: usize) -> Result<Option<RemoteFeedbackRecord>> {
        Ok(self.fetch_page(index, 1).await?.items.into_iter().next())
    }

    /// Records in `range`, fetched page by page. Stops early at the end of
    /// the view.
    pub async fn slice(&self, range: Range<usize>) -> Result<Vec<RemoteFeedbackRecord>> {
        let mut cursor = self.cursor().starting_at(range.start).take(range.len());
        cursor.collect().await
    }

    /// Every record in the view, or the first `max_records` of them.
    pub async fn collect(&self, max_records: Option<usize>) -> Result<Vec<RemoteFeedbackRecord>> {
        let mut cursor = self.cursor();
        if let Some(max) = max_records {
            cursor = cursor.take(max);
        }
        cursor.collect().await
    }

    /// Page-wise cursor over the view.
    pub fn cursor(&self) -> RecordsCursor {
        RecordsCursor::new(self.clone(), self.dataset.batching.fetch_page_size)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Validate and push new records in batches of `push_batch_size`.
    ///
    /// Accepts one record, one raw JSON mapping, or a list mixing both.
    pub async fn add(&self, records: impl Into<RecordsInput>, show_progress: bool) -> Result<()> {
        auth::require_elevated(self.api(), "add records")?;

        let metadata_properties = self.live_metadata_properties().await?;
        let schema = RecordSchema::new(
            self.dataset.fields.iter().map(|f| &f.field),
            metadata_properties.iter(),
            self.dataset.allow_extra_metadata,
        );
        let records = validation::parse_and_validate_records(records.into(), &schema)?;

        let name_to_id = self.dataset.question_name_to_id();
        let payloads = records
            .iter()
            .map(|record| record.to_server_payload(&name_to_id))
            .collect::<Result<Vec<_>>>()?;

        let batch_size = self.dataset.batching.push_batch_size;
        let show_progress = show_progress && self.dataset.show_progress;
        let pb = progress_bar(payloads.len(), show_progress, "Pushing records to Argilla...");
        let mut payloads = payloads.into_iter().peekable();
        let mut batch_index = 0usize;

        while payloads.peek().is_some() {
            let batch: Vec<_> = payloads.by_ref().take(batch_size).collect();
            let batch_len = batch.len();
            self.api()
                .add_records(self.dataset.id, batch)
                .await
                .map_err(|e| {
                    pb.abandon();
                    FeedbackError::remote(
                        format!("Failed while pushing batch {batch_index} of records to Argilla"),
                        e,
                    )
                })?;
            debug!(
                dataset_id = %self.dataset.id,
                batch = batch_index,
                size = batch_len,
                "Pushed records batch"
            );
            pb.inc(batch_len as u64);
            batch_index += 1;
        }

        pb.finish_and_clear();
        info!(dataset_id = %self.dataset.id, count = records.len(), "Added records");
        Ok(())
    }

    /// Push changed metadata and suggestions of already-remote records.
    pub async fn update(
        &self,
        records: impl Into<OneOrMany<RemoteFeedbackRecord>>,
        show_progress: bool,
    ) -> Result<()> {
        auth::require_elevated(self.api(), "update records")?;

        let records = records.into().into_vec();
        let metadata_properties = self.live_metadata_properties().await?;
        let schema = RecordSchema::new(
            self.dataset.fields.iter().map(|f| &f.field),
            metadata_properties.iter(),
            self.dataset.allow_extra_metadata,
        );
        for record in &records {
            validation::validate_metadata(&record.metadata, &schema)?;
        }

        let name_to_id = self.dataset.question_name_to_id();
        let payloads = records
            .iter()
            .map(|record| record.to_server_payload(&name_to_id))
            .collect::<Result<Vec<_>>>()?;

        let batch_size = self.dataset.batching.push_batch_size;
        let show_progress = show_progress && self.dataset.show_progress;
        let pb = progress_bar(payloads.len(), show_progress, "Updating records in Argilla...");

        for (batch_index, batch) in payloads.chunks(batch_size).enumerate() {
            self.api()
                .update_records(self.dataset.id, batch.to_vec())
                .await
                .map_err(|e| {
                    pb.abandon();
                    FeedbackError::remote(
                        format!("Failed while updating batch {batch_index} of records in Argilla"),
                        e,
                    )
                })?;
            pb.inc(batch.len() as u64);
        }

        pb.finish_and_clear();
        info!(dataset_id = %self.dataset.id, count = records.len(), "Updated records");
        Ok(())
    }

    /// Delete records in batches of `delete_batch_size`.
    ///
    /// Batches run in order. A failing batch aborts the rest; earlier batches
    /// are not rolled back.
    pub async fn delete(&self, records: &[RemoteFeedbackRecord]) -> Result<()> {
        auth::require_elevated(self.api(), "delete records")?;

        let batch_size = self.dataset.batching.delete_batch_size;
        for (batch_index, batch) in records.chunks(batch_size).enumerate() {
            let ids: Vec<Uuid> = batch.iter().map(|r| r.id).collect();
            self.api()
                .delete_records(self.dataset.id, ids)
                .await
                .map_err(|e| FeedbackError::remote("Failed to remove records from Argilla", e))?;
            debug!(
                dataset_id = %self.dataset.id,
                batch = batch_index,
                size = batch.len(),
                "Deleted records batch"
            );
        }

        info!(dataset_id = %self.dataset.id, count = records.len(), "Deleted records");
        Ok(())
    }

    async fn live_metadata_properties(&self) -> Result<Vec<MetadataProperty>> {
        Ok(self
            .api()
            .list_metadata_properties(self.dataset.id)
            .await
            .map_err(|e| {
                FeedbackError::remote(
                    "Failed while fetching the metadata properties from Argilla",
                    e,
                )
            })?
            .into_iter()
            .map(|p| p.property)
            .collect())
    }
}

fn progress_bar(len: usize, show: bool, message: &'static str) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message(message);
    pb
}

/// Async cursor that walks a view one page at a time.
///
/// K_i: Stops at the first short page, so it never asks past the end.
pub struct RecordsCursor {
    records: RemoteFeedbackRecords,
    page_size: usize,
    offset: usize,
    remaining: Option<usize>,
    buffer: VecDeque<RemoteFeedbackRecord>,
    exhausted: bool,
}

impl RecordsCursor {
    fn new(records: RemoteFeedbackRecords, page_size: usize) -> Self {
        Self {
            records,
            page_size: page_size.max(1),
            offset: 0,
            remaining: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Start at `offset` instead of the first record.
    pub fn starting_at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Yield at most `n` records.
    pub fn take(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Next page of records, `None` once the view (or the `take` limit) is done.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RemoteFeedbackRecord>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        if self.exhausted || self.remaining == Some(0) {
            return Ok(None);
        }

        let limit = self
            .remaining
            .map_or(self.page_size, |remaining| remaining.min(self.page_size));
        let page = self.records.fetch_page(self.offset, limit).await?;
        let received = page.items.len();

        self.offset += received;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(received);
        }
        if received < limit {
            self.exhausted = true;
        }

        Ok((received > 0).then_some(page.items))
    }

    /// Next single record.
    pub async fn next(&mut self) -> Result<Option<RemoteFeedbackRecord>> {
        if self.buffer.is_empty() {
            match self.next_page().await? {
                Some(page) => self.buffer.extend(page),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Drain the cursor into a vector.
    pub async fn collect(&mut self) -> Result<Vec<RemoteFeedbackRecord>> {
        let mut out = Vec::new();
        while let Some(page) = self.next_page().await? {
            out.extend(page);
        }
        Ok(out)
    }
}

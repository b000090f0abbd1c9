//! Record input normalization and schema validation.
//!
//! K_i: Shared by the remote and the local dataset, so both reject the same
//! records for the same reasons.

use crate::models::{FeedbackError, FeedbackRecord, Field, MetadataProperty, Result};
use serde_json::{Map, Value};

/// One record as a caller may hand it over.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordInput {
    Record(FeedbackRecord),
    /// Raw JSON mapping shaped like a `FeedbackRecord`
    Raw(Value),
}

impl From<FeedbackRecord> for RecordInput {
    fn from(record: FeedbackRecord) -> Self {
        Self::Record(record)
    }
}

impl From<Value> for RecordInput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// One or many records, possibly mixing typed records and raw mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordsInput(pub Vec<RecordInput>);

impl RecordsInput {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<FeedbackRecord> for RecordsInput {
    fn from(record: FeedbackRecord) -> Self {
        Self(vec![RecordInput::Record(record)])
    }
}

/// A JSON array is read as a list of mappings, anything else as one mapping.
impl From<Value> for RecordsInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items.into_iter().map(RecordInput::Raw).collect()),
            other => Self(vec![RecordInput::Raw(other)]),
        }
    }
}

impl From<RecordInput> for RecordsInput {
    fn from(input: RecordInput) -> Self {
        Self(vec![input])
    }
}

impl From<Vec<RecordInput>> for RecordsInput {
    fn from(inputs: Vec<RecordInput>) -> Self {
        Self(inputs)
    }
}

impl From<Vec<FeedbackRecord>> for RecordsInput {
    fn from(records: Vec<FeedbackRecord>) -> Self {
        Self(records.into_iter().map(RecordInput::Record).collect())
    }
}

impl From<Vec<Value>> for RecordsInput {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into_iter().map(RecordInput::Raw).collect())
    }
}

/// The parts of a dataset schema a record is checked against.
#[derive(Debug, Clone)]
pub struct RecordSchema<'a> {
    fields: Vec<&'a Field>,
    metadata_properties: Vec<&'a MetadataProperty>,
    allow_extra_metadata: bool,
}

impl<'a> RecordSchema<'a> {
    pub fn new(
        fields: impl IntoIterator<Item = &'a Field>,
        metadata_properties: impl IntoIterator<Item = &'a MetadataProperty>,
        allow_extra_metadata: bool,
    ) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            metadata_properties: metadata_properties.into_iter().collect(),
            allow_extra_metadata,
        }
    }
}

/// Normalize the input and validate every record. Nothing is returned unless
/// all records pass.
pub fn parse_and_validate_records(
    input: RecordsInput,
    schema: &RecordSchema<'_>,
) -> Result<Vec<FeedbackRecord>> {
    if input.is_empty() {
        return Err(FeedbackError::validation("Expected at least one record"));
    }

    input
        .0
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let record = match item {
                RecordInput::Record(record) => record,
                RecordInput::Raw(value) => FeedbackRecord::from_value(value)?,
            };
            validate_record(&record, schema).map_err(|e| match e {
                FeedbackError::Validation(message) => {
                    FeedbackError::Validation(format!("Record {index}: {message}"))
                }
                other => other,
            })?;
            Ok(record)
        })
        .collect()
}

/// Fields and metadata of one record.
pub fn validate_record(record: &FeedbackRecord, schema: &RecordSchema<'_>) -> Result<()> {
    validate_fields(record, schema)?;
    validate_metadata(&record.metadata, schema)
}

fn validate_fields(record: &FeedbackRecord, schema: &RecordSchema<'_>) -> Result<()> {
    let missing: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| f.required && !record.fields.contains_key(&f.name))
        .map(|f| f.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(FeedbackError::validation(format!("Missing required fields: {missing:?}")));
    }

    let unknown: Vec<&str> = record
        .fields
        .keys()
        .filter(|name| !schema.fields.iter().any(|f| &f.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(FeedbackError::validation(format!(
            "Fields not defined in the dataset: {unknown:?}"
        )));
    }
    Ok(())
}

/// Metadata values against the schema's metadata properties.
///
/// Keys without a matching property pass only when extra metadata is allowed.
pub fn validate_metadata(metadata: &Map<String, Value>, schema: &RecordSchema<'_>) -> Result<()> {
    for (key, value) in metadata {
        match schema.metadata_properties.iter().find(|p| &p.name == key) {
            Some(property) => property.validate_value(value)?,
            None if schema.allow_extra_metadata => {}
            None => {
                return Err(FeedbackError::validation(format!(
                    "Metadata `{key}` is not a metadata property of the dataset and extra \
                     metadata is not allowed"
                )));
            }
        }
    }
    Ok(())
}

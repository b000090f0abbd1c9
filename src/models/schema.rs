//! Dataset schema: fields, questions, and metadata properties.
//!
//! K_i: Local types carry no server id. Their `Remote*` counterparts wrap a
//! local value together with the id assigned by the server, and `to_local`
//! strips it again.

use super::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Fields
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSettings {
    Text {
        #[serde(default)]
        use_markdown: bool,
    },
}

/// A record field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    pub settings: FieldSettings,
}

impl Field {
    /// Required plain-text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            required: true,
            settings: FieldSettings::Text { use_markdown: false },
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A field as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteField {
    pub id: Uuid,
    #[serde(flatten)]
    pub field: Field,
}

impl RemoteField {
    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn to_local(&self) -> Field {
        self.field.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Questions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelOption {
    pub value: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingOption {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionSettings {
    Text {
        #[serde(default)]
        use_markdown: bool,
    },
    Rating {
        options: Vec<RatingOption>,
    },
    LabelSelection {
        options: Vec<LabelOption>,
        #[serde(default)]
        visible_options: Option<usize>,
    },
    MultiLabelSelection {
        options: Vec<LabelOption>,
        #[serde(default)]
        visible_options: Option<usize>,
    },
    Ranking {
        options: Vec<LabelOption>,
    },
}

/// An annotation question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    pub settings: QuestionSettings,
}

impl Question {
    /// Single-choice label question.
    pub fn label<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_settings(
            name,
            QuestionSettings::LabelSelection {
                options: label_options(labels),
                visible_options: None,
            },
        )
    }

    /// Multiple-choice label question.
    pub fn multi_label<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_settings(
            name,
            QuestionSettings::MultiLabelSelection {
                options: label_options(labels),
                visible_options: None,
            },
        )
    }

    /// Rating question over the given integer values.
    pub fn rating(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::with_settings(
            name,
            QuestionSettings::Rating {
                options: values.into_iter().map(|value| RatingOption { value }).collect(),
            },
        )
    }

    /// Free-text question.
    pub fn text(name: impl Into<String>) -> Self {
        Self::with_settings(name, QuestionSettings::Text { use_markdown: false })
    }

    fn with_settings(name: impl Into<String>, settings: QuestionSettings) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            required: true,
            settings,
        }
    }
}

fn label_options<I, S>(labels: I) -> Vec<LabelOption>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    labels
        .into_iter()
        .map(|label| LabelOption {
            value: label.into(),
            text: None,
        })
        .collect()
}

/// A question as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteQuestion {
    pub id: Uuid,
    #[serde(flatten)]
    pub question: Question,
}

impl RemoteQuestion {
    pub fn name(&self) -> &str {
        &self.question.name
    }

    pub fn to_local(&self) -> Question {
        self.question.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata properties
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataPropertySettings {
    Terms {
        #[serde(default)]
        values: Option<Vec<String>>,
    },
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Float {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

/// An indexed metadata property that records can be filtered and sorted by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperty {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub visible_for_annotators: bool,
    pub settings: MetadataPropertySettings,
}

impl MetadataProperty {
    pub fn terms(name: impl Into<String>, values: Option<Vec<String>>) -> Self {
        Self::with_settings(name, MetadataPropertySettings::Terms { values })
    }

    pub fn integer(name: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        Self::with_settings(name, MetadataPropertySettings::Integer { min, max })
    }

    pub fn float(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::with_settings(name, MetadataPropertySettings::Float { min, max })
    }

    fn with_settings(name: impl Into<String>, settings: MetadataPropertySettings) -> Self {
        Self {
            name: name.into(),
            title: None,
            visible_for_annotators: true,
            settings,
        }
    }

    /// Check a record's metadata value against this property.
    pub fn validate_value(&self, value: &Value) -> Result<()> {
        let name = &self.name;
        match &self.settings {
            MetadataPropertySettings::Terms { values } => {
                let terms: Vec<&str> = match value {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(items) => items
                        .iter()
                        .map(|item| {
                            item.as_str().ok_or_else(|| {
                                FeedbackError::validation(format!(
                                    "Metadata `{name}` expects strings, got {item}"
                                ))
                            })
                        })
                        .collect::<Result<_>>()?,
                    other => {
                        return Err(FeedbackError::validation(format!(
                            "Metadata `{name}` expects a string or a list of strings, got {other}"
                        )));
                    }
                };
                if let Some(allowed) = values {
                    if let Some(bad) = terms.iter().find(|t| !allowed.iter().any(|a| a == *t)) {
                        return Err(FeedbackError::validation(format!(
                            "Metadata `{name}` does not allow `{bad}`, allowed values are \
                             {allowed:?}"
                        )));
                    }
                }
                Ok(())
            }
            MetadataPropertySettings::Integer { min, max } => {
                let v = value.as_i64().ok_or_else(|| {
                    FeedbackError::validation(format!(
                        "Metadata `{name}` expects an integer, got {value}"
                    ))
                })?;
                check_range(name, v, *min, *max)
            }
            MetadataPropertySettings::Float { min, max } => {
                let v = value.as_f64().ok_or_else(|| {
                    FeedbackError::validation(format!(
                        "Metadata `{name}` expects a number, got {value}"
                    ))
                })?;
                check_range(name, v, *min, *max)
            }
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    name: &str,
    value: T,
    min: Option<T>,
    max: Option<T>,
) -> Result<()> {
    if min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max) {
        let min = min.map_or_else(|| "-inf".to_string(), |v| v.to_string());
        let max = max.map_or_else(|| "inf".to_string(), |v| v.to_string());
        return Err(FeedbackError::validation(format!(
            "Metadata `{name}` value {value} is outside of [{min}, {max}]"
        )));
    }
    Ok(())
}

/// A metadata property as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMetadataProperty {
    pub id: Uuid,
    #[serde(flatten)]
    pub property: MetadataProperty,
}

impl RemoteMetadataProperty {
    pub fn name(&self) -> &str {
        &self.property.name
    }

    pub fn to_local(&self) -> MetadataProperty {
        self.property.clone()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_question_from_server_payload() {
        let payload = json!({
            "id": "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d",
            "name": "sentiment",
            "title": "Sentiment",
            "required": true,
            "settings": {
                "type": "label_selection",
                "options": [{"value": "pos", "text": "Positive"}, {"value": "neg"}]
            },
            "dataset_id": "1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed"
        });
        let question: RemoteQuestion = serde_json::from_value(payload).unwrap();
        assert_eq!(question.name(), "sentiment");
        assert!(matches!(
            question.question.settings,
            QuestionSettings::LabelSelection { ref options, .. } if options.len() == 2
        ));
        assert_eq!(question.to_local().title.as_deref(), Some("Sentiment"));
    }

    #[test]
    fn test_terms_value_validation() {
        let prop = MetadataProperty::terms("genre", Some(vec!["rock".into(), "jazz".into()]));
        assert!(prop.validate_value(&json!("rock")).is_ok());
        assert!(prop.validate_value(&json!(["rock", "jazz"])).is_ok());
        assert!(prop.validate_value(&json!("pop")).is_err());
        assert!(prop.validate_value(&json!(3)).is_err());

        let open = MetadataProperty::terms("tag", None);
        assert!(open.validate_value(&json!("anything")).is_ok());
    }

    #[test]
    fn test_numeric_value_validation() {
        let length = MetadataProperty::integer("length", Some(0), Some(10));
        assert!(length.validate_value(&json!(10)).is_ok());
        assert!(length.validate_value(&json!(11)).is_err());
        assert!(length.validate_value(&json!(1.5)).is_err());

        let score = MetadataProperty::float("score", None, Some(1.0));
        assert!(score.validate_value(&json!(-3.5)).is_ok());
        assert!(score.validate_value(&json!(1.5)).is_err());
    }

    #[test]
    fn test_metadata_property_serializes_with_type_tag() {
        let prop = MetadataProperty::integer("length", Some(1), None);
        let value = serde_json::to_value(&prop).unwrap();
        assert_eq!(value["settings"]["type"], "integer");
        assert_eq!(value["settings"]["min"], 1);
        assert_eq!(value["visible_for_annotators"], true);
    }
}

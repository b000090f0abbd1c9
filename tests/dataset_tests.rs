// tests/dataset_tests.rs
mod common;

use argilla_remote::dataset::{DirectoryExporter, LabelStrategy, TrainingTask, UnificationStrategy};
use argilla_remote::models::{
    FeedbackError, MetadataFilter, MetadataProperty, OneOrMany, ResponseStatus,
    ResponseStatusFilter, SortBy, SortOrder, UserRole,
};
use argilla_remote::{Config, FeedbackApi, RemoteFeedbackDataset};
use common::{Call, MockApi, batching, count_warnings, dataset};
use std::sync::Arc;
use tempfile::tempdir;

fn genre_and_year() -> MockApi {
    MockApi::owner()
        .with_metadata_property(MetadataProperty::terms("genre", None))
        .with_metadata_property(MetadataProperty::integer("year", None, None))
}

#[tokio::test]
async fn test_identity_and_url() {
    let api = Arc::new(MockApi::owner());
    let ds = dataset(&api, batching(500, 100, 250)).await;

    assert_eq!(ds.id(), api.dataset_id);
    assert_eq!(ds.name(), "feedback");
    assert_eq!(ds.workspace().name, "admin");
    assert_eq!(
        ds.url(),
        format!("http://localhost:6900/dataset/{}/annotation-mode", api.dataset_id)
    );
    assert_eq!(ds.question_name_to_id()["quality"], api.question_id("quality"));

    let shown = ds.to_string();
    assert!(shown.contains("name=feedback"));
    assert!(shown.contains(r#"questions=["sentiment", "quality"]"#));
}

#[tokio::test]
async fn test_sort_then_filter_keeps_both_axes() {
    let api = Arc::new(genre_and_year());
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let sorted = ds
        .sort_by(vec![SortBy::metadata("year", SortOrder::Desc).unwrap()])
        .await
        .unwrap();
    let both = sorted
        .filter_by(
            vec![ResponseStatusFilter::Submitted],
            vec![MetadataFilter::terms("genre", ["rock", "jazz"]).unwrap()],
        )
        .await
        .unwrap();

    assert_eq!(
        both.records().sort_by_query_strings(),
        Some(vec!["metadata.year:desc".to_string()])
    );
    assert_eq!(
        both.records().metadata_filters_query_strings(),
        Some(vec!["genre:rock,jazz".to_string()])
    );
    assert_eq!(
        both.records().response_status_query_strings(),
        Some(vec!["submitted".to_string()])
    );

    // earlier handles are untouched
    assert!(ds.records().sort_by_query_strings().is_none());
    assert!(!sorted.records().has_filters());
    assert_eq!(both.id(), ds.id());
}

#[tokio::test]
async fn test_filter_then_sort_keeps_filters() {
    let api = Arc::new(genre_and_year());
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let filtered = ds
        .filter_by(vec![ResponseStatusFilter::Draft], vec![])
        .await
        .unwrap();
    let refiltered = filtered
        .filter_by(vec![], vec![MetadataFilter::integer("year", Some(2000), None).unwrap()])
        .await
        .unwrap();
    let sorted = refiltered
        .sort_by(vec![SortBy::new("updated_at", SortOrder::Asc).unwrap()])
        .await
        .unwrap();

    let records = sorted.records();
    assert_eq!(records.response_status(), &[ResponseStatusFilter::Draft]);
    assert_eq!(
        records.metadata_filters_query_strings(),
        Some(vec![r#"year:{"ge": 2000}"#.to_string()])
    );
    assert_eq!(records.sort_by_query_strings(), Some(vec!["updated_at:asc".to_string()]));
}

#[tokio::test]
async fn test_filter_by_without_criteria_does_no_io() {
    let api = Arc::new(MockApi::owner());
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let err = ds.filter_by(vec![], vec![]).await.unwrap_err();
    assert!(matches!(err, FeedbackError::Validation(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_delete_metadata_properties_unknown_name_deletes_nothing() {
    let api = Arc::new(MockApi::owner().with_metadata_property(MetadataProperty::terms("b", None)));
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let err = ds.delete_metadata_properties(["a", "b"]).await.unwrap_err();
    match err {
        FeedbackError::UnknownMetadataNames { unknown, .. } => assert_eq!(unknown, vec!["a"]),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(api.calls_of("delete_metadata_property").is_empty());
    assert_eq!(api.metadata_property_names(), vec!["b"]);
}

#[tokio::test]
async fn test_delete_metadata_properties_cardinality() {
    let api = Arc::new(
        MockApi::owner()
            .with_metadata_property(MetadataProperty::terms("a", None))
            .with_metadata_property(MetadataProperty::terms("b", None))
            .with_metadata_property(MetadataProperty::integer("c", None, None)),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let one = ds.delete_metadata_properties("c").await.unwrap();
    assert!(matches!(one, OneOrMany::One(ref p) if p.name == "c"));

    let many = ds.delete_metadata_properties(vec!["a", "b"]).await.unwrap();
    assert_eq!(many.len(), 2);
    assert!(matches!(many, OneOrMany::Many(_)));
    assert!(api.metadata_property_names().is_empty());
}

#[tokio::test]
async fn test_metadata_property_management() {
    let api = Arc::new(
        MockApi::owner().with_metadata_property(MetadataProperty::terms("genre", None)),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let dup = ds
        .add_metadata_property(MetadataProperty::terms("genre", None))
        .await
        .unwrap_err();
    assert!(matches!(dup, FeedbackError::Validation(_)));
    assert!(api.calls_of("add_metadata_property").is_empty());

    let added = ds
        .add_metadata_property(MetadataProperty::float("score", Some(0.0), Some(1.0)))
        .await
        .unwrap();
    assert_eq!(added.name(), "score");

    let mut properties = ds.metadata_properties().await.unwrap();
    assert_eq!(properties.len(), 2);
    for property in &mut properties {
        property.property.title = Some(property.name().to_uppercase());
    }
    ds.update_metadata_properties(properties).await.unwrap();
    assert_eq!(api.calls_of("update_metadata_property").len(), 2);
}

#[tokio::test]
async fn test_update_metadata_properties_stops_at_first_failure() {
    let api = Arc::new(
        MockApi::owner()
            .with_metadata_property(MetadataProperty::terms("first", None))
            .with_metadata_property(MetadataProperty::terms("second", None))
            .with_metadata_property(MetadataProperty::terms("third", None))
            .fail_on("update_metadata_property", 2),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;
    let properties = ds.metadata_properties().await.unwrap();

    let err = ds.update_metadata_properties(properties).await.unwrap_err();
    assert!(err.to_string().contains("`second`"));
    assert_eq!(api.calls_of("update_metadata_property").len(), 2);
}

#[tokio::test]
async fn test_metadata_mutations_require_elevated_role() {
    let api = Arc::new(
        MockApi::new(UserRole::Annotator)
            .with_metadata_property(MetadataProperty::terms("a", None)),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;

    assert!(matches!(
        ds.add_metadata_property(MetadataProperty::terms("b", None)).await,
        Err(FeedbackError::PermissionDenied { .. })
    ));
    assert!(matches!(
        ds.delete_metadata_properties("a").await,
        Err(FeedbackError::PermissionDenied { .. })
    ));
    assert!(matches!(ds.delete().await, Err(FeedbackError::PermissionDenied { .. })));
    assert!(api.calls().is_empty());

    // reads stay open
    assert_eq!(ds.metadata_properties().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pull_empty_dataset_warns_once() {
    let api = Arc::new(
        MockApi::owner().with_metadata_property(MetadataProperty::terms("genre", None)),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;
    let (warnings, _guard) = count_warnings();

    let local = ds.pull(None).await.unwrap();

    assert!(local.is_empty());
    assert_eq!(local.metadata_properties().len(), 1);
    assert_eq!(local.guidelines(), Some("Label the sentiment"));
    assert_eq!(warnings.count(), 1);
}

#[tokio::test]
async fn test_pull_max_records_takes_first_in_server_order() {
    let api = Arc::new(MockApi::owner().with_records(20));
    let ds = dataset(&api, batching(500, 100, 250)).await;
    let (warnings, _guard) = count_warnings();

    let local = ds.pull(Some(5)).await.unwrap();

    let texts: Vec<_> = local.iter().map(|r| r.fields["text"].as_str()).collect();
    assert_eq!(texts, vec!["record 0", "record 1", "record 2", "record 3", "record 4"]);
    assert_eq!(local.records()[0].external_id.as_deref(), Some("ext-0"));
    assert_eq!(warnings.count(), 0);
    assert_eq!(api.calls_of("get_metrics").len(), 1);

    let everything = ds.pull(None).await.unwrap();
    assert_eq!(everything.len(), 20);
}

#[tokio::test]
async fn test_pull_respects_active_filters() {
    let api = Arc::new(
        MockApi::owner()
            .with_records(3)
            .with_answered_records(2, ResponseStatus::Discarded),
    );
    let ds = dataset(&api, batching(500, 100, 250)).await;

    let discarded = ds
        .filter_by(vec![ResponseStatusFilter::Discarded], vec![])
        .await
        .unwrap();
    let local = discarded.pull(None).await.unwrap();
    assert_eq!(local.len(), 2);
    assert!(local.iter().all(|r| r.responses[0].status == ResponseStatus::Discarded));
}

#[tokio::test]
async fn test_fallback_operations_warn_and_pull() {
    let api = Arc::new(MockApi::owner().with_records(4));
    let ds = dataset(&api, batching(500, 100, 250)).await;
    let (warnings, _guard) = count_warnings();

    let unified = ds
        .unify_responses("sentiment", UnificationStrategy::Label(LabelStrategy::Majority))
        .await
        .unwrap();
    assert_eq!(unified.len(), 4);
    assert_eq!(warnings.count(), 1);

    let data = ds
        .prepare_for_training(&TrainingTask::text_classification("text", "sentiment"), 1.0)
        .await
        .unwrap();
    // none of the records carry an answer yet
    assert!(data.train.is_empty());
    assert_eq!(warnings.count(), 2);

    let dir = tempdir().unwrap();
    let exporter = DirectoryExporter::new(dir.path());
    ds.push_to_huggingface("org/feedback", &exporter, false)
        .await
        .unwrap();
    assert!(exporter.repo_dir("org/feedback").join("records.jsonl").exists());
    assert_eq!(warnings.count(), 3);

    // the remote view itself is unchanged
    assert!(!ds.records().has_filters());
}

#[tokio::test]
async fn test_push_to_argilla_is_a_warning() {
    let api = Arc::new(MockApi::owner());
    let ds = dataset(&api, batching(500, 100, 250)).await;
    let (warnings, _guard) = count_warnings();

    let same = ds.push_to_argilla();
    assert_eq!(same.id(), ds.id());
    assert_eq!(warnings.count(), 1);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_delete_dataset() {
    let api = Arc::new(MockApi::owner());
    let ds = dataset(&api, batching(500, 100, 250)).await;
    ds.delete().await.unwrap();
    assert_eq!(api.calls(), vec![Call::DeleteDataset]);

    let failing = Arc::new(MockApi::owner().fail_on("delete_dataset", 1));
    let ds = dataset(&failing, batching(500, 100, 250)).await;
    let err = ds.delete().await.unwrap_err();
    assert!(err.to_string().contains("Failed while deleting the `FeedbackDataset` from Argilla"));
}

#[tokio::test]
async fn test_from_config_carries_batching_and_progress() {
    let api = Arc::new(MockApi::owner());
    let config = Config::from_toml(
        "[batching]\npush_batch_size = 3\n\n[output]\nshow_progress = false\n",
    )
    .unwrap();

    let dyn_api: Arc<dyn FeedbackApi> = api.clone();
    let quiet = RemoteFeedbackDataset::from_config(dyn_api, api.dataset_id, &config)
        .await
        .unwrap();
    assert!(!quiet.shows_progress());
    assert_eq!(quiet.batching().push_batch_size, 3);
    assert!(!quiet.sort_by(vec![]).await.unwrap().shows_progress());

    let default = dataset(&api, batching(500, 100, 250)).await;
    assert!(default.shows_progress());
}

#[tokio::test]
async fn test_from_server_rejects_zero_batch_size() {
    let api = Arc::new(MockApi::owner());
    let dyn_api: Arc<dyn FeedbackApi> = api.clone();
    let err = RemoteFeedbackDataset::from_server(dyn_api, api.dataset_id, batching(0, 100, 250))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedbackError::Config(_)));
    assert!(api.calls().is_empty());
}

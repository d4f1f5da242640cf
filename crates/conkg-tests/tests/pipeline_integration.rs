use std::path::Path;

use conkg_core::entity::EntityType;
use conkg_core::qa::{QaQuery, RetrievalMode, SourceKind};
use conkg_ingest::IngestOptions;
use conkg_tests::{memory_state, seeded_state, test_config};

fn write_fixture(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture dir");
    }
    std::fs::write(path, contents).expect("failed to write fixture");
}

fn site_fixtures(root: &Path) {
    write_fixture(
        root,
        "site/daily-log.txt",
        b"Daily log. Tower crane inspection passed this morning. \
          RFI 21 raised about the crane base anchor bolts. \
          Concrete pour for level 3 slab moved to Friday because of rain. \
          Crane operator certification copies are filed with the safety binder.",
    );
    write_fixture(root, "site/photo.jpg", &[0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn ingest_directory_indexes_supported_files() {
    let data = tempfile::tempdir().expect("failed to create temp dir");
    site_fixtures(data.path());
    let state = memory_state(test_config(data.path()));

    let options = IngestOptions {
        project_id: Some("Harbor Tower".into()),
        include_hidden: false,
    };
    let report = state
        .pipeline
        .ingest_path(data.path(), &options)
        .await
        .expect("failed to ingest fixtures");

    assert_eq!(report.files_seen, 2);
    assert_eq!(report.files_ingested, 1);
    assert_eq!(report.files_skipped, 1);
    assert!(report.errors.is_empty());
    assert_eq!(report.project_id.as_deref(), Some("project:harbor-tower"));
    assert!(report.chunks_stored >= 2);

    let chunks = state.vector.count().await.expect("failed to count chunks");
    assert_eq!(chunks, report.chunks_stored);

    let project = state
        .graph
        .get_entity("project:harbor-tower")
        .await
        .expect("lookup failed")
        .expect("project should be created on ingest");
    assert_eq!(project.name, "Harbor Tower");

    let docs = state
        .graph
        .search_entities("daily-log.txt", &[EntityType::Document], 5)
        .await
        .expect("search failed");
    let doc = &docs.first().expect("document entity missing").entity;
    let hood = state
        .graph
        .get_neighbors(&doc.id, 1)
        .await
        .expect("neighbors failed");
    let neighbor_ids: Vec<&str> = hood.neighbors.iter().map(|e| e.id.as_str()).collect();
    assert!(neighbor_ids.contains(&"project:harbor-tower"));
    assert!(neighbor_ids.contains(&"issue:rfi-21"));
}

#[tokio::test]
async fn reingest_replaces_chunks() {
    let data = tempfile::tempdir().expect("failed to create temp dir");
    site_fixtures(data.path());
    let state = memory_state(test_config(data.path()));
    let options = IngestOptions::default();

    let first = state
        .pipeline
        .ingest_path(data.path(), &options)
        .await
        .expect("first ingest failed");
    let entities_after_first = state.graph.entity_count().await.expect("count failed");

    let second = state
        .pipeline
        .ingest_path(data.path(), &options)
        .await
        .expect("second ingest failed");

    assert_eq!(first.chunks_stored, second.chunks_stored);
    assert_eq!(
        state.vector.count().await.expect("failed to count chunks"),
        second.chunks_stored
    );
    assert_eq!(
        state.graph.entity_count().await.expect("count failed"),
        entities_after_first
    );
    assert!(second.store.entities_merged > 0);
}

#[tokio::test]
async fn vector_only_answer_cites_ingested_file() {
    let data = tempfile::tempdir().expect("failed to create temp dir");
    site_fixtures(data.path());
    let state = memory_state(test_config(data.path()));
    state
        .pipeline
        .ingest_path(
            data.path(),
            &IngestOptions {
                project_id: Some("Harbor Tower".into()),
                include_hidden: false,
            },
        )
        .await
        .expect("failed to ingest fixtures");

    let response = state
        .qa
        .ask(&QaQuery {
            question: "What happened with the tower crane inspection?".into(),
            project: Some("Harbor Tower".into()),
            mode: RetrievalMode::VectorOnly,
            top_k: None,
        })
        .await
        .expect("ask failed");

    assert!(!response.sources.is_empty());
    assert!(response.sources.iter().all(|s| s.kind == SourceKind::Vector));
    assert_eq!(response.sources[0].label, "daily-log.txt");
    assert!(response.answer.starts_with("I didn't find matching entities"));
    assert!(response.answer.contains("(daily-log.txt)"));
}

#[tokio::test]
async fn missing_path_is_an_error() {
    let data = tempfile::tempdir().expect("failed to create temp dir");
    let state = seeded_state(data.path()).await;
    let result = state
        .pipeline
        .ingest_path(&data.path().join("nope"), &IngestOptions::default())
        .await;
    assert!(result.is_err());
}

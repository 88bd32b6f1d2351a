#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end indexing and retrieval with a deterministic embedder

mod common;

use tempfile::TempDir;

use common::{PARIS_TOKYO, initialize, paris_retriever, retriever, test_config, write_source};
use travel_rag::indexer::{StoreOrigin, StoreState};
use travel_rag::search::{NO_RESULTS_MESSAGE, QueryOutcome};

fn contents(outcome: QueryOutcome) -> Vec<String> {
    match outcome {
        QueryOutcome::Found(results) => results
            .into_iter()
            .map(|r| r.chunk_metadata.content)
            .collect(),
        QueryOutcome::NoResults => Vec::new(),
        QueryOutcome::Failed(message) => panic!("query failed: {message}"),
    }
}

#[tokio::test]
async fn capital_of_france_finds_paris() {
    let (retriever, _dir) = paris_retriever().await;

    let results = contents(retriever.query("capital of France", None).await);

    assert_eq!(results.len(), 2);
    assert!(results[0].contains("Paris"), "top result: {}", results[0]);

    let answer = retriever.answer("capital of France", None).await;
    assert!(answer.starts_with("📍 Paris is the capital of France."));
}

#[tokio::test]
async fn result_count_is_min_of_k_and_chunk_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());
    let guide = [
        "Visit the museum in Paris.",
        "Rome has the best food in Italy.",
        "Take the train from Tokyo.",
        "The beach city is warm in summer.",
        "Where is the capital of Japan?",
    ]
    .join(" ");
    write_source(&config, &guide);

    let state = initialize(&config).await;
    let total = state.chunk_count() as usize;
    assert!(total >= 4, "expected several chunks, got {total}");
    let retriever = retriever(&config, state);

    for k in [0, 1, 2, total, total + 5] {
        let outcome = retriever.query("best food in Rome", Some(k)).await;
        let similarities: Vec<f32> = match outcome {
            QueryOutcome::Found(results) => results.iter().map(|r| r.similarity_score).collect(),
            QueryOutcome::NoResults => Vec::new(),
            QueryOutcome::Failed(message) => panic!("query failed: {message}"),
        };

        assert_eq!(similarities.len(), k.min(total), "k = {k}");
        assert!(
            similarities.windows(2).all(|w| w[0] >= w[1]),
            "k = {k}: {similarities:?}"
        );
    }
}

#[tokio::test]
async fn persisted_store_answers_without_source() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());
    write_source(&config, PARIS_TOKYO);

    let built = initialize(&config).await;
    assert!(matches!(
        built,
        StoreState::Ready {
            origin: StoreOrigin::Built,
            ..
        }
    ));
    let before = contents(retriever(&config, built).query("Tokyo Japan", Some(2)).await);

    std::fs::remove_file(&config.store.source_path).expect("should remove source");

    let loaded = initialize(&config).await;
    assert!(matches!(
        loaded,
        StoreState::Ready {
            origin: StoreOrigin::Persisted,
            chunk_count: 2,
            ..
        }
    ));
    let after = contents(retriever(&config, loaded).query("Tokyo Japan", Some(2)).await);

    assert_eq!(before, after);
    assert!(after[0].contains("Japan"));
}

#[tokio::test]
async fn rebuilding_replaces_previous_contents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    write_source(&config, PARIS_TOKYO);
    assert_eq!(initialize(&config).await.chunk_count(), 2);

    write_source(&config, "Rome is the capital of Italy.");
    let state = initialize(&config).await;
    assert_eq!(state.chunk_count(), 1);

    let results = contents(retriever(&config, state).query("capital of France", None).await);
    assert_eq!(results, vec!["Rome is the capital of Italy.".to_string()]);
}

#[tokio::test]
async fn empty_document_gives_no_information() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());
    write_source(&config, "");

    let state = initialize(&config).await;
    assert!(state.is_ready());
    assert_eq!(state.chunk_count(), 0);

    let answer = retriever(&config, state).answer("capital of France", None).await;
    assert_eq!(answer, NO_RESULTS_MESSAGE);
}

#[tokio::test]
async fn missing_everything_gives_no_information() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(temp_dir.path());

    let state = initialize(&config).await;
    assert!(!state.is_ready());

    let answer = retriever(&config, state).answer("capital of France", None).await;
    assert_eq!(answer, NO_RESULTS_MESSAGE);
}

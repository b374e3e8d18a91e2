//! Integration tests for the full ingestion flow:
//! dispatcher lookup → capability extraction → dual-store persistence.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use ingestion::testing::{FixtureRepositorySource, MockBrowserEngine, MockEngineProvider};
use ingestion::{
    crawl_links, ArticleDocument, ArticleExtractor, BrowserConfig, CollectionSpec, DistanceMetric,
    Dispatcher, DocumentFilter, DocumentStore, EnsureOutcome, Extractor, MemoryDocumentStore,
    MemoryVectorStore, RepositoryConfig, RepositoryDocument, RepositoryExtractor, VectorRecord,
    VectorStore,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ingestion=debug")
        .try_init();
}

fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn quick_browser_config() -> BrowserConfig {
    BrowserConfig::default().with_settle(Duration::from_millis(1))
}

/// Dispatcher with a repository capability over a fixture checkout and a
/// browser capability over a mock engine.
fn build_dispatcher(
    store: Arc<MemoryDocumentStore>,
    fixture: &Path,
    engine: MockBrowserEngine,
) -> Dispatcher {
    let repo_store = store.clone();
    let repo_source = Arc::new(FixtureRepositorySource::new(fixture));
    let article_store = store;
    let provider = Arc::new(MockEngineProvider::new(engine));

    Dispatcher::builder()
        .register_host("github.com", move || -> Box<dyn Extractor> {
            Box::new(
                RepositoryExtractor::new(repo_store.clone(), RepositoryConfig::new())
                    .with_source(repo_source.clone()),
            )
        })
        .register_host("medium.com", move || -> Box<dyn Extractor> {
            Box::new(
                ArticleExtractor::new(article_store.clone(), quick_browser_config())
                    .with_provider(provider.clone()),
            )
        })
        .build()
}

#[tokio::test]
async fn test_batch_ingests_mixed_sources() {
    init_tracing();
    let fixture = tempfile::tempdir().unwrap();
    write_file(fixture.path(), "src/main.py", b"print('analytical engine')");
    write_file(fixture.path(), "README.md", b"A difference engine");

    let store = Arc::new(MemoryDocumentStore::new());
    let engine = MockBrowserEngine::new()
        .with_heights([800, 800])
        .with_script_result("document.title", json!("On Computation"))
        .with_script_result("innerText", json!("Machines can compute."));
    let dispatcher = build_dispatcher(store.clone(), fixture.path(), engine);

    let user = store.get_or_create_user("Ada", "Lovelace").await.unwrap();
    let links = vec![
        "https://github.com/ada/engine".to_string(),
        "https://medium.com/@ada/on-computation".to_string(),
        "https://unknown.example/whatever".to_string(),
    ];

    let report = crawl_links(&dispatcher, &links, &user, None).await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.successful(), 2);
    assert_eq!(report.domains["github.com"].successful, 1);
    assert_eq!(report.domains["medium.com"].successful, 1);
    assert_eq!(report.domains["unknown.example"].successful, 0);

    let repo = store
        .find::<RepositoryDocument>(&DocumentFilter::by_link("https://github.com/ada/engine"))
        .await
        .unwrap()
        .expect("repository persisted");
    assert_eq!(repo.name, "engine");
    assert_eq!(repo.author_id, user.id);
    assert!(repo.content.contains_key("src/main.py"));
    assert!(repo.content.contains_key("README.md"));

    let article = store
        .find::<ArticleDocument>(&DocumentFilter::by_link(
            "https://medium.com/@ada/on-computation",
        ))
        .await
        .unwrap()
        .expect("article persisted");
    assert_eq!(article.content["title"], "On Computation");
    assert_eq!(article.author_full_name, "Ada Lovelace");
}

#[tokio::test]
async fn test_repeated_batch_is_idempotent() {
    init_tracing();
    let fixture = tempfile::tempdir().unwrap();
    write_file(fixture.path(), "src/main.py", b"print('hi')");

    let store = Arc::new(MemoryDocumentStore::new());
    let engine = MockBrowserEngine::new().with_heights([800, 800]);
    let dispatcher = build_dispatcher(store.clone(), fixture.path(), engine);

    let user = store.get_or_create_user("Ada", "Lovelace").await.unwrap();
    let links = vec!["https://github.com/ada/engine".to_string()];

    let first = crawl_links(&dispatcher, &links, &user, None).await;
    let writes_after_first = store.write_count();
    let second = crawl_links(&dispatcher, &links, &user, None).await;

    assert_eq!(first.successful(), 1);
    assert_eq!(second.successful(), 1);
    // The dedup'd second run performed zero writes.
    assert_eq!(store.write_count(), writes_after_first);

    let docs = store
        .find_all::<RepositoryDocument>(&DocumentFilter::by_link("https://github.com/ada/engine"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn test_vector_stage_joins_on_document_id() {
    init_tracing();
    let fixture = tempfile::tempdir().unwrap();
    write_file(fixture.path(), "src/main.py", b"print('hi')");

    let store = Arc::new(MemoryDocumentStore::new());
    let engine = MockBrowserEngine::new();
    let dispatcher = build_dispatcher(store.clone(), fixture.path(), engine);

    let user = store.get_or_create_user("Ada", "Lovelace").await.unwrap();
    let links = vec!["https://github.com/ada/engine".to_string()];
    crawl_links(&dispatcher, &links, &user, None).await;

    let doc = store
        .find::<RepositoryDocument>(&DocumentFilter::by_link("https://github.com/ada/engine"))
        .await
        .unwrap()
        .unwrap();

    // A later embedding stage writes records keyed by the document id;
    // the collection is provisioned lazily on first write.
    let vectors = MemoryVectorStore::new();
    let record = VectorRecord::new(doc.id, vec![1.0, 0.0, 0.0])
        .with_payload("platform", doc.platform.as_str());
    let report = vectors.upsert("repositories", &[record]).await.unwrap();
    assert!(report.provisioned);

    let ensure = vectors
        .ensure_collection(&CollectionSpec::new(
            "repositories",
            3,
            DistanceMetric::Cosine,
        ))
        .await
        .unwrap();
    assert_eq!(ensure, EnsureOutcome::AlreadyPresent);

    let hits = vectors
        .search("repositories", &[1.0, 0.0, 0.0], 1, None)
        .await
        .unwrap();
    assert_eq!(hits[0].id, doc.id);
}

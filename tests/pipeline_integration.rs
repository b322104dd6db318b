//! End-to-end runs of the pipeline against a fixture storefront.

use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use pipestock::store::{HttpImageFetcher, ObjectSink, TableSink};
use pipestock::{Config, HttpNavigator, Persister, Pipeline, SinkKind};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = include_str!("fixtures/home.html");
const SEARCH_PAGE_1: &str = include_str!("fixtures/search_page1.html");
const SEARCH_PAGE_2: &str = include_str!("fixtures/search_page2.html");
const PRODUCT: &str = include_str!("fixtures/product.html");
const PRODUCT_NO_PRICE: &str = include_str!("fixtures/product_no_price.html");

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

fn product(id: &str, name: &str, price: &str) -> ResponseTemplate {
    html(PRODUCT.replace("{id}", id).replace("{name}", name).replace("{price}", price))
}

/// Serves the home page, two result pages (one overlapping link), four products
/// of which one has no price, and every image.
async fn storefront() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET")).and(path("/gb/en/")).respond_with(html(HOME)).mount(&server).await;

    Mock::given(method("GET"))
        .and(path("/gb/en/search/"))
        .and(query_param("page", "2"))
        .respond_with(html(SEARCH_PAGE_2))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gb/en/search/"))
        .and(query_param("q", "desk"))
        .respond_with(html(SEARCH_PAGE_1))
        .mount(&server)
        .await;

    let products = [
        ("/gb/en/p/micke-desk-white-20351742/", product("20351742", "MICKE", "129")),
        ("/gb/en/p/lagkapten-desk-10501844/", product("10501844", "LAGKAPTEN", "45")),
        ("/gb/en/p/alex-desk-90263902/", html(PRODUCT_NO_PRICE)),
        ("/gb/en/p/trotten-desk-sit-stand-30516241/", product("30516241", "TROTTEN", "199")),
    ];
    for (product_path, response) in products {
        Mock::given(method("GET"))
            .and(path(product_path))
            .respond_with(response)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path_regex(r"^/images/\d+-\d\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8\xff\xe0".to_vec()))
        .mount(&server)
        .await;

    server
}

fn config(server: &MockServer) -> Config {
    Config {
        base_url: Some(format!("{}/gb/en/", server.uri())),
        word: "desk".to_string(),
        pages: 2,
        delay_ms: 0,
        delay_jitter_ms: 0,
        consent_timeout_ms: 100,
        ..Config::default()
    }
}

fn local_persister(root: &Path, images: bool) -> Persister {
    let persister = Persister::new(root).with_local(true);
    if images {
        persister.with_images(Arc::new(HttpImageFetcher::new(None).unwrap()))
    } else {
        persister
    }
}

#[tokio::test]
async fn test_local_and_images_run_is_idempotent() {
    let server = storefront().await;
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("raw_data");
    let config = config(&server);

    let navigator = HttpNavigator::new(&config).unwrap();
    let mut pipeline = Pipeline::new(navigator, local_persister(&root, true), &config);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.links_found, 4);
    assert_eq!(summary.products_visited, 4);
    assert_eq!(summary.products_failed, 1);
    assert_eq!(summary.written(SinkKind::Local), 3);
    assert_eq!(summary.written(SinkKind::Images), 3);
    assert_eq!(summary.images_saved, 9);
    assert_eq!(summary.images_failed, 0);

    let record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(root.join("20351742/data.json")).unwrap()).unwrap();
    assert_eq!(record["Product_id"], "20351742");
    assert_eq!(record["Price"], "£129");
    assert_eq!(record["Name"], "MICKE");
    assert_eq!(record["Description"], "Desk, white, 105x50 cm");
    assert_eq!(record["Image_link"], format!("{}/images/20351742-1.jpg", server.uri()));
    assert_eq!(record["Image_all_links"].as_array().unwrap().len(), 2);

    assert!(root.join("20351742/image/MICKE_20351742.jpg").exists());
    assert!(root.join("20351742/images/MICKE_0_20351742.jpg").exists());
    assert!(root.join("20351742/images/MICKE_1_20351742.jpg").exists());
    assert!(!root.join("90263902").exists());

    // Second run over the same folder stores nothing new
    let navigator = HttpNavigator::new(&config).unwrap();
    let mut rerun = Pipeline::new(navigator, local_persister(&root, true), &config);
    let summary = rerun.run().await.unwrap();

    assert_eq!(summary.written(SinkKind::Local), 0);
    assert_eq!(summary.seen(SinkKind::Local), 3);
    assert_eq!(summary.written(SinkKind::Images), 0);
    assert_eq!(summary.images_saved, 0);
}

#[tokio::test]
async fn test_max_products_without_images() {
    let server = storefront().await;
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("raw_data");
    let mut config = config(&server);
    config.max_products = Some(2);

    let navigator = HttpNavigator::new(&config).unwrap();
    let mut pipeline = Pipeline::new(navigator, local_persister(&root, false), &config);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.links_found, 4);
    assert_eq!(summary.products_visited, 2);
    assert_eq!(summary.written(SinkKind::Local), 2);
    assert_eq!(summary.images_saved, 0);
    assert!(root.join("20351742/data.json").exists());
    assert!(root.join("10501844/data.json").exists());
    assert!(!root.join("30516241").exists());
    assert!(!root.join("20351742/image").exists());
}

#[tokio::test]
async fn test_object_store_and_table_without_local() {
    let server = storefront().await;
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("raw_data");
    let config = config(&server);

    let memory = Arc::new(InMemory::new());
    let db_url = format!("sqlite://{}?mode=rwc", tmp.path().join("products.db").display());

    let persister = Persister::new(&root)
        .with_object_sink(ObjectSink::new(memory.clone(), "raw_data"))
        .with_table(TableSink::connect(&db_url, "table_name").await.unwrap());

    let navigator = HttpNavigator::new(&config).unwrap();
    let mut pipeline = Pipeline::new(navigator, persister, &config);
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.written(SinkKind::ObjectStore), 3);
    assert_eq!(summary.written(SinkKind::Table), 3);
    assert_eq!(summary.written(SinkKind::Local), 0);

    // Staging copies are gone once uploaded
    for id in ["20351742", "10501844", "30516241"] {
        assert!(!root.join(id).exists());
        let key = ObjectPath::from(format!("raw_data/{}/data.json", id));
        assert!(memory.head(&key).await.is_ok());
    }

    let table = TableSink::connect(&db_url, "table_name").await.unwrap();
    let ids = table.existing_ids().await.unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains("30516241"));

    // A rerun against the same bucket and table writes nothing
    let persister = Persister::new(&root)
        .with_object_sink(ObjectSink::new(memory.clone(), "raw_data"))
        .with_table(table);
    let navigator = HttpNavigator::new(&config).unwrap();
    let mut rerun = Pipeline::new(navigator, persister, &config);
    let summary = rerun.run().await.unwrap();

    assert_eq!(summary.written(SinkKind::ObjectStore), 0);
    assert_eq!(summary.written(SinkKind::Table), 0);
    assert_eq!(summary.seen(SinkKind::ObjectStore), 3);
    assert_eq!(summary.seen(SinkKind::Table), 3);
}

#![allow(dead_code)]

use enrollpay::application::config::EngineConfig;
use enrollpay::application::engine::{EnginePorts, OrderEngine};
use enrollpay::infrastructure::in_memory::InMemoryStore;
use enrollpay::infrastructure::payment::SimulatedGateway;
use enrollpay::interfaces::catalog::CatalogFile;
use std::io::{Error, Write};
use tempfile::NamedTempFile;

/// Course 1 costs 100, course 2 is free, course 3 is a draft.
pub const CATALOG: &str = r#"{
    "courses": [
        { "id": 1, "title": "Rust for Backend Engineers", "status": "published", "price": "100" },
        { "id": 2, "title": "Intro to Git", "status": "published", "price": "0" },
        { "id": 3, "title": "Unreleased", "status": "draft", "price": "30" }
    ],
    "coupons": [
        { "id": 1, "code": "SAVE20", "discount_type": "percentage", "discount_value": "20" },
        { "id": 2, "code": "ONCE", "discount_type": "fixed", "discount_value": "10", "usage_limit": 1 }
    ]
}"#;

pub const HEADER: [&str; 6] = ["command", "user", "course", "order", "coupon", "method"];

pub fn write_catalog(json: &str) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(json.as_bytes())?;
    file.flush()?;
    Ok(file)
}

pub fn write_commands(rows: &[[&str; 6]]) -> Result<NamedTempFile, Error> {
    let file = NamedTempFile::new()?;
    let mut wtr = csv::WriterBuilder::new().from_path(file.path())?;
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(file)
}

/// An engine over the sample catalog, backed by a fresh in-memory store.
pub async fn engine(config: EngineConfig) -> (OrderEngine, InMemoryStore) {
    let catalog = CatalogFile::from_reader(CATALOG.as_bytes()).unwrap();
    let store = InMemoryStore::new();
    catalog.seed_coupons(&store).await.unwrap();
    let ports = EnginePorts::from_store(catalog.course_catalog(), store.clone(), SimulatedGateway::new());
    (OrderEngine::new(ports, config), store)
}

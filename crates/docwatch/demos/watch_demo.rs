//! End-to-end tour of the subscription container against the in-memory
//! driver: one change-stream subscription with a typed body, one tailing
//! subscription, a stop/start cycle.
//!
//! Run with `cargo run --example watch_demo`.

use std::sync::Arc;
use std::time::Duration;

use bson::{doc, Document};
use docwatch::testing::MockDatabase;
use docwatch::{
    ChangeStreamEvent, ChangeStreamOptions, ChangeStreamRequest, Message, StreamFilter,
    SubscriptionContainer, TailingOptions, TailingRequest,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Order {
    #[serde(rename = "_id")]
    id: String,
    status: String,
}

#[tokio::main]
async fn main() -> Result<(), docwatch::Error> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let db = Arc::new(MockDatabase::new("shop"));
    let container = SubscriptionContainer::new(db.clone());

    // Typed change-stream subscription; update events get the full
    // document because the target type is not the raw Document.
    let orders = container.register(ChangeStreamRequest::new(
        |message: Message<ChangeStreamEvent, Order>| match message.body() {
            Ok(Some(order)) => println!("order {} is now {}", order.id, order.status),
            Ok(None) => println!("event without body"),
            Err(error) => eprintln!("conversion failed: {error}"),
        },
        ChangeStreamOptions::builder()
            .collection("orders")
            .filter(StreamFilter::criteria(doc! { "status": "shipped" }))
            .build(),
    ))?;

    // Tailing subscription on a capped audit log.
    container.register(TailingRequest::new(
        |message: Message<Document, Document>| {
            if let Ok(Some(entry)) = message.body() {
                println!("audit: {entry}");
            }
        },
        TailingOptions::builder().collection("audit").build(),
    ))?;

    container.start();
    while !orders.is_active() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    db.collection("orders")
        .insert(doc! { "_id": "o-1", "status": "shipped" });
    db.collection("audit").insert(doc! { "who": "demo", "what": "insert o-1" });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Stop cancels the workers but keeps the registrations.
    container.stop();
    assert!(!orders.is_active());

    container.start();
    while !orders.is_active() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    db.collection("orders")
        .insert(doc! { "_id": "o-2", "status": "shipped" });
    tokio::time::sleep(Duration::from_millis(100)).await;

    container.stop();
    println!("delivered {} order events", orders.metrics().messages_delivered);
    Ok(())
}

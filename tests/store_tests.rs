//! SQLite message store tests against an in-memory database.

use transmitter::{Message, MessageStore, SqliteStore};

async fn setup_store() -> SqliteStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        // every connection to :memory: is its own database
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create test database");

    let store = SqliteStore::with_pool(pool);
    store.run_migrations().await.expect("migrations failed");
    store
}

#[tokio::test]
async fn messages_round_trip_per_channel() {
    let store = setup_store().await;
    let sos = Message::new("SOS", 20, 600);
    let cq = Message::new("CQ DX", 40, 800);

    store.add_message("/lobby", &sos).await.unwrap();
    store.add_message("/lobby", &cq).await.unwrap();
    store.add_message("/tower", &sos).await.unwrap();

    let lobby = store.messages_for_channel("/lobby").await.unwrap();
    assert_eq!(lobby, vec![sos.clone(), cq]);

    let tower = store.messages_for_channel("/tower").await.unwrap();
    assert_eq!(tower, vec![sos]);
}

#[tokio::test]
async fn unknown_channel_is_empty() {
    let store = setup_store().await;
    let messages = store.messages_for_channel("/nowhere").await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn remove_deletes_every_copy() {
    let store = setup_store().await;
    let msg = Message::new("E", 20, 600);

    store.add_message("/lobby", &msg).await.unwrap();
    store.add_message("/lobby", &msg).await.unwrap();
    assert_eq!(store.messages_for_channel("/lobby").await.unwrap().len(), 2);

    let removed = store.remove_message("/lobby", &msg).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.messages_for_channel("/lobby").await.unwrap().is_empty());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = setup_store().await;
    store.run_migrations().await.unwrap();

    let msg = Message::new("TEST", 30, 700);
    store.add_message("/lobby", &msg).await.unwrap();
    store.run_migrations().await.unwrap();
    assert_eq!(store.messages_for_channel("/lobby").await.unwrap(), vec![msg]);
}

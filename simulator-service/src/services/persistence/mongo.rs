//! MongoDB transcript store.

use async_trait::async_trait;
use mongodb::{
    bson::{doc, Bson},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Duration;

use super::TranscriptSink;
use crate::models::{InteractionRecord, SessionRecord};
use crate::services::metrics;

pub const SESSIONS_COLLECTION: &str = "sessions";
pub const INTERACTIONS_COLLECTION: &str = "interactions";

#[derive(Clone)]
pub struct MongoTranscriptStore {
    client: MongoClient,
    db: Database,
    write_timeout: Duration,
}

impl MongoTranscriptStore {
    pub async fn connect(
        uri: &str,
        database: &str,
        write_timeout: Duration,
    ) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Connected to MongoDB database");
        Ok(Self {
            client,
            db,
            write_timeout,
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        let session_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_created_idx".to_string())
                    .build(),
            )
            .build();

        self.sessions()
            .create_index(session_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create sessions index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let interaction_index = IndexModel::builder()
            .keys(doc! { "session_id": 1, "turn_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("session_turn_idx".to_string())
                    .build(),
            )
            .build();

        self.interactions()
            .create_index(interaction_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create interactions index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    fn sessions(&self) -> Collection<SessionRecord> {
        self.db.collection(SESSIONS_COLLECTION)
    }

    fn interactions(&self) -> Collection<InteractionRecord> {
        self.db.collection(INTERACTIONS_COLLECTION)
    }
}

fn inserted_id_string(id: Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl TranscriptSink for MongoTranscriptStore {
    async fn open_session(&self, record: &SessionRecord) -> Option<String> {
        let sessions = self.sessions();
        let insert = sessions.insert_one(record, None);

        match tokio::time::timeout(self.write_timeout, insert).await {
            Ok(Ok(result)) => Some(inserted_id_string(result.inserted_id)),
            Ok(Err(e)) => {
                tracing::warn!(user_id = %record.user_id, "Failed to open session record: {}", e);
                metrics::record_persistence_failure("open_session");
                None
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %record.user_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Timed out opening session record"
                );
                metrics::record_persistence_failure("open_session");
                None
            }
        }
    }

    fn record_interaction(&self, record: InteractionRecord) {
        let collection = self.interactions();
        let write_timeout = self.write_timeout;

        tokio::spawn(async move {
            let insert = collection.insert_one(&record, None);
            let outcome = tokio::time::timeout(write_timeout, insert).await;

            let error = match outcome {
                Ok(Ok(_)) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "write timed out".to_string(),
            };

            tracing::warn!(
                session_id = %record.session_id,
                turn_number = record.turn_number,
                error = %error,
                "Failed to record interaction"
            );
            metrics::record_persistence_failure("record_interaction");
        });
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn object_ids_are_rendered_as_hex() {
        let oid = ObjectId::new();
        assert_eq!(inserted_id_string(Bson::ObjectId(oid)), oid.to_hex());
        assert_eq!(inserted_id_string(Bson::String("abc".into())), "abc");
    }

    #[tokio::test]
    async fn unreachable_server_keeps_placeholder_id() {
        let store = MongoTranscriptStore::connect(
            "mongodb://127.0.0.1:9/?serverSelectionTimeoutMS=200&connectTimeoutMS=200",
            "simulator_test",
            Duration::from_millis(300),
        )
        .await
        .unwrap();

        let id = store.open_session(&SessionRecord::opened("user-1")).await;
        assert!(id.is_none());
    }
}

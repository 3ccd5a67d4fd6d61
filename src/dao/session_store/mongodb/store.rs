use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult},
    models::{MongoSessionDocument, doc_id},
};
use crate::dao::{
    models::SessionEntity,
    session_store::SessionRepository,
    storage::StorageResult,
};

const SESSION_COLLECTION_NAME: &str = "avalon_sessions";

#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = open_database(&self.config).await?;
        *self.database.write().await = database;
        debug!(database = %self.config.database_name, "MongoDB handle replaced");
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = open_database(&config).await?;
        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        let expiry = IndexModel::builder()
            .keys(doc! {"updated_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_expiry_idx".to_owned()))
                    .expire_after(Some(self.session_ttl()))
                    .build(),
            )
            .build();

        collection
            .create_index(expiry)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "updated_at",
                source,
            })?;

        let by_state = IndexModel::builder()
            .keys(doc! {"state": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_state_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(by_state)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "state",
                source,
            })?;

        Ok(())
    }

    fn session_ttl(&self) -> Duration {
        self.inner.config.session_ttl
    }

    async fn collection(&self) -> Collection<MongoSessionDocument> {
        self.inner
            .database
            .read()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn put_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let document: MongoSessionDocument = session.into();
        let collection = self.collection().await;

        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;

        debug!(game_id = %id, "session document upserted");
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let collection = self.collection().await;

        let Some(document) = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?
        else {
            return Ok(None);
        };

        let entity = document
            .try_into()
            .map_err(|source| MongoDaoError::CorruptDocument { id, source })?;
        Ok(Some(entity))
    }

    async fn delete_session(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.collection().await;
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteSession { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn session_exists(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.collection().await;
        let matches = collection
            .count_documents(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(matches > 0)
    }

    async fn count_sessions(&self) -> MongoResult<u64> {
        let collection = self.collection().await;
        collection
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::CountSessions { source })
    }
}

impl SessionRepository for MongoSessionStore {
    fn put(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.put_session(session).await.map_err(Into::into) })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.get_session(id).await.map_err(Into::into) })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_session(id).await.map_err(Into::into) })
    }

    fn exists(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.session_exists(id).await.map_err(Into::into) })
    }

    fn count(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_sessions().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

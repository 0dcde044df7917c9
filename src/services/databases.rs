//! Document CRUD and live document views.

use super::segment;
use crate::client::{Call, Client, Role};
use crate::error::{Error, Result};
use crate::realtime::LiveView;
use appwrite_types::document::{ID, PERMISSIONS};
use appwrite_types::{
    with_appended_params, Channel, Document, DocumentError, DocumentList, Param, Query,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Clone)]
pub struct Databases {
    client: Client,
    role: Role,
}

impl Databases {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            role: Role::Client,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    fn documents_path(database_id: &str, collection_id: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            segment(database_id),
            segment(collection_id)
        )
    }

    fn document_path(database_id: &str, collection_id: &str, document_id: &str) -> String {
        format!(
            "{}/{}",
            Self::documents_path(database_id, collection_id),
            segment(document_id)
        )
    }

    pub async fn list_documents<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList<T>> {
        let call = Call::get(Self::documents_path(database_id, collection_id))
            .param(queries_param(queries))
            .role(self.role);
        self.client.call(call).await
    }

    pub async fn get_document<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        queries: &[Query],
    ) -> Result<Document<T>> {
        let call = Call::get(Self::document_path(database_id, collection_id, document_id))
            .param(queries_param(queries))
            .role(self.role);
        self.client.call(call).await
    }

    /// Create a document. `document_id` may be [`appwrite_types::UNIQUE_ID`].
    pub async fn create_document<T>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &T,
        permissions: Option<&[String]>,
    ) -> Result<Document<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut call = Call::post(Self::documents_path(database_id, collection_id))
            .param(Param::string("documentId", document_id))
            .param(Param::map("data", data_object(data)?))
            .role(self.role);
        if let Some(permissions) = permissions {
            call = call.param(Param::list("permissions", permissions.iter().cloned()));
        }
        self.client.call(call).await
    }

    /// Create several documents in one call. Each payload carries its own
    /// `$id` and the shared `$permissions`.
    pub async fn create_documents<T>(
        &self,
        database_id: &str,
        collection_id: &str,
        documents: &[(String, T)],
        permissions: &[String],
    ) -> Result<DocumentList<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let payloads = documents
            .iter()
            .map(|(id, data)| {
                with_appended_params(
                    data,
                    [
                        (ID, Value::from(id.as_str())),
                        (PERMISSIONS, Value::from(permissions.to_vec())),
                    ],
                )
            })
            .collect::<std::result::Result<Vec<_>, DocumentError>>()?;
        let call = Call::post(Self::documents_path(database_id, collection_id))
            .param(Param::json_list("documents", payloads))
            .role(self.role);
        self.client.call(call).await
    }

    pub async fn update_document<T>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &T,
        permissions: Option<&[String]>,
    ) -> Result<Document<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut call = Call::patch(Self::document_path(database_id, collection_id, document_id))
            .param(Param::map("data", data_object(data)?))
            .role(self.role);
        if let Some(permissions) = permissions {
            call = call.param(Param::list("permissions", permissions.iter().cloned()));
        }
        self.client.call(call).await
    }

    pub async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let call = Call::delete(Self::document_path(database_id, collection_id, document_id))
            .role(self.role);
        self.client.call_bytes(call).await?;
        Ok(())
    }

    /// Live list of a collection, re-fetched on every change.
    pub fn live_documents<T>(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> LiveView<DocumentList<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let service = self.clone();
        let database_id = database_id.to_string();
        let collection_id = collection_id.to_string();
        let channels = vec![Channel::documents(&database_id, &collection_id)];
        self.client.live(channels, move || {
            let service = service.clone();
            let database_id = database_id.clone();
            let collection_id = collection_id.clone();
            let queries = queries.clone();
            async move {
                service
                    .list_documents(&database_id, &collection_id, &queries)
                    .await
            }
        })
    }

    /// Live single document. A missing document is emitted as `None` and
    /// the view keeps running.
    pub fn live_document<T>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> LiveView<Option<Document<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let service = self.clone();
        let database_id = database_id.to_string();
        let collection_id = collection_id.to_string();
        let document_id = document_id.to_string();
        let channels = vec![Channel::document(
            &database_id,
            &collection_id,
            &document_id,
        )];
        self.client.live(channels, move || {
            let service = service.clone();
            let database_id = database_id.clone();
            let collection_id = collection_id.clone();
            let document_id = document_id.clone();
            async move {
                match service
                    .get_document(&database_id, &collection_id, &document_id, &[])
                    .await
                {
                    Ok(document) => Ok(Some(document)),
                    Err(e) if e.is_not_found() => {
                        debug!(document_id = %document_id, "live document not found");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        })
    }
}

fn queries_param(queries: &[Query]) -> Param {
    Param::list("queries", queries.iter().map(ToString::to_string))
}

fn data_object<T: Serialize>(data: &T) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(data)? {
        Value::Object(object) => Ok(object),
        _ => Err(Error::Document(DocumentError::DataNotAnObject)),
    }
}

impl Client {
    pub fn databases(&self) -> Databases {
        Databases::new(self.clone())
    }
}

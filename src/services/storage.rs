//! Bucket files.

use super::segment;
use crate::client::{Call, Client, Role};
use crate::error::Result;
use crate::transport::ProgressCallback;
use crate::upload::UploadProgressCallback;
use appwrite_types::{File, FileList, InputFile, Param, Query};
use bytes::Bytes;

#[derive(Clone)]
pub struct Storage {
    client: Client,
    role: Role,
}

impl Storage {
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

    fn files_path(bucket_id: &str) -> String {
        format!("/storage/buckets/{}/files", segment(bucket_id))
    }

    fn file_path(bucket_id: &str, file_id: &str) -> String {
        format!("{}/{}", Self::files_path(bucket_id), segment(file_id))
    }

    /// Upload `file`, resuming a partial upload of the same `file_id`.
    pub async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file: InputFile,
        permissions: Option<&[String]>,
        on_progress: Option<UploadProgressCallback>,
    ) -> Result<File> {
        let mut call = Call::post(Self::files_path(bucket_id))
            .multipart()
            .param(Param::string("fileId", file_id))
            .param(Param::file(file.file_name, file.data))
            .role(self.role);
        if let Some(permissions) = permissions {
            call = call.param(Param::list("permissions", permissions.iter().cloned()));
        }
        self.client.chunked_upload(call, on_progress).await
    }

    pub async fn get_file(&self, bucket_id: &str, file_id: &str) -> Result<File> {
        let call = Call::get(Self::file_path(bucket_id, file_id)).role(self.role);
        self.client.call(call).await
    }

    pub async fn list_files(
        &self,
        bucket_id: &str,
        queries: &[Query],
        search: Option<&str>,
    ) -> Result<FileList> {
        let mut call = Call::get(Self::files_path(bucket_id))
            .param(Param::list(
                "queries",
                queries.iter().map(ToString::to_string),
            ))
            .role(self.role);
        if let Some(search) = search {
            call = call.param(Param::string("search", search));
        }
        self.client.call(call).await
    }

    pub async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        let call = Call::delete(Self::file_path(bucket_id, file_id)).role(self.role);
        self.client.call_bytes(call).await?;
        Ok(())
    }

    /// Raw file content.
    pub async fn get_file_download(
        &self,
        bucket_id: &str,
        file_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Bytes> {
        let mut call = Call::get(format!("{}/download", Self::file_path(bucket_id, file_id)))
            .role(self.role);
        if let Some(on_progress) = on_progress {
            call = call.on_download_progress(on_progress);
        }
        self.client.call_bytes(call).await
    }
}

impl Client {
    pub fn storage(&self) -> Storage {
        Storage::new(self.clone())
    }
}

//! Resumable chunked uploads.
//!
//! Payloads below [`CHUNK_SIZE`] go out as one ordinary POST. Larger ones
//! first probe the file record for `chunksUploaded`, then stream the
//! remaining chunks in order with a `Content-Range` header.

use crate::client::{decode_body, Call, Client};
use crate::error::{Error, Result};
use appwrite_types::params::{find_file, find_string, replace_file_data};
use appwrite_types::upload::content_range;
use appwrite_types::{UploadProgress, CHUNK_SIZE, UNIQUE_ID};
use reqwest::header::HeaderValue;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub const HEADER_CONTENT_RANGE: &str = "content-range";
pub const HEADER_UPLOAD_ID: &str = "x-appwrite-id";

/// Invoked once per acknowledged chunk.
pub type UploadProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

impl Client {
    /// Upload the file param of `call` in chunks of [`CHUNK_SIZE`].
    ///
    /// `call` must carry a file param and a string `fileId` param. Its path
    /// is the collection path (e.g. `storage/buckets/{bucketId}/files`);
    /// the resume probe reads `{path}/{fileId}`.
    pub async fn chunked_upload<T: DeserializeOwned>(
        &self,
        mut call: Call,
        on_progress: Option<UploadProgressCallback>,
    ) -> Result<T> {
        let (size, data) = match find_file(call.params_ref()) {
            Some((_, data)) => (data.len() as u64, data.clone()),
            None => return Err(Error::contract("upload requires a file param")),
        };
        let file_id = find_string(call.params_ref(), "fileId")
            .map(str::to_string)
            .ok_or_else(|| Error::contract("upload requires a string fileId param"))?;
        call.set_method(Method::POST);

        if size < CHUNK_SIZE {
            debug!(file_id = %file_id, size, "single request upload");
            return self.call(call).await;
        }

        let chunks_total = size.div_ceil(CHUNK_SIZE);
        let mut offset = self.resume_offset(&call, &file_id).await?;
        if offset > 0 {
            info!(file_id = %file_id, offset, size, "resuming upload");
        }

        let params = call.params_ref().to_vec();
        let mut last: Option<Value> = None;
        while offset < size {
            let end = (offset + CHUNK_SIZE).min(size);
            let chunk = data.slice(offset as usize..end as usize);

            let mut chunk_call = call.clone();
            chunk_call.set_params(replace_file_data(&params, chunk));
            chunk_call.headers_mut().insert(
                HEADER_CONTENT_RANGE,
                HeaderValue::from_str(&content_range(offset, size))?,
            );

            let response: Value = self.call(chunk_call).await?;
            if let Some(id) = response.get("$id").and_then(Value::as_str) {
                call.headers_mut()
                    .insert(HEADER_UPLOAD_ID, HeaderValue::from_str(id)?);
            }

            offset += CHUNK_SIZE;
            let uploaded = offset.min(size);
            let progress = UploadProgress {
                id: response
                    .get("$id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                progress: uploaded as f64 / size as f64 * 100.0,
                size_uploaded: uploaded,
                chunks_total: response
                    .get("chunksTotal")
                    .and_then(Value::as_u64)
                    .unwrap_or(chunks_total),
                chunks_uploaded: response
                    .get("chunksUploaded")
                    .and_then(Value::as_u64)
                    .unwrap_or_else(|| uploaded.div_ceil(CHUNK_SIZE)),
            };
            debug!(
                file_id = %file_id,
                progress = progress.progress,
                chunks_uploaded = progress.chunks_uploaded,
                "chunk acknowledged"
            );
            if let Some(on_progress) = &on_progress {
                on_progress(progress);
            }
            last = Some(response);
        }

        let last = last.ok_or_else(|| {
            Error::contract(format!(
                "upload of {} produced no chunk response (resume offset past end)",
                file_id
            ))
        })?;
        Ok(serde_json::from_value(last)?)
    }

    /// Byte offset to resume from. A missing file record starts at zero.
    async fn resume_offset(&self, call: &Call, file_id: &str) -> Result<u64> {
        if file_id == UNIQUE_ID {
            return Ok(0);
        }
        let probe = Call::get(format!(
            "{}/{}",
            call.path().trim_end_matches('/'),
            urlencoding::encode(file_id)
        ))
        .role(call.role_ref());
        match self.call_bytes(probe).await {
            Ok(body) => {
                let record: Value = decode_body(&body)?;
                let chunks_uploaded = record
                    .get("chunksUploaded")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                resume_point(chunks_uploaded)
            }
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Byte offset after `chunks_uploaded` full chunks.
fn resume_point(chunks_uploaded: u64) -> Result<u64> {
    chunks_uploaded.checked_mul(CHUNK_SIZE).ok_or_else(|| {
        Error::contract(format!(
            "chunksUploaded {} is out of range",
            chunks_uploaded
        ))
    })
}

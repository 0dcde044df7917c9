//! reqwest-backed transport.

use super::{
    HttpTransport, ProgressCallback, SessionCookies, TransportError, TransportRequest,
    TransportResponse,
};
use crate::config::Timeouts;
use crate::encoding::{EncodedBody, FormPart, FormValue};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::sync::Arc;
use tracing::trace;

/// Granularity of upload progress reports.
const PROGRESS_SLICE: usize = 64 * 1024;

/// HTTP transport over a shared `reqwest::Client`.
///
/// Cheap to clone; concurrent calls share the connection pool.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport for `base_url` with the given timeouts.
    ///
    /// `cookies` is attached for the client role only.
    pub fn new(
        base_url: &str,
        timeouts: &Timeouts,
        self_signed: bool,
        cookies: Option<Arc<SessionCookies>>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .timeout(timeouts.request())
            .danger_accept_invalid_certs(self_signed);
        if let Some(cookies) = cookies {
            builder = builder.cookie_provider(cookies);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self::from_client(http, base_url))
    }

    /// Wrap an existing client.
    pub fn from_client(http: Client, base_url: &str) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            path,
            mut headers,
            body,
            on_upload,
            on_download,
        } = request;

        let url = format!("{}{}", self.base_url, path);
        if body.is_multipart() {
            // reqwest writes its own content-type with the boundary
            headers.remove(CONTENT_TYPE);
        }

        let mut builder = self.http.request(method, &url).headers(headers);
        builder = match body {
            EncodedBody::Query(pairs) if pairs.is_empty() => builder,
            EncodedBody::Query(pairs) => builder.query(&pairs),
            EncodedBody::Json(object) => builder.json(&object),
            EncodedBody::Multipart(parts) => builder.multipart(build_form(parts, on_upload)?),
        };

        let mut response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let total = response.content_length();

        let mut received = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            received.extend_from_slice(&chunk);
            if let Some(on_download) = &on_download {
                on_download(received.len() as u64, total);
            }
        }
        trace!(%status, bytes = received.len(), "response received");

        Ok(TransportResponse {
            status,
            body: received.freeze(),
        })
    }
}

fn build_form(
    parts: Vec<FormPart>,
    on_upload: Option<ProgressCallback>,
) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part.value {
            FormValue::Text(text) => form.text(part.name, text),
            FormValue::File { file_name, data } => {
                let len = data.len() as u64;
                let body = match &on_upload {
                    Some(on_upload) => progress_body(data, on_upload.clone()),
                    None => Body::from(data),
                };
                let file_part = Part::stream_with_length(body, len)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                form.part(part.name, file_part)
            }
        };
    }
    Ok(form)
}

/// Stream `data` in slices, reporting bytes handed to the connection.
fn progress_body(data: Bytes, on_upload: ProgressCallback) -> Body {
    let total = data.len() as u64;
    let slices: Vec<Bytes> = (0..data.len())
        .step_by(PROGRESS_SLICE)
        .map(|start| data.slice(start..(start + PROGRESS_SLICE).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(slices).map(move |slice| {
        sent += slice.len() as u64;
        on_upload(sent, Some(total));
        Ok::<Bytes, std::io::Error>(slice)
    });
    Body::wrap_stream(stream)
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let t = ReqwestTransport::from_client(Client::new(), "http://localhost/v1");
        assert_eq!(t.base_url(), "http://localhost/v1/");
        let t = ReqwestTransport::from_client(Client::new(), "http://localhost/v1/");
        assert_eq!(t.base_url(), "http://localhost/v1/");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connect_error() {
        let t = ReqwestTransport::new("http://127.0.0.1:1/v1", &Timeouts::default(), false, None)
            .unwrap();
        let err = t
            .send(TransportRequest {
                method: reqwest::Method::GET,
                path: "health".into(),
                headers: Default::default(),
                body: EncodedBody::Query(Vec::new()),
                on_upload: None,
                on_download: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_) | TransportError::Io(_)));
    }
}

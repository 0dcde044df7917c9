//! Call layer.
//!
//! Every backend operation funnels through [`Client::call`]: check
//! connectivity, pick the role transport, merge headers, encode params,
//! send, and decode either the success body or a [`BackendError`].

use crate::config::ClientConfig;
use crate::connectivity::{AssumeConnected, ConnectivityProbe};
use crate::encoding::{encode, BodyKind, MULTIPART_FORM_DATA};
use crate::error::{Error, Result};
use crate::realtime::{RealtimeTransport, WebSocketRealtime};
use crate::transport::{
    HttpTransport, ProgressCallback, ReqwestTransport, SessionCookies, SessionStore,
    TransportRequest,
};
use appwrite_types::{BackendError, Param};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Privilege context of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// End-user context: project id and session cookies.
    Client,
    /// Privileged context: project id and API key.
    Server,
}

/// A single backend call, built up before dispatch.
#[derive(Clone)]
pub struct Call {
    method: Method,
    path: String,
    headers: HeaderMap,
    params: Vec<Param>,
    role: Role,
    on_upload: Option<ProgressCallback>,
    on_download: Option<ProgressCallback>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("role", &self.role)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: Vec::new(),
            role: Role::Client,
            on_upload: None,
            on_download: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Ask for a multipart body instead of JSON.
    pub fn multipart(self) -> Self {
        self.header(CONTENT_TYPE, HeaderValue::from_static(MULTIPART_FORM_DATA))
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn on_upload_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_upload = Some(callback);
        self
    }

    pub fn on_download_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_download = Some(callback);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn params_ref(&self) -> &[Param] {
        &self.params
    }

    pub fn role_ref(&self) -> Role {
        self.role
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_params(&mut self, params: Vec<Param>) {
        self.params = params;
    }
}

/// Strip a single leading slash; the base URL already ends in one.
pub fn normalize_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Decode a success body. An empty body decodes as JSON `null`, so calls
/// without a response payload can target `()`.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(serde_json::from_value(Value::Null)?)
    } else {
        Ok(serde_json::from_slice(body)?)
    }
}

struct RoleTransport {
    headers: HeaderMap,
    transport: Arc<dyn HttpTransport>,
}

struct Inner {
    config: ClientConfig,
    client: RoleTransport,
    server: Option<RoleTransport>,
    connectivity: Arc<dyn ConnectivityProbe>,
    session: Option<Arc<dyn SessionStore>>,
    realtime: Arc<dyn RealtimeTransport>,
}

/// Shared handle to the backend. Cheap to clone; safe to use from many
/// tasks at once.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Client with reqwest transports, WebSocket realtime and no
    /// connectivity probe.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            connectivity: None,
            client_transport: None,
            server_transport: None,
            realtime: None,
            cookies: None,
            session: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn realtime(&self) -> Arc<dyn RealtimeTransport> {
        self.inner.realtime.clone()
    }

    /// True when the server role is available.
    pub fn has_server_role(&self) -> bool {
        self.inner.server.is_some()
    }

    /// Drop every session cookie held by the client role.
    pub fn clear_session(&self) {
        if let Some(session) = &self.inner.session {
            session.clear();
        }
    }

    /// Execute `call` and decode the success body as `T`.
    pub async fn call<T: DeserializeOwned>(&self, call: Call) -> Result<T> {
        let body = self.call_bytes(call).await?;
        decode_body(&body)
    }

    /// Execute `call` and return the raw success body.
    pub async fn call_bytes(&self, call: Call) -> Result<Bytes> {
        let Call {
            method,
            path,
            headers,
            params,
            role,
            on_upload,
            on_download,
        } = call;

        let role_transport = self.role_transport(role)?;

        if !self.inner.connectivity.is_connected().await {
            warn!(%method, path = %path, "no connectivity, call not dispatched");
            return Err(Error::no_connectivity());
        }

        let path = normalize_path(&path).to_string();
        let mut merged = role_transport.headers.clone();
        merged.extend(headers);
        let body = encode(&method, BodyKind::from_headers(&merged), &params);

        debug!(%method, path = %path, ?role, "dispatching call");
        let response = role_transport
            .transport
            .send(TransportRequest {
                method: method.clone(),
                path: path.clone(),
                headers: merged,
                body,
                on_upload,
                on_download,
            })
            .await
            .map_err(|e| {
                warn!(%method, path = %path, error = %e, "transport failure");
                Error::from(e)
            })?;

        if response.status.is_success() {
            debug!(%method, path = %path, status = %response.status, "call succeeded");
            Ok(response.body)
        } else {
            let err = BackendError::from_response(response.status.as_u16(), &response.body);
            debug!(
                %method,
                path = %path,
                code = err.code,
                kind = ?err.kind,
                "backend returned an error"
            );
            Err(Error::Backend(err))
        }
    }

    fn role_transport(&self, role: Role) -> Result<&RoleTransport> {
        match role {
            Role::Client => Ok(&self.inner.client),
            Role::Server => self
                .inner
                .server
                .as_ref()
                .ok_or_else(|| Error::contract("server role requires an API key")),
        }
    }
}

/// Assembles a [`Client`], optionally with custom collaborators.
pub struct ClientBuilder {
    config: ClientConfig,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
    client_transport: Option<Arc<dyn HttpTransport>>,
    server_transport: Option<Arc<dyn HttpTransport>>,
    realtime: Option<Arc<dyn RealtimeTransport>>,
    cookies: Option<Arc<SessionCookies>>,
    session: Option<Arc<dyn SessionStore>>,
}

impl ClientBuilder {
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    pub fn client_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.client_transport = Some(transport);
        self
    }

    pub fn server_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.server_transport = Some(transport);
        self
    }

    pub fn realtime(mut self, realtime: Arc<dyn RealtimeTransport>) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Cookie jar for the default client-role transport.
    pub fn cookies(mut self, cookies: Arc<SessionCookies>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Session store cleared by [`Client::clear_session`] when a custom
    /// client transport is used.
    pub fn session_store(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> Result<Client> {
        let config = self.config;
        config.validate()?;
        let endpoint = config.endpoint();

        let (client_transport, session) = match self.client_transport {
            Some(transport) => (transport, self.session),
            None => {
                let cookies = self.cookies.unwrap_or_default();
                let transport = ReqwestTransport::new(
                    &endpoint,
                    &config.timeouts,
                    config.self_signed,
                    Some(cookies.clone()),
                )?;
                let session: Arc<dyn SessionStore> = cookies;
                (
                    Arc::new(transport) as Arc<dyn HttpTransport>,
                    Some(self.session.unwrap_or(session)),
                )
            }
        };
        let client = RoleTransport {
            headers: config.base_headers(Role::Client)?,
            transport: client_transport,
        };

        let server = if config.api_key.is_some() {
            let transport = match self.server_transport {
                Some(transport) => transport,
                None => Arc::new(ReqwestTransport::new(
                    &endpoint,
                    &config.timeouts,
                    config.self_signed,
                    None,
                )?) as Arc<dyn HttpTransport>,
            };
            Some(RoleTransport {
                headers: config.base_headers(Role::Server)?,
                transport,
            })
        } else {
            None
        };

        let realtime = match self.realtime {
            Some(realtime) => realtime,
            None => Arc::new(WebSocketRealtime::from_config(&config)) as Arc<dyn RealtimeTransport>,
        };

        debug!(
            endpoint = %endpoint,
            project = %config.project_id,
            server_role = server.is_some(),
            "client constructed"
        );

        Ok(Client {
            inner: Arc::new(Inner {
                config,
                client,
                server,
                connectivity: self
                    .connectivity
                    .unwrap_or_else(|| Arc::new(AssumeConnected)),
                session,
                realtime,
            }),
        })
    }
}

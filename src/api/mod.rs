pub(crate) mod stream;
pub(crate) mod transport;

use crate::models::{
    DocType, EvaluationPoint, HealthReport, Identity, KnowledgeDetail, KnowledgeDoc, LogKind,
    LogRecord, LogSeverity, ModelConfig, Project, TaskStatus,
};
use crate::session::SessionStore;
use crate::state::list::{ListQuery, ListResult};
use crate::state::reorder::{DropPosition, MoveRequest};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use transport::{HttpTransport, MultipartForm, OutgoingRequest, RawResponse, RequestBody, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// Rejected locally; no request was sent.
    Validation,
    Network,
    Unauthorized,
    Http,
    /// 2xx response whose body still reports a failure.
    Application,
    Parse,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub data: Option<Value>,
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Validation,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    fn network(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: format!("Network error: {e}"),
            status: None,
            data: None,
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: format!("Unexpected response: {e}"),
            status: None,
            data: None,
        }
    }

    fn from_response(kind: ApiErrorKind, message: String, status: u16, payload: Payload) -> Self {
        Self {
            kind,
            message,
            status: Some(status),
            data: Some(payload.into_value()),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// A response body after the single read: JSON when it parses, text otherwise.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn decode(content_type: Option<&str>, body: String) -> Self {
        let declared_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let trimmed = body.trim_start();
        let looks_json = trimmed.starts_with('{') || trimmed.starts_with('[');

        if declared_json || looks_json {
            if let Ok(v) = serde_json::from_str::<Value>(&body) {
                return Payload::Json(v);
            }
        }
        Payload::Text(body)
    }

    fn into_value(self) -> Value {
        match self {
            Payload::Json(v) => v,
            Payload::Text(t) => Value::String(t),
        }
    }
}

fn field_message(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        // FastAPI validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        Value::Array(items) => {
            let msgs = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()).or_else(|| i.as_str()))
                .collect::<Vec<_>>();
            if msgs.is_empty() {
                Some(v.to_string())
            } else {
                Some(msgs.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

/// `error`, then `detail`, then `message`.
fn structured_message(payload: &Payload) -> Option<String> {
    let Payload::Json(v) = payload else {
        return None;
    };
    ["error", "detail", "message"]
        .iter()
        .find_map(|k| v.get(*k).and_then(field_message))
}

fn is_application_error(payload: &Payload) -> bool {
    let Payload::Json(v) = payload else {
        return false;
    };
    let has_error = v.get("error").map(|e| !e.is_null()).unwrap_or(false);
    let status_error = v.get("status").and_then(|s| s.as_str()) == Some("error");
    has_error || status_error
}

/// Turn a raw response into a payload or a typed error. Pure; the 401 side
/// effect lives in `ApiClient::dispatch`.
pub(crate) fn normalize_response(raw: RawResponse) -> ApiResult<Payload> {
    let payload = Payload::decode(raw.content_type.as_deref(), raw.body);

    if !(200..300).contains(&raw.status) {
        let message = structured_message(&payload)
            .or_else(|| match &payload {
                Payload::Text(t) if !t.trim().is_empty() => Some(t.trim().to_string()),
                _ => None,
            })
            .unwrap_or_else(|| {
                if raw.status_text.trim().is_empty() {
                    format!("Request failed ({})", raw.status)
                } else {
                    raw.status_text.clone()
                }
            });
        let kind = if raw.status == 401 {
            ApiErrorKind::Unauthorized
        } else {
            ApiErrorKind::Http
        };
        return Err(ApiError::from_response(kind, message, raw.status, payload));
    }

    if is_application_error(&payload) {
        let message =
            structured_message(&payload).unwrap_or_else(|| "Request failed".to_string());
        return Err(ApiError::from_response(
            ApiErrorKind::Application,
            message,
            raw.status,
            payload,
        ));
    }

    Ok(payload)
}

fn decode_payload<T: DeserializeOwned>(payload: Payload) -> ApiResult<T> {
    serde_json::from_value(payload.into_value()).map_err(ApiError::parse)
}

pub(crate) fn with_query(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let qs = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{qs}")
}

pub(crate) fn require_non_empty(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

pub(crate) fn require_http_url(value: &str, field: &str) -> ApiResult<()> {
    match reqwest::Url::parse(value.trim()) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => Ok(()),
        _ => Err(ApiError::validation(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

// ---- wire types --------------------------------------------------------

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    pub token_type: String,
}

#[derive(Serialize, Clone, Debug)]
pub(crate) struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct ProjectDraft {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Serialize, Clone, Debug)]
pub(crate) struct CreateLogRequest {
    pub project_id: i64,
    pub log_type: LogKind,
    pub message: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Created {
    pub id: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct LogFilter {
    pub kind: Option<LogKind>,
    pub severity: Option<LogSeverity>,
}

#[derive(Serialize, Clone, Debug)]
struct MoveDocumentRequest {
    project_id: i64,
    doc_id: i64,
    anchor_doc_id: i64,
    position: DropPosition,
}

/// Upload result. A duplicate is an expected outcome, not an error.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum UploadOutcome {
    #[serde(rename = "success")]
    Uploaded {
        id: i64,
        filename: String,
    },
    Duplicate {
        existing_filename: String,
        #[serde(default)]
        existing_doc_id: Option<i64>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FileUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<EvaluationPoint>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct TestGenRequest {
    pub requirement: String,
    pub project_id: i64,
    pub compress: bool,
    pub expected_count: u32,
    pub batch_index: u32,
    pub batch_size: u32,
}

impl TestGenRequest {
    pub fn new(project_id: i64, requirement: String) -> Self {
        Self {
            requirement,
            project_id,
            compress: false,
            expected_count: 20,
            batch_index: 0,
            batch_size: 20,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct TaskTicket {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct ApiTestRequest {
    pub requirement: String,
    pub project_id: i64,
    pub base_url: Option<String>,
    pub test_types: Option<Vec<String>>,
    /// "natural" | "structured"
    pub mode: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct ApiTestReport {
    #[serde(default)]
    pub script: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

pub(crate) const AUTOMATION_TYPES: &[&str] = &["web", "app"];

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct UiAutomationRequest {
    /// Page URL for "web", package or app name for "app".
    pub url: String,
    pub task: String,
    pub project_id: i64,
    pub automation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_context: Option<String>,
}

impl UiAutomationRequest {
    fn validate(&self) -> ApiResult<()> {
        require_non_empty(&self.task, "Task")?;
        if !AUTOMATION_TYPES.contains(&self.automation_type.as_str()) {
            return Err(ApiError::validation(format!(
                "Unknown automation type: {}",
                self.automation_type
            )));
        }
        if self.automation_type == "web" {
            require_http_url(&self.url, "Page URL")
        } else {
            require_non_empty(&self.url, "App")
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct UiAutomationReport {
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub result: Value,
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    content: &'a str,
    project_id: i64,
}

#[derive(Deserialize)]
struct EvaluateResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct ModelConfigRequest {
    pub provider: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vl_model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbo_model_name: Option<String>,
}

impl ModelConfigRequest {
    fn validate(&self) -> ApiResult<()> {
        require_non_empty(&self.provider, "Provider")?;
        require_non_empty(&self.model_name, "Model name")?;
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            require_http_url(url, "Base URL")?;
        }
        Ok(())
    }
}

// ---- client ------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    session: SessionStore,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(base_url: String, session: SessionStore) -> Self {
        Self::with_transport(base_url, session, Arc::new(HttpTransport))
    }

    pub fn with_transport(
        base_url: String,
        session: SessionStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            transport,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn prepare(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> ApiResult<OutgoingRequest> {
        if !path.starts_with('/') {
            return Err(ApiError::validation(format!(
                "API path must start with '/': {path}"
            )));
        }

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.session.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        match &body {
            RequestBody::Json(_) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()))
            }
            RequestBody::Form(_) => headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )),
            // The transport writes the multipart boundary itself.
            RequestBody::Multipart(_) | RequestBody::Empty => {}
        }

        Ok(OutgoingRequest {
            method,
            url: self.url(path),
            headers,
            body,
        })
    }

    async fn dispatch(&self, req: OutgoingRequest) -> ApiResult<Payload> {
        let method = req.method.clone();
        let url = req.url.clone();
        tracing::debug!("{method} {url}");

        let raw = self.transport.send(req).await.map_err(|e| {
            tracing::warn!("{method} {url} failed: {e}");
            ApiError::network(e)
        })?;

        if raw.status == 401 {
            self.session.clear();
        }

        normalize_response(raw).inspect_err(|e| {
            tracing::debug!("{method} {url} -> {:?}: {}", e.kind, e.message);
        })
    }

    async fn send_body<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> ApiResult<T> {
        let req = self.prepare(method, path, body)?;
        decode_payload(self.dispatch(req).await?)
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> ApiResult<T> {
        let body = match body {
            Some(b) => RequestBody::Json(serde_json::to_value(b).map_err(ApiError::parse)?),
            None => RequestBody::Empty,
        };
        self.send_body(method, path, body).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_body(Method::GET, path, RequestBody::Empty).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_body(Method::DELETE, path, RequestBody::Empty).await
    }

    pub async fn upload<T: DeserializeOwned>(&self, path: &str, form: MultipartForm) -> ApiResult<T> {
        if !form.has_file() {
            return Err(ApiError::validation("Please choose a file to upload"));
        }
        self.send_body(Method::POST, path, RequestBody::Multipart(form))
            .await
    }

    pub async fn submit_form<T: DeserializeOwned>(
        &self,
        path: &str,
        pairs: Vec<(String, String)>,
    ) -> ApiResult<T> {
        self.send_body(Method::POST, path, RequestBody::Form(pairs))
            .await
    }

    // ---- auth ----

    pub async fn register(&self, username: &str, password: &str) -> ApiResult<Identity> {
        require_non_empty(username, "Username")?;
        require_non_empty(password, "Password")?;
        self.request(
            Method::POST,
            "/api/auth/register",
            Some(&RegisterRequest {
                username: username.trim().to_string(),
                password: password.to_string(),
            }),
        )
        .await
    }

    /// OAuth2 password flow, then resolve the identity with the new token.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Identity> {
        require_non_empty(username, "Username")?;
        require_non_empty(password, "Password")?;

        let token: TokenResponse = self
            .submit_form(
                "/api/auth/login",
                vec![
                    ("username".to_string(), username.trim().to_string()),
                    ("password".to_string(), password.to_string()),
                ],
            )
            .await?;
        self.session.sign_in(token.access_token);

        match self.me().await {
            Ok(user) => {
                self.session.set_user(user.clone());
                tracing::info!("signed in as {}", user.username);
                Ok(user)
            }
            Err(e) => {
                self.session.clear();
                Err(e)
            }
        }
    }

    pub async fn me(&self) -> ApiResult<Identity> {
        self.get("/api/auth/me").await
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    // ---- projects ----

    pub async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.get("/api/projects").await
    }

    pub async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project> {
        require_non_empty(&draft.name, "Project name")?;
        self.request(Method::POST, "/api/projects", Some(draft)).await
    }

    pub async fn update_project(&self, id: i64, draft: &ProjectDraft) -> ApiResult<Project> {
        require_non_empty(&draft.name, "Project name")?;
        self.request(Method::PUT, &format!("/api/projects/{id}"), Some(draft))
            .await
    }

    pub async fn delete_project(&self, id: i64) -> ApiResult<Value> {
        self.delete(&format!("/api/projects/{id}")).await
    }

    // ---- knowledge base ----

    pub async fn knowledge_list(
        &self,
        project_id: i64,
        query: &ListQuery,
    ) -> ApiResult<ListResult<KnowledgeDoc>> {
        let mut pairs = vec![("project_id".to_string(), project_id.to_string())];
        pairs.extend(query.query_pairs());
        self.get(&with_query("/api/knowledge-list", &pairs)).await
    }

    pub async fn knowledge_detail(&self, global_id: i64) -> ApiResult<KnowledgeDetail> {
        self.get(&format!("/api/knowledge/{global_id}")).await
    }

    pub async fn delete_knowledge(&self, global_id: i64) -> ApiResult<Value> {
        self.delete(&format!("/api/knowledge/{global_id}")).await
    }

    pub async fn upload_knowledge(
        &self,
        project_id: i64,
        doc_type: DocType,
        file: FileUpload,
        force: bool,
    ) -> ApiResult<UploadOutcome> {
        require_non_empty(&file.file_name, "File")?;
        let form = MultipartForm::new()
            .file("file", &file.file_name, file.mime, file.bytes)
            .text("doc_type", doc_type.as_ref())
            .text("project_id", project_id.to_string())
            .text("force", if force { "true" } else { "false" });
        self.upload("/api/upload-knowledge", form).await
    }

    pub async fn move_knowledge(&self, project_id: i64, mv: &MoveRequest) -> ApiResult<Value> {
        if mv.subject_id == mv.anchor_id {
            return Err(ApiError::validation("A document cannot be moved relative to itself"));
        }
        self.request(
            Method::POST,
            "/api/knowledge/move",
            Some(&MoveDocumentRequest {
                project_id,
                doc_id: mv.subject_id,
                anchor_doc_id: mv.anchor_id,
                position: mv.position,
            }),
        )
        .await
    }

    // ---- activity log ----

    pub async fn create_log(&self, project_id: i64, kind: LogKind, message: &str) -> ApiResult<i64> {
        require_non_empty(message, "Message")?;
        let created: Created = self
            .request(
                Method::POST,
                "/api/logs",
                Some(&CreateLogRequest {
                    project_id,
                    log_type: kind,
                    message: message.to_string(),
                }),
            )
            .await?;
        Ok(created.id)
    }

    pub async fn list_logs(&self, project_id: i64, filter: &LogFilter) -> ApiResult<Vec<LogRecord>> {
        let mut pairs = vec![];
        if let Some(kind) = filter.kind {
            pairs.push(("log_type".to_string(), kind.as_str().to_string()));
        }
        if let Some(sev) = filter.severity {
            pairs.push(("severity".to_string(), sev.to_string()));
        }
        self.get(&with_query(&format!("/api/logs/{project_id}"), &pairs))
            .await
    }

    pub async fn clear_logs(&self, project_id: i64) -> ApiResult<Value> {
        self.delete(&format!("/api/logs/{project_id}")).await
    }

    // ---- monitoring / reports ----

    pub async fn health(&self) -> ApiResult<HealthReport> {
        self.get("/api/health").await
    }

    pub async fn evaluation_history(
        &self,
        project_id: i64,
        limit: u32,
    ) -> ApiResult<Vec<EvaluationPoint>> {
        let path = with_query(
            &format!("/api/evaluation/history/{project_id}"),
            &[("limit".to_string(), limit.to_string())],
        );
        let res: HistoryResponse = self.get(&path).await?;
        Ok(res.history)
    }

    // ---- generation / automation ----

    pub async fn generate_tests_async(&self, req: &TestGenRequest) -> ApiResult<TaskTicket> {
        require_non_empty(&req.requirement, "Requirement")?;
        if req.expected_count == 0 {
            return Err(ApiError::validation("Expected count must be at least 1"));
        }
        self.request(Method::POST, "/api/generate-tests/async", Some(req))
            .await
    }

    pub async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatus> {
        require_non_empty(task_id, "Task id")?;
        self.get(&format!("/api/tasks/{}", urlencoding::encode(task_id)))
            .await
    }

    pub async fn run_api_test(&self, req: &ApiTestRequest) -> ApiResult<ApiTestReport> {
        require_non_empty(&req.requirement, "Requirement")?;
        if let Some(url) = req.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            require_http_url(url, "Base URL")?;
        }
        self.request(Method::POST, "/api/api-testing", Some(req)).await
    }

    pub async fn run_ui_automation(&self, req: &UiAutomationRequest) -> ApiResult<UiAutomationReport> {
        req.validate()?;
        self.request(Method::POST, "/api/ui-automation", Some(req))
            .await
    }

    /// Score a block of test cases; the verdict is the evaluator's report text.
    pub async fn evaluate(&self, project_id: i64, content: &str) -> ApiResult<String> {
        require_non_empty(content, "Content")?;
        let res: EvaluateResponse = self
            .request(Method::POST, "/api/evaluate", Some(&EvaluateRequest { content, project_id }))
            .await?;
        Ok(match res.result {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        })
    }

    // ---- model provider settings ----

    pub async fn current_model_config(&self) -> ApiResult<ModelConfig> {
        self.get("/api/config/current").await
    }

    pub async fn validate_model_config(&self, req: &ModelConfigRequest) -> ApiResult<Value> {
        req.validate()?;
        self.request(Method::POST, "/api/config/validate", Some(req))
            .await
    }

    pub async fn save_model_config(&self, req: &ModelConfigRequest) -> ApiResult<i64> {
        req.validate()?;
        let created: Created = self
            .request(Method::POST, "/api/config/save", Some(req))
            .await?;
        Ok(created.id)
    }

    /// URL of the SSE endpoint streaming a short completion from a provider.
    /// The endpoint only sees query parameters, so a key-protected provider
    /// needs `api_key` here.
    pub fn stream_test_url(
        &self,
        provider: &str,
        model: &str,
        prompt: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
    ) -> ApiResult<String> {
        require_non_empty(provider, "Provider")?;
        require_non_empty(model, "Model name")?;
        let prompt = if prompt.trim().is_empty() { "Hi" } else { prompt };
        let mut pairs = vec![
            ("provider".to_string(), provider.to_string()),
            ("model".to_string(), model.to_string()),
            ("prompt".to_string(), prompt.to_string()),
        ];
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            pairs.push(("api_key".to_string(), key.to_string()));
        }
        if let Some(url) = base_url.map(str::trim).filter(|u| !u.is_empty()) {
            require_http_url(url, "Base URL")?;
            pairs.push(("base_url".to_string(), url.to_string()));
        }
        Ok(self.url(&with_query("/api/config/test-stream", &pairs)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::transport::{OutgoingRequest, RawResponse, Transport};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub requests: Mutex<Vec<OutgoingRequest>>,
        responses: Mutex<VecDeque<Result<RawResponse, String>>>,
    }

    impl FakeTransport {
        pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
            self.push_raw(status, Some("application/json"), &body.to_string())
        }

        pub fn push_raw(&self, status: u16, content_type: Option<&str>, body: &str) -> &Self {
            self.responses.lock().unwrap().push_back(Ok(RawResponse {
                status,
                status_text: status_text(status).to_string(),
                content_type: content_type.map(|s| s.to_string()),
                body: body.to_string(),
            }));
            self
        }

        pub fn push_failure(&self, message: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
            self
        }

        pub fn sent(&self) -> Vec<OutgoingRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        }
    }

    #[async_trait(?Send)]
    impl Transport for FakeTransport {
        async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, String> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no canned response".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeTransport;
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn client_with(fake: &Arc<FakeTransport>, token: Option<&str>) -> ApiClient {
        let session = SessionStore::in_memory();
        if let Some(t) = token {
            session.sign_in(t.to_string());
        }
        ApiClient::with_transport("http://api.test/".to_string(), session, fake.clone())
    }

    #[test]
    fn test_auth_header_present_only_with_token() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!([])).push_json(200, json!([]));

        let authed = client_with(&fake, Some("jwt-1"));
        block_on(authed.list_projects()).expect("list");
        let anon = client_with(&fake, None);
        block_on(anon.list_projects()).expect("list");

        let sent = fake.sent();
        assert_eq!(sent[0].header("authorization"), Some("Bearer jwt-1"));
        assert_eq!(sent[0].url, "http://api.test/api/projects");
        assert!(sent[1].header("Authorization").is_none());
    }

    #[test]
    fn test_upload_never_sets_json_content_type() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"status": "success", "id": 9, "filename": "a.txt"}));
        let c = client_with(&fake, Some("t"));

        let out = block_on(c.upload_knowledge(
            3,
            DocType::Requirement,
            FileUpload {
                file_name: "a.txt".to_string(),
                mime: Some("text/plain".to_string()),
                bytes: b"hello".to_vec(),
            },
            false,
        ))
        .expect("upload");
        assert_eq!(
            out,
            UploadOutcome::Uploaded {
                id: 9,
                filename: "a.txt".to_string()
            }
        );

        let req = &fake.sent()[0];
        assert!(req.header("Content-Type").is_none());
        let RequestBody::Multipart(form) = &req.body else {
            panic!("expected multipart body");
        };
        assert!(form.has_file());
        assert!(form
            .parts
            .iter()
            .any(|(k, v)| k == "project_id" && *v == transport::PartValue::Text("3".to_string())));
    }

    #[test]
    fn test_upload_duplicate_is_an_outcome() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(
            200,
            json!({"status": "duplicate", "existing_filename": "foo.txt", "existing_doc_id": 4}),
        );
        let c = client_with(&fake, Some("t"));

        let out = block_on(c.upload_knowledge(
            1,
            DocType::TestCase,
            FileUpload {
                file_name: "bar.txt".to_string(),
                mime: None,
                bytes: vec![1, 2, 3],
            },
            false,
        ))
        .expect("duplicate is not an error");
        match out {
            UploadOutcome::Duplicate {
                existing_filename, ..
            } => assert!(existing_filename.contains("foo.txt")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_upload_without_file_is_rejected_locally() {
        let fake = Arc::new(FakeTransport::default());
        let c = client_with(&fake, Some("t"));
        let err = block_on(c.upload::<Value>("/api/upload-knowledge", MultipartForm::new().text("a", "b")))
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert!(fake.sent().is_empty());
    }

    #[test]
    fn test_401_clears_session_regardless_of_body() {
        for body in ["", "not json", r#"{"detail":"Could not validate credentials"}"#] {
            let fake = Arc::new(FakeTransport::default());
            fake.push_raw(401, Some("application/json"), body);
            let c = client_with(&fake, Some("stale"));

            let err = block_on(c.list_projects()).unwrap_err();
            assert!(err.is_unauthorized());
            assert_eq!(err.status, Some(401));
            assert!(c.session().token().is_none());
        }
    }

    #[test]
    fn test_error_message_priority() {
        let cases = [
            (json!({"error": "E", "detail": "D", "message": "M"}), "E"),
            (json!({"detail": "D", "message": "M"}), "D"),
            (json!({"message": "M"}), "M"),
            (
                json!({"detail": [{"loc": ["body", "name"], "msg": "field required", "type": "missing"}]}),
                "field required",
            ),
        ];
        for (body, expected) in cases {
            let err = normalize_response(RawResponse {
                status: 400,
                status_text: "Bad Request".to_string(),
                content_type: Some("application/json".to_string()),
                body: body.to_string(),
            })
            .unwrap_err();
            assert_eq!(err.kind, ApiErrorKind::Http);
            assert_eq!(err.message, expected);
            assert_eq!(err.status, Some(400));
        }
    }

    #[test]
    fn test_error_message_falls_back_to_text_then_status() {
        let err = normalize_response(RawResponse {
            status: 502,
            status_text: "Bad Gateway".to_string(),
            content_type: Some("text/html".to_string()),
            body: "upstream down".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.message, "upstream down");

        let err = normalize_response(RawResponse {
            status: 500,
            status_text: "Internal Server Error".to_string(),
            content_type: None,
            body: "  ".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.message, "Internal Server Error");
    }

    #[test]
    fn test_success_with_error_field_is_application_error() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"error": "Project name already exists in this level"}));
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.create_project(&ProjectDraft {
            name: "Alpha".to_string(),
            ..Default::default()
        }))
        .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Application);
        assert_eq!(err.message, "Project name already exists in this level");
        assert_eq!(err.data, Some(json!({"error": "Project name already exists in this level"})));
    }

    #[test]
    fn test_null_error_field_is_not_a_failure() {
        let payload = normalize_response(RawResponse {
            status: 200,
            status_text: "OK".to_string(),
            content_type: Some("application/json".to_string()),
            body: r#"{"error": null, "id": 1}"#.to_string(),
        })
        .expect("ok");
        assert_eq!(payload, Payload::Json(json!({"error": null, "id": 1})));
    }

    #[test]
    fn test_invalid_json_body_is_kept_as_text() {
        assert_eq!(
            Payload::decode(Some("application/json"), "{oops".to_string()),
            Payload::Text("{oops".to_string())
        );
        assert_eq!(
            Payload::decode(None, r#"{"a":1}"#.to_string()),
            Payload::Json(json!({"a": 1}))
        );
        assert_eq!(
            Payload::decode(Some("text/plain"), "plain".to_string()),
            Payload::Text("plain".to_string())
        );
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_failure("connection refused");
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.health()).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Network);
        assert!(err.message.contains("connection refused"));
        // A transport failure says nothing about the token.
        assert!(c.session().is_authenticated());
    }

    #[test]
    fn test_validation_errors_send_nothing() {
        let fake = Arc::new(FakeTransport::default());
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.create_project(&ProjectDraft {
            name: "   ".to_string(),
            ..Default::default()
        }))
        .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);

        let err = block_on(c.run_api_test(&ApiTestRequest {
            requirement: "login returns token".to_string(),
            project_id: 1,
            base_url: Some("not a url".to_string()),
            test_types: None,
            mode: "natural".to_string(),
        }))
        .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);

        let err = block_on(c.get::<Value>("api/projects")).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);

        assert!(fake.sent().is_empty());
    }

    #[test]
    fn test_login_stores_token_and_identity() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"access_token": "jwt-x", "token_type": "bearer"}))
            .push_json(200, json!({"id": 5, "username": "qa"}));
        let c = client_with(&fake, None);

        let user = block_on(c.login("qa", "secret")).expect("login");
        assert_eq!(user.username, "qa");
        assert_eq!(c.session().token().as_deref(), Some("jwt-x"));

        let sent = fake.sent();
        assert_eq!(
            sent[0].header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            sent[0].body,
            RequestBody::Form(vec![
                ("username".to_string(), "qa".to_string()),
                ("password".to_string(), "secret".to_string()),
            ])
        );
        assert_eq!(sent[1].header("Authorization"), Some("Bearer jwt-x"));
    }

    #[test]
    fn test_login_rejected_leaves_no_session() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(401, json!({"detail": "Incorrect username or password"}));
        let c = client_with(&fake, None);

        let err = block_on(c.login("qa", "bad")).unwrap_err();
        assert_eq!(err.message, "Incorrect username or password");
        assert!(!c.is_authenticated());
    }

    #[test]
    fn test_json_request_sets_content_type() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"status": "success", "id": 77}));
        let c = client_with(&fake, Some("t"));

        let id = block_on(c.create_log(3, LogKind::User, "checked login flow")).expect("log");
        assert_eq!(id, 77);

        let req = &fake.sent()[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(
            req.body,
            RequestBody::Json(json!({"project_id": 3, "log_type": "user", "message": "checked login flow"}))
        );
    }

    #[test]
    fn test_create_project_then_refresh_includes_it() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"id": 11, "name": "Checkout", "level": 1}))
            .push_json(
                200,
                json!([
                    {"id": 11, "name": "Checkout", "level": 1, "description": null},
                    {"id": 2, "name": "Legacy", "level": 1}
                ]),
            );
        let c = client_with(&fake, Some("t"));

        let created = block_on(c.create_project(&ProjectDraft {
            name: "Checkout".to_string(),
            ..Default::default()
        }))
        .expect("create");
        let projects = block_on(c.list_projects()).expect("list");
        assert!(projects.iter().any(|p| p.name == created.name));
    }

    #[test]
    fn test_knowledge_list_query_string() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(
            200,
            json!({"documents": [], "pagination": {"page": 1, "total_pages": 1, "total": 0}}),
        );
        let c = client_with(&fake, Some("t"));

        let mut q = ListQuery::new(6);
        q.set_filter("search", "login & auth");
        block_on(c.knowledge_list(4, &q)).expect("list");

        assert_eq!(
            fake.sent()[0].url,
            "http://api.test/api/knowledge-list?project_id=4&page=1&page_size=6&search=login%20%26%20auth"
        );
    }

    #[test]
    fn test_move_request_body() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"success": true}));
        let c = client_with(&fake, Some("t"));

        block_on(c.move_knowledge(
            2,
            &MoveRequest {
                subject_id: 10,
                anchor_id: 12,
                position: DropPosition::After,
            },
        ))
        .expect("move");
        assert_eq!(
            fake.sent()[0].body,
            RequestBody::Json(json!({"project_id": 2, "doc_id": 10, "anchor_doc_id": 12, "position": "after"}))
        );
    }

    #[test]
    fn test_failed_move_reports_application_error() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"error": "Move failed"}));
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.move_knowledge(
            2,
            &MoveRequest {
                subject_id: 10,
                anchor_id: 12,
                position: DropPosition::Before,
            },
        ))
        .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Application);
    }

    #[test]
    fn test_task_failure_surfaces_as_error() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(
            200,
            json!({"task_id": "abc", "status": "FAILURE", "result": null, "error": "quota exhausted"}),
        );
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.task_status("abc")).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Application);
        assert_eq!(err.message, "quota exhausted");
    }

    #[test]
    fn test_config_validate_reports_invalid() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"valid": false, "error": "unknown provider: foo"}));
        let c = client_with(&fake, Some("t"));

        let req = ModelConfigRequest {
            provider: "foo".to_string(),
            model_name: "m".to_string(),
            ..Default::default()
        };
        let err = block_on(c.validate_model_config(&req)).unwrap_err();
        assert_eq!(err.message, "unknown provider: foo");
    }

    #[test]
    fn test_stream_test_url() {
        let fake = Arc::new(FakeTransport::default());
        let c = client_with(&fake, None);
        let url = c.stream_test_url("openai", "gpt-4o-mini", "", None, None).expect("url");
        assert_eq!(
            url,
            "http://api.test/api/config/test-stream?provider=openai&model=gpt-4o-mini&prompt=Hi"
        );
        let url = c
            .stream_test_url("ollama", "qwen2", "ping", Some("  "), Some("http://gpu:11434/v1"))
            .expect("url");
        assert!(url.ends_with("&prompt=ping&base_url=http%3A%2F%2Fgpu%3A11434%2Fv1"));
        assert!(c.stream_test_url("", "m", "x", None, None).is_err());
        assert!(c.stream_test_url("openai", "m", "x", None, Some("gpu:11434")).is_err());
    }

    #[test]
    fn test_stream_test_url_forwards_api_key() {
        let fake = Arc::new(FakeTransport::default());
        let c = client_with(&fake, None);
        let url = c
            .stream_test_url("dashscope", "qwen-max", "Hi", Some("sk-a/b+c"), None)
            .expect("url");
        assert_eq!(
            url,
            "http://api.test/api/config/test-stream?provider=dashscope&model=qwen-max&prompt=Hi&api_key=sk-a%2Fb%2Bc"
        );
    }

    #[test]
    fn test_clear_logs_status_error_is_application_error() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"status": "error", "message": "Project not found"}));
        let c = client_with(&fake, Some("t"));

        let err = block_on(c.clear_logs(3)).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Application);
        assert_eq!(err.message, "Project not found");
        assert_eq!(fake.sent()[0].method, Method::DELETE);
        assert!(fake.sent()[0].url.ends_with("/api/logs/3"));
    }

    #[test]
    fn test_ui_automation_request_and_report() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(
            200,
            json!({"script": "page.goto(url)", "result": {"status": "success", "steps": 4}}),
        );
        let c = client_with(&fake, Some("t"));

        let req = UiAutomationRequest {
            url: "https://shop.test/login".to_string(),
            task: "log in and open the cart".to_string(),
            project_id: 5,
            automation_type: "web".to_string(),
            image_model: None,
            requirement_context: Some("Cart keeps items".to_string()),
        };
        let report = block_on(c.run_ui_automation(&req)).expect("report");
        assert_eq!(report.script, "page.goto(url)");
        assert_eq!(report.result["status"], "success");

        let sent = fake.sent();
        assert!(sent[0].url.ends_with("/api/ui-automation"));
        assert_eq!(
            sent[0].body,
            RequestBody::Json(json!({
                "url": "https://shop.test/login",
                "task": "log in and open the cart",
                "project_id": 5,
                "automation_type": "web",
                "requirement_context": "Cart keeps items",
            }))
        );
    }

    #[test]
    fn test_ui_automation_validation() {
        let fake = Arc::new(FakeTransport::default());
        let c = client_with(&fake, Some("t"));
        let base = UiAutomationRequest {
            url: "com.shop.app".to_string(),
            task: "open settings".to_string(),
            project_id: 1,
            automation_type: "app".to_string(),
            image_model: None,
            requirement_context: None,
        };

        let web_without_url = UiAutomationRequest {
            automation_type: "web".to_string(),
            ..base.clone()
        };
        let err = block_on(c.run_ui_automation(&web_without_url)).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);

        let unknown = UiAutomationRequest {
            automation_type: "desktop".to_string(),
            ..base.clone()
        };
        assert!(block_on(c.run_ui_automation(&unknown)).is_err());

        let blank_task = UiAutomationRequest {
            task: " ".to_string(),
            ..base
        };
        assert!(block_on(c.run_ui_automation(&blank_task)).is_err());
        assert!(fake.sent().is_empty());
    }

    #[test]
    fn test_evaluate_returns_report_text() {
        let fake = Arc::new(FakeTransport::default());
        fake.push_json(200, json!({"result": "Score: 8/10"}))
            .push_json(200, json!({"result": {"score": 8}}));
        let c = client_with(&fake, Some("t"));

        assert_eq!(block_on(c.evaluate(4, "case 1: login")).expect("text"), "Score: 8/10");
        assert_eq!(
            fake.sent()[0].body,
            RequestBody::Json(json!({"content": "case 1: login", "project_id": 4}))
        );
        let structured = block_on(c.evaluate(4, "case 1: login")).expect("json");
        assert!(structured.contains("\"score\": 8"));

        let err = block_on(c.evaluate(4, "  ")).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert_eq!(fake.sent().len(), 2);
    }
}

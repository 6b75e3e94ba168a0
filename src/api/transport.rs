use async_trait::async_trait;
use reqwest::Method;

/// A single multipart field.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PartValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MultipartForm {
    pub parts: Vec<(String, PartValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push((name.to_string(), PartValue::Text(value.into())));
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, mime: Option<String>, bytes: Vec<u8>) -> Self {
        self.parts.push((
            name.to_string(),
            PartValue::File {
                file_name: file_name.to_string(),
                mime,
                bytes,
            },
        ));
        self
    }

    pub fn has_file(&self) -> bool {
        self.parts
            .iter()
            .any(|(_, v)| matches!(v, PartValue::File { .. }))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(MultipartForm),
}

/// Fully prepared request: URL resolved, headers decided.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

#[cfg(test)]
impl OutgoingRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What came back over the wire, before any interpretation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Sends prepared requests. Errors are transport-level only (DNS, refused,
/// aborted); any HTTP status is a successful send.
#[async_trait(?Send)]
pub(crate) trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, String>;
}

/// Browser `fetch` (wasm) or hyper (native) through reqwest.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct HttpTransport;

impl HttpTransport {
    fn into_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, String> {
        let mut out = reqwest::multipart::Form::new();
        for (name, value) in form.parts {
            out = match value {
                PartValue::Text(text) => out.text(name, text),
                PartValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime.filter(|m| !m.trim().is_empty()) {
                        part = part.mime_str(&mime).map_err(|e| e.to_string())?;
                    }
                    out.part(name, part)
                }
            };
        }
        Ok(out)
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, String> {
        let client = reqwest::Client::new();
        let mut req = client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        req = match request.body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => {
                req.body(serde_json::to_vec(&value).map_err(|e| e.to_string())?)
            }
            RequestBody::Form(pairs) => req.form(&pairs),
            RequestBody::Multipart(form) => req.multipart(Self::into_reqwest_form(form)?),
        };

        let res = req.send().await.map_err(|e| e.to_string())?;

        let status = res.status();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = res.text().await.map_err(|e| e.to_string())?;

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_type,
            body,
        })
    }
}

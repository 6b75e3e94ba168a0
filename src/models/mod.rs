use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// Authenticated account as returned by `/api/auth/me`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Identity {
    pub id: i64,
    pub username: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Nesting depth, 1..=3.
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_level() -> u8 {
    1
}

/// Document categories understood by the knowledge base.
///
/// `Incomplete` doubles as the filter for product requirements on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum DocType {
    Requirement,
    Incomplete,
    TestCase,
    Prototype,
}

impl DocType {
    pub fn label(&self) -> &'static str {
        match self {
            DocType::Requirement => "Requirement",
            DocType::Incomplete => "Product requirement",
            DocType::TestCase => "Test case",
            DocType::Prototype => "Prototype",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct LinkedDoc {
    pub id: i64,
    pub global_id: i64,
    pub filename: String,
    #[serde(default)]
    pub content_preview: String,
    #[serde(default)]
    pub content: String,
}

/// One row of `/api/knowledge-list`.
///
/// `id` is the per-project number shown to users; `global_id` is what every
/// mutating endpoint (move, delete, detail) expects.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct KnowledgeDoc {
    pub id: i64,
    pub global_id: i64,
    pub filename: String,
    pub doc_type: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub source_doc_id: Option<i64>,
    #[serde(default)]
    pub source_doc_name: Option<String>,
    #[serde(default)]
    pub content_preview: String,
    #[serde(default)]
    pub linked_test_cases: Vec<LinkedDoc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct KnowledgeDetail {
    pub id: i64,
    pub global_id: i64,
    pub filename: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub linked_docs: Vec<LinkedDoc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogKind {
    User,
    #[serde(other)]
    System,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::User => "user",
            LogKind::System => "system",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum LogSeverity {
    Error,
    Ok,
}

/// Log row as stored by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct LogRecord {
    pub id: i64,
    pub project_id: i64,
    pub log_type: LogKind,
    pub message: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct ServiceHealth {
    pub ok: bool,
    #[serde(default)]
    pub details: String,
    // The backend reports "Unknown" when the setting is missing, so keep these loose.
    #[serde(default)]
    pub host: Option<serde_json::Value>,
    #[serde(default)]
    pub port: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct HealthReport {
    pub mysql: ServiceHealth,
    pub redis: ServiceHealth,
}

impl HealthReport {
    pub fn all_ok(&self) -> bool {
        self.mysql.ok && self.redis.ok
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct EvaluationPoint {
    pub id: i64,
    pub created_at: String,
    #[serde(default)]
    pub precision: f64,
    #[serde(default)]
    pub recall: f64,
    #[serde(default)]
    pub f1_score: f64,
    #[serde(default)]
    pub semantic_similarity: f64,
    #[serde(default)]
    pub missing_count: u32,
    #[serde(default)]
    pub hallucination_count: u32,
    #[serde(default)]
    pub modification_count: u32,
}

/// Celery task state as reported by `/api/tasks/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct TaskStatus {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCESS" | "FAILURE" | "REVOKED")
    }

    /// Number of generated cases when the result is a JSON array.
    pub fn generated_count(&self) -> Option<usize> {
        self.result
            .as_ref()
            .and_then(|r| r.as_array())
            .map(|cases| cases.len())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub(crate) struct ModelConfig {
    pub active: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub vl_model_name: Option<String>,
    #[serde(default)]
    pub turbo_model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub has_api_key: bool,
}

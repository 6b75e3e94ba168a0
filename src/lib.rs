mod api;
mod app;
mod components;
mod config;
mod logging;
mod models;
mod pages;
mod session;
mod state;
mod storage;
mod util;

use crate::app::App;
use crate::config::EnvConfig;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use crate::models::Identity;
    use crate::session::SessionStore;
    use crate::storage::load_session_from_storage;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_persistent_session_roundtrip() {
        let store = SessionStore::persistent();
        store.clear();

        store.sign_in("t1".to_string());
        store.set_user(Identity {
            id: 1,
            username: "qa".to_string(),
        });

        let reloaded = SessionStore::persistent();
        assert_eq!(reloaded.token().as_deref(), Some("t1"));
        assert_eq!(reloaded.user().map(|u| u.username).as_deref(), Some("qa"));

        assert!(reloaded.clear());
        assert_eq!(load_session_from_storage(), (None, None));
    }
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    let config = EnvConfig::new();
    logging::init(config.log_level);
    tracing::info!("starting console, api at {}", config.api_url);
    mount_to_body(move || view! { <App config=config.clone() /> });
}

#[cfg(test)]
mod tests {
    use crate::api::{TaskTicket, TokenResponse, UploadOutcome};
    use crate::models::{HealthReport, KnowledgeDoc, LogKind, LogRecord, Project, TaskStatus};
    use crate::state::list::ListResult;

    #[test]
    fn test_token_response_contract_deserialize() {
        let json = r#"{"access_token": "jwt-token", "token_type": "bearer"}"#;
        let parsed: TokenResponse = serde_json::from_str(json).expect("token response should parse");
        assert_eq!(parsed.access_token, "jwt-token");
    }

    #[test]
    fn test_project_contract_defaults() {
        let json = r#"{"id": 3, "name": "Payments"}"#;
        let p: Project = serde_json::from_str(json).expect("project should parse");
        assert_eq!(p.level, 1);
        assert!(p.parent_id.is_none());
    }

    #[test]
    fn test_knowledge_list_contract_deserialize() {
        let json = r#"{
            "documents": [{
                "id": 1,
                "global_id": 101,
                "filename": "login.md",
                "doc_type": "requirement",
                "created_at": "2024-05-01T10:00:00",
                "linked_test_cases": [{"id": 2, "global_id": 102, "filename": "login_cases.xlsx"}]
            }],
            "pagination": {"page": 2, "page_size": 6, "total": 7, "total_pages": 2}
        }"#;
        let res: ListResult<KnowledgeDoc> = serde_json::from_str(json).expect("list should parse");
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].global_id, 101);
        assert_eq!(res.items[0].linked_test_cases[0].filename, "login_cases.xlsx");
        assert_eq!(res.pagination.total_pages, 2);
    }

    #[test]
    fn test_upload_outcome_contract_deserialize() {
        let ok: UploadOutcome =
            serde_json::from_str(r#"{"status": "success", "id": 9, "filename": "a.txt"}"#).expect("success");
        assert!(matches!(ok, UploadOutcome::Uploaded { id: 9, .. }));

        let dup: UploadOutcome = serde_json::from_str(
            r#"{"status": "duplicate", "existing_filename": "foo.txt", "existing_doc_id": 4}"#,
        )
        .expect("duplicate");
        assert_eq!(
            dup,
            UploadOutcome::Duplicate {
                existing_filename: "foo.txt".to_string(),
                existing_doc_id: Some(4)
            }
        );
    }

    #[test]
    fn test_log_record_unknown_type_is_system() {
        let json = r#"{"id": 5, "project_id": 1, "log_type": "audit", "message": "x"}"#;
        let r: LogRecord = serde_json::from_str(json).expect("log should parse");
        assert_eq!(r.log_type, LogKind::System);
    }

    #[test]
    fn test_health_and_task_contracts() {
        let json = r#"{
            "mysql": {"ok": true, "details": "Connected", "host": "db", "port": 3306},
            "redis": {"ok": false, "details": "Connection refused", "host": "Unknown", "port": "Unknown"}
        }"#;
        let h: HealthReport = serde_json::from_str(json).expect("health should parse");
        assert!(h.mysql.ok);
        assert!(!h.all_ok());

        let ticket: TaskTicket =
            serde_json::from_str(r#"{"task_id": "abc", "status": "PENDING"}"#).expect("ticket");
        assert_eq!(ticket.task_id, "abc");

        let done: TaskStatus = serde_json::from_str(
            r#"{"task_id": "abc", "status": "SUCCESS", "result": [{"title": "a"}, {"title": "b"}]}"#,
        )
        .expect("status");
        assert!(done.is_terminal());
        assert_eq!(done.generated_count(), Some(2));
    }
}

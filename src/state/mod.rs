pub(crate) mod activity_log;
pub(crate) mod list;
pub(crate) mod polling;
pub(crate) mod reorder;

use crate::api::{ApiClient, ApiError};
use crate::components::toast::{show_toast, ToastKind, ToastQueue};
use crate::config::EnvConfig;
use crate::models::{Identity, Project};
use crate::session::SessionStore;
use crate::storage::{load_current_project, save_current_project};
use leptos::prelude::*;
use leptos::task::spawn_local;

#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub config: StoredValue<EnvConfig>,
    pub api_client: StoredValue<ApiClient>,

    /// Mirrors the session so views can react to login/logout/401.
    pub authenticated: RwSignal<bool>,
    pub current_user: RwSignal<Option<Identity>>,

    pub projects: RwSignal<Vec<Project>>,
    pub projects_loading: RwSignal<bool>,
    pub current_project_id: RwSignal<Option<i64>>,

    pub toasts: RwSignal<ToastQueue>,
}

impl AppState {
    pub fn new(config: EnvConfig) -> Self {
        let session = SessionStore::persistent();
        let authenticated = session.is_authenticated();
        let user = session.user();
        let client = ApiClient::new(config.api_url.clone(), session);
        tracing::info!("api base url: {}", client.base_url);

        Self {
            config: StoredValue::new(config),
            api_client: StoredValue::new(client),
            authenticated: RwSignal::new(authenticated),
            current_user: RwSignal::new(user),
            projects: RwSignal::new(vec![]),
            projects_loading: RwSignal::new(false),
            current_project_id: RwSignal::new(load_current_project()),
            toasts: RwSignal::new(ToastQueue::default()),
        }
    }

    pub fn client(&self) -> ApiClient {
        self.api_client.get_value()
    }

    pub fn config(&self) -> EnvConfig {
        self.config.get_value()
    }

    pub fn notify(&self, kind: ToastKind, message: impl Into<String>) {
        show_toast(self.toasts, kind, message);
    }

    pub fn signed_in(&self, user: Identity) {
        self.current_user.set(Some(user));
        self.authenticated.set(true);
    }

    pub fn sign_out(&self) {
        self.client().logout();
        self.go_to_login();
    }

    fn go_to_login(&self) {
        self.authenticated.set(false);
        self.current_user.set(None);
        self.projects.set(vec![]);
        let _ = window().location().set_href("/login");
    }

    /// Route a request error: a 401 (session already cleared by the client)
    /// sends the user to login, anything else is returned for the caller to
    /// show inline. Returns `None` when handled.
    pub fn triage(&self, e: ApiError) -> Option<ApiError> {
        if e.is_unauthorized() {
            tracing::info!("session expired, redirecting to login");
            self.go_to_login();
            None
        } else {
            Some(e)
        }
    }

    /// `triage`, then toast whatever is left.
    pub fn report(&self, e: ApiError) {
        if let Some(e) = self.triage(e) {
            self.notify(ToastKind::Error, e.message);
        }
    }

    pub fn select_project(&self, id: Option<i64>) {
        self.current_project_id.set(id);
        save_current_project(id);
    }

    pub fn current_project(&self) -> Option<Project> {
        let id = self.current_project_id.get()?;
        self.projects.with(|ps| ps.iter().find(|p| p.id == id).cloned())
    }

    pub fn refresh_projects(&self) {
        let state = *self;
        let client = self.client();
        self.projects_loading.set(true);
        spawn_local(async move {
            match client.list_projects().await {
                Ok(list) => {
                    // Drop a stale selection (project deleted elsewhere).
                    let selected = state.current_project_id.get_untracked();
                    if let Some(id) = selected {
                        if !list.iter().any(|p| p.id == id) {
                            state.select_project(list.first().map(|p| p.id));
                        }
                    } else if let Some(first) = list.first() {
                        state.select_project(Some(first.id));
                    }
                    state.projects.set(list);
                }
                Err(e) => state.report(e),
            }
            state.projects_loading.set(false);
        });
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AppContext(pub AppState);

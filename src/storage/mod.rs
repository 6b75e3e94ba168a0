use crate::models::Identity;
use serde::{Deserialize, Serialize};

pub(crate) const TOKEN_KEY: &str = "aitp_token";
pub(crate) const USER_KEY: &str = "aitp_user";
pub(crate) const CURRENT_PROJECT_KEY: &str = "aitp_current_project_id";

// View state restored when navigating back to a list.
pub(crate) const KNOWLEDGE_VIEW_KEY: &str = "aitp_knowledge_view";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = local_storage()?;
    let json = storage.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Some(storage) = local_storage() {
            let _ = storage.set_item(key, &json);
        }
    }
}

pub(crate) fn remove_from_storage(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

pub(crate) fn load_session_from_storage() -> (Option<String>, Option<Identity>) {
    let Some(storage) = local_storage() else {
        return (None, None);
    };

    let token = storage
        .get_item(TOKEN_KEY)
        .ok()
        .flatten()
        .filter(|t| !t.trim().is_empty());
    let user = storage
        .get_item(USER_KEY)
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok());

    (token, user)
}

pub(crate) fn save_token_to_storage(token: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(TOKEN_KEY, token);
    }
}

pub(crate) fn save_user_to_storage(user: &Identity) {
    save_json_to_storage(USER_KEY, user);
}

pub(crate) fn clear_session_storage() {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(TOKEN_KEY);
        let _ = storage.remove_item(USER_KEY);
    }
}

pub(crate) fn load_current_project() -> Option<i64> {
    local_storage()?
        .get_item(CURRENT_PROJECT_KEY)
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
}

pub(crate) fn save_current_project(id: Option<i64>) {
    match id {
        Some(id) => {
            if let Some(storage) = local_storage() {
                let _ = storage.set_item(CURRENT_PROJECT_KEY, &id.to_string());
            }
        }
        None => remove_from_storage(CURRENT_PROJECT_KEY),
    }
}

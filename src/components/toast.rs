use crate::state::AppContext;
use leptos::prelude::*;

pub(crate) const TOAST_TTL_MS: u32 = 4_000;
const MAX_TOASTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ToastQueue {
    items: Vec<Toast>,
    next_id: u64,
}

impl ToastQueue {
    /// Newest last. The oldest toast is dropped once the queue is full.
    pub fn push(&mut self, kind: ToastKind, message: impl Into<String>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.items.push(Toast {
            id,
            kind,
            message: message.into(),
        });
        if self.items.len() > MAX_TOASTS {
            self.items.remove(0);
        }
        id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|t| t.id != id);
    }

    pub fn items(&self) -> &[Toast] {
        &self.items
    }
}

/// Push a toast and schedule its removal.
pub(crate) fn show_toast(toasts: RwSignal<ToastQueue>, kind: ToastKind, message: impl Into<String>) {
    let message = message.into();
    match kind {
        ToastKind::Error => tracing::warn!("toast: {message}"),
        _ => tracing::debug!("toast: {message}"),
    }
    let id = toasts.try_update(|q| q.push(kind, message));
    if let Some(id) = id {
        gloo_timers::callback::Timeout::new(TOAST_TTL_MS, move || {
            toasts.try_update(|q| q.dismiss(id));
        })
        .forget();
    }
}

#[component]
pub fn ToastHost() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let toasts = app_state.0.toasts;

    view! {
        <div class="pointer-events-none fixed right-4 top-4 z-50 flex w-80 flex-col gap-2" aria-live="polite">
            <For
                each=move || toasts.get().items().to_vec()
                key=|t| t.id
                children=move |t| {
                    let tone = match t.kind {
                        ToastKind::Success => "border-success/40 bg-success/10 text-success",
                        ToastKind::Error => "border-destructive/40 bg-destructive/10 text-destructive",
                        ToastKind::Info => "border-border bg-card text-foreground",
                    };
                    let id = t.id;
                    view! {
                        <div
                            class=format!("pointer-events-auto rounded-md border px-3 py-2 text-xs shadow-sm {tone}")
                            role="status"
                            on:click=move |_| toasts.update(|q| q.dismiss(id))
                        >
                            {t.message}
                        </div>
                    }
                }
            />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_caps_and_dismisses() {
        let mut q = ToastQueue::default();
        let first = q.push(ToastKind::Info, "a");
        for i in 0..MAX_TOASTS {
            q.push(ToastKind::Info, format!("n{i}"));
        }
        assert_eq!(q.items().len(), MAX_TOASTS);
        assert!(q.items().iter().all(|t| t.id != first));

        let last = q.items()[MAX_TOASTS - 1].id;
        q.dismiss(last);
        assert_eq!(q.items().len(), MAX_TOASTS - 1);
    }
}

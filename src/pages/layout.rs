use crate::components::toast::ToastHost;
use crate::components::ui::{Button, ButtonSize, ButtonVariant, Card, CardContent, Spinner};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_location;

use super::auth::LoginPage;

const NAV_ITEMS: &[(&str, &str)] = &[
    ("/", "Dashboard"),
    ("/projects", "Projects"),
    ("/knowledge", "Knowledge base"),
    ("/generate", "Test generation"),
    ("/api-test", "API testing"),
    ("/ui-automation", "UI automation"),
    ("/evaluation", "Evaluation"),
    ("/settings", "Model settings"),
];

pub(crate) fn is_active(pathname: &str, href: &str) -> bool {
    if href == "/" {
        pathname == "/"
    } else {
        pathname == href || pathname.starts_with(&format!("{href}/"))
    }
}

#[component]
fn ProjectSwitcher() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let projects = app_state.0.projects;
    let current = app_state.0.current_project_id;

    let on_change = move |ev: web_sys::Event| {
        let value = event_target_value(&ev);
        app_state.0.select_project(value.parse::<i64>().ok());
    };

    view! {
        <div class="flex flex-col gap-1">
            <span class="text-[11px] uppercase tracking-wide text-muted-foreground">"Project"</span>
            <Show
                when=move || !projects.with(|p| p.is_empty())
                fallback=move || view! {
                    <a href="/projects" class="text-xs text-primary underline underline-offset-4">
                        {move || if app_state.0.projects_loading.get() { "Loading..." } else { "Create a project" }}
                    </a>
                }
            >
                <select
                    class="h-8 w-full rounded-md border border-input bg-transparent px-2 text-sm"
                    prop:value=move || current.get().map(|id| id.to_string()).unwrap_or_default()
                    on:change=on_change
                >
                    <For
                        each=move || projects.get()
                        key=|p| p.id
                        children=move |p| {
                            let id = p.id;
                            let indent = "· ".repeat(p.level.saturating_sub(1) as usize);
                            view! {
                                <option value=id.to_string() selected=move || current.get() == Some(id)>
                                    {format!("{indent}{}", p.name)}
                                </option>
                            }
                        }
                    />
                </select>
            </Show>
        </div>
    }
}

#[component]
pub fn AppLayout(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let location = use_location();
    let pathname = move || location.pathname.get();

    // Load projects once per mount; resolve the identity if only the token
    // survived a reload.
    Effect::new(move |prev: Option<()>| {
        if prev.is_some() {
            return;
        }
        app_state.0.refresh_projects();

        if app_state.0.current_user.get_untracked().is_none() {
            let client = app_state.0.client();
            spawn_local(async move {
                match client.me().await {
                    Ok(user) => {
                        client.session().set_user(user.clone());
                        app_state.0.current_user.set(Some(user));
                    }
                    Err(e) => {
                        let _ = app_state.0.triage(e);
                    }
                }
            });
        }
    });

    let on_logout = move |_| app_state.0.sign_out();

    view! {
        <div class="min-h-screen bg-background text-foreground">
            <ToastHost />
            <div class="mx-auto flex min-h-screen w-full max-w-6xl gap-6 px-4 py-6">
                <aside class="w-56 shrink-0">
                    <div class="sticky top-6 space-y-4">
                        <a href="/" class="block text-sm font-semibold text-foreground">"AI Test Platform"</a>

                        <Card class="py-3">
                            <CardContent class="px-3">
                                <ProjectSwitcher />
                            </CardContent>
                        </Card>

                        <nav class="flex flex-col gap-0.5">
                            {NAV_ITEMS
                                .iter()
                                .map(|(href, label)| {
                                    let href = *href;
                                    view! {
                                        <a
                                            href=href
                                            class=move || {
                                                if is_active(&pathname(), href) {
                                                    "rounded-md bg-accent px-2 py-1.5 text-sm font-medium text-accent-foreground"
                                                } else {
                                                    "rounded-md px-2 py-1.5 text-sm text-muted-foreground hover:bg-accent/50"
                                                }
                                            }
                                        >
                                            {*label}
                                        </a>
                                    }
                                })
                                .collect_view()}
                        </nav>

                        <div class="flex items-center justify-between border-t pt-3">
                            <span class="truncate text-xs text-muted-foreground">
                                {move || {
                                    app_state
                                        .0
                                        .current_user
                                        .get()
                                        .map(|u| u.username)
                                        .unwrap_or_else(|| "…".to_string())
                                }}
                            </span>
                            <Button variant=ButtonVariant::Ghost size=ButtonSize::Xs on:click=on_logout>
                                "Log out"
                            </Button>
                        </div>
                    </div>
                </aside>

                <main class="min-w-0 flex-1">{children()}</main>
            </div>
        </div>
    }
}

#[component]
pub fn RootAuthed(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let is_authenticated = move || app_state.0.authenticated.get();

    // Store children so the view macro sees an `Fn` (not an `FnOnce`).
    let children = StoredValue::new(children);

    view! {
        <Show when=is_authenticated fallback=move || view! { <LoginPage /> }>
            <AppLayout>
                {move || children.with_value(|c| c())}
            </AppLayout>
        </Show>
    }
}

/// Wraps pages that need a selected project.
#[component]
pub fn RequireProject(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let children = StoredValue::new(children);

    view! {
        <Show
            when=move || app_state.0.current_project_id.get().is_some()
            fallback=move || view! {
                <div class="flex items-center gap-2 py-10 text-sm text-muted-foreground">
                    <Show when=move || app_state.0.projects_loading.get() fallback=|| ().into_view()>
                        <Spinner />
                    </Show>
                    "Select or create a project first."
                </div>
            }
        >
            {move || children.with_value(|c| c())}
        </Show>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        assert!(is_active("/", "/"));
        assert!(!is_active("/projects", "/"));
        assert!(is_active("/projects", "/projects"));
        assert!(is_active("/projects/3", "/projects"));
        assert!(!is_active("/projectsx", "/projects"));
    }
}

use crate::components::ui::{Button, ButtonSize, Card, CardContent};
use crate::config::EnvConfig;
use crate::pages::{
    ApiTestPage, DashboardPage, EvaluationPage, GeneratePage, KnowledgePage, LoginPage,
    ProjectsPage, RegisterPage, RequireProject, RootAuthed, SettingsPage, UiAutomationPage,
};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

/// Shown instead of a blank page when a view fails.
#[component]
fn CrashFallback(#[prop(into)] message: Signal<String>) -> impl IntoView {
    tracing::error!("view error: {}", message.get_untracked());

    view! {
        <div class="mx-auto max-w-md px-4 py-16">
            <Card>
                <CardContent class="flex flex-col gap-3">
                    <div class="text-sm font-medium">"Something went wrong"</div>
                    <div class="text-xs text-muted-foreground">{move || message.get()}</div>
                    <Button size=ButtonSize::Sm on:click=move |_| { let _ = window().location().reload(); }>
                        "Reload"
                    </Button>
                </CardContent>
            </Card>
        </div>
    }
}

#[component]
pub fn App(config: EnvConfig) -> impl IntoView {
    provide_context(AppContext(AppState::new(config)));

    // Router hooks (`use_location`) need the <Router> context.
    view! {
        <Router>
            <ErrorBoundary fallback=|errors| {
                let message = move || {
                    errors
                        .get()
                        .into_iter()
                        .map(|(_, e)| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                view! { <CrashFallback message=Signal::derive(message) /> }
            }>
                <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                    <Route path=path!("login") view=LoginPage />
                    <Route path=path!("register") view=RegisterPage />
                    <Route path=path!("") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <DashboardPage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("projects") view=move || view! {
                        <RootAuthed>
                            <ProjectsPage />
                        </RootAuthed>
                    } />
                    <Route path=path!("knowledge") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <KnowledgePage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("generate") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <GeneratePage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("api-test") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <ApiTestPage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("ui-automation") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <UiAutomationPage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("evaluation") view=move || view! {
                        <RootAuthed>
                            <RequireProject>
                                <EvaluationPage />
                            </RequireProject>
                        </RootAuthed>
                    } />
                    <Route path=path!("settings") view=move || view! {
                        <RootAuthed>
                            <SettingsPage />
                        </RootAuthed>
                    } />
                </Routes>
            </ErrorBoundary>
        </Router>
    }
}

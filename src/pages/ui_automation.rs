use super::api_test::report_summary;
use crate::api::{UiAutomationReport, UiAutomationRequest};
use crate::components::ui::{
    Badge, BadgeTone, Button, ButtonSize, Card, CardContent, CardDescription, CardHeader,
    CardTitle, ErrorAlert, Input, Label, NativeSelect, Spinner, Textarea,
};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde_json::Value;

fn blank_to_none(s: &str) -> Option<String> {
    Some(s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn automation_request(
    project_id: i64,
    automation_type: &str,
    target: &str,
    task: &str,
    context: &str,
    image_model: &str,
) -> UiAutomationRequest {
    UiAutomationRequest {
        url: target.trim().to_string(),
        task: task.trim().to_string(),
        project_id,
        automation_type: automation_type.to_string(),
        image_model: blank_to_none(image_model),
        requirement_context: blank_to_none(context),
    }
}

/// Summary lines and the run status of an execution result. The executor
/// returns an object with a `status`; anything else is shown as-is.
pub(crate) fn result_lines(result: &Value) -> (Option<String>, Vec<(String, String)>) {
    match result {
        Value::Object(map) => {
            let status = map.get("status").and_then(Value::as_str).map(str::to_string);
            let lines = report_summary(map)
                .into_iter()
                .filter(|(k, _)| k != "status")
                .collect();
            (status, lines)
        }
        Value::Null => (None, vec![]),
        Value::String(s) => (None, vec![("output".to_string(), s.clone())]),
        other => (None, vec![("output".to_string(), other.to_string())]),
    }
}

#[component]
pub fn UiAutomationPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let automation_type: RwSignal<String> = RwSignal::new("web".to_string());
    let target: RwSignal<String> = RwSignal::new(String::new());
    let task: RwSignal<String> = RwSignal::new(String::new());
    let context: RwSignal<String> = RwSignal::new(String::new());
    let image_model: RwSignal<String> = RwSignal::new(String::new());

    let running: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let report: RwSignal<Option<UiAutomationReport>> = RwSignal::new(None);

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if running.get_untracked() {
            return;
        }
        let Some(project_id) = app_state.0.current_project_id.get_untracked() else {
            return;
        };
        let req = automation_request(
            project_id,
            &automation_type.get_untracked(),
            &target.get_untracked(),
            &task.get_untracked(),
            &context.get_untracked(),
            &image_model.get_untracked(),
        );

        let client = app_state.0.client();
        running.set(true);
        error.set(None);
        spawn_local(async move {
            match client.run_ui_automation(&req).await {
                Ok(r) => {
                    tracing::info!("ui automation finished for project {project_id}");
                    report.set(Some(r));
                }
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        error.set(Some(e.message));
                    }
                }
            }
            running.set(false);
        });
    };

    let target_label = move || {
        if automation_type.with(|t| t == "app") {
            "App package"
        } else {
            "Page URL"
        }
    };

    view! {
        <div class="flex flex-col gap-4">
            <h1 class="text-lg font-semibold">"UI automation"</h1>

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"Job"</CardTitle>
                    <CardDescription class="text-xs">
                        "A script is generated from the task and run right away; this can take a while."
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <form class="flex flex-col gap-3" on:submit=on_submit>
                        <div class="grid grid-cols-1 gap-3 md:grid-cols-[10rem_1fr]">
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="automation_type" class="text-xs">"Target"</Label>
                                <NativeSelect
                                    id="automation_type"
                                    class="h-8 text-sm"
                                    bind_value=automation_type
                                    options={vec![
                                        ("web".to_string(), "Web page".to_string()),
                                        ("app".to_string(), "Mobile app".to_string()),
                                    ]}
                                />
                            </div>
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="automation_target" class="text-xs" required=true>{target_label}</Label>
                                <Input id="automation_target" bind_value=target placeholder="https://staging.example.com/login" class="h-8 text-sm" />
                            </div>
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="automation_task" class="text-xs" required=true>"Task"</Label>
                            <Textarea
                                id="automation_task"
                                bind_value=task
                                rows=3
                                placeholder="Log in with the demo account and add one item to the cart"
                                class="text-sm"
                            />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="automation_context" class="text-xs">"Requirement context"</Label>
                            <Textarea id="automation_context" bind_value=context rows=3 class="text-sm" />
                        </div>
                        <div class="flex flex-wrap items-end gap-3">
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="image_model" class="text-xs">"Vision model"</Label>
                                <Input id="image_model" bind_value=image_model placeholder="default" class="h-8 w-48 text-sm" />
                            </div>
                            <Button size=ButtonSize::Sm attr:disabled=move || running.get()>
                                <Show when=move || running.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                {move || if running.get() { "Running..." } else { "Run" }}
                            </Button>
                        </div>
                        <ErrorAlert error=error />
                    </form>
                </CardContent>
            </Card>

            {move || {
                report
                    .get()
                    .map(|r| {
                        let (status, lines) = result_lines(&r.result);
                        let tone = match status.as_deref() {
                            Some("success") => BadgeTone::Ok,
                            Some("error") | Some("failed") => BadgeTone::Error,
                            _ => BadgeTone::Info,
                        };
                        view! {
                            <Card>
                                <CardHeader>
                                    <CardTitle class="flex items-center gap-2 text-sm">
                                        "Result"
                                        {status.map(|s| view! { <Badge tone=tone>{s}</Badge> })}
                                    </CardTitle>
                                </CardHeader>
                                <CardContent class="flex flex-col gap-3">
                                    <dl class="grid grid-cols-[max-content_1fr] gap-x-4 gap-y-1 text-xs">
                                        {lines
                                            .into_iter()
                                            .map(|(k, v)| view! {
                                                <dt class="text-muted-foreground">{k}</dt>
                                                <dd class="break-all">{v}</dd>
                                            })
                                            .collect_view()}
                                    </dl>
                                    <pre class="max-h-[480px] overflow-auto rounded-md bg-muted/40 p-3 text-xs">{r.script}</pre>
                                </CardContent>
                            </Card>
                        }
                    })
            }}
        </div>
    }
}

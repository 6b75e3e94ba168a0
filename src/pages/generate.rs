use crate::api::{ApiResult, TestGenRequest};
use crate::components::ui::{
    Badge, BadgeTone, Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription,
    CardHeader, CardTitle, ErrorAlert, Input, Label, Spinner, Textarea,
};
use crate::models::TaskStatus;
use crate::state::polling::{poll_once, start_polling, PollSlot, PollTicket, TaskPhase};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde_json::Value;

pub(crate) const MAX_EXPECTED_CASES: u32 = 200;

pub(crate) fn parse_expected_count(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_EXPECTED_CASES).contains(&n) => Ok(n),
        _ => Err(format!("Expected count must be between 1 and {MAX_EXPECTED_CASES}")),
    }
}

/// One line per generated case, from whichever title-ish field it carries.
pub(crate) fn case_titles(result: &Value) -> Vec<String> {
    let Some(cases) = result.as_array() else {
        return vec![];
    };
    cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            ["title", "case_name", "name", "description"]
                .iter()
                .find_map(|k| case.get(k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("Case {}", i + 1))
        })
        .collect()
}

#[component]
fn PhaseBadge(#[prop(into)] phase: Signal<Option<TaskPhase>>) -> impl IntoView {
    move || {
        phase.get().map(|p| match p {
            TaskPhase::Running(status) => view! { <Badge tone=BadgeTone::Info>{status}</Badge> }.into_any(),
            TaskPhase::Succeeded(_) => view! { <Badge tone=BadgeTone::Ok>"SUCCESS"</Badge> }.into_any(),
            TaskPhase::Failed(_) => view! { <Badge tone=BadgeTone::Error>"FAILED"</Badge> }.into_any(),
        })
    }
}

#[component]
pub fn GeneratePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let task_poll_ms = app_state.0.config().task_poll_ms;

    let requirement: RwSignal<String> = RwSignal::new(String::new());
    let expected: RwSignal<String> = RwSignal::new("20".to_string());
    let form_error: RwSignal<Option<String>> = RwSignal::new(None);
    let submitting: RwSignal<bool> = RwSignal::new(false);

    let task_id: RwSignal<Option<String>> = RwSignal::new(None);
    let phase: RwSignal<Option<TaskPhase>> = RwSignal::new(None);
    let task_slot = StoredValue::new(PollSlot::new());

    on_cleanup(move || task_slot.with_value(|slot| slot.cancel()));

    let watch_task = move |id: String| {
        let client = app_state.0.client();
        let handle = start_polling(task_poll_ms, move |ticket: PollTicket| {
            let client = client.clone();
            let id = id.clone();
            async move {
                let done_id = id.clone();
                let fetch = async { client.task_status(&id).await };
                poll_once(ticket, fetch, move |_, result: ApiResult<TaskStatus>| {
                    let result = result.map_err(|e| app_state.0.triage(e.clone()).unwrap_or(e));
                    let next = TaskPhase::from_result(result);
                    if next.is_done() {
                        tracing::info!("task {done_id} finished");
                        task_slot.with_value(|slot| slot.cancel());
                    }
                    phase.set(Some(next));
                })
                .await;
            }
        });
        task_slot.with_value(|slot| slot.replace(handle));
    };

    let submit = move || {
        if submitting.get_untracked() {
            return;
        }
        let Some(project_id) = app_state.0.current_project_id.get_untracked() else {
            return;
        };
        let count = match parse_expected_count(&expected.get_untracked()) {
            Ok(n) => n,
            Err(msg) => {
                form_error.set(Some(msg));
                return;
            }
        };
        let mut req = TestGenRequest::new(project_id, requirement.get_untracked().trim().to_string());
        req.expected_count = count;
        req.batch_size = count;

        form_error.set(None);
        submitting.set(true);
        task_slot.with_value(|slot| slot.cancel());
        phase.set(None);

        let client = app_state.0.client();
        spawn_local(async move {
            match client.generate_tests_async(&req).await {
                Ok(ticket) => {
                    tracing::info!("generation task {} queued", ticket.task_id);
                    task_id.set(Some(ticket.task_id.clone()));
                    phase.set(Some(TaskPhase::Running(if ticket.status.is_empty() {
                        "PENDING".to_string()
                    } else {
                        ticket.status
                    })));
                    watch_task(ticket.task_id);
                }
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        form_error.set(Some(e.message));
                    }
                }
            }
            submitting.set(false);
        });
    };

    let stop = move |_| {
        task_slot.with_value(|slot| slot.cancel());
        phase.set(None);
        task_id.set(None);
    };

    let running = move || phase.with(|p| matches!(p, Some(TaskPhase::Running(_))));

    view! {
        <div class="flex flex-col gap-4">
            <h1 class="text-lg font-semibold">"Test generation"</h1>

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"Requirement"</CardTitle>
                    <CardDescription class="text-xs">
                        "Generation runs in the background; the status below refreshes until it finishes."
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <form
                        class="flex flex-col gap-3"
                        on:submit=move |ev: web_sys::SubmitEvent| {
                            ev.prevent_default();
                            submit();
                        }
                    >
                        <Textarea bind_value=requirement rows=8 placeholder="Paste or describe the requirement" class="text-sm" />
                        <div class="flex flex-wrap items-end gap-3">
                            <div class="flex flex-col gap-1.5">
                                <Label html_for="expected_count" class="text-xs">"Expected cases"</Label>
                                <Input id="expected_count" r#type="number" bind_value=expected class="h-8 w-28 text-sm" />
                            </div>
                            <Button size=ButtonSize::Sm attr:disabled=move || submitting.get() || running()>
                                <Show when=move || submitting.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                "Generate"
                            </Button>
                        </div>
                        <ErrorAlert error=form_error />
                    </form>
                </CardContent>
            </Card>

            <Show when=move || task_id.with(|t| t.is_some()) fallback=|| ().into_view()>
                <Card>
                    <CardHeader>
                        <CardTitle class="flex items-center gap-2 text-sm">
                            "Task"
                            <span class="font-mono text-xs text-muted-foreground">{move || task_id.get().unwrap_or_default()}</span>
                            <PhaseBadge phase=phase />
                        </CardTitle>
                    </CardHeader>
                    <CardContent class="flex flex-col gap-3">
                        <Show when=running fallback=|| ().into_view()>
                            <div class="flex items-center gap-2 text-xs text-muted-foreground">
                                <Spinner />
                                "Waiting for the worker..."
                                <Button size=ButtonSize::Xs variant=ButtonVariant::Ghost on:click=stop>
                                    "Stop watching"
                                </Button>
                            </div>
                        </Show>
                        {move || match phase.get() {
                            Some(TaskPhase::Succeeded(status)) => {
                                let titles = status.result.as_ref().map(case_titles).unwrap_or_default();
                                let count = status.generated_count().unwrap_or(titles.len());
                                view! {
                                    <div class="text-sm">{format!("{count} test cases generated")}</div>
                                    <ol class="list-decimal pl-5 text-sm">
                                        {titles.into_iter().map(|t| view! { <li>{t}</li> }).collect_view()}
                                    </ol>
                                }
                                .into_any()
                            }
                            Some(TaskPhase::Failed(msg)) => view! {
                                <ErrorAlert error=Signal::derive(move || Some(msg.clone())) />
                            }
                            .into_any(),
                            _ => ().into_any(),
                        }}
                    </CardContent>
                </Card>
            </Show>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_expected_count() {
        assert_eq!(parse_expected_count(" 20 "), Ok(20));
        assert!(parse_expected_count("0").is_err());
        assert!(parse_expected_count("201").is_err());
        assert!(parse_expected_count("many").is_err());
    }

    #[test]
    fn test_case_titles_prefers_title_fields() {
        let result = json!([
            {"title": "Login with valid password"},
            {"case_name": "Lockout after 5 attempts"},
            {"steps": ["open page"]},
        ]);
        assert_eq!(
            case_titles(&result),
            vec!["Login with valid password", "Lockout after 5 attempts", "Case 3"]
        );
        assert!(case_titles(&json!({"detail": "x"})).is_empty());
    }
}

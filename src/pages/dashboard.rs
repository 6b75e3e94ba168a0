use crate::api::{ApiResult, LogFilter};
use crate::components::toast::ToastKind;
use crate::components::ui::{
    Badge, BadgeTone, Button, ButtonSize, ButtonVariant, Card, CardContent, CardHeader, CardTitle,
    ErrorAlert, LoadingRow, NativeSelect, StatCard, Textarea,
};
use crate::models::{HealthReport, LogKind, LogRecord, LogSeverity, ServiceHealth};
use crate::state::activity_log::{ActivityLog, LogEntry};
use crate::state::polling::{poll_once, start_polling, PollSlot, PollTicket, SyncStatus};
use crate::state::AppContext;
use crate::util::{clock_time, now_ms};
use leptos::prelude::*;
use leptos::task::spawn_local;
use strum::IntoEnumIterator;

fn select_options(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(value, label)| (value.to_string(), label.to_string()))
        .collect()
}

/// Build the backend filter from the two select values ("" = any).
pub(crate) fn log_filter_from(kind: &str, severity: &str) -> LogFilter {
    LogFilter {
        kind: match kind {
            "user" => Some(LogKind::User),
            "system" => Some(LogKind::System),
            _ => None,
        },
        severity: LogSeverity::iter().find(|s| s.as_ref() == severity),
    }
}

#[component]
fn ServiceRow(name: &'static str, service: ServiceHealth) -> impl IntoView {
    let tone = if service.ok { BadgeTone::Ok } else { BadgeTone::Error };
    view! {
        <div class="flex items-center justify-between gap-2 text-sm">
            <span>{name}</span>
            <span class="truncate text-xs text-muted-foreground">{service.details.clone()}</span>
            <Badge tone=tone>{if service.ok { "up" } else { "down" }}</Badge>
        </div>
    }
}

#[component]
fn LogColumn(
    title: &'static str,
    #[prop(into)] entries: Signal<Vec<LogEntry>>,
) -> impl IntoView {
    view! {
        <div class="flex min-w-0 flex-1 flex-col gap-1">
            <div class="text-xs font-medium text-muted-foreground">{title}</div>
            <Show
                when=move || entries.with(|e| !e.is_empty())
                fallback=|| view! { <div class="py-4 text-xs text-muted-foreground">"Nothing yet."</div> }
            >
                <ul class="flex max-h-80 flex-col gap-1 overflow-auto">
                    {move || {
                        entries
                            .get()
                            .into_iter()
                            .rev()
                            .map(|entry| {
                                let pending = entry.is_pending();
                                view! {
                                    <li class={if pending { "text-xs opacity-60" } else { "text-xs" }}>
                                        <span class="mr-2 tabular-nums text-muted-foreground">
                                            {clock_time(entry.created_at_ms)}
                                        </span>
                                        {entry.message}
                                        {pending.then(|| view! { <span class="ml-2 italic text-muted-foreground">"sending…"</span> })}
                                    </li>
                                }
                            })
                            .collect_view()
                    }}
                </ul>
            </Show>
        </div>
    }
}

#[component]
pub fn DashboardPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let config = app_state.0.config();
    let project_id = app_state.0.current_project_id;

    // ---- service health ----
    let health: RwSignal<Option<HealthReport>> = RwSignal::new(None);
    let health_sync: RwSignal<SyncStatus> = RwSignal::new(SyncStatus::default());
    let health_slot = StoredValue::new(PollSlot::new());

    let health_client = app_state.0.client();
    let handle = start_polling(config.health_poll_ms, move |ticket: PollTicket| {
        let client = health_client.clone();
        health_sync.try_update(|s| s.begin(ticket.mode));
        async move {
            poll_once(ticket, client.health(), move |mode, result: ApiResult<HealthReport>| {
                let result = result.map_err(|e| app_state.0.triage(e.clone()).unwrap_or(e));
                health_sync.try_update(|s| s.finish(mode, &result));
                if let Ok(report) = result {
                    health.set(Some(report));
                }
            })
            .await;
        }
    });
    health_slot.with_value(|slot| slot.replace(handle));

    // ---- activity log ----
    let activity: RwSignal<ActivityLog> = RwSignal::new(ActivityLog::new(now_ms().max(0) as u64));
    let log_sync: RwSignal<SyncStatus> = RwSignal::new(SyncStatus::default());
    let log_slot = StoredValue::new(PollSlot::new());
    let kind_filter: RwSignal<String> = RwSignal::new(String::new());
    let severity_filter: RwSignal<String> = RwSignal::new(String::new());
    let note: RwSignal<String> = RwSignal::new(String::new());

    // One log loop per (project, filter); a new one replaces the old.
    Effect::new(move |_| {
        let filter = log_filter_from(&kind_filter.get(), &severity_filter.get());
        let Some(pid) = project_id.get() else {
            log_slot.with_value(|slot| slot.cancel());
            return;
        };
        activity.update(|a| a.clear());

        let client = app_state.0.client();
        let handle = start_polling(config.log_poll_ms, move |ticket: PollTicket| {
            let client = client.clone();
            let filter = filter.clone();
            log_sync.try_update(|s| s.begin(ticket.mode));
            async move {
                let fetch = async { client.list_logs(pid, &filter).await };
                poll_once(ticket, fetch, move |mode, result: ApiResult<Vec<LogRecord>>| {
                    let result = result.map_err(|e| app_state.0.triage(e.clone()).unwrap_or(e));
                    log_sync.try_update(|s| s.finish(mode, &result));
                    if let Ok(records) = result {
                        activity.update(|a| a.merge_server(records));
                    }
                })
                .await;
            }
        });
        log_slot.with_value(|slot| slot.replace(handle));
    });

    on_cleanup(move || {
        health_slot.with_value(|slot| slot.cancel());
        log_slot.with_value(|slot| slot.cancel());
    });

    let streams = Memo::new(move |_| activity.with(|a| a.streams()));

    let add_note = move || {
        let text = note.get_untracked();
        let Some(pid) = project_id.get_untracked() else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        let Some(temp) = activity.try_update(|a| a.append(pid, LogKind::User, &text, now_ms())) else {
            return;
        };
        note.set(String::new());

        let client = app_state.0.client();
        spawn_local(async move {
            match client.create_log(pid, LogKind::User, &text).await {
                Ok(id) => {
                    activity.update(|a| {
                        a.confirm(temp, id);
                    });
                }
                Err(e) => {
                    activity.update(|a| {
                        a.rollback(temp);
                    });
                    // Give the text back so it can be resent.
                    if note.with_untracked(|n| n.is_empty()) {
                        note.set(text);
                    }
                    app_state.0.report(e);
                }
            }
        });
    };

    let clear_logs = move |_| {
        let Some(pid) = project_id.get_untracked() else {
            return;
        };
        let confirmed = window()
            .confirm_with_message("Clear every log entry of this project?")
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let client = app_state.0.client();
        spawn_local(async move {
            match client.clear_logs(pid).await {
                Ok(_) => {
                    activity.update(|a| a.clear());
                    app_state.0.notify(ToastKind::Success, "Logs cleared");
                }
                Err(e) => app_state.0.report(e),
            }
        });
    };

    let project_name = move || {
        app_state
            .0
            .current_project()
            .map(|p| p.name)
            .unwrap_or_default()
    };

    view! {
        <div class="flex flex-col gap-4">
            <div class="flex items-baseline justify-between">
                <h1 class="text-lg font-semibold">"Dashboard"</h1>
                <span class="text-xs text-muted-foreground">{project_name}</span>
            </div>

            <div class="grid grid-cols-1 gap-3 md:grid-cols-3">
                <Card class="py-4">
                    <CardContent class="flex flex-col gap-2">
                        <div class="flex items-center justify-between text-xs text-muted-foreground">
                            "Services"
                            {move || health.with(|h| h.as_ref().map(|h| {
                                if h.all_ok() {
                                    view! { <Badge tone=BadgeTone::Ok>"all up"</Badge> }.into_any()
                                } else {
                                    view! { <Badge tone=BadgeTone::Error>"degraded"</Badge> }.into_any()
                                }
                            }))}
                        </div>
                        {move || match health.get() {
                            Some(h) => view! {
                                <ServiceRow name="MySQL" service=h.mysql />
                                <ServiceRow name="Redis" service=h.redis />
                            }
                            .into_any(),
                            None if health_sync.with(|s| s.loading) => view! { <LoadingRow /> }.into_any(),
                            None => view! {
                                <ErrorAlert error=Signal::derive(move || health_sync.with(|s| s.error.clone())) />
                            }
                            .into_any(),
                        }}
                    </CardContent>
                </Card>
                <StatCard
                    label="Notes"
                    value=Signal::derive(move || streams.with(|s| s.user.len().to_string()))
                    hint="written by the team"
                />
                <StatCard
                    label="System events"
                    value=Signal::derive(move || streams.with(|s| s.system.len().to_string()))
                    hint="uploads, generations, runs"
                />
            </div>

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"Activity"</CardTitle>
                </CardHeader>
                <CardContent class="flex flex-col gap-3">
                    <form
                        class="flex flex-col gap-2"
                        on:submit=move |ev: web_sys::SubmitEvent| {
                            ev.prevent_default();
                            add_note();
                        }
                    >
                        <Textarea bind_value=note rows=2 placeholder="Leave a note for this project" class="text-sm" />
                        <div class="flex flex-wrap items-center gap-2">
                            <Button size=ButtonSize::Sm attr:disabled=move || note.with(|n| n.trim().is_empty())>
                                "Add note"
                            </Button>
                            <NativeSelect
                                class="h-8 w-36 text-xs"
                                bind_value=kind_filter
                                options={select_options(&[("", "All sources"), ("user", "Notes"), ("system", "System")])}
                            />
                            <NativeSelect
                                class="h-8 w-36 text-xs"
                                bind_value=severity_filter
                                options={select_options(&[("", "Any outcome"), ("error", "Errors"), ("ok", "Successful")])}
                            />
                        </div>
                    </form>
                    <div class="flex justify-end">
                        <Button
                            size=ButtonSize::Xs
                            variant=ButtonVariant::Ghost
                            class="text-destructive"
                            on:click=clear_logs
                        >
                            "Clear logs"
                        </Button>
                    </div>

                    <ErrorAlert error=Signal::derive(move || log_sync.with(|s| s.error.clone())) />

                    <Show
                        when=move || !(log_sync.with(|s| s.loading) && activity.with(|a| a.is_empty()))
                        fallback=|| view! { <LoadingRow /> }
                    >
                        <div class="flex flex-col gap-4 md:flex-row">
                            <LogColumn title="Notes" entries=Signal::derive(move || streams.with(|s| s.user.clone())) />
                            <LogColumn title="System" entries=Signal::derive(move || streams.with(|s| s.system.clone())) />
                        </div>
                    </Show>
                </CardContent>
            </Card>
        </div>
    }
}

use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription, CardHeader, CardTitle,
    ErrorAlert, LoadingRow, Spinner, StatCard, Textarea,
};
use crate::models::EvaluationPoint;
use crate::state::AppContext;
use crate::util::{percent, short_timestamp};
use leptos::prelude::*;
use leptos::task::spawn_local;

const HISTORY_LIMIT: u32 = 20;

/// History sorted newest first. `created_at` arrives as `MM-DD HH:MM`
/// without a year, so ordering goes by id, which grows with each run.
pub(crate) fn newest_first(mut points: Vec<EvaluationPoint>) -> Vec<EvaluationPoint> {
    points.sort_by_key(|p| std::cmp::Reverse(p.id));
    points
}

/// F1 change between the two newest runs, as a signed label.
pub(crate) fn f1_trend(newest_first: &[EvaluationPoint]) -> Option<String> {
    match newest_first {
        [latest, previous, ..] => {
            let delta = (latest.f1_score - previous.f1_score) * 100.0;
            Some(format!("{delta:+.1} pts vs previous run"))
        }
        _ => None,
    }
}

#[component]
pub fn EvaluationPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let project_id = app_state.0.current_project_id;

    let history: RwSignal<Vec<EvaluationPoint>> = RwSignal::new(vec![]);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let reload: RwSignal<u64> = RwSignal::new(0);

    Effect::new(move |_| {
        reload.track();
        let Some(pid) = project_id.get() else {
            return;
        };
        let client = app_state.0.client();
        loading.set(true);
        error.set(None);
        spawn_local(async move {
            match client.evaluation_history(pid, HISTORY_LIMIT).await {
                // Ignore a response for a project that is no longer selected.
                Ok(points) if project_id.get_untracked() == Some(pid) => history.set(newest_first(points)),
                Ok(_) => {}
                Err(e) => {
                    history.set(vec![]);
                    if let Some(e) = app_state.0.triage(e) {
                        error.set(Some(e.message));
                    }
                }
            }
            loading.set(false);
        });
    });

    let content: RwSignal<String> = RwSignal::new(String::new());
    let scoring: RwSignal<bool> = RwSignal::new(false);
    let score_error: RwSignal<Option<String>> = RwSignal::new(None);
    let verdict: RwSignal<Option<String>> = RwSignal::new(None);

    let on_score = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if scoring.get_untracked() {
            return;
        }
        let Some(pid) = project_id.get_untracked() else {
            return;
        };
        let text = content.get_untracked();
        let client = app_state.0.client();
        scoring.set(true);
        score_error.set(None);
        spawn_local(async move {
            match client.evaluate(pid, &text).await {
                Ok(report) => {
                    verdict.set(Some(report));
                    reload.update(|n| *n += 1);
                }
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        score_error.set(Some(e.message));
                    }
                }
            }
            scoring.set(false);
        });
    };

    let latest_metric = move |pick: fn(&EvaluationPoint) -> f64| {
        Signal::derive(move || {
            history.with(|h| h.first().map(|p| percent(pick(p))).unwrap_or_else(|| "—".to_string()))
        })
    };

    view! {
        <div class="flex flex-col gap-4">
            <div class="flex items-center justify-between">
                <h1 class="text-lg font-semibold">"Evaluation"</h1>
                <Button size=ButtonSize::Xs variant=ButtonVariant::Outline on:click=move |_| reload.update(|n| *n += 1)>
                    "Refresh"
                </Button>
            </div>

            <div class="grid grid-cols-2 gap-3 md:grid-cols-4">
                <StatCard label="F1" value=latest_metric(|p| p.f1_score) />
                <StatCard label="Precision" value=latest_metric(|p| p.precision) />
                <StatCard label="Recall" value=latest_metric(|p| p.recall) />
                <StatCard label="Semantic similarity" value=latest_metric(|p| p.semantic_similarity) />
            </div>

            <p class="text-xs text-muted-foreground">{move || history.with(|h| f1_trend(h)).unwrap_or_default()}</p>

            <ErrorAlert error=error />

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"Score test cases"</CardTitle>
                    <CardDescription class="text-xs">
                        "Paste generated or hand-written cases to have them reviewed for clarity, coverage and correctness."
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <form class="flex flex-col gap-3" on:submit=on_score>
                        <Textarea bind_value=content rows=6 placeholder="1. Login with a valid password..." class="text-sm" />
                        <div>
                            <Button size=ButtonSize::Sm attr:disabled=move || scoring.get() || content.with(|c| c.trim().is_empty())>
                                <Show when=move || scoring.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                "Evaluate"
                            </Button>
                        </div>
                        <ErrorAlert error=score_error />
                        {move || verdict.get().map(|text| view! {
                            <pre class="max-h-80 overflow-auto whitespace-pre-wrap rounded-md bg-muted/40 p-3 text-xs">{text}</pre>
                        })}
                    </form>
                </CardContent>
            </Card>

            <Card>
                <CardContent>
                    <Show when=move || !(loading.get() && history.with(|h| h.is_empty())) fallback=|| view! { <LoadingRow /> }>
                        <Show
                            when=move || history.with(|h| !h.is_empty())
                            fallback=|| view! {
                                <div class="py-6 text-center text-xs text-muted-foreground">"No evaluation runs for this project yet."</div>
                            }
                        >
                            <table class="w-full text-xs">
                                <thead class="text-left text-muted-foreground">
                                    <tr>
                                        <th class="py-1">"Run"</th>
                                        <th>"Precision"</th>
                                        <th>"Recall"</th>
                                        <th>"F1"</th>
                                        <th>"Similarity"</th>
                                        <th>"Missing"</th>
                                        <th>"Hallucinated"</th>
                                        <th>"Modified"</th>
                                    </tr>
                                </thead>
                                <tbody class="divide-y tabular-nums">
                                    <For
                                        each=move || history.get()
                                        key=|p| p.id
                                        children=|p: EvaluationPoint| view! {
                                            <tr>
                                                <td class="py-1">{short_timestamp(&p.created_at)}</td>
                                                <td>{percent(p.precision)}</td>
                                                <td>{percent(p.recall)}</td>
                                                <td>{percent(p.f1_score)}</td>
                                                <td>{percent(p.semantic_similarity)}</td>
                                                <td>{p.missing_count}</td>
                                                <td>{p.hallucination_count}</td>
                                                <td>{p.modification_count}</td>
                                            </tr>
                                        }
                                    />
                                </tbody>
                            </table>
                        </Show>
                    </Show>
                </CardContent>
            </Card>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: i64, created_at: &str, f1: f64) -> EvaluationPoint {
        EvaluationPoint {
            id,
            created_at: created_at.to_string(),
            precision: 0.0,
            recall: 0.0,
            f1_score: f1,
            semantic_similarity: 0.0,
            missing_count: 0,
            hallucination_count: 0,
            modification_count: 0,
        }
    }

    #[test]
    fn test_newest_first_and_trend() {
        // Backend order is oldest first, stamped `MM-DD HH:MM`.
        let sorted = newest_first(vec![
            point(1, "05-01 09:00", 0.70),
            point(2, "05-02 09:00", 0.75),
            point(3, "05-03 09:00", 0.82),
        ]);
        let ids: Vec<_> = sorted.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(f1_trend(&sorted).as_deref(), Some("+7.0 pts vs previous run"));
        assert_eq!(f1_trend(&sorted[..1]), None);
        assert_eq!(short_timestamp(&sorted[0].created_at), "05-03 09:00");
    }

    #[test]
    fn test_newest_first_ignores_unparseable_dates() {
        let sorted = newest_first(vec![
            point(7, "12-31 23:59", 0.60),
            point(8, "01-01 00:01", 0.90),
        ]);
        assert_eq!(sorted[0].id, 8);
        assert_eq!(f1_trend(&sorted).as_deref(), Some("+30.0 pts vs previous run"));
    }
}

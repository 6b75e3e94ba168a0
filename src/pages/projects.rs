use crate::api::ProjectDraft;
use crate::components::toast::ToastKind;
use crate::components::ui::{
    Badge, Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription, CardHeader,
    CardTitle, ErrorAlert, Input, Label, LoadingRow, Spinner,
};
use crate::models::Project;
use crate::state::AppContext;
use crate::util::short_timestamp;
use leptos::prelude::*;
use leptos::task::spawn_local;

pub(crate) const MAX_PROJECT_LEVEL: u8 = 3;

/// Projects that may take a child: anything above the deepest level.
pub(crate) fn parent_candidates(projects: &[Project]) -> Vec<(i64, String)> {
    projects
        .iter()
        .filter(|p| p.level < MAX_PROJECT_LEVEL)
        .map(|p| (p.id, p.name.clone()))
        .collect()
}

/// Depth-first order so children follow their parent.
pub(crate) fn tree_order(projects: &[Project]) -> Vec<Project> {
    fn visit(parent: Option<i64>, all: &[Project], out: &mut Vec<Project>) {
        for p in all.iter().filter(|p| p.parent_id == parent) {
            out.push(p.clone());
            visit(Some(p.id), all, out);
        }
    }
    let mut out = Vec::with_capacity(projects.len());
    visit(None, projects, &mut out);
    // Orphans (parent not visible) go last.
    for p in projects {
        if !out.iter().any(|o| o.id == p.id) {
            out.push(p.clone());
        }
    }
    out
}

#[component]
pub fn ProjectsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let projects = app_state.0.projects;

    let name: RwSignal<String> = RwSignal::new(String::new());
    let description: RwSignal<String> = RwSignal::new(String::new());
    let parent: RwSignal<String> = RwSignal::new(String::new());
    let create_error: RwSignal<Option<String>> = RwSignal::new(None);
    let creating: RwSignal<bool> = RwSignal::new(false);

    let editing: RwSignal<Option<i64>> = RwSignal::new(None);
    let edit_name: RwSignal<String> = RwSignal::new(String::new());

    let submit_create = move || {
        if creating.get_untracked() {
            return;
        }
        let draft = ProjectDraft {
            name: name.get_untracked().trim().to_string(),
            description: Some(description.get_untracked())
                .filter(|d| !d.trim().is_empty()),
            parent_id: parent.get_untracked().parse().ok(),
        };

        let client = app_state.0.client();
        creating.set(true);
        create_error.set(None);

        spawn_local(async move {
            match client.create_project(&draft).await {
                Ok(project) => {
                    name.set(String::new());
                    description.set(String::new());
                    app_state.0.notify(ToastKind::Success, format!("Project \"{}\" created", project.name));
                    if app_state.0.current_project_id.get_untracked().is_none() {
                        app_state.0.select_project(Some(project.id));
                    }
                    app_state.0.refresh_projects();
                }
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        create_error.set(Some(e.message));
                    }
                }
            }
            creating.set(false);
        });
    };

    let save_rename = move |project: Project| {
        let new_name = edit_name.get_untracked();
        let draft = ProjectDraft {
            name: new_name.trim().to_string(),
            description: project.description.clone(),
            parent_id: project.parent_id,
        };
        let client = app_state.0.client();
        spawn_local(async move {
            match client.update_project(project.id, &draft).await {
                Ok(_) => {
                    editing.set(None);
                    app_state.0.refresh_projects();
                }
                Err(e) => app_state.0.report(e),
            }
        });
    };

    let delete_project = move |project: Project| {
        let confirmed = window()
            .confirm_with_message(&format!(
                "Delete project \"{}\" with all its documents and logs?",
                project.name
            ))
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let client = app_state.0.client();
        spawn_local(async move {
            match client.delete_project(project.id).await {
                Ok(_) => {
                    app_state.0.notify(ToastKind::Success, "Project deleted");
                    if app_state.0.current_project_id.get_untracked() == Some(project.id) {
                        app_state.0.select_project(None);
                    }
                    app_state.0.refresh_projects();
                }
                Err(e) => app_state.0.report(e),
            }
        });
    };

    view! {
        <div class="flex flex-col gap-4">
            <h1 class="text-lg font-semibold">"Projects"</h1>

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"New project"</CardTitle>
                    <CardDescription class="text-xs">
                        {format!("Projects nest up to {MAX_PROJECT_LEVEL} levels deep.")}
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <form
                        class="grid grid-cols-1 gap-3 md:grid-cols-3"
                        on:submit=move |ev: web_sys::SubmitEvent| {
                            ev.prevent_default();
                            submit_create();
                        }
                    >
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="project_name" class="text-xs" required=true>"Name"</Label>
                            <Input id="project_name" bind_value=name class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="project_desc" class="text-xs">"Description"</Label>
                            <Input id="project_desc" bind_value=description class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="project_parent" class="text-xs">"Parent"</Label>
                            <select
                                id="project_parent"
                                class="h-8 rounded-md border border-input bg-transparent px-2 text-sm"
                                prop:value=move || parent.get()
                                on:change=move |ev| parent.set(event_target_value(&ev))
                            >
                                <option value="">"(top level)"</option>
                                {move || {
                                    parent_candidates(&projects.get())
                                        .into_iter()
                                        .map(|(id, n)| view! { <option value=id.to_string()>{n}</option> })
                                        .collect_view()
                                }}
                            </select>
                        </div>
                        <div class="md:col-span-3 flex items-center gap-3">
                            <Button size=ButtonSize::Sm attr:disabled=move || creating.get()>
                                <Show when=move || creating.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                "Create"
                            </Button>
                            <ErrorAlert error=create_error />
                        </div>
                    </form>
                </CardContent>
            </Card>

            <Card>
                <CardContent>
                    <Show
                        when=move || !(app_state.0.projects_loading.get() && projects.with(|p| p.is_empty()))
                        fallback=|| view! { <LoadingRow /> }
                    >
                        <Show
                            when=move || !projects.with(|p| p.is_empty())
                            fallback=|| view! { <div class="py-6 text-center text-xs text-muted-foreground">"No projects yet."</div> }
                        >
                            <ul class="divide-y">
                                <For
                                    each=move || tree_order(&projects.get())
                                    key=|p| (p.id, p.name.clone())
                                    children=move |p: Project| {
                                        let id = p.id;
                                        let pad = format!("padding-left: {}rem", (p.level.saturating_sub(1) as f32) * 1.25);
                                        let p_rename = p.clone();
                                        let p_delete = p.clone();
                                        let p_view = p.clone();
                                        view! {
                                            <li class="flex items-center justify-between gap-3 py-2" style=pad>
                                                <Show
                                                    when=move || editing.get() == Some(id)
                                                    fallback=move || {
                                                        let p = p_view.clone();
                                                        view! {
                                                            <button
                                                                class="flex min-w-0 flex-1 items-center gap-2 text-left"
                                                                on:click=move |_| app_state.0.select_project(Some(id))
                                                            >
                                                                <span class="truncate text-sm">{p.name.clone()}</span>
                                                                <Show when=move || app_state.0.current_project_id.get() == Some(id) fallback=|| ().into_view()>
                                                                    <Badge>"current"</Badge>
                                                                </Show>
                                                                <span class="truncate text-xs text-muted-foreground">
                                                                    {p.description.clone().unwrap_or_default()}
                                                                </span>
                                                            </button>
                                                        }
                                                    }
                                                >
                                                    {
                                                        let p = p_rename.clone();
                                                        view! {
                                                            <div class="flex flex-1 items-center gap-2">
                                                                <Input
                                                                    bind_value=edit_name
                                                                    class="h-7 text-sm"
                                                                    on_enter=Callback::new(move |_: ()| save_rename(p.clone()))
                                                                />
                                                                <Button size=ButtonSize::Xs variant=ButtonVariant::Ghost on:click=move |_| editing.set(None)>
                                                                    "Cancel"
                                                                </Button>
                                                            </div>
                                                        }
                                                    }
                                                </Show>
                                                <div class="flex shrink-0 items-center gap-1">
                                                    <span class="text-[11px] text-muted-foreground">
                                                        {p.created_at.as_deref().map(short_timestamp).unwrap_or_default()}
                                                    </span>
                                                    <Button
                                                        size=ButtonSize::Xs
                                                        variant=ButtonVariant::Ghost
                                                        on:click={
                                                            let current_name = p.name.clone();
                                                            move |_| {
                                                                edit_name.set(current_name.clone());
                                                                editing.set(Some(id));
                                                            }
                                                        }
                                                    >
                                                        "Rename"
                                                    </Button>
                                                    <Button
                                                        size=ButtonSize::Xs
                                                        variant=ButtonVariant::Ghost
                                                        class="text-destructive"
                                                        on:click=move |_| delete_project(p_delete.clone())
                                                    >
                                                        "Delete"
                                                    </Button>
                                                </div>
                                            </li>
                                        }
                                    }
                                />
                            </ul>
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

    fn project(id: i64, name: &str, parent_id: Option<i64>, level: u8) -> Project {
        Project {
            id,
            name: name.to_string(),
            description: None,
            parent_id,
            level,
            created_at: None,
        }
    }

    #[test]
    fn test_tree_order_puts_children_after_parent() {
        let list = vec![
            project(3, "child-of-1", Some(1), 2),
            project(1, "root-a", None, 1),
            project(2, "root-b", None, 1),
            project(4, "grandchild", Some(3), 3),
            project(9, "orphan", Some(42), 2),
        ];
        let names: Vec<_> = tree_order(&list).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["root-a", "child-of-1", "grandchild", "root-b", "orphan"]);
    }

    #[test]
    fn test_deepest_level_cannot_be_parent() {
        let list = vec![project(1, "a", None, 1), project(4, "deep", Some(3), 3)];
        assert_eq!(parent_candidates(&list), vec![(1, "a".to_string())]);
    }
}

use crate::api::{ApiResult, FileUpload, UploadOutcome};
use crate::components::pagination::Pagination;
use crate::components::toast::ToastKind;
use crate::components::ui::{
    Badge, BadgeTone, Button, ButtonSize, ButtonVariant, Card, CardContent, CardHeader, CardTitle,
    ErrorAlert, Input, LoadingRow, Spinner,
};
use crate::models::{DocType, KnowledgeDetail, KnowledgeDoc};
use crate::state::list::{FetchOutcome, ListQuery, ListState};
use crate::state::polling::FetchMode;
use crate::state::reorder::{
    compute_move, page_drop_zone, position_for_pointer, DropPosition, DropZone, MoveRequest,
    PageDwell,
};
use crate::state::AppContext;
use crate::storage::{load_json_from_storage, save_json_to_storage, KNOWLEDGE_VIEW_KEY};
use crate::util::{now_ms, short_timestamp, truncate_chars};
use gloo_timers::callback::Timeout;
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use wasm_bindgen::JsCast;

const PREVIEW_CHARS: usize = 1_500;

/// Page and filters, remembered per project across navigation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct KnowledgeView {
    pub project_id: i64,
    pub query: ListQuery,
}

/// Saved view for `project_id`, or a fresh first page.
pub(crate) fn restored_query(
    saved: Option<KnowledgeView>,
    project_id: Option<i64>,
    page_size: u32,
) -> ListQuery {
    match saved {
        Some(view) if Some(view.project_id) == project_id && view.query.page >= 1 => ListQuery {
            page_size: page_size.max(1),
            ..view.query
        },
        _ => ListQuery::new(page_size),
    }
}

pub(crate) fn doc_type_label(raw: &str) -> String {
    DocType::iter()
        .find(|d| d.as_ref() == raw)
        .map(|d| d.label().to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn parse_doc_type(raw: &str) -> Option<DocType> {
    DocType::iter().find(|d| d.as_ref() == raw)
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct UploadFeedback {
    pub kind: ToastKind,
    pub message: String,
    /// Reset the file picker.
    pub clear_selection: bool,
    /// Keep the file around for an "upload anyway".
    pub offer_force: bool,
}

/// What the user sees after an upload attempt.
pub(crate) fn upload_feedback(file_name: &str, result: &ApiResult<UploadOutcome>) -> UploadFeedback {
    match result {
        Ok(UploadOutcome::Uploaded { filename, .. }) => UploadFeedback {
            kind: ToastKind::Success,
            message: format!("Uploaded \"{filename}\""),
            clear_selection: true,
            offer_force: false,
        },
        Ok(UploadOutcome::Duplicate {
            existing_filename, ..
        }) => UploadFeedback {
            kind: ToastKind::Error,
            message: format!(
                "\"{file_name}\" has the same content as \"{existing_filename}\", which is already in the knowledge base"
            ),
            clear_selection: true,
            offer_force: true,
        },
        Err(e) => UploadFeedback {
            kind: ToastKind::Error,
            message: e.message.clone(),
            clear_selection: false,
            offer_force: false,
        },
    }
}

async fn read_file(file: web_sys::File) -> Result<FileUpload, String> {
    let buf = wasm_bindgen_futures::JsFuture::from(file.array_buffer())
        .await
        .map_err(|_| format!("Could not read \"{}\"", file.name()))?;
    let bytes = js_sys::Uint8Array::new(&buf).to_vec();
    Ok(FileUpload {
        file_name: file.name(),
        mime: Some(file.type_()).filter(|m| !m.is_empty()),
        bytes,
    })
}

#[component]
fn UploadPanel(#[prop(into)] on_uploaded: Callback<()>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let file_input: NodeRef<html::Input> = NodeRef::new();
    let selected: RwSignal<Option<String>> = RwSignal::new(None);
    let doc_type: RwSignal<String> = RwSignal::new(DocType::Requirement.as_ref().to_string());
    let uploading: RwSignal<bool> = RwSignal::new(false);
    // Set after a duplicate response so the user can force the upload.
    let duplicate: RwSignal<Option<(FileUpload, DocType)>> = RwSignal::new(None);

    let clear_selection = move || {
        if let Some(input) = file_input.get_untracked() {
            input.set_value("");
        }
        selected.set(None);
    };

    let send = move |file: FileUpload, kind: DocType, force: bool| {
        let Some(project_id) = app_state.0.current_project_id.get_untracked() else {
            return;
        };
        let client = app_state.0.client();
        uploading.set(true);
        spawn_local(async move {
            let name = file.file_name.clone();
            let result = client
                .upload_knowledge(project_id, kind, file.clone(), force)
                .await;
            let result = result.map_err(|e| app_state.0.triage(e.clone()).unwrap_or(e));
            let feedback = upload_feedback(&name, &result);

            if feedback.clear_selection {
                clear_selection();
            }
            duplicate.set(feedback.offer_force.then(|| (file, kind)));
            app_state.0.notify(feedback.kind, feedback.message);
            if result.is_ok() {
                on_uploaded.run(());
            }
            uploading.set(false);
        });
    };

    let on_upload = move |_| {
        if uploading.get_untracked() {
            return;
        }
        let Some(kind) = parse_doc_type(&doc_type.get_untracked()) else {
            return;
        };
        let file = file_input
            .get_untracked()
            .and_then(|input| input.files())
            .and_then(|files| files.get(0));
        let Some(file) = file else {
            app_state.0.notify(ToastKind::Error, "Choose a file first");
            return;
        };
        spawn_local(async move {
            match read_file(file).await {
                Ok(upload) => send(upload, kind, false),
                Err(msg) => app_state.0.notify(ToastKind::Error, msg),
            }
        });
    };

    let on_force = move |_| {
        if let Some((file, kind)) = duplicate.get_untracked() {
            send(file, kind, true);
        }
    };

    view! {
        <Card>
            <CardHeader>
                <CardTitle class="text-sm">"Upload document"</CardTitle>
            </CardHeader>
            <CardContent class="flex flex-col gap-3">
                <div class="flex flex-wrap items-center gap-2">
                    <select
                        class="h-8 rounded-md border border-input bg-transparent px-2 text-sm"
                        prop:value=move || doc_type.get()
                        on:change=move |ev| doc_type.set(event_target_value(&ev))
                    >
                        {DocType::iter()
                            .map(|d| view! { <option value=d.as_ref().to_string()>{d.label()}</option> })
                            .collect_view()}
                    </select>
                    <input
                        type="file"
                        class="text-xs"
                        node_ref=file_input
                        on:change=move |_| {
                            let name = file_input
                                .get_untracked()
                                .and_then(|input| input.files())
                                .and_then(|files| files.get(0))
                                .map(|f| f.name());
                            selected.set(name);
                        }
                    />
                    <Button
                        size=ButtonSize::Sm
                        attr:disabled=move || uploading.get() || selected.get().is_none()
                        on:click=on_upload
                    >
                        <Show when=move || uploading.get() fallback=|| ().into_view()>
                            <Spinner />
                        </Show>
                        "Upload"
                    </Button>
                </div>
                <Show when=move || duplicate.with(|d| d.is_some()) fallback=|| ().into_view()>
                    <div class="flex items-center gap-2 text-xs text-muted-foreground">
                        {move || {
                            duplicate
                                .with(|d| d.as_ref().map(|(f, _)| f.file_name.clone()))
                                .map(|n| format!("\"{n}\" was not uploaded."))
                                .unwrap_or_default()
                        }}
                        <Button size=ButtonSize::Xs variant=ButtonVariant::Outline on:click=on_force>
                            "Upload anyway"
                        </Button>
                        <Button size=ButtonSize::Xs variant=ButtonVariant::Ghost on:click=move |_| duplicate.set(None)>
                            "Dismiss"
                        </Button>
                    </div>
                </Show>
            </CardContent>
        </Card>
    }
}

#[component]
fn DocDetail(detail: KnowledgeDetail) -> impl IntoView {
    view! {
        <div class="flex flex-col gap-2 rounded-md bg-muted/40 p-3 text-xs">
            <pre class="max-h-64 overflow-auto whitespace-pre-wrap">{truncate_chars(&detail.content, PREVIEW_CHARS)}</pre>
            <Show when={
                let empty = detail.linked_docs.is_empty();
                move || !empty
            } fallback=|| ().into_view()>
                <div class="text-muted-foreground">"Linked documents"</div>
            </Show>
            <ul class="list-disc pl-4">
                {detail
                    .linked_docs
                    .iter()
                    .map(|d| view! { <li>{format!("#{} {}", d.id, d.filename)}</li> })
                    .collect_view()}
            </ul>
        </div>
    }
}

#[component]
pub fn KnowledgePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let config = app_state.0.config();
    let page_size = config.page_size;
    let dwell_ms = config.dwell_ms;
    let project_id = app_state.0.current_project_id;

    let query: RwSignal<ListQuery> = RwSignal::new(restored_query(
        load_json_from_storage(KNOWLEDGE_VIEW_KEY),
        project_id.get_untracked(),
        page_size,
    ));
    let list: RwSignal<ListState<KnowledgeDoc>> = RwSignal::new(ListState::default());
    let reload: RwSignal<u64> = RwSignal::new(0);

    let search_text: RwSignal<String> =
        RwSignal::new(query.with_untracked(|q| q.filter("search").unwrap_or_default().to_string()));

    let expanded: RwSignal<Option<i64>> = RwSignal::new(None);
    let detail: RwSignal<Option<KnowledgeDetail>> = RwSignal::new(None);

    let dragging: RwSignal<Option<i64>> = RwSignal::new(None);
    let drop_hint: RwSignal<Option<DropZone>> = RwSignal::new(None);
    let dwell: RwSignal<PageDwell> = RwSignal::new(PageDwell::new(dwell_ms));

    // Switching project starts over at page 1 without filters.
    Effect::new(move |prev: Option<Option<i64>>| {
        let pid = project_id.get();
        if let Some(prev) = prev {
            if prev != pid {
                search_text.set(String::new());
                expanded.set(None);
                query.set(ListQuery::new(page_size));
            }
        }
        pid
    });

    Effect::new(move |_| {
        let Some(pid) = project_id.get() else {
            return;
        };
        let q = query.get();
        reload.track();

        save_json_to_storage(
            KNOWLEDGE_VIEW_KEY,
            &KnowledgeView {
                project_id: pid,
                query: q.clone(),
            },
        );

        let Some(seq) = list.try_update(|l| l.begin(FetchMode::Foreground)) else {
            return;
        };
        let client = app_state.0.client();
        spawn_local(async move {
            let result = client.knowledge_list(pid, &q).await;
            let result = result.map_err(|e| app_state.0.triage(e.clone()).unwrap_or(e));
            match list.try_update(|l| l.finish(seq, result)) {
                Some(FetchOutcome::Clamped(page)) => {
                    tracing::debug!("page {} is past the end, showing {page}", q.page);
                    query.update(|q| q.go_to(page));
                }
                Some(FetchOutcome::Stale) => tracing::debug!("dropped stale knowledge page {}", q.page),
                _ => {}
            }
        });
    });

    let refetch = move || reload.update(|n| *n += 1);

    let end_drag = move || {
        dragging.set(None);
        drop_hint.set(None);
        dwell.update(|d| d.leave());
    };

    let dragend = window_event_listener(ev::dragend, move |_: web_sys::DragEvent| end_drag());
    on_cleanup(move || dragend.remove());

    // The list is re-fetched after every attempt; order is never patched locally.
    let send_move = move |pid: i64, mv: MoveRequest| {
        let client = app_state.0.client();
        spawn_local(async move {
            match client.move_knowledge(pid, &mv).await {
                Ok(_) => app_state.0.notify(ToastKind::Success, "Document moved"),
                Err(e) => app_state.0.report(e),
            }
            refetch();
        });
    };

    let visible_ids = move || list.with_untracked(|l| l.items.iter().map(|d| d.global_id).collect::<Vec<_>>());

    let drop_on_row = move |zone: DropZone| {
        let (Some(dragged), Some(pid)) = (dragging.get_untracked(), project_id.get_untracked()) else {
            return;
        };
        end_drag();
        match compute_move(&visible_ids(), dragged, zone) {
            Some(mv) => send_move(pid, mv),
            None => tracing::debug!("drop of {dragged} leaves the order unchanged"),
        }
    };

    let drop_on_page = move |page: u32| {
        let (Some(dragged), Some(pid)) = (dragging.get_untracked(), project_id.get_untracked()) else {
            return;
        };
        end_drag();
        let shown = list.with_untracked(|l| l.page);
        let current_ids = visible_ids();
        let mut target = query.get_untracked();
        target.go_to(page);
        let client = app_state.0.client();

        spawn_local(async move {
            let ids = if page == shown {
                current_ids
            } else {
                match client.knowledge_list(pid, &target).await {
                    Ok(res) => res.items.iter().map(|d| d.global_id).collect(),
                    Err(e) => {
                        app_state.0.report(e);
                        return;
                    }
                }
            };
            let mv = page_drop_zone(&ids).and_then(|zone| compute_move(&ids, dragged, zone));
            if let Some(mv) = mv {
                send_move(pid, mv);
            }
        });
    };

    let on_drag_page = Callback::new(move |page: u32| {
        if dragging.get_untracked().is_none() {
            return;
        }
        let fresh = dwell.with_untracked(|d| d.hovered() != Some(page));
        dwell.update(|d| d.enter(page, now_ms()));
        if fresh {
            Timeout::new(dwell_ms + 20, move || {
                let due = dwell.try_update(|d| d.fire_if_due(now_ms())).flatten();
                if let Some(page) = due {
                    if query.with_untracked(|q| q.page) != page {
                        query.update(|q| q.go_to(page));
                    }
                }
            })
            .forget();
        }
    });

    let toggle_detail = move |global_id: i64| {
        if expanded.get_untracked() == Some(global_id) {
            expanded.set(None);
            return;
        }
        expanded.set(Some(global_id));
        detail.set(None);
        let client = app_state.0.client();
        spawn_local(async move {
            match client.knowledge_detail(global_id).await {
                Ok(d) if expanded.get_untracked() == Some(global_id) => detail.set(Some(d)),
                Ok(_) => {}
                Err(e) => {
                    expanded.set(None);
                    app_state.0.report(e);
                }
            }
        });
    };

    let delete_doc = move |doc: KnowledgeDoc| {
        let confirmed = window()
            .confirm_with_message(&format!("Delete \"{}\"?", doc.filename))
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let client = app_state.0.client();
        spawn_local(async move {
            match client.delete_knowledge(doc.global_id).await {
                Ok(_) => {
                    app_state.0.notify(ToastKind::Success, format!("Deleted \"{}\"", doc.filename));
                    refetch();
                }
                Err(e) => app_state.0.report(e),
            }
        });
    };

    let apply_search = move || {
        let text = search_text.get_untracked();
        query.maybe_update(|q| q.set_filter("search", text));
    };

    let filter_select = move |key: &'static str| {
        move |ev: web_sys::Event| {
            let value = event_target_value(&ev);
            query.maybe_update(|q| q.set_filter(key, value));
        }
    };

    let row = move |doc: KnowledgeDoc| {
        let gid = doc.global_id;
        let doc_for_delete = doc.clone();
        let hint_class = move || match drop_hint.get() {
            Some(DropZone { anchor_id, position: DropPosition::Before }) if anchor_id == gid => "border-t-2 border-t-primary",
            Some(DropZone { anchor_id, position: DropPosition::After }) if anchor_id == gid => "border-b-2 border-b-primary",
            _ => "",
        };
        let linked = doc.linked_test_cases.len();
        view! {
            <li
                class=move || {
                    let faded = if dragging.get() == Some(gid) { "opacity-50" } else { "" };
                    format!("flex flex-col gap-2 py-2 {} {faded}", hint_class())
                }
                draggable="true"
                on:dragstart=move |ev: web_sys::DragEvent| {
                    if let Some(dt) = ev.data_transfer() {
                        dt.set_effect_allowed("move");
                        let _ = dt.set_data("text/plain", &gid.to_string());
                    }
                    dragging.set(Some(gid));
                }
                on:dragover=move |ev: web_sys::DragEvent| {
                    if dragging.get_untracked().is_none() {
                        return;
                    }
                    ev.prevent_default();
                    let Some(el) = ev.current_target().and_then(|t| t.dyn_into::<web_sys::Element>().ok()) else {
                        return;
                    };
                    let rect = el.get_bounding_client_rect();
                    let position = position_for_pointer(ev.client_y() as f64, rect.top(), rect.height());
                    let zone = DropZone { anchor_id: gid, position };
                    if drop_hint.get_untracked() != Some(zone) {
                        drop_hint.set(Some(zone));
                    }
                }
                on:drop=move |ev: web_sys::DragEvent| {
                    ev.prevent_default();
                    let zone = drop_hint
                        .get_untracked()
                        .filter(|z| z.anchor_id == gid)
                        .unwrap_or(DropZone { anchor_id: gid, position: DropPosition::After });
                    drop_on_row(zone);
                }
            >
                <div class="flex items-center gap-3">
                    <span class="w-10 shrink-0 cursor-grab text-xs text-muted-foreground">{format!("#{}", doc.id)}</span>
                    <button class="min-w-0 flex-1 truncate text-left text-sm" on:click=move |_| toggle_detail(gid)>
                        {doc.filename.clone()}
                    </button>
                    <Badge tone=BadgeTone::Info>{doc_type_label(&doc.doc_type)}</Badge>
                    {(linked > 0).then(|| view! { <Badge>{format!("{linked} linked")}</Badge> })}
                    <span class="w-28 shrink-0 text-right text-[11px] text-muted-foreground">
                        {short_timestamp(&doc.created_at)}
                    </span>
                    <Button
                        size=ButtonSize::Xs
                        variant=ButtonVariant::Ghost
                        class="text-destructive"
                        on:click=move |_| delete_doc(doc_for_delete.clone())
                    >
                        "Delete"
                    </Button>
                </div>
                <Show when=move || expanded.get() == Some(gid) fallback=|| ().into_view()>
                    {move || match detail.get() {
                        Some(d) => view! { <DocDetail detail=d /> }.into_any(),
                        None => view! { <LoadingRow /> }.into_any(),
                    }}
                </Show>
            </li>
        }
    };

    view! {
        <div class="flex flex-col gap-4">
            <h1 class="text-lg font-semibold">"Knowledge base"</h1>

            <UploadPanel on_uploaded=Callback::new(move |_: ()| refetch()) />

            <Card>
                <CardContent class="flex flex-col gap-3">
                    <div class="flex flex-wrap items-center gap-2">
                        <Input
                            bind_value=search_text
                            placeholder="Search file names"
                            class="h-8 w-56 text-sm"
                            on_enter=Callback::new(move |_: ()| apply_search())
                        />
                        <Button size=ButtonSize::Sm variant=ButtonVariant::Secondary on:click=move |_| apply_search()>
                            "Search"
                        </Button>
                        <select
                            class="h-8 rounded-md border border-input bg-transparent px-2 text-sm"
                            prop:value=move || query.with(|q| q.filter("doc_type").unwrap_or_default().to_string())
                            on:change=filter_select("doc_type")
                        >
                            <option value="">"All types"</option>
                            {DocType::iter()
                                .map(|d| view! { <option value=d.as_ref().to_string()>{d.label()}</option> })
                                .collect_view()}
                        </select>
                        <input
                            type="date"
                            class="h-8 rounded-md border border-input bg-transparent px-2 text-xs"
                            prop:value=move || query.with(|q| q.filter("start_date").unwrap_or_default().to_string())
                            on:change=filter_select("start_date")
                        />
                        <span class="text-xs text-muted-foreground">"to"</span>
                        <input
                            type="date"
                            class="h-8 rounded-md border border-input bg-transparent px-2 text-xs"
                            prop:value=move || query.with(|q| q.filter("end_date").unwrap_or_default().to_string())
                            on:change=filter_select("end_date")
                        />
                        <Button
                            size=ButtonSize::Sm
                            variant=ButtonVariant::Ghost
                            on:click=move |_| {
                                search_text.set(String::new());
                                query.maybe_update(|q| q.clear_filters());
                            }
                        >
                            "Reset"
                        </Button>
                        <span class="ml-auto text-xs text-muted-foreground">
                            {move || format!("{} documents", list.with(|l| l.total_items))}
                        </span>
                    </div>

                    <ErrorAlert error=Signal::derive(move || list.with(|l| l.error.clone())) />

                    <Show
                        when=move || !list.with(|l| l.loading && l.items.is_empty())
                        fallback=|| view! { <LoadingRow /> }
                    >
                        <Show
                            when=move || list.with(|l| !l.items.is_empty())
                            fallback=move || view! {
                                <div class="py-6 text-center text-xs text-muted-foreground">
                                    {move || if list.with(|l| l.error.is_some()) { "" } else { "No documents match." }}
                                </div>
                            }
                        >
                            <ul class=move || if list.with(|l| l.loading) { "divide-y opacity-60" } else { "divide-y" }>
                                <For
                                    each=move || list.with(|l| l.items.clone())
                                    key=|d| (d.global_id, d.filename.clone())
                                    children=row
                                />
                            </ul>
                        </Show>
                    </Show>

                    <Pagination
                        page=Signal::derive(move || list.with(|l| l.page))
                        total_pages=Signal::derive(move || list.with(|l| l.total_pages))
                        on_page=Callback::new(move |p: u32| query.update(|q| q.go_to(p)))
                        on_drag_page=on_drag_page
                        on_drag_leave=Callback::new(move |_: ()| dwell.update(|d| d.leave()))
                        on_drop_page=Callback::new(drop_on_page)
                    />
                    <Show when=move || dragging.get().is_some() fallback=|| ().into_view()>
                        <p class="text-center text-[11px] text-muted-foreground">
                            "Hold over a page number to open it, or drop there to move to the end of that page."
                        </p>
                    </Show>
                </CardContent>
            </Card>
        </div>
    }
}

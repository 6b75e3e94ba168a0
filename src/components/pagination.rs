use crate::components::ui::{Button, ButtonSize, ButtonVariant};
use leptos::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PageItem {
    Page(u32),
    Gap,
}

/// Page buttons to show: first, last, and a window around `current`.
pub(crate) fn page_window(current: u32, total: u32, radius: u32) -> Vec<PageItem> {
    let total = total.max(1);
    let current = current.clamp(1, total);
    let lo = current.saturating_sub(radius).max(1);
    let hi = (current + radius).min(total);

    let mut out = Vec::new();
    if lo > 1 {
        out.push(PageItem::Page(1));
        if lo > 2 {
            out.push(PageItem::Gap);
        }
    }
    out.extend((lo..=hi).map(PageItem::Page));
    if hi < total {
        if hi + 1 < total {
            out.push(PageItem::Gap);
        }
        out.push(PageItem::Page(total));
    }
    out
}

/// Pager whose buttons double as drop targets while a row is dragged.
#[component]
pub fn Pagination(
    #[prop(into)] page: Signal<u32>,
    #[prop(into)] total_pages: Signal<u32>,
    #[prop(into)] on_page: Callback<u32>,
    /// Drag hovering a page button.
    #[prop(into, optional)]
    on_drag_page: Option<Callback<u32>>,
    #[prop(into, optional)] on_drag_leave: Option<Callback<()>>,
    /// Row dropped on a page button.
    #[prop(into, optional)]
    on_drop_page: Option<Callback<u32>>,
) -> impl IntoView {
    let page_button = move |p: u32| {
        let is_current = move || page.get() == p;
        view! {
            <span
                on:dragover=move |ev: web_sys::DragEvent| {
                    if let Some(cb) = on_drag_page {
                        ev.prevent_default();
                        cb.run(p);
                    }
                }
                on:dragleave=move |_| {
                    if let Some(cb) = on_drag_leave {
                        cb.run(());
                    }
                }
                on:drop=move |ev: web_sys::DragEvent| {
                    if let Some(cb) = on_drop_page {
                        ev.prevent_default();
                        cb.run(p);
                    }
                }
            >
                {move || {
                    let variant = if is_current() { ButtonVariant::Default } else { ButtonVariant::Ghost };
                    view! {
                        <Button size=ButtonSize::Xs variant=variant on:click=move |_| on_page.run(p)>
                            {p.to_string()}
                        </Button>
                    }
                }}
            </span>
        }
    };

    view! {
        <Show when=move || { total_pages.get() > 1 } fallback=|| ().into_view()>
            <nav class="flex items-center justify-center gap-1 pt-3" aria-label="Pagination">
                <Button
                    size=ButtonSize::Xs
                    variant=ButtonVariant::Ghost
                    attr:disabled=move || page.get() <= 1
                    on:click=move |_| on_page.run(page.get_untracked().saturating_sub(1).max(1))
                >
                    "Prev"
                </Button>
                {move || {
                    page_window(page.get(), total_pages.get(), 2)
                        .into_iter()
                        .map(|item| match item {
                            PageItem::Page(p) => page_button(p).into_any(),
                            PageItem::Gap => view! { <span class="px-1 text-xs text-muted-foreground">"…"</span> }.into_any(),
                        })
                        .collect_view()
                }}
                <Button
                    size=ButtonSize::Xs
                    variant=ButtonVariant::Ghost
                    attr:disabled=move || page.get() >= total_pages.get()
                    on:click=move |_| on_page.run((page.get_untracked() + 1).min(total_pages.get_untracked()))
                >
                    "Next"
                </Button>
            </nav>
        </Show>
    }
}

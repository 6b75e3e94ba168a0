use icons::{Loader, LoaderCircle};
use leptos::prelude::*;
use tw_merge::tw_merge;

#[component]
pub fn Spinner(#[prop(into, optional)] class: String) -> impl IntoView {
    let merged_class = tw_merge!("size-4 animate-spin", class);

    view! { <Loader class=merged_class attr:role="status" attr:aria-label="Loading" /> }
}

/// Centered spinner with a caption, for list bodies that are still loading.
#[component]
pub fn LoadingRow(#[prop(into, default = "Loading...".to_string())] label: String) -> impl IntoView {
    view! {
        <div class="flex items-center justify-center gap-2 py-8 text-xs text-muted-foreground">
            <LoaderCircle class="size-4 animate-spin" attr:role="status" />
            <span>{label}</span>
        </div>
    }
}

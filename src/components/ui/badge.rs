use leptos::prelude::*;
use tw_merge::tw_merge;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BadgeTone {
    #[default]
    Neutral,
    Ok,
    Error,
    Info,
}

impl BadgeTone {
    fn classes(self) -> &'static str {
        match self {
            BadgeTone::Neutral => "bg-muted text-muted-foreground",
            BadgeTone::Ok => "bg-success/15 text-success",
            BadgeTone::Error => "bg-destructive/15 text-destructive",
            BadgeTone::Info => "bg-primary/10 text-primary",
        }
    }
}

#[component]
pub fn Badge(
    #[prop(optional)] tone: BadgeTone,
    #[prop(into, optional)] class: String,
    children: Children,
) -> impl IntoView {
    let class = tw_merge!(
        "inline-flex items-center rounded-full px-2 py-0.5 text-[11px] font-medium",
        tone.classes(),
        class
    );
    view! { <span class=class>{children()}</span> }
}

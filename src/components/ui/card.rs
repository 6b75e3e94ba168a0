use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Card, div, "bg-card text-card-foreground flex flex-col gap-4 rounded-xl border py-5 shadow-sm"}
    clx! {CardHeader, div, "flex flex-col items-start gap-1.5 px-5"}
    clx! {CardTitle, h2, "leading-none font-semibold"}
    clx! {CardContent, div, "px-5"}
    clx! {CardDescription, p, "text-muted-foreground text-sm"}
    clx! {CardFooter, footer, "flex items-center px-5", "gap-2"}
}

pub use components::*;

/// Small headline number used on the dashboard and evaluation pages.
#[component]
pub fn StatCard(
    #[prop(into)] label: String,
    #[prop(into)] value: Signal<String>,
    #[prop(into, optional)] hint: String,
) -> impl IntoView {
    view! {
        <Card class="gap-1 py-4">
            <CardContent class="flex flex-col gap-1">
                <div class="text-xs text-muted-foreground">{label}</div>
                <div class="text-xl font-semibold tabular-nums">{move || value.get()}</div>
                <div class="text-[11px] text-muted-foreground">{hint}</div>
            </CardContent>
        </Card>
    }
}

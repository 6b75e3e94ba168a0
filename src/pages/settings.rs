use crate::api::stream::{StreamPreview, StreamState};
use crate::api::ModelConfigRequest;
use crate::components::toast::ToastKind;
use crate::components::ui::{
    Badge, BadgeTone, Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription,
    CardHeader, CardTitle, ErrorAlert, Input, Label, NativeSelect, Spinner,
};
use crate::models::ModelConfig;
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

pub(crate) const PROVIDERS: &[(&str, &str)] = &[
    ("dashscope", "DashScope"),
    ("openai", "OpenAI compatible"),
    ("ollama", "Ollama"),
    ("local", "Local server"),
];

fn provider_options() -> Vec<(String, String)> {
    PROVIDERS
        .iter()
        .map(|(value, label)| (value.to_string(), label.to_string()))
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    Some(s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Form fields to request. A blank key keeps the stored one.
pub(crate) fn config_request(
    provider: &str,
    model_name: &str,
    api_key: &str,
    base_url: &str,
    vl_model: &str,
    turbo_model: &str,
) -> ModelConfigRequest {
    ModelConfigRequest {
        provider: provider.trim().to_string(),
        model_name: model_name.trim().to_string(),
        api_key: non_empty(api_key),
        base_url: non_empty(base_url),
        vl_model_name: non_empty(vl_model),
        turbo_model_name: non_empty(turbo_model),
    }
}

#[component]
pub fn SettingsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let provider: RwSignal<String> = RwSignal::new(PROVIDERS[0].0.to_string());
    let model_name: RwSignal<String> = RwSignal::new(String::new());
    let api_key: RwSignal<String> = RwSignal::new(String::new());
    let base_url: RwSignal<String> = RwSignal::new(String::new());
    let vl_model: RwSignal<String> = RwSignal::new(String::new());
    let turbo_model: RwSignal<String> = RwSignal::new(String::new());

    let current: RwSignal<Option<ModelConfig>> = RwSignal::new(None);
    let busy: RwSignal<Option<&'static str>> = RwSignal::new(None);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let prompt: RwSignal<String> = RwSignal::new(String::new());
    let preview: RwSignal<StreamPreview> = RwSignal::new(StreamPreview::default());
    let event_source = StoredValue::new_local(None::<web_sys::EventSource>);

    let load_current = move || {
        let client = app_state.0.client();
        spawn_local(async move {
            match client.current_model_config().await {
                Ok(cfg) => {
                    if cfg.active {
                        provider.set(cfg.provider.clone().unwrap_or_else(|| PROVIDERS[0].0.to_string()));
                        model_name.set(cfg.model_name.clone().unwrap_or_default());
                        base_url.set(cfg.base_url.clone().unwrap_or_default());
                        vl_model.set(cfg.vl_model_name.clone().unwrap_or_default());
                        turbo_model.set(cfg.turbo_model_name.clone().unwrap_or_default());
                    }
                    current.set(Some(cfg));
                }
                Err(e) => app_state.0.report(e),
            }
        });
    };
    load_current();

    let request = move || {
        config_request(
            &provider.get_untracked(),
            &model_name.get_untracked(),
            &api_key.get_untracked(),
            &base_url.get_untracked(),
            &vl_model.get_untracked(),
            &turbo_model.get_untracked(),
        )
    };

    let on_validate = move |_| {
        if busy.get_untracked().is_some() {
            return;
        }
        let req = request();
        let client = app_state.0.client();
        busy.set(Some("validate"));
        error.set(None);
        spawn_local(async move {
            match client.validate_model_config(&req).await {
                Ok(_) => app_state.0.notify(ToastKind::Success, "Connection works"),
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        error.set(Some(e.message));
                    }
                }
            }
            busy.set(None);
        });
    };

    let on_save = move |_| {
        if busy.get_untracked().is_some() {
            return;
        }
        let req = request();
        let client = app_state.0.client();
        busy.set(Some("save"));
        error.set(None);
        spawn_local(async move {
            match client.save_model_config(&req).await {
                Ok(id) => {
                    tracing::info!("model config {id} saved");
                    api_key.set(String::new());
                    app_state.0.notify(ToastKind::Success, "Settings saved");
                    load_current();
                }
                Err(e) => {
                    if let Some(e) = app_state.0.triage(e) {
                        error.set(Some(e.message));
                    }
                }
            }
            busy.set(None);
        });
    };

    let close_stream = move || {
        event_source.update_value(|es| {
            if let Some(es) = es.take() {
                es.close();
            }
        });
    };

    on_cleanup(move || close_stream());

    let start_stream = move |_| {
        let url = match app_state.0.client().stream_test_url(
            &provider.get_untracked(),
            &model_name.get_untracked(),
            &prompt.get_untracked(),
            Some(api_key.get_untracked().as_str()),
            Some(base_url.get_untracked().as_str()),
        ) {
            Ok(url) => url,
            Err(e) => {
                error.set(Some(e.message));
                return;
            }
        };
        close_stream();
        error.set(None);
        preview.update(|p| p.start());

        let es = match web_sys::EventSource::new(&url) {
            Ok(es) => es,
            Err(_) => {
                preview.update(|p| p.disconnect());
                return;
            }
        };

        let es_msg = es.clone();
        let on_message = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |ev: web_sys::MessageEvent| {
            let Some(data) = ev.data().as_string() else {
                return;
            };
            if preview.try_update(|p| p.apply_raw(&data)).unwrap_or(true) {
                es_msg.close();
            }
        });
        let es_err = es.clone();
        // EventSource reconnects on its own; a finished preview should not.
        let on_error = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            es_err.close();
            preview.try_update(|p| p.disconnect());
        });
        es.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        es.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        on_message.forget();
        on_error.forget();

        event_source.set_value(Some(es));
    };

    let stop_stream = move |_| {
        close_stream();
        preview.update(|p| p.disconnect());
    };

    let streaming = move || preview.with(|p| p.state == StreamState::Streaming);

    view! {
        <div class="flex flex-col gap-4">
            <h1 class="text-lg font-semibold">"Model settings"</h1>

            <Card>
                <CardHeader>
                    <CardTitle class="flex items-center gap-2 text-sm">
                        "Provider"
                        {move || current.get().map(|c| {
                            if c.active {
                                view! { <Badge tone=BadgeTone::Ok>"active"</Badge> }.into_any()
                            } else {
                                view! { <Badge>"not configured"</Badge> }.into_any()
                            }
                        })}
                    </CardTitle>
                    <CardDescription class="text-xs">
                        {move || {
                            if current.with(|c| c.as_ref().is_some_and(|c| c.has_api_key)) {
                                "An API key is stored. Leave the field blank to keep it."
                            } else {
                                "No API key stored yet."
                            }
                        }}
                    </CardDescription>
                </CardHeader>
                <CardContent>
                    <div class="grid grid-cols-1 gap-3 md:grid-cols-2">
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="provider" class="text-xs" required=true>"Provider"</Label>
                            <NativeSelect
                                id="provider"
                                class="h-8 text-sm"
                                bind_value=provider
                                options={provider_options()}
                            />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="model_name" class="text-xs" required=true>"Model"</Label>
                            <Input id="model_name" bind_value=model_name placeholder="qwen-max" class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="api_key" class="text-xs">"API key"</Label>
                            <Input id="api_key" r#type="password" bind_value=api_key class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="base_url" class="text-xs">"Base URL"</Label>
                            <Input id="base_url" bind_value=base_url placeholder="http://localhost:11434/v1" class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="vl_model" class="text-xs">"Vision model"</Label>
                            <Input id="vl_model" bind_value=vl_model class="h-8 text-sm" />
                        </div>
                        <div class="flex flex-col gap-1.5">
                            <Label html_for="turbo_model" class="text-xs">"Fast model"</Label>
                            <Input id="turbo_model" bind_value=turbo_model class="h-8 text-sm" />
                        </div>
                        <div class="flex items-center gap-2 md:col-span-2">
                            <Button size=ButtonSize::Sm attr:disabled=move || busy.get().is_some() on:click=on_save>
                                <Show when=move || busy.get() == Some("save") fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                "Save"
                            </Button>
                            <Button
                                size=ButtonSize::Sm
                                variant=ButtonVariant::Outline
                                attr:disabled=move || busy.get().is_some()
                                on:click=on_validate
                            >
                                <Show when=move || busy.get() == Some("validate") fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                "Test connection"
                            </Button>
                        </div>
                        <div class="md:col-span-2">
                            <ErrorAlert error=error />
                        </div>
                    </div>
                </CardContent>
            </Card>

            <Card>
                <CardHeader>
                    <CardTitle class="text-sm">"Streaming preview"</CardTitle>
                    <CardDescription class="text-xs">
                        "Streams with the provider fields above. Providers that need a key use the one typed in the API key field."
                    </CardDescription>
                </CardHeader>
                <CardContent class="flex flex-col gap-3">
                    <div class="flex items-center gap-2">
                        <Input bind_value=prompt placeholder="Hi" class="h-8 text-sm" />
                        <Show
                            when=streaming
                            fallback=move || view! {
                                <Button size=ButtonSize::Sm variant=ButtonVariant::Secondary on:click=start_stream>
                                    "Stream"
                                </Button>
                            }
                        >
                            <Button size=ButtonSize::Sm variant=ButtonVariant::Ghost on:click=stop_stream>
                                "Stop"
                            </Button>
                        </Show>
                    </div>
                    <pre class="min-h-16 whitespace-pre-wrap rounded-md bg-muted/40 p-3 text-xs">
                        {move || preview.with(|p| p.text.clone())}
                        <Show when=streaming fallback=|| ().into_view()>
                            <span class="animate-pulse">"▍"</span>
                        </Show>
                    </pre>
                    <ErrorAlert error=Signal::derive(move || match preview.get().state {
                        StreamState::Failed(msg) => Some(msg),
                        _ => None,
                    }) />
                </CardContent>
            </Card>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_request_drops_blank_optionals() {
        let req = config_request(" openai ", "gpt-4o", "", "  ", "", "gpt-4o-mini");
        assert_eq!(req.provider, "openai");
        assert_eq!(req.api_key, None);
        assert_eq!(req.base_url, None);
        assert_eq!(req.vl_model_name, None);
        assert_eq!(req.turbo_model_name.as_deref(), Some("gpt-4o-mini"));

        let json = serde_json::to_value(&req).expect("serialize");
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn test_provider_options_cover_every_provider() {
        let options = provider_options();
        assert_eq!(options.len(), PROVIDERS.len());
        assert_eq!(options[0], ("dashscope".to_string(), "DashScope".to_string()));
    }
}

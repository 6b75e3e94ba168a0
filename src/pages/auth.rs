use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, Card, CardContent, CardDescription, CardHeader,
    CardTitle, ErrorAlert, Input, Label, Spinner,
};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

/// Client-side checks before the register request goes out.
pub(crate) fn validate_registration(username: &str, password: &str, confirm: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

#[component]
fn AuthShell(#[prop(into)] title: String, #[prop(into)] subtitle: String, children: Children) -> impl IntoView {
    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                <div class="mb-6 flex items-center justify-center">
                    <a href="/" class="text-sm font-medium text-foreground">"AI Test Platform"</a>
                </div>
                <Card>
                    <CardHeader>
                        <CardTitle class="text-lg">{title}</CardTitle>
                        <CardDescription class="text-xs">{subtitle}</CardDescription>
                    </CardHeader>
                    <CardContent>{children()}</CardContent>
                </Card>
            </div>
        </div>
    }
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let username: RwSignal<String> = RwSignal::new(String::new());
    let password: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);

    let app_state = expect_context::<AppContext>();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if loading.get_untracked() {
            return;
        }

        let username_val = username.get_untracked();
        let password_val = password.get_untracked();
        let client = app_state.0.client();

        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match client.login(&username_val, &password_val).await {
                Ok(user) => {
                    app_state.0.signed_in(user);
                    let _ = window().location().set_href("/");
                }
                // A 401 here means bad credentials, not an expired session.
                Err(e) => error.set(Some(e.message)),
            }
            loading.set(false);
        });
    };

    view! {
        <AuthShell title="Log in" subtitle="Use your username and password to continue.">
            <form class="flex flex-col gap-3" on:submit=on_submit>
                <div class="flex flex-col gap-1.5">
                    <Label html_for="username" class="text-xs">"Username"</Label>
                    <Input id="username" placeholder="username" bind_value=username required=true class="h-8 text-sm" />
                </div>

                <div class="flex flex-col gap-1.5">
                    <Label html_for="password" class="text-xs">"Password"</Label>
                    <Input
                        id="password"
                        r#type="password"
                        placeholder="••••••••"
                        bind_value=password
                        required=true
                        class="h-8 text-sm"
                    />
                </div>

                <ErrorAlert error=error />

                <Button class="w-full" size=ButtonSize::Sm attr:disabled=move || loading.get()>
                    <span class="inline-flex items-center gap-2">
                        <Show when=move || loading.get() fallback=|| ().into_view()>
                            <Spinner />
                        </Show>
                        {move || if loading.get() { "Signing in..." } else { "Continue" }}
                    </span>
                </Button>

                <div class="pt-1 text-xs text-muted-foreground">
                    "No account? "
                    <a class="text-primary underline underline-offset-4" href="/register">"Register"</a>
                </div>
            </form>
        </AuthShell>
    }
}

#[component]
pub fn RegisterPage() -> impl IntoView {
    let username: RwSignal<String> = RwSignal::new(String::new());
    let password: RwSignal<String> = RwSignal::new(String::new());
    let confirm_password: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let created: RwSignal<Option<String>> = RwSignal::new(None);

    let app_state = expect_context::<AppContext>();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let username_val = username.get_untracked();
        let password_val = password.get_untracked();

        if let Err(msg) = validate_registration(&username_val, &password_val, &confirm_password.get_untracked()) {
            error.set(Some(msg));
            return;
        }

        let client = app_state.0.client();
        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match client.register(&username_val, &password_val).await {
                Ok(user) => created.set(Some(user.username)),
                Err(e) => error.set(Some(e.message)),
            }
            loading.set(false);
        });
    };

    view! {
        <AuthShell title="Create account" subtitle="Projects and model settings are kept per account.">
            <Show
                when=move || created.get().is_none()
                fallback=move || view! {
                    <Alert>
                        <AlertDescription class="text-xs">
                            {move || format!("Account \"{}\" created. You can now ", created.get().unwrap_or_default())}
                            <a class="text-primary underline underline-offset-4" href="/login">"log in"</a>
                            "."
                        </AlertDescription>
                    </Alert>
                }
            >
                <form class="flex flex-col gap-3" on:submit=on_submit>
                    <div class="flex flex-col gap-1.5">
                        <Label html_for="username" class="text-xs" required=true>"Username"</Label>
                        <Input id="username" placeholder="username" bind_value=username required=true class="h-8 text-sm" />
                    </div>

                    <div class="flex flex-col gap-1.5">
                        <Label html_for="password" class="text-xs" required=true>"Password"</Label>
                        <Input
                            id="password"
                            r#type="password"
                            placeholder="••••••••"
                            bind_value=password
                            required=true
                            class="h-8 text-sm"
                        />
                    </div>

                    <div class="flex flex-col gap-1.5">
                        <Label html_for="confirm_password" class="text-xs" required=true>"Confirm password"</Label>
                        <Input
                            id="confirm_password"
                            r#type="password"
                            placeholder="••••••••"
                            bind_value=confirm_password
                            required=true
                            class="h-8 text-sm"
                        />
                    </div>

                    <ErrorAlert error=error />

                    <Button class="w-full" size=ButtonSize::Sm attr:disabled=move || loading.get()>
                        <span class="inline-flex items-center gap-2">
                            <Show when=move || loading.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            {move || if loading.get() { "Creating..." } else { "Create account" }}
                        </span>
                    </Button>

                    <div class="pt-1 text-xs text-muted-foreground">
                        "Already have an account? "
                        <a class="text-primary underline underline-offset-4" href="/login">"Log in"</a>
                    </div>
                </form>
            </Show>
        </AuthShell>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("qa", "secret1", "secret1").is_ok());
        assert_eq!(
            validate_registration("  ", "secret1", "secret1").unwrap_err(),
            "Username is required"
        );
        assert!(validate_registration("qa", "abc", "abc")
            .unwrap_err()
            .contains("at least 6"));
        assert_eq!(
            validate_registration("qa", "secret1", "secret2").unwrap_err(),
            "Passwords do not match"
        );
    }
}

//! Sign-in and registration page.

use cybertest_lab_access::{Credentials, SignInController, SignInError, SignInMode};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_query_map;
use std::sync::Arc;

use crate::navigation::use_navigator;
use crate::runtime::{RuntimeStatus, use_access_runtime};

const CONNECTING_MESSAGE: &str = "Connecting to the authentication service. Please try again.";

/// Sign-in page. Lives outside the access gate.
///
/// An `error` query parameter, as set by the callback page, is shown on
/// first render.
#[component]
pub fn AuthPage() -> impl IntoView {
    let query = use_query_map();
    let runtime = use_access_runtime();
    let navigator = use_navigator();

    let (mode, set_mode) = signal(SignInMode::SignIn);
    let (username, set_username) = signal(String::new());
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (error, set_error) = signal(query.with_untracked(|params| params.get("error")));
    let (busy, set_busy) = signal(false);

    let controller = RwSignal::new(None::<Arc<SignInController>>);
    Effect::new(move || {
        if let RuntimeStatus::Ready(access) = runtime.get() {
            controller.set(Some(Arc::new(SignInController::new(
                access.provider(),
                access.policy().clone(),
                navigator.clone(),
            ))));
        }
    });

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let Some(controller) = controller.get_untracked() else {
            let message = runtime.with_untracked(|status| match status {
                RuntimeStatus::Unavailable(message) => message.clone(),
                RuntimeStatus::Connecting | RuntimeStatus::Ready(_) => {
                    CONNECTING_MESSAGE.to_string()
                }
            });
            set_error.set(Some(message));
            return;
        };

        let credentials = Credentials::new(email.get_untracked(), password.get_untracked())
            .with_username(username.get_untracked());
        let mode = mode.get_untracked();
        set_error.set(None);
        set_busy.set(true);

        spawn_local(async move {
            match controller.submit(mode, &credentials).await {
                Ok(outcome) => {
                    tracing::debug!(outcome = ?outcome, "sign-in form submitted");
                }
                Err(report) => match report.current_context() {
                    SignInError::AlreadyInFlight => {}
                    err => {
                        set_error.try_set(Some(err.to_string()));
                    }
                },
            }
            set_busy.try_set(false);
        });
    };

    let is_register = move || mode.get() == SignInMode::Register;

    view! {
        <div class="centered-page auth-page">
            <div class="auth-column">
                <div class="panel-header">
                    <h1>"CyberTest Lab"</h1>
                    <p>"Private Security Testing Environment"</p>
                </div>

                <div class="panel">
                    <h2>{move || if is_register() { "Register" } else { "Sign In" }}</h2>

                    <div class="notice notice-danger">
                        <h3>"Restricted Access"</h3>
                        <p>"Only authorized email addresses can access this private testing environment."</p>
                    </div>

                    {move || error.get().map(|message| view! {
                        <div class="form-error" role="alert">{message}</div>
                    })}

                    <form class="auth-form" on:submit=on_submit>
                        {move || is_register().then(|| view! {
                            <div class="form-group">
                                <label>"Username"</label>
                                <input
                                    type="text"
                                    placeholder="Choose a username"
                                    prop:value=move || username.get()
                                    on:input=move |ev| set_username.set(event_target_value(&ev))
                                />
                            </div>
                        })}

                        <div class="form-group">
                            <label>"Email"</label>
                            <input
                                type="email"
                                required
                                placeholder="Enter your authorized email"
                                prop:value=move || email.get()
                                on:input=move |ev| set_email.set(event_target_value(&ev))
                            />
                        </div>

                        <div class="form-group">
                            <label>"Password"</label>
                            <input
                                type="password"
                                required
                                prop:value=move || password.get()
                                on:input=move |ev| set_password.set(event_target_value(&ev))
                            />
                        </div>

                        <button type="submit" class="primary-button" disabled=move || busy.get()>
                            {move || {
                                if busy.get() {
                                    "Processing..."
                                } else if is_register() {
                                    "Register"
                                } else {
                                    "Sign In"
                                }
                            }}
                        </button>
                    </form>

                    <div class="mode-toggle">
                        <button
                            type="button"
                            class="link-button"
                            on:click=move |_| {
                                set_mode.update(|mode| *mode = mode.toggled());
                                set_error.set(None);
                            }
                        >
                            {move || {
                                if is_register() {
                                    "Already have an account? Sign In"
                                } else {
                                    "Need an account? Register"
                                }
                            }}
                        </button>
                    </div>
                </div>

                <div class="notice notice-warning">
                    <h3>"Important Disclaimer"</h3>
                    <ul>
                        <li>"This is a private security testing laboratory for personal educational use"</li>
                        <li>"Contains intentional security vulnerabilities for learning purposes"</li>
                        <li>"Access is restricted to authorized users only"</li>
                        <li>"Unauthorized access or use is strictly prohibited"</li>
                    </ul>
                </div>
            </div>
        </div>
    }
}

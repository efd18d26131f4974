//! Access gate wrapped around every lab page.
//!
//! Once the runtime has settled, the gate builds one [`AccessGuard`] over a
//! fresh [`SessionStore`] and keeps both for as long as it is mounted. It
//! renders exactly one of four surfaces and never polls: the guard pushes
//! re-evaluated states into a signal. Equal states are deduplicated by the
//! memo, so a token refresh for the same identity does not re-render the
//! lab.

use cybertest_lab_access::{AccessGuard, AccessState, Route, SessionStore};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::Arc;

use crate::components::SignOutButton;
use crate::runtime::{AccessRuntime, RuntimeStatus, use_access_runtime};

/// Renders `children` only for an authorized identity.
#[component]
pub fn AccessGate(children: ChildrenFn) -> impl IntoView {
    let runtime = use_access_runtime();

    view! {
        <div class="access-gate">
            {move || match runtime.get() {
                RuntimeStatus::Connecting => view! { <LoadingPanel/> }.into_any(),
                RuntimeStatus::Ready(access) => guarded(Ok(access), children.clone()).into_any(),
                RuntimeStatus::Unavailable(reason) => {
                    guarded(Err(reason), children.clone()).into_any()
                }
            }}
        </div>
    }
}

/// Mounts a guard and renders whatever it decides.
///
/// Without a provider the store is resolved to "no session" straight away.
fn guarded(access: Result<AccessRuntime, String>, children: ChildrenFn) -> impl IntoView {
    let store = SessionStore::new();
    let policy = access
        .as_ref()
        .map(|access| access.policy().clone())
        .unwrap_or_default();
    let guard = AccessGuard::new(store.clone(), policy);

    let latest = RwSignal::new(guard.current());
    let watch = guard.watch(Arc::new(move |next: &AccessState| {
        latest.try_set(next.clone());
    }));
    let state = Memo::new(move |_| latest.get());

    match access {
        Ok(access) => {
            let store = store.clone();
            spawn_local(async move { store.start(access.provider()).await });
        }
        Err(reason) => store.resolve_unavailable(&reason),
    }

    on_cleanup(move || {
        watch.unsubscribe();
        guard.store().dispose();
    });

    move || access_surface(state.get(), store.clone(), children.clone())
}

/// Picks the surface for one access state.
///
/// Protected `children` are only built for [`AccessState::Authorized`], so
/// any other state drops them.
fn access_surface(state: AccessState, store: SessionStore, children: ChildrenFn) -> AnyView {
    match state {
        AccessState::Loading => view! { <LoadingPanel/> }.into_any(),
        AccessState::Unauthenticated => view! { <SignInPrompt/> }.into_any(),
        AccessState::Unauthorized(identity) => view! {
            <AccessDeniedPanel email=identity.email().to_string() store=store/>
        }.into_any(),
        AccessState::Authorized(identity) => view! {
            <div class="identity-bar">
                <div class="identity">
                    <span>"Welcome, " {identity.email().to_string()}</span>
                    <span class="separator">"|"</span>
                    <span class="muted">"Private Testing Environment"</span>
                </div>
                <SignOutButton store=store label="Logout" button_class="logout-button"/>
            </div>
            {children()}
        }.into_any(),
    }
}

/// Neutral progress indicator shown until the session is resolved.
#[component]
fn LoadingPanel() -> impl IntoView {
    view! {
        <div class="centered-page">
            <div class="loading" role="status">
                <div class="spinner"></div>
                <p>"Loading..."</p>
            </div>
        </div>
    }
}

/// Inline prompt for visitors without a session.
#[component]
fn SignInPrompt() -> impl IntoView {
    view! {
        <div class="centered-page">
            <div class="panel">
                <div class="panel-header">
                    <h1>"CyberTest Lab"</h1>
                    <p>"Private Security Testing Environment"</p>
                </div>
                <div class="notice notice-danger">
                    <h3>"Access Restricted"</h3>
                    <p>
                        "This is a private security testing environment. "
                        "Access is restricted to authorized users only."
                    </p>
                </div>
                <div class="notice notice-warning">
                    <h3>"Disclaimer"</h3>
                    <p>
                        "This application contains intentional security vulnerabilities for educational purposes. "
                        "It is designed for personal use by the owner only. Unauthorized access or use is prohibited."
                    </p>
                </div>
                <a href=Route::SignIn.path() class="primary-button">"Sign In"</a>
            </div>
        </div>
    }
}

/// Shown to a signed-in identity that is not on the allow-list.
#[component]
fn AccessDeniedPanel(email: String, store: SessionStore) -> impl IntoView {
    view! {
        <div class="centered-page">
            <div class="panel">
                <div class="panel-header">
                    <h1 class="danger">"Access Denied"</h1>
                </div>
                <div class="notice notice-danger">
                    <h3>"Unauthorized Email"</h3>
                    <p>
                        "Your email address (" {email}
                        ") is not authorized to access this private testing environment."
                    </p>
                </div>
                <div class="notice">
                    <h3>"About This Application"</h3>
                    <p>
                        "This is a private security testing laboratory designed for personal educational use. "
                        "The application contains intentional vulnerabilities and is not intended for public access."
                    </p>
                </div>
                <SignOutButton store=store button_class="danger-button"/>
            </div>
        </div>
    }
}

//! Landing page for the provider's out-of-band redirects.

use cybertest_lab_access::CallbackResolver;
use cybertest_lab_access::navigation::sign_in_with_error;
use cybertest_lab_access::{Navigator, Redirect};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_location;
use std::sync::Arc;

use crate::navigation::use_navigator;
use crate::runtime::{RuntimeStatus, use_access_runtime};

/// Reads the URL fragment once the provider client is ready and leaves the
/// page with history replaced, so back-navigation never returns here.
#[component]
pub fn CallbackPage() -> impl IntoView {
    let location = use_location();
    let runtime = use_access_runtime();
    let navigator = use_navigator();
    let resolver = RwSignal::new(None::<Arc<CallbackResolver>>);

    Effect::new(move || {
        if resolver.with_untracked(Option::is_some) {
            return;
        }
        match runtime.get() {
            RuntimeStatus::Connecting => {}
            RuntimeStatus::Ready(access) => {
                let active = Arc::new(CallbackResolver::new(access.provider(), navigator.clone()));
                resolver.set(Some(Arc::clone(&active)));
                let fragment = location.hash.get_untracked();
                spawn_local(async move {
                    let outcome = active.resolve(&fragment).await;
                    tracing::debug!(outcome = ?outcome, "callback finished");
                });
            }
            RuntimeStatus::Unavailable(message) => {
                navigator.navigate(Redirect::replace(sign_in_with_error(&message)));
            }
        }
    });

    on_cleanup(move || {
        if let Some(active) = resolver.try_get_untracked().flatten() {
            active.cancel();
        }
    });

    view! {
        <div class="centered-page">
            <div class="loading" role="status">
                <div class="spinner"></div>
                <p>"Processing authentication..."</p>
            </div>
        </div>
    }
}

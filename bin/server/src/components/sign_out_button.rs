//! Sign-out control used by the identity bar and the access-denied panel.

use cybertest_lab_access::{SessionStore, SignOutController, SignOutStatus};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::Arc;

use crate::navigation::use_navigator;
use crate::runtime::use_access_runtime;

/// Button that signs out through the provider.
///
/// Shows busy while the request is in flight and a dismissible message if
/// it fails. The session is only touched on success.
#[component]
pub fn SignOutButton(
    store: SessionStore,
    #[prop(default = "Sign Out")] label: &'static str,
    #[prop(default = "sign-out-button")] button_class: &'static str,
) -> impl IntoView {
    let status = RwSignal::new(SignOutStatus::Idle);
    let navigator = use_navigator();
    let controller = use_access_runtime().with_untracked(|runtime| {
        runtime.runtime().map(|runtime| {
            Arc::new(
                SignOutController::new(runtime.provider(), store.clone(), navigator.clone())
                    .with_observer(Arc::new(move |next: &SignOutStatus| {
                        status.try_set(next.clone());
                    })),
            )
        })
    });

    let busy = move || status.get() == SignOutStatus::InFlight;
    let unavailable = controller.is_none();

    let on_sign_out = {
        let controller = controller.clone();
        move |_| {
            let Some(controller) = controller.clone() else {
                return;
            };
            spawn_local(async move {
                if let Err(report) = controller.sign_out().await {
                    tracing::debug!(error = %report.current_context(), "sign-out not completed");
                }
            });
        }
    };

    view! {
        <span class="sign-out">
            <button
                type="button"
                class=button_class
                disabled=move || unavailable || busy()
                on:click=on_sign_out
            >
                {move || if busy() { "Signing out..." } else { label }}
            </button>
            {move || match status.get() {
                SignOutStatus::Failed(message) => {
                    let controller = controller.clone();
                    view! {
                        <span class="sign-out-error" role="alert">
                            {message}
                            <button
                                type="button"
                                class="dismiss"
                                on:click=move |_| {
                                    if let Some(controller) = &controller {
                                        controller.dismiss_error();
                                    }
                                }
                            >"Dismiss"</button>
                        </span>
                    }.into_any()
                }
                SignOutStatus::Idle | SignOutStatus::InFlight => view! { <span></span> }.into_any(),
            }}
        </span>
    }
}

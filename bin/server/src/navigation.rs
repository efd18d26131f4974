//! Router-backed navigation for the access controllers.
//!
//! Controllers in the access crate navigate through the [`Navigator`] trait
//! and may do so from inside a spawned future. Requests are parked in a
//! signal and performed by an effect that lives inside the `<Router>`, where
//! `use_navigate` is available.

use cybertest_lab_access::{Navigator, Redirect};
use leptos::prelude::*;
use leptos_router::NavigateOptions;
use leptos_router::hooks::use_navigate;
use std::sync::Arc;

/// [`Navigator`] that hands redirects to the Leptos router.
#[derive(Debug, Clone, Copy)]
pub struct RouterNavigator {
    pending: RwSignal<Option<Redirect>>,
}

#[cfg(test)]
impl RouterNavigator {
    /// A navigator with no router behind it. Requests are parked and dropped.
    pub(crate) fn unrouted() -> Self {
        Self {
            pending: RwSignal::new(None),
        }
    }
}

impl Navigator for RouterNavigator {
    fn navigate(&self, redirect: Redirect) {
        if self.pending.try_set(Some(redirect)).is_some() {
            tracing::debug!("navigation requested after the router was torn down");
        }
    }
}

/// Installs the navigator for the current router and makes it available to
/// descendants. Must be called inside `<Router>`.
pub fn provide_router_navigator() -> RouterNavigator {
    let pending = RwSignal::new(None::<Redirect>);
    let navigate = use_navigate();

    Effect::new(move || {
        let Some(redirect) = pending.get() else {
            return;
        };
        pending.set(None);
        navigate(
            redirect.to(),
            NavigateOptions {
                replace: redirect.replaces_history(),
                ..Default::default()
            },
        );
    });

    let navigator = RouterNavigator { pending };
    provide_context(navigator);
    navigator
}

/// Returns the router navigator as a trait object for the controllers.
pub fn use_navigator() -> Arc<dyn Navigator> {
    Arc::new(expect_context::<RouterNavigator>())
}

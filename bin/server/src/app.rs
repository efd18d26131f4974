//! Main Leptos application component and routing.
//!
//! `/auth` and `/auth/callback` sit outside the access gate; every other
//! route renders inside it, wrapped in the lab shell.

use leptos::prelude::*;
use leptos_meta::{Title, provide_meta_context};
use leptos_router::{
    components::{Route, Router, Routes},
    path,
};

use crate::components::AccessGate;
use crate::navigation::provide_router_navigator;
use crate::pages::{AuthPage, CallbackPage, HomePage};
use crate::runtime::provide_access_runtime;

/// The main application component.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();
    provide_access_runtime();

    view! {
        <Title text="CyberTest Lab"/>
        <Router>
            <AppRoutes/>
        </Router>
    }
}

/// Routes, plus the navigator that needs the router in scope.
#[component]
fn AppRoutes() -> impl IntoView {
    provide_router_navigator();

    view! {
        <Routes fallback=|| "Page not found.".into_view()>
            <Route path=path!("/auth") view=AuthPage/>
            <Route path=path!("/auth/callback") view=CallbackPage/>
            <Route path=path!("/") view=|| view! { <LabPage><HomePage/></LabPage> }/>
        </Routes>
    }
}

/// Gated page with the lab header, warning banner and footer.
#[component]
fn LabPage(children: ChildrenFn) -> impl IntoView {
    view! {
        <AccessGate>
            <div class="lab">
                <Header/>
                <main class="container">
                    <WarningBanner/>
                    {children()}
                </main>
                <Footer/>
            </div>
        </AccessGate>
    }
}

/// Header component with the lab title.
#[component]
fn Header() -> impl IntoView {
    view! {
        <header class="header">
            <div class="header-left">
                <a href="/" class="logo">
                    <span class="logo-title">"CyberTest Lab"</span>
                    <span class="logo-subtitle">"Private Security Testing Environment"</span>
                </a>
            </div>
            <div class="header-right">
                <span class="personal-use">"Personal Use Only"</span>
            </div>
        </header>
    }
}

#[component]
fn WarningBanner() -> impl IntoView {
    view! {
        <div class="warning-banner">
            <p class="warning-title">"Private Security Testing Laboratory"</p>
            <p>
                "This is a controlled environment for learning about web security vulnerabilities. "
                "This application is for personal educational use only and contains intentional security flaws."
            </p>
        </div>
    }
}

#[component]
fn Footer() -> impl IntoView {
    view! {
        <footer class="footer">
            <p class="footer-title">"Private Testing Environment"</p>
            <p>"This application is designed for personal educational use only."</p>
            <p>"Contains intentional security vulnerabilities for learning purposes."</p>
            <p>"Unauthorized access or use is prohibited."</p>
        </footer>
    }
}

//! Home page component.

use leptos::prelude::*;

/// Lab exercises listed on the home page.
const EXERCISES: [(&str, &str); 4] = [
    (
        "Reflected XSS",
        "Test for reflected Cross-Site Scripting vulnerabilities",
    ),
    (
        "Stored XSS",
        "Test for stored/persistent Cross-Site Scripting attacks",
    ),
    (
        "DOM-based XSS",
        "Test for DOM-based Cross-Site Scripting vulnerabilities",
    ),
    (
        "SQL Injection",
        "Test SQL injection through a vulnerable comments system",
    ),
];

/// The home page component. Rendered only inside the access gate.
#[component]
pub fn HomePage() -> impl IntoView {
    view! {
        <div class="home-page">
            <div class="exercise-grid">
                {EXERCISES
                    .iter()
                    .map(|(title, description)| view! { <ExerciseCard title=*title description=*description/> })
                    .collect_view()}
            </div>
        </div>
    }
}

#[component]
fn ExerciseCard(title: &'static str, description: &'static str) -> impl IntoView {
    view! {
        <div class="exercise-card">
            <h3>{title}</h3>
            <p>{description}</p>
            <div class="card-action">"Test Vulnerability"</div>
        </div>
    }
}

//! Page components for the application.
//!
//! Each page is a Leptos component that renders a specific route.

pub mod auth;
pub mod callback;
pub mod home;

// Re-export all page components for convenient access
pub use auth::AuthPage;
pub use callback::CallbackPage;
pub use home::HomePage;

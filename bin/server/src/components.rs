//! Reusable access-control components.

pub mod access_gate;
pub mod sign_out_button;

pub use access_gate::AccessGate;
pub use sign_out_button::SignOutButton;

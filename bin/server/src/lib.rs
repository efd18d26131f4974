//! CyberTest Lab web server and UI.
//!
//! This crate provides the Leptos-based web interface for the private
//! security testing lab: the access gate wrapped around every lab page, the
//! sign-in page and the provider callback page. The access decision itself
//! lives in `cybertest-lab-access`; this crate wires it to the router and
//! the browser.

#![allow(non_snake_case)]

pub mod app;
pub mod components;
pub mod error;
pub mod navigation;
pub mod pages;
pub mod runtime;

#[cfg(feature = "ssr")]
pub mod config;

#[cfg(feature = "hydrate")]
mod client;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::App;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}

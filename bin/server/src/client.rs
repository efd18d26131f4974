//! Browser-only glue: `localStorage` persistence and cross-tab sync.

use cybertest_lab_access::persistence::{decode_session, encode_session};
use cybertest_lab_access::{GoTrueClient, ProviderError, Session, SessionPersistence};
use rootcause::prelude::Report;
use std::sync::Arc;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;

/// Session persistence backed by the browser's `localStorage`.
///
/// The storage handle is looked up on every call so the type stays
/// `Send + Sync`.
#[derive(Debug, Clone)]
pub struct LocalStoragePersistence {
    key: String,
}

impl LocalStoragePersistence {
    /// Creates persistence for one storage key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

fn local_storage() -> Result<web_sys::Storage, ProviderError> {
    web_sys::window()
        .and_then(|window| window.local_storage().ok().flatten())
        .ok_or_else(|| ProviderError::Storage {
            reason: "localStorage is unavailable".to_string(),
        })
}

fn storage_error(value: &JsValue) -> ProviderError {
    ProviderError::Storage {
        reason: format!("{value:?}"),
    }
}

impl SessionPersistence for LocalStoragePersistence {
    fn load(&self) -> Result<Option<Session>, Report<ProviderError>> {
        let raw = local_storage()?
            .get_item(&self.key)
            .map_err(|e| storage_error(&e))?;
        raw.as_deref().map(decode_session).transpose()
    }

    fn store(&self, session: &Session) -> Result<(), Report<ProviderError>> {
        let raw = encode_session(session)?;
        local_storage()?
            .set_item(&self.key, &raw)
            .map_err(|e| storage_error(&e))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), Report<ProviderError>> {
        local_storage()?
            .remove_item(&self.key)
            .map_err(|e| storage_error(&e))?;
        Ok(())
    }
}

/// Re-reads the persisted session whenever another tab changes it.
///
/// The browser only fires `storage` events for writes made by other
/// documents, so this never echoes the client's own writes.
pub fn watch_other_tabs(client: &Arc<GoTrueClient>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let key = client.config().storage_key().to_string();
    let client = Arc::downgrade(client);

    let on_storage = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
        move |event: web_sys::StorageEvent| {
            // No key means the other tab cleared all of storage.
            if event.key().is_some_and(|changed| changed != key) {
                return;
            }
            if let Some(client) = client.upgrade() {
                client.sync_from_storage();
            }
        },
    );

    if let Err(e) =
        window.add_event_listener_with_callback("storage", on_storage.as_ref().unchecked_ref())
    {
        tracing::warn!(error = ?e, "could not watch session storage");
        return;
    }
    // Lives as long as the page.
    on_storage.forget();
}

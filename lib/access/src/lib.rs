//! Session-gated access control for CyberTest Lab.
//!
//! This crate decides whether the person in front of the browser may use the
//! lab at all. It tracks the provider's session, checks the identity against
//! a fixed allow-list, and reduces the three asynchronous inputs (initial
//! lookup, session events, explicit sign-out) to one of four access states.
//!
//! # Components
//!
//! - [`SessionStore`]: the only writer of the cached session
//! - [`AccessPolicy`]: exact-match allow-list decision
//! - [`AccessGuard`]: store plus policy, projected to an [`AccessState`]
//! - [`CallbackResolver`]: finishes out-of-band session handoffs
//! - [`SignOutController`] and [`SignInController`]: the two user actions
//! - [`GoTrueClient`]: the hosted identity provider behind [`IdentityProvider`]
//!
//! Authorization here is advisory. It gates what the client renders and
//! protects nothing on the server.

pub mod callback;
pub mod config;
pub mod error;
pub mod gotrue;
pub mod guard;
pub mod identity;
pub mod navigation;
pub mod persistence;
pub mod policy;
pub mod provider;
pub mod session;
pub mod signin;
pub mod signout;
pub mod state;
pub mod store;
mod sync;

#[cfg(test)]
mod testing;

pub use callback::{CallbackOutcome, CallbackResolver, CallbackTokens};
pub use config::{AccessConfig, ProviderConfig};
pub use error::{ConfigError, ProviderError, SignInError, SignOutError};
pub use gotrue::GoTrueClient;
pub use guard::{AccessGuard, AccessState};
pub use identity::Identity;
pub use navigation::{HistoryMode, Navigator, Redirect, Route};
pub use persistence::{MemoryPersistence, SessionPersistence};
pub use policy::{AccessPolicy, AllowList};
pub use provider::{IdentityProvider, SessionBroadcast, SessionCallback, Subscription};
pub use session::{Session, SessionEvent};
pub use signin::{Credentials, SignInController, SignInMode, SignInOutcome};
pub use signout::{SignOutController, SignOutStatus};
pub use state::{SessionSlot, SessionSnapshot, SessionUpdate};
pub use store::SessionStore;

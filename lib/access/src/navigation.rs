//! Routes and the navigation seam.
//!
//! Controllers never touch the router directly. They hand a [`Redirect`] to
//! a [`Navigator`], which the UI layer implements on top of its router and
//! tests implement on top of an in-memory history.

/// The entry points the access-control subsystem navigates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Default (protected) entry point.
    Home,
    /// Sign-in and registration form.
    SignIn,
    /// Landing route for out-of-band session handoffs.
    Callback,
}

impl Route {
    /// Returns the route's path.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::SignIn => "/auth",
            Self::Callback => "/auth/callback",
        }
    }
}

/// Builds the sign-in URL carrying an error for display.
#[must_use]
pub fn sign_in_with_error(message: &str) -> String {
    format!(
        "{}?error={}",
        Route::SignIn.path(),
        urlencoding::encode(message)
    )
}

/// How a navigation affects the history stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Add a new entry.
    Push,
    /// Overwrite the current entry, so back-navigation skips it.
    Replace,
}

/// A navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    to: String,
    history: HistoryMode,
}

impl Redirect {
    /// Navigates to `to`, adding a history entry.
    #[must_use]
    pub fn push(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            history: HistoryMode::Push,
        }
    }

    /// Navigates to `to`, replacing the current history entry.
    #[must_use]
    pub fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            history: HistoryMode::Replace,
        }
    }

    /// Returns the target URL.
    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Returns the history mode.
    #[must_use]
    pub fn history(&self) -> HistoryMode {
        self.history
    }

    /// Returns true if the current history entry is overwritten.
    #[must_use]
    pub fn replaces_history(&self) -> bool {
        self.history == HistoryMode::Replace
    }
}

/// Performs navigation on behalf of controllers.
pub trait Navigator: Send + Sync {
    /// Navigates according to `redirect`.
    fn navigate(&self, redirect: Redirect);
}

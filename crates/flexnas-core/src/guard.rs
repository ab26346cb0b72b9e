//! Navigation guard for protected views.

use std::sync::Arc;

use tracing::debug;

use crate::auth::{SessionStore, LOGIN_PATH};

/// Outcome of a navigation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(&'static str),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// Lets anonymous users reach only the login view.
#[derive(Clone)]
pub struct RouteGuard {
    session: Arc<SessionStore>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    pub fn check(&self, target: &str) -> Access {
        let access = if target == LOGIN_PATH || self.session.is_authenticated() {
            Access::Allow
        } else {
            Access::Redirect(LOGIN_PATH)
        };
        debug!(view = target, ?access, "Route guard decision");
        access
    }
}

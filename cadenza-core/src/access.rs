//! Access control gate: who may mutate the playlist right now.

use std::sync::Arc;
use std::time::Duration;

use cadenza_types::{AccessPermission, AccessToken};

use crate::library::Library;

/// Read-only view over the library's permission table and throttle window.
///
/// Nothing here is cached; every call asks the library, so a promotion or
/// demotion takes effect on the next check.
#[derive(Clone)]
pub struct AccessControlGate {
    library: Arc<dyn Library>,
}

impl AccessControlGate {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self { library }
    }

    pub fn permission_for(&self, token: &AccessToken) -> AccessPermission {
        self.library.permission_for(token)
    }

    pub fn remaining_throttle(&self) -> Duration {
        self.library.remaining_throttle()
    }

    /// True while the throttle window is open. Applies to admins as well.
    pub fn is_throttled(&self) -> bool {
        !self.remaining_throttle().is_zero()
    }
}

// lib/src/session.rs

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{TimeZone, Utc};
use models::{Department, Role, StaffProfile, StaffUser};

/// Uid recorded as the actor of writes made by the system itself.
pub const SYSTEM_UID: &str = "SYSTEM_AUTO_BILL";

/// The acting user of one request or CLI invocation.
///
/// Services take the session explicitly instead of reading any global
/// "current user" state.
#[derive(Debug)]
pub struct SessionContext {
    pub user: StaffUser,
    welcome_shown: AtomicBool,
}

impl SessionContext {
    pub fn new(user: StaffUser) -> Self {
        SessionContext { user, welcome_shown: AtomicBool::new(false) }
    }

    /// Session used by scheduled jobs and the operator CLI.
    pub fn system() -> Self {
        Self::new(StaffUser {
            uid: SYSTEM_UID.to_string(),
            email: "system@localhost".to_string(),
            display_name: "System".to_string(),
            department: Department::Administration,
            profile: StaffProfile::General { role: Role::Admin },
            active: true,
            created_at: Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now),
        })
    }

    pub fn uid(&self) -> &str {
        &self.user.uid
    }

    pub fn role(&self) -> Role {
        self.user.role()
    }

    /// Returns `true` only the first time it is called for this session.
    pub fn mark_welcome_shown(&self) -> bool {
        !self.welcome_shown.swap(true, Ordering::SeqCst)
    }
}

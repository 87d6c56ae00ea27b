use std::time::Duration;

/// Tuning knobs for the synchronization engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of recent messages requested by the very first poll. Seeds the
    /// high watermark as `-(initial_backlog)`.
    pub initial_backlog: u32,
    /// Default page size for `load_older` when the caller passes 0.
    pub page_size: u32,
    /// Cadence of poll-lane tick attempts.
    pub poll_interval: Duration,
    /// Client-side deadline for one long-poll request. The server is
    /// expected to hold the request open until new data arrives or its own
    /// timeout elapses, so this stays generous.
    pub poll_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_backlog: 50,
            page_size: 20,
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(420),
        }
    }
}

/// The local user, for remote-deletion authorization.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub username: Option<String>,
    /// Admins may request server-side deletion of anyone's message. The
    /// server still gets the final say.
    pub admin: bool,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            admin: false,
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Whether this identity may even attempt a server-side deletion of the
    /// given message. Local copies may always be deleted.
    pub fn may_delete_remote(&self, id: crate::model::MessageId, author: Option<&str>) -> bool {
        if id <= 0 {
            return false;
        }
        if self.admin {
            return true;
        }
        match (self.username.as_deref(), author) {
            (Some(me), Some(author)) => me == author,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expected_tuning() {
        let config = SyncConfig::default();
        assert_eq!(config.initial_backlog, 50);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn own_messages_are_remotely_deletable() {
        let identity = Identity::new("drh");
        assert!(identity.may_delete_remote(10, Some("drh")));
        assert!(!identity.may_delete_remote(10, Some("stephan")));
        assert!(!identity.may_delete_remote(10, None));
    }

    #[test]
    fn admin_may_delete_any_positive_id() {
        let identity = Identity::new("admin").with_admin(true);
        assert!(identity.may_delete_remote(10, Some("stephan")));
        // Local notices have negative ids and never reach the server.
        assert!(!identity.may_delete_remote(-1, None));
        assert!(!identity.may_delete_remote(0, Some("admin")));
    }
}

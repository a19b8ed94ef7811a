use crate::error::SessionError;

/// Immutable identity of one negotiation session: who we are, who we talk
/// to, and the signaling topic both sides independently derive.
///
/// The topic is keyed by the local participant's name; the relay routes
/// messages pushed on it by their `target` field, so no coordination is
/// needed between the peers to agree on topic names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    local_name: String,
    remote_name: String,
    topic: String,
}

impl Session {
    /// Builds the session identity, rejecting empty names.
    pub fn new(local_name: &str, remote_name: &str) -> Result<Self, SessionError> {
        if local_name.is_empty() || remote_name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        Ok(Self {
            local_name: local_name.to_owned(),
            remote_name: remote_name.to_owned(),
            topic: handshake_topic(local_name),
        })
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Application-level cross-talk filter: only messages from the expected
    /// remote participant are acted upon.
    pub fn accepts_sender(&self, from: &str) -> bool {
        from == self.remote_name
    }
}

pub fn handshake_topic(local_name: &str) -> String {
    format!("handshake:{}", local_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_topic_from_local_name() {
        let session = Session::new("alice", "bob").unwrap();
        assert_eq!(session.topic(), "handshake:alice");
        assert_eq!(session.local_name(), "alice");
        assert_eq!(session.remote_name(), "bob");
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(
            Session::new("", "bob"),
            Err(SessionError::EmptyName)
        ));
        assert!(matches!(
            Session::new("alice", ""),
            Err(SessionError::EmptyName)
        ));
    }

    #[test]
    fn filters_foreign_senders() {
        let session = Session::new("alice", "bob").unwrap();
        assert!(session.accepts_sender("bob"));
        assert!(!session.accepts_sender("mallory"));
        assert!(!session.accepts_sender("alice"));
    }
}

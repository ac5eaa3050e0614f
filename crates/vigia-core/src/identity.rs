use std::sync::{Arc, OnceLock};

/// Stable per-client random identifier used to key presence rows.
///
/// The token is generated lazily on first access and is identical for the
/// life of this handle; clones share it. Distinct handles never collide.
/// The token has no meaning beyond being a presence-row key; the server
/// never destroys it explicitly, the staleness sweep reclaims the row.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    token: Arc<OnceLock<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> &str {
        self.token
            .get_or_init(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_calls() {
        let identity = SessionIdentity::new();
        let first = identity.id().to_string();
        assert_eq!(identity.id(), first);
    }

    #[test]
    fn clones_share_the_token() {
        let identity = SessionIdentity::new();
        let clone = identity.clone();
        assert_eq!(identity.id(), clone.id());
    }

    #[test]
    fn distinct_handles_get_distinct_tokens() {
        let a = SessionIdentity::new();
        let b = SessionIdentity::new();
        assert_ne!(a.id(), b.id());
    }
}

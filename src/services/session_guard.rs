use std::time::{Duration, SystemTime};

use tracing::info;

use crate::{dao::models::PlayerEntity, error::ServiceError};

/// Best-effort single-device lock based on the heartbeat age.
///
/// Only consulted when a player registers or logs in; sessions already
/// attached are never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGuard {
    threshold: Duration,
}

impl SessionGuard {
    /// Guard rejecting heartbeats younger than `threshold`.
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Admit `player` unless another device reported in recently.
    pub fn admit(&self, player: &PlayerEntity, now: SystemTime) -> Result<(), ServiceError> {
        let Some(last_seen) = player.last_seen_at else {
            return Ok(());
        };

        // A heartbeat from the future (clock skew) counts as fresh.
        let age = now.duration_since(last_seen).unwrap_or(Duration::ZERO);
        if age < self.threshold {
            info!(
                player_id = %player.id,
                age_ms = age.as_millis() as u64,
                "login rejected: player active on another device"
            );
            return Err(ServiceError::ActiveElsewhere {
                player_id: player.id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn seen(at: Option<SystemTime>) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            display_name: "ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            full_name: None,
            score: 0,
            last_seen_at: at,
            registered_at: SystemTime::UNIX_EPOCH,
            registration_seq: 0,
            version: 1,
        }
    }

    #[test]
    fn recent_heartbeat_is_rejected() {
        let guard = SessionGuard::new(Duration::from_secs(20));
        let now = SystemTime::now();
        let err = guard
            .admit(&seen(Some(now - Duration::from_secs(5))), now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::ActiveElsewhere { .. }));
    }

    #[test]
    fn stale_or_missing_heartbeat_is_admitted() {
        let guard = SessionGuard::new(Duration::from_secs(20));
        let now = SystemTime::now();
        assert!(guard.admit(&seen(Some(now - Duration::from_secs(25))), now).is_ok());
        assert!(guard.admit(&seen(None), now).is_ok());
    }

    #[test]
    fn future_heartbeat_counts_as_fresh() {
        let guard = SessionGuard::new(Duration::from_secs(20));
        let now = SystemTime::now();
        assert!(guard.admit(&seen(Some(now + Duration::from_secs(3))), now).is_err());
    }
}

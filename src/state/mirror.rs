use crate::{
    dao::models::{GameSettingsEntity, SettingsChange, Version, Versioned},
    state::{
        game::{Position, Signal},
        phase::Phase,
    },
};

/// What a merge changed in the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorUpdate {
    /// Phase after a newer phase write was accepted, even if its value is unchanged.
    pub phase: Option<Phase>,
    /// Whether the signal was replaced.
    pub signal: bool,
    /// Whether the target position was replaced.
    pub position: bool,
    /// Whether the tick interval was replaced.
    pub tick_interval: bool,
}

impl MirrorUpdate {
    /// Whether anything was accepted.
    pub fn is_empty(&self) -> bool {
        self.phase.is_none() && !self.signal && !self.position && !self.tick_interval
    }
}

/// Client-side copy of the settings singleton.
///
/// Each field is merged independently and only replaced by a strictly newer
/// version, so out-of-order or duplicated notifications never move a field
/// backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsMirror {
    phase: Versioned<Phase>,
    signal: Versioned<Signal>,
    position: Versioned<Position>,
    tick_interval_ms: Versioned<Option<u64>>,
}

impl Default for SettingsMirror {
    fn default() -> Self {
        Self::from_entity(&GameSettingsEntity::default())
    }
}

impl SettingsMirror {
    /// Mirror seeded from a full read.
    pub fn from_entity(entity: &GameSettingsEntity) -> Self {
        Self {
            phase: entity.phase,
            signal: entity.signal,
            position: entity.position,
            tick_interval_ms: entity.tick_interval_ms,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase.value
    }

    /// Current signal.
    pub fn signal(&self) -> Signal {
        self.signal.value
    }

    /// Current target position.
    pub fn position(&self) -> Position {
        self.position.value
    }

    /// Merge a partial change notification.
    pub fn merge(&mut self, change: &SettingsChange) -> MirrorUpdate {
        let patch = &change.patch;
        let version = change.version;
        MirrorUpdate {
            phase: patch
                .phase
                .filter(|phase| accept(&mut self.phase, *phase, version))
                .map(|_| self.phase.value),
            signal: patch
                .signal
                .is_some_and(|signal| accept(&mut self.signal, signal, version)),
            position: patch
                .position
                .is_some_and(|position| accept(&mut self.position, position, version)),
            tick_interval: patch
                .tick_interval_ms
                .is_some_and(|interval| accept(&mut self.tick_interval_ms, interval, version)),
        }
    }

    /// Merge a full re-read, field by field.
    pub fn refresh(&mut self, entity: &GameSettingsEntity) -> MirrorUpdate {
        MirrorUpdate {
            phase: accept(&mut self.phase, entity.phase.value, entity.phase.version)
                .then_some(entity.phase.value),
            signal: accept(&mut self.signal, entity.signal.value, entity.signal.version),
            position: accept(
                &mut self.position,
                entity.position.value,
                entity.position.version,
            ),
            tick_interval: accept(
                &mut self.tick_interval_ms,
                entity.tick_interval_ms.value,
                entity.tick_interval_ms.version,
            ),
        }
    }
}

fn accept<T>(field: &mut Versioned<T>, value: T, version: Version) -> bool {
    if version <= field.version {
        return false;
    }
    *field = Versioned::new(value, version);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::SettingsPatch;

    fn change(version: Version, patch: SettingsPatch) -> SettingsChange {
        SettingsChange { version, patch }
    }

    #[test]
    fn partial_change_leaves_other_fields_alone() {
        let mut mirror = SettingsMirror::default();
        mirror.merge(&change(3, SettingsPatch::phase(Phase::Playing)));

        let update = mirror.merge(&change(
            4,
            SettingsPatch {
                signal: Some(Signal::Active),
                ..SettingsPatch::default()
            },
        ));

        assert_eq!(update.phase, None);
        assert!(update.signal);
        assert_eq!(mirror.phase(), Phase::Playing);
        assert_eq!(mirror.signal(), Signal::Active);
    }

    #[test]
    fn out_of_order_changes_never_regress() {
        let mut mirror = SettingsMirror::default();
        mirror.merge(&change(7, SettingsPatch::phase(Phase::Ended)));
        let update = mirror.merge(&change(6, SettingsPatch::phase(Phase::Playing)));
        assert!(update.is_empty());
        assert_eq!(mirror.phase(), Phase::Ended);

        let duplicate = mirror.merge(&change(7, SettingsPatch::phase(Phase::Ended)));
        assert!(duplicate.is_empty());
    }

    #[test]
    fn newer_write_of_same_phase_counts_as_fresh() {
        let mut mirror = SettingsMirror::default();
        mirror.merge(&change(2, SettingsPatch::phase(Phase::Countdown)));
        let update = mirror.merge(&change(5, SettingsPatch::phase(Phase::Countdown)));
        assert_eq!(update.phase, Some(Phase::Countdown));
    }

    #[test]
    fn refresh_merges_per_field_versions() {
        let mut mirror = SettingsMirror::default();
        mirror.merge(&change(
            9,
            SettingsPatch {
                signal: Some(Signal::Active),
                ..SettingsPatch::default()
            },
        ));

        let mut entity = GameSettingsEntity::default();
        entity.apply(&SettingsPatch::phase(Phase::Playing), 8);
        entity.apply(
            &SettingsPatch {
                signal: Some(Signal::Inactive),
                ..SettingsPatch::default()
            },
            5,
        );

        let update = mirror.refresh(&entity);
        assert_eq!(update.phase, Some(Phase::Playing));
        assert!(!update.signal);
        assert_eq!(mirror.signal(), Signal::Active);
    }
}

//! Application-level configuration loading, including the game tuning knobs.

use std::{env, fs, io::ErrorKind, ops::RangeInclusive, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TAP_ARENA_CONFIG_PATH";
/// Environment variable overriding the public base URL used in join links.
const BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
/// Environment variable holding the Resend API key.
const RESEND_API_KEY_ENV: &str = "RESEND_API_KEY";
/// Environment variable overriding the join-link sender address.
const RESEND_FROM_ENV: &str = "RESEND_FROM";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SENDER: &str = "Game Team <onboarding@resend.dev>";

/// Allowed range for a fixed broadcaster tick interval.
pub const TICK_INTERVAL_BOUNDS: RangeInclusive<Duration> =
    Duration::from_millis(200)..=Duration::from_millis(2000);

/// Knobs driving the broadcaster, the synchronizers and the session guard.
#[derive(Debug, Clone, PartialEq)]
pub struct GameTuning {
    /// Seconds between entering `Countdown` and the automatic switch to `Playing`.
    pub countdown_secs: u8,
    /// Fixed tick interval; `None` draws each interval from `random_tick_range`.
    pub tick_interval: Option<Duration>,
    /// Range of the randomized tick interval.
    pub random_tick_range: RangeInclusive<Duration>,
    /// Probability that a tick draws the active signal.
    pub active_probability: f64,
    /// Half-width of the square the target moves in.
    pub position_bound: f64,
    /// Whether ticks also move the target.
    pub spatial_movement: bool,
    /// Period of the client "last seen" heartbeat.
    pub heartbeat_period: Duration,
    /// Heartbeat age under which a login is rejected as active elsewhere.
    pub presence_threshold: Duration,
    /// Leaderboard rows pushed to players.
    pub player_leaderboard_size: usize,
    /// Leaderboard rows pushed to the live screen.
    pub live_leaderboard_size: usize,
}

impl GameTuning {
    /// Countdown length as a duration.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(u64::from(self.countdown_secs))
    }
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            tick_interval: None,
            random_tick_range: Duration::from_millis(800)..=Duration::from_millis(1800),
            active_probability: 0.4,
            position_bound: 130.0,
            spatial_movement: true,
            heartbeat_period: Duration::from_secs(5),
            presence_threshold: Duration::from_secs(20),
            player_leaderboard_size: 5,
            live_leaderboard_size: 7,
        }
    }
}

/// Settings for the join-link notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Resend API key; the notifier only logs links when absent.
    pub api_key: Option<String>,
    /// Sender address.
    pub from: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from: DEFAULT_SENDER.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Game tuning.
    pub game: GameTuning,
    /// Public URL of the player-facing front end.
    pub base_url: String,
    /// Join-link notifier settings.
    pub notifier: NotifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameTuning::default(),
            base_url: DEFAULT_BASE_URL.into(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded game configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(base_url) = non_empty_env(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        config.notifier.api_key = non_empty_env(RESEND_API_KEY_ENV);
        if let Some(from) = non_empty_env(RESEND_FROM_ENV) {
            config.notifier.from = from;
        }

        config
    }

    /// Link a player follows to join the game screen.
    pub fn join_link(&self, player_id: uuid::Uuid) -> String {
        format!("{}/game?id={player_id}", self.base_url.trim_end_matches('/'))
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    base_url: Option<String>,
    sender: Option<String>,
    countdown_secs: Option<u8>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    tick_interval_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    random_tick_min_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    random_tick_max_ms: Option<Duration>,
    active_probability: Option<f64>,
    position_bound: Option<f64>,
    spatial_movement: Option<bool>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    heartbeat_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    presence_threshold_secs: Option<Duration>,
    player_leaderboard_size: Option<usize>,
    live_leaderboard_size: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = GameTuning::default();

        let tick_interval = raw.tick_interval_ms.and_then(|interval| {
            if TICK_INTERVAL_BOUNDS.contains(&interval) {
                Some(interval)
            } else {
                warn!(
                    interval_ms = interval.as_millis() as u64,
                    "configured tick interval out of range; using randomized ticks"
                );
                None
            }
        });

        let min = raw
            .random_tick_min_ms
            .unwrap_or(*defaults.random_tick_range.start());
        let max = raw
            .random_tick_max_ms
            .unwrap_or(*defaults.random_tick_range.end());
        let random_tick_range = if min <= max && !min.is_zero() {
            min..=max
        } else {
            warn!("invalid random tick range; using defaults");
            defaults.random_tick_range.clone()
        };

        let active_probability = match raw.active_probability {
            Some(p) if (0.0..=1.0).contains(&p) => p,
            Some(p) => {
                warn!(probability = p, "active probability outside [0, 1]; using default");
                defaults.active_probability
            }
            None => defaults.active_probability,
        };

        let game = GameTuning {
            countdown_secs: raw.countdown_secs.unwrap_or(defaults.countdown_secs),
            tick_interval,
            random_tick_range,
            active_probability,
            position_bound: raw
                .position_bound
                .filter(|bound| bound.is_finite() && *bound >= 0.0)
                .unwrap_or(defaults.position_bound),
            spatial_movement: raw.spatial_movement.unwrap_or(defaults.spatial_movement),
            heartbeat_period: raw
                .heartbeat_secs
                .filter(|period| !period.is_zero())
                .unwrap_or(defaults.heartbeat_period),
            presence_threshold: raw
                .presence_threshold_secs
                .unwrap_or(defaults.presence_threshold),
            player_leaderboard_size: raw
                .player_leaderboard_size
                .unwrap_or(defaults.player_leaderboard_size),
            live_leaderboard_size: raw
                .live_leaderboard_size
                .unwrap_or(defaults.live_leaderboard_size),
        };

        Self {
            game,
            base_url: raw.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            notifier: NotifierConfig {
                api_key: None,
                from: raw.sender.unwrap_or_else(|| DEFAULT_SENDER.into()),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("{}");
        assert_eq!(config.game, GameTuning::default());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn durations_are_read_in_their_units() {
        let config = parse(
            r#"{"tick_interval_ms": 500, "heartbeat_secs": 3, "presence_threshold_secs": 30}"#,
        );
        assert_eq!(config.game.tick_interval, Some(Duration::from_millis(500)));
        assert_eq!(config.game.heartbeat_period, Duration::from_secs(3));
        assert_eq!(config.game.presence_threshold, Duration::from_secs(30));
    }

    #[test]
    fn out_of_range_values_fall_back() {
        let config = parse(r#"{"tick_interval_ms": 50, "active_probability": 1.5}"#);
        assert_eq!(config.game.tick_interval, None);
        assert_eq!(config.game.active_probability, 0.4);
    }

    #[test]
    fn join_link_points_at_the_game_screen() {
        let config = AppConfig {
            base_url: "https://arena.example/".into(),
            ..AppConfig::default()
        };
        let id = uuid::Uuid::nil();
        assert_eq!(
            config.join_link(id),
            format!("https://arena.example/game?id={id}")
        );
    }
}

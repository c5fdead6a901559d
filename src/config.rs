//! Application-level configuration loading: round rules, timing and the seed question bank.

use std::{
    env, fs,
    io::ErrorKind,
    path::PathBuf,
    time::{Duration, SystemTime},
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{game::Question, state_machine::RoundRules};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BUZZER_BEATER_CONFIG_PATH";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Countdown length of every round.
    pub round_duration_secs: u32,
    /// Points awarded for a confirmed answer.
    pub points_per_correct_answer: u32,
    /// Pause between a resolved round and the automatic advance.
    #[serde(rename = "post_round_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub post_round_delay: Duration,
    /// Countdown step.
    #[serde(rename = "tick_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    /// Questions inserted into an empty bank at startup.
    pub seed_questions: Vec<SeedQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Question entry of the configuration file.
pub struct SeedQuestion {
    /// Prompt shown on screen.
    pub prompt: String,
    /// Expected answer.
    pub answer: String,
    /// Optional media clip.
    #[serde(default)]
    pub clip_url: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        round_duration_secs = config.round_duration_secs,
                        seed_questions = config.seed_questions.len(),
                        "loaded configuration"
                    );
                    config.sanitized()
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
        }
    }

    /// Replace values the round driver cannot run with by their defaults.
    fn sanitized(mut self) -> Self {
        if self.tick_interval.is_zero() {
            let fallback = Self::default().tick_interval;
            warn!(
                fallback_ms = fallback.as_millis() as u64,
                "tick_interval_ms must be positive; using default"
            );
            self.tick_interval = fallback;
        }
        self
    }

    /// Rules handed to the round state machine.
    pub fn rules(&self) -> RoundRules {
        RoundRules {
            round_duration_secs: self.round_duration_secs,
            points_per_correct_answer: self.points_per_correct_answer,
        }
    }

    /// Build fresh questions out of the seed entries, keeping their order.
    pub fn seed_bank(&self) -> Vec<Question> {
        let now = SystemTime::now();
        self.seed_questions
            .iter()
            .enumerate()
            .map(|(position, seed)| {
                let mut question =
                    Question::new(seed.prompt.clone(), seed.answer.clone(), seed.clip_url.clone());
                question.created_at = now + Duration::from_millis(position as u64);
                question
            })
            .collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            points_per_correct_answer: 10,
            post_round_delay: Duration::from_millis(3_000),
            tick_interval: Duration::from_secs(1),
            seed_questions: default_questions(),
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

fn default_questions() -> Vec<SeedQuestion> {
    [
        (
            "This 2017 hit by Luis Fonsi and Daddy Yankee became the most-viewed YouTube video of all time.",
            "Despacito",
        ),
        (
            "What artist is known for the \"Moonwalk\" and the album \"Thriller\"?",
            "Michael Jackson",
        ),
        (
            "The song \"Bohemian Rhapsody\" is a signature hit for which British rock band?",
            "Queen",
        ),
        (
            "Which female artist holds the record for the most Grammy wins?",
            "Beyoncé",
        ),
    ]
    .into_iter()
    .map(|(prompt, answer)| SeedQuestion {
        prompt: prompt.into(),
        answer: answer.into(),
        clip_url: None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"round_duration_secs": 20, "post_round_delay_ms": 1500}"#)
                .unwrap();
        assert_eq!(config.round_duration_secs, 20);
        assert_eq!(config.post_round_delay, Duration::from_millis(1_500));
        assert_eq!(config.points_per_correct_answer, 10);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.seed_questions.len(), 4);
    }

    #[test]
    fn zero_tick_interval_falls_back_to_default() {
        let config: AppConfig =
            serde_json::from_str(r#"{"tick_interval_ms": 0, "round_duration_secs": 20}"#).unwrap();
        let config = config.sanitized();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.round_duration_secs, 20);
    }

    #[test]
    fn seed_bank_preserves_configured_order() {
        let bank = AppConfig::default().seed_bank();
        assert_eq!(bank[0].answer, "Despacito");
        assert!(bank.windows(2).all(|pair| pair[0].created_at < pair[1].created_at));
    }
}

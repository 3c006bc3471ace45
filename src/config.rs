use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::db::models::JobLease;
use crate::error::{StoryError, StoryResult};
use crate::llm::{GenerationMode, ImageOptions, TextOptions};

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub logs_dir: PathBuf,
    pub database_url: String,
    pub openai_generate: bool,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub app_profile: String,
    pub text_model: String,
    pub text_max_output_tokens: u32,
    pub image_model: String,
    pub image_size: String,
    pub image_quality: String,
    pub generation_timeout_seconds: u64,
    pub job_poll_interval_ms: u64,
    pub job_lease_seconds: u64,
    pub job_max_attempts: u32,
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| {
            let value = value.trim();
            value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    if value.starts_with("sqlite:") {
        return value;
    }
    format!("sqlite://{value}")
}

impl Config {
    pub fn load() -> StoryResult<Self> {
        let text_defaults = TextOptions::default();
        let image_defaults = ImageOptions::default();

        let config = Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            logs_dir: PathBuf::from(env_string("LOGS_DIR", "logs")),
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://storybook.db",
            )),
            openai_generate: env_bool("OPENAI_GENERATE", false),
            openai_api_key: env_string("OPENAI_API_KEY", ""),
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            app_profile: env_string("APP_PROFILE", "development").trim().to_lowercase(),
            text_model: env_string("TEXT_MODEL", &text_defaults.model),
            text_max_output_tokens: env_u32(
                "TEXT_MAX_OUTPUT_TOKENS",
                text_defaults.max_output_tokens,
            ),
            image_model: env_string("IMAGE_MODEL", &image_defaults.model),
            image_size: env_string("IMAGE_SIZE", &image_defaults.size),
            image_quality: env_string("IMAGE_QUALITY", &image_defaults.quality),
            generation_timeout_seconds: env_u64("GENERATION_TIMEOUT_SECONDS", 120).max(1),
            job_poll_interval_ms: env_u64("JOB_POLL_INTERVAL_MS", 1000).max(10),
            job_lease_seconds: env_u64("JOB_LEASE_SECONDS", 600).max(1),
            job_max_attempts: env_u32("JOB_MAX_ATTEMPTS", 3).max(1),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StoryResult<()> {
        Url::parse(&self.openai_base_url).map_err(|err| {
            StoryError::Configuration(format!(
                "OPENAI_BASE_URL '{}' is not a valid URL: {err}",
                self.openai_base_url
            ))
        })?;
        if self.text_max_output_tokens == 0 {
            return Err(StoryError::Configuration(
                "TEXT_MAX_OUTPUT_TOKENS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_test_profile(&self) -> bool {
        self.app_profile == "test"
    }

    pub fn generation_mode(&self) -> StoryResult<GenerationMode> {
        GenerationMode::resolve(
            self.openai_generate,
            &self.openai_api_key,
            self.is_test_profile(),
        )
    }

    pub fn text_options(&self) -> TextOptions {
        TextOptions {
            model: self.text_model.clone(),
            max_output_tokens: self.text_max_output_tokens,
        }
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            model: self.image_model.clone(),
            size: self.image_size.clone(),
            quality: self.image_quality.clone(),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    pub fn job_lease(&self) -> JobLease {
        JobLease {
            duration: Duration::from_secs(self.job_lease_seconds),
            max_attempts: i64::from(self.job_max_attempts),
        }
    }
}

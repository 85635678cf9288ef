use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::avatar::{AvatarConfig, FallbackCatalog, RetryPolicy};
use crate::media::{CaptureConstraints, RecorderConfig};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    pub recording: RecordingSettings,
    pub avatar: AvatarSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8001/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecordingSettings {
    pub max_duration_secs: u64,
    pub min_duration_secs: u64,
    pub timeslice_ms: u64,
    pub media_type: String,
    pub video_bits_per_second: u32,
    pub constraints: CaptureConstraints,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,
            min_duration_secs: 5,
            timeslice_ms: 1000,
            media_type: "video/webm;codecs=vp8,opus".to_string(),
            video_bits_per_second: 1_000_000,
            constraints: CaptureConstraints::default(),
        }
    }
}

impl RecordingSettings {
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            max_duration: Duration::from_secs(self.max_duration_secs),
            min_duration: Duration::from_secs(self.min_duration_secs),
            timeslice: Duration::from_millis(self.timeslice_ms),
            media_type: self.media_type.clone(),
            video_bits_per_second: self.video_bits_per_second,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AvatarSettings {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub fallback_videos: BTreeMap<String, String>,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        let mut fallback_videos = BTreeMap::new();
        for (category, url) in [
            ("default", "/videos/fallback/anna-welcome.mp4"),
            ("intro", "/videos/fallback/anna-intro.mp4"),
            ("question", "/videos/fallback/anna-discussion.mp4"),
            ("closing", "/videos/fallback/anna-closing.mp4"),
        ] {
            fallback_videos.insert(category.to_string(), url.to_string());
        }
        Self {
            poll_interval_ms: 1000,
            max_poll_attempts: 30,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1000,
            fallback_videos,
        }
    }
}

impl AvatarSettings {
    pub fn pipeline_config(&self) -> AvatarConfig {
        AvatarConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_attempts: self.max_poll_attempts,
            retry: RetryPolicy::new(
                self.retry_max_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
            ),
        }
    }

    pub fn catalog(&self) -> FallbackCatalog {
        FallbackCatalog::new(self.fallback_videos.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub progress_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            progress_dir: ".greenroom/progress".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

//! Kira-backed cue player.
//!
//! The audio backend is built lazily on `unlock`: creating the manager is
//! the step that can fail when no output device is available, which is the
//! native analog of a denied autoplay permission. A failed playback tears
//! the backend down so the next unlock rebuilds it from scratch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kira::sound::static_sound::StaticSoundData;
use kira::{AudioManager, AudioManagerSettings};
use tokio::sync::Mutex;
use tracing::info;

use crate::cues::CuePlayer;

pub struct KiraCuePlayer {
    sound_path: PathBuf,
    backend: Mutex<Option<Backend>>,
}

struct Backend {
    manager: AudioManager,
    sound: StaticSoundData,
}

impl KiraCuePlayer {
    pub fn new(sound_path: impl Into<PathBuf>) -> Self {
        Self {
            sound_path: sound_path.into(),
            backend: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CuePlayer for KiraCuePlayer {
    async fn unlock(&self) -> Result<()> {
        let mut backend = self.backend.lock().await;
        if backend.is_some() {
            return Ok(());
        }

        let manager = AudioManager::new(AudioManagerSettings::default())
            .map_err(|e| anyhow::anyhow!("failed to initialize audio manager: {}", e))?;
        let sound = StaticSoundData::from_file(&self.sound_path)
            .with_context(|| format!("failed to load cue sample {:?}", self.sound_path))?;

        info!("audio unlocked, cue sample {:?}", self.sound_path);
        *backend = Some(Backend { manager, sound });
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut backend = self.backend.lock().await;
        let Some(loaded) = backend.as_mut() else {
            anyhow::bail!("audio backend not initialized");
        };

        match loaded.manager.play(loaded.sound.clone()) {
            Ok(_handle) => Ok(()),
            Err(e) => {
                // tear the backend down so the next unlock rebuilds it
                *backend = None;
                Err(anyhow::anyhow!("cue playback rejected: {}", e))
            }
        }
    }
}

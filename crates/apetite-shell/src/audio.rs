//! Notification sound playback.
//!
//! The worker never plays audio itself; it broadcasts a `PlayAudio` message
//! and each open page relays it to an [`AudioSink`]. Playback failures are
//! the autoplay-blocked case and are logged, never propagated.

use std::sync::Arc;

use apetite_worker::WorkerMessage;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Volume notification sounds are played at.
pub const NOTIFICATION_VOLUME: f32 = 0.5;

/// Errors from audio playback.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The host refused or failed to play the sound.
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// Result type for audio operations.
pub type Result<T> = std::result::Result<T, AudioError>;

/// Plays notification sounds on the host.
pub trait AudioSink: Send + Sync {
    /// Play `sound` at `volume` (0.0 to 1.0).
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot play the sound.
    fn play(&self, sound: &str, volume: f32) -> Result<()>;
}

/// Sink for hosts without audio output; playback is a logged no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn play(&self, sound: &str, volume: f32) -> Result<()> {
        debug!("Discarding playback of {} at volume {}", sound, volume);
        Ok(())
    }
}

/// Forward worker messages from a client receiver to an audio sink.
///
/// Runs until the worker side closes the channel. Sink failures are logged
/// at warn and swallowed.
pub async fn relay_audio(mut messages: mpsc::Receiver<WorkerMessage>, sink: Arc<dyn AudioSink>) {
    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::PlayAudio { sound } => {
                if let Err(e) = sink.play(&sound, NOTIFICATION_VOLUME) {
                    warn!("Notification sound not played: {}", e);
                }
            }
        }
    }
    debug!("Audio relay stopped");
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullAudioSink;
        assert!(sink.play("/audio/notification.mp3", 0.5).is_ok());
    }

    #[test]
    fn test_audio_error_display() {
        let error = AudioError::Playback("autoplay blocked".to_string());
        assert!(error.to_string().contains("autoplay blocked"));
    }

    #[tokio::test]
    async fn test_relay_plays_on_play_audio() {
        let sink = Arc::new(RecordingSink::new());
        let (tx, rx) = mpsc::channel(4);
        let relay = tokio::spawn(relay_audio(rx, sink.clone() as Arc<dyn AudioSink>));

        tx.send(WorkerMessage::PlayAudio {
            sound: "/audio/notification.mp3".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        relay.await.unwrap();

        assert_eq!(
            sink.played(),
            vec![("/audio/notification.mp3".to_string(), NOTIFICATION_VOLUME)]
        );
    }

    #[tokio::test]
    async fn test_relay_survives_playback_failure() {
        let sink = Arc::new(RecordingSink::failing());
        let (tx, rx) = mpsc::channel(4);
        let relay = tokio::spawn(relay_audio(rx, sink.clone() as Arc<dyn AudioSink>));

        for _ in 0..3 {
            tx.send(WorkerMessage::PlayAudio {
                sound: "/audio/notification.mp3".to_string(),
            })
            .await
            .unwrap();
        }
        drop(tx);

        // The relay ran to the end of the channel without bailing out
        relay.await.unwrap();
        assert!(sink.played().is_empty());
    }

    #[tokio::test]
    async fn test_relay_stops_when_channel_closes() {
        let sink = Arc::new(NullAudioSink);
        let (tx, rx) = mpsc::channel::<WorkerMessage>(1);
        let relay = tokio::spawn(relay_audio(rx, sink as Arc<dyn AudioSink>));

        drop(tx);
        relay.await.unwrap();
    }
}

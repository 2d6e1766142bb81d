//! Live playback control.
//!
//! While a stream is running, the encoder process accepts runtime commands
//! over a request/reply channel: seeking, playback speed, overlay text, and
//! color adjustment. This module formats those commands and checks the
//! replies; the channel itself (socket, pipe) is behind [`CommandChannel`].

use crate::error::{Result, StreamError};

/// Request/reply command channel to the running encoder.
pub trait CommandChannel: Send + Sync {
    /// Send one command line, wait for the reply.
    fn request(&self, command: &str) -> Result<String>;
}

/// Commands for a live, already-running stream.
pub struct LiveControl<C: CommandChannel> {
    channel: C,
}

impl<C: CommandChannel> LiveControl<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Jump to an absolute position in the source, in seconds.
    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(&format!("seek {seconds}"))
    }

    /// Change playback speed. `1.0` is real time, `2.0` is double speed.
    ///
    /// Implemented by rescaling presentation timestamps, so the frame
    /// cadence changes at the source rather than in the pacing layer.
    pub fn set_playback_speed(&self, factor: f64) -> Result<()> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(StreamError::Control(format!(
                "playback speed must be positive, got {factor}"
            )));
        }
        self.send(&format!("setpts={}*PTS", 1.0 / factor))
    }

    /// Replace the text overlay burned into the video.
    pub fn update_overlay_text(&self, text: &str) -> Result<()> {
        // Quotes would terminate the filter argument early.
        let escaped = text.replace('\'', "\\'");
        self.send(&format!("drawtext reinit text='{escaped}'"))
    }

    /// Adjust brightness, contrast, saturation, and hue.
    pub fn set_color_filter(
        &self,
        brightness: f64,
        contrast: f64,
        saturation: f64,
        hue: f64,
    ) -> Result<()> {
        self.send(&format!(
            "hue=b={brightness}:c={contrast}:s={saturation}:h={hue}"
        ))
    }

    fn send(&self, command: &str) -> Result<()> {
        tracing::debug!(command, "control command");
        let reply = self.channel.request(command)?;
        if reply.trim().eq_ignore_ascii_case("error") || reply.starts_with("error") {
            return Err(StreamError::Control(format!(
                "command {command:?} rejected: {reply}"
            )));
        }
        Ok(())
    }
}

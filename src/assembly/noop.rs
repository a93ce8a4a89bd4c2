//! No-op player for runs that only download and merge

use super::Player;
use async_trait::async_trait;
use std::path::Path;

/// Player that does nothing
///
/// Used when playback is disabled so the delivery path stays the same.
///
/// # Examples
///
/// ```
/// use segment_dl::assembly::{NoOpPlayer, Player};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// NoOpPlayer.play(Path::new("output.mp4")).await?;
/// # Ok(())
/// # }
/// ```
pub struct NoOpPlayer;

#[async_trait]
impl Player for NoOpPlayer {
    async fn play(&self, artifact: &Path) -> crate::Result<()> {
        tracing::debug!(artifact = %artifact.display(), "Playback disabled");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

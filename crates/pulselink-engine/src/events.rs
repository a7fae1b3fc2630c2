use crate::store::PlaybackMode;

/// Playback lifecycle events emitted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramesEvent {
    /// A once-mode sequence played its last frame; channel data was cleared.
    Completed,
    /// A loop-mode sequence wrapped back to its first frame.
    Looped,
}

/// Session event sink, injected once at controller construction.
///
/// Every method has a no-op default, so implementors only pick the events
/// they care about. Callbacks fire outside the engine lock and must not
/// block; hand the event off if real work is needed.
pub trait EngineObserver: Send + Sync {
    /// One scheduler tick elapsed (fires even while paused).
    fn on_data_sync(&self) {}

    /// Playback lifecycle event.
    fn on_frames_event(&self, _event: FramesEvent) {}

    /// Playback mode was set.
    fn on_playback_mode_changed(&self, _old: PlaybackMode, _new: PlaybackMode) {}

    /// The authoritative playback position moved.
    fn on_progress_changed(&self, _position: usize) {}

    /// Transport session came up or went down.
    fn on_connection_changed(&self, _connected: bool) {}

    /// The device reported its absolute channel strengths.
    fn on_strength_changed(&self, _strength_a: u8, _strength_b: u8) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}

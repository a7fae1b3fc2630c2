use pulselink_proto::{clamp_frequency, clamp_pulse_strength, Channel, PulseOperation, STRENGTH_MAX};

/// What happens when a frame sequence reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Stop at the last frame.
    #[default]
    Once,
    /// Restart at the first frame.
    Loop,
}

/// One buffered instruction: a waveform unit plus, for recorded snapshot
/// replay, the absolute channel strength captured with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFrame {
    pub pulse: PulseOperation,
    pub target_strength: Option<u8>,
}

impl ChannelFrame {
    /// The frame streamed when a channel has nothing to play.
    pub const NEUTRAL: ChannelFrame = ChannelFrame {
        pulse: PulseOperation::NEUTRAL,
        target_strength: None,
    };

    pub fn pulse(pulse: PulseOperation) -> Self {
        Self {
            pulse,
            target_strength: None,
        }
    }

    pub fn snapshot(pulse: PulseOperation, target_strength: u8) -> Self {
        Self {
            pulse,
            target_strength: Some(target_strength),
        }
    }
}

/// Per-channel frame sequences with two decoupled cursors.
///
/// `buffer_index` is the transmission lookahead: it only ever grows, so the
/// send path can run several frames ahead of real time to absorb transport
/// jitter. `logical_index` is the authoritative "currently playing" position
/// and is always within the valid domain whenever data exists; it is what
/// UI, recording, and progress reporting observe.
#[derive(Debug, Default)]
pub struct ChannelStateStore {
    channels: [Vec<ChannelFrame>; 2],
    buffer_index: usize,
    logical_index: usize,
    mode: PlaybackMode,
}

impl ChannelStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a channel's sequence with plain waveform data.
    ///
    /// Pulse values are sanitized into protocol range; strict validation
    /// belongs to the codec.
    pub fn set_waveform(&mut self, channel: Channel, pulses: Vec<PulseOperation>) {
        self.channels[channel.index()] = pulses
            .into_iter()
            .map(|pulse| ChannelFrame::pulse(sanitize(pulse)))
            .collect();
        self.reset_frame_progress();
    }

    /// Replace a channel's sequence with recorded snapshot frames.
    pub fn set_snapshot_frames(&mut self, channel: Channel, frames: Vec<ChannelFrame>) {
        self.channels[channel.index()] = frames
            .into_iter()
            .map(|frame| ChannelFrame {
                pulse: sanitize(frame.pulse),
                target_strength: frame.target_strength.map(|s| s.min(STRENGTH_MAX)),
            })
            .collect();
        self.reset_frame_progress();
    }

    /// Clear one channel's sequence.
    pub fn clear(&mut self, channel: Channel) {
        self.channels[channel.index()].clear();
        self.reset_frame_progress();
    }

    /// Clear both channels' sequences.
    pub fn clear_all(&mut self) {
        for frames in &mut self.channels {
            frames.clear();
        }
        self.reset_frame_progress();
    }

    /// Set the playback mode, reconciling the logical cursor so it stays in
    /// the new mode's valid domain.
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        let old = self.mode;
        self.mode = mode;

        if old != mode {
            let max = self.max_frames();
            if max > 0 {
                self.logical_index = match mode {
                    PlaybackMode::Loop => self.logical_index % max,
                    PlaybackMode::Once => self.logical_index.min(max - 1),
                };
            }
        }
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn has_data(&self, channel: Channel) -> bool {
        !self.channels[channel.index()].is_empty()
    }

    pub fn has_any_data(&self) -> bool {
        Channel::ALL.iter().any(|&channel| self.has_data(channel))
    }

    /// Advance the transmission cursor and return both channels' next frames.
    ///
    /// A channel shorter than the longest one loops its own data (modulo its
    /// length) until every channel has been visited `buffer_index` times.
    /// Empty channels, and fully exhausted once-mode playback, yield the
    /// neutral frame. The cursor increments unconditionally and is never
    /// clamped.
    pub fn advance_buffer_for_send(&mut self) -> [ChannelFrame; 2] {
        let max = self.max_frames();
        let index = self.buffer_index;

        let result = Channel::ALL.map(|channel| {
            let frames = &self.channels[channel.index()];
            if frames.is_empty() {
                return ChannelFrame::NEUTRAL;
            }
            match self.mode {
                PlaybackMode::Loop => frames[index % frames.len()],
                PlaybackMode::Once => {
                    if index < frames.len() {
                        frames[index]
                    } else if index < max {
                        frames[index % frames.len()]
                    } else {
                        ChannelFrame::NEUTRAL
                    }
                }
            }
        });

        self.buffer_index += 1;
        result
    }

    /// Batch form of [`advance_buffer_for_send`](Self::advance_buffer_for_send),
    /// used by prefetch top-up.
    pub fn advance_buffer_batch(&mut self, count: usize) -> Vec<[ChannelFrame; 2]> {
        (0..count).map(|_| self.advance_buffer_for_send()).collect()
    }

    /// Advance the authoritative playback position.
    ///
    /// Loop mode wraps modulo the longest sequence; returns true on the tick
    /// it wraps back to 0. Once mode clamps at the last valid index.
    pub fn advance_logical_frame(&mut self) -> bool {
        let max = self.max_frames();
        if max == 0 {
            return false;
        }

        match self.mode {
            PlaybackMode::Loop => {
                self.logical_index = (self.logical_index + 1) % max;
                self.logical_index == 0
            }
            PlaybackMode::Once => {
                if self.logical_index < max - 1 {
                    self.logical_index += 1;
                }
                false
            }
        }
    }

    /// True if there is nothing (left) to play: no data, or once mode at the
    /// last valid index. Always false in loop mode while data exists.
    pub fn is_sequence_finished(&self) -> bool {
        let max = self.max_frames();
        if max == 0 {
            return true;
        }
        match self.mode {
            PlaybackMode::Loop => false,
            PlaybackMode::Once => self.logical_index >= max - 1,
        }
    }

    /// The authoritative playback position.
    pub fn frame_position(&self) -> usize {
        self.logical_index
    }

    /// Seek. The position is clamped into the valid domain and the
    /// transmission cursor resynchronizes to it.
    pub fn set_frame_position(&mut self, position: usize) {
        let max = self.max_frames();
        let position = if max > 0 { position.min(max - 1) } else { 0 };

        self.logical_index = position;
        self.buffer_index = position;
    }

    /// Pulse at the authoritative playback position, channel-local modulo.
    pub fn current_pulse(&self, channel: Channel) -> Option<PulseOperation> {
        let frames = &self.channels[channel.index()];
        if frames.is_empty() || self.logical_index >= self.max_frames() {
            return None;
        }
        Some(frames[self.logical_index % frames.len()].pulse)
    }

    /// Rewind both cursors to 0.
    pub fn reset_frame_progress(&mut self) {
        self.buffer_index = 0;
        self.logical_index = 0;
    }

    fn max_frames(&self) -> usize {
        self.channels.iter().map(Vec::len).max().unwrap_or(0)
    }
}

fn sanitize(pulse: PulseOperation) -> PulseOperation {
    PulseOperation {
        frequency: pulse.frequency.map(clamp_frequency),
        strength: pulse.strength.map(clamp_pulse_strength),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulses(n: usize) -> Vec<PulseOperation> {
        (0..n)
            .map(|i| PulseOperation::new([10 + i as u8; 4], [i as u8; 4]))
            .collect()
    }

    #[test]
    fn once_mode_clamps_at_last_index() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(4));

        for _ in 0..3 {
            store.advance_logical_frame();
        }
        assert_eq!(store.frame_position(), 3);
        assert!(store.is_sequence_finished());

        // One further call leaves the position unchanged.
        store.advance_logical_frame();
        assert_eq!(store.frame_position(), 3);
    }

    #[test]
    fn loop_mode_wraps_and_never_finishes() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(4));
        store.set_playback_mode(PlaybackMode::Loop);

        for i in 1..4 {
            assert!(!store.advance_logical_frame());
            assert_eq!(store.frame_position(), i);
            assert!(!store.is_sequence_finished());
        }
        assert!(store.advance_logical_frame());
        assert_eq!(store.frame_position(), 0);
        assert!(!store.is_sequence_finished());
    }

    #[test]
    fn empty_store_is_finished_and_streams_neutral() {
        let mut store = ChannelStateStore::new();
        assert!(store.is_sequence_finished());

        let frames = store.advance_buffer_for_send();
        assert_eq!(frames[0], ChannelFrame::NEUTRAL);
        assert_eq!(frames[1], ChannelFrame::NEUTRAL);
        assert_eq!(frames[0].pulse.frequency, [10, 10, 10, 10]);
        assert_eq!(frames[0].pulse.strength, [0, 0, 0, 0]);
    }

    #[test]
    fn short_channel_loops_until_longest_finishes() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(3));
        store.set_waveform(Channel::B, pulses(5));

        let batch = store.advance_buffer_batch(5);

        // B emits its natural sequence once.
        for (i, frames) in batch.iter().enumerate() {
            assert_eq!(frames[Channel::B.index()].pulse.strength, [i as u8; 4]);
        }
        // A cycles back to its start for calls 4 and 5.
        assert_eq!(batch[3][Channel::A.index()].pulse.strength, [0; 4]);
        assert_eq!(batch[4][Channel::A.index()].pulse.strength, [1; 4]);

        // Both exhausted: neutral data from here on.
        let after = store.advance_buffer_for_send();
        assert_eq!(after[Channel::A.index()], ChannelFrame::NEUTRAL);
        assert_eq!(after[Channel::B.index()], ChannelFrame::NEUTRAL);
    }

    #[test]
    fn loop_mode_buffer_cycles_each_channel_independently() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(2));
        store.set_waveform(Channel::B, pulses(3));
        store.set_playback_mode(PlaybackMode::Loop);

        let batch = store.advance_buffer_batch(6);
        let a_strengths: Vec<u8> = batch
            .iter()
            .map(|frames| frames[Channel::A.index()].pulse.strength[0])
            .collect();
        let b_strengths: Vec<u8> = batch
            .iter()
            .map(|frames| frames[Channel::B.index()].pulse.strength[0])
            .collect();
        assert_eq!(a_strengths, [0, 1, 0, 1, 0, 1]);
        assert_eq!(b_strengths, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn replacing_data_resets_both_cursors() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(4));
        store.advance_buffer_for_send();
        store.advance_logical_frame();

        store.set_waveform(Channel::A, pulses(2));
        assert_eq!(store.frame_position(), 0);
        let frames = store.advance_buffer_for_send();
        assert_eq!(frames[Channel::A.index()].pulse.strength, [0; 4]);
    }

    #[test]
    fn mode_change_reconciles_logical_index() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(3));
        store.set_playback_mode(PlaybackMode::Loop);

        // Park the cursor at the end, then shrink the domain under it.
        store.advance_logical_frame();
        store.advance_logical_frame();
        assert_eq!(store.frame_position(), 2);

        store.set_playback_mode(PlaybackMode::Once);
        assert_eq!(store.frame_position(), 2);
        assert!(store.is_sequence_finished());

        store.set_playback_mode(PlaybackMode::Loop);
        assert_eq!(store.frame_position(), 2);
    }

    #[test]
    fn seek_clamps_and_resyncs_buffer() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(5));

        store.set_frame_position(99);
        assert_eq!(store.frame_position(), 4);
        let frames = store.advance_buffer_for_send();
        assert_eq!(frames[Channel::A.index()].pulse.strength, [4; 4]);

        store.clear_all();
        store.set_frame_position(3);
        assert_eq!(store.frame_position(), 0);
    }

    #[test]
    fn current_pulse_follows_logical_position() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(Channel::A, pulses(2));
        store.set_waveform(Channel::B, pulses(4));

        store.advance_logical_frame();
        store.advance_logical_frame();

        // A wraps channel-locally, B reads its natural frame.
        assert_eq!(store.current_pulse(Channel::A).unwrap().strength, [0; 4]);
        assert_eq!(store.current_pulse(Channel::B).unwrap().strength, [2; 4]);
        assert!(store.current_pulse(Channel::A).is_some());

        store.clear(Channel::A);
        assert!(store.current_pulse(Channel::A).is_none());
    }

    #[test]
    fn ingest_sanitizes_out_of_range_values() {
        let mut store = ChannelStateStore::new();
        store.set_waveform(
            Channel::A,
            vec![PulseOperation::new([5, 250, 100, 10], [120, 50, 0, 101])],
        );

        let pulse = store.current_pulse(Channel::A).unwrap();
        assert_eq!(pulse.frequency, [10, 240, 100, 10]);
        assert_eq!(pulse.strength, [100, 50, 0, 100]);

        store.set_snapshot_frames(
            Channel::B,
            vec![ChannelFrame::snapshot(PulseOperation::NEUTRAL, 255)],
        );
        let frames = store.advance_buffer_for_send();
        assert_eq!(frames[Channel::B.index()].target_strength, Some(200));
    }
}

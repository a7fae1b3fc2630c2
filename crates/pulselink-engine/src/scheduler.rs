use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pulselink_proto::{encode_limit_frame, encode_strength_frame, Channel, StrengthFrame};
use pulselink_transport::TransportAdapter;

use crate::controller::{EngineState, Shared};
use crate::events::FramesEvent;
use crate::store::PlaybackMode;

/// Streaming cadence and flow-control tuning for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target interval between frames.
    pub period: Duration,
    /// Subtracted from the period each tick to compensate scheduling
    /// overhead and avoid cumulative drift.
    pub epsilon: Duration,
    /// Prefetch window: top up when fewer than `prefetch_min` frames are in
    /// flight, up to `prefetch_max`.
    pub prefetch_min: usize,
    pub prefetch_max: usize,
    /// How long a strength request may await its acknowledgment.
    pub ack_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            epsilon: Duration::from_millis(1),
            prefetch_min: 1,
            prefetch_max: 5,
            ack_timeout: Duration::from_secs(1),
        }
    }
}

/// The fixed-cadence send loop.
///
/// Merges store output and negotiator selections into encoded strength
/// frames and drives the transport. Owned by one controller; terminated only
/// by cancellation.
pub(crate) struct StreamScheduler<T: TransportAdapter> {
    shared: Arc<Shared>,
    transport: T,
    cancel: CancellationToken,
    prefetch_count: usize,
}

impl<T: TransportAdapter> StreamScheduler<T> {
    pub(crate) fn new(shared: Arc<Shared>, transport: T, cancel: CancellationToken) -> Self {
        Self {
            shared,
            transport,
            cancel,
            prefetch_count: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut connected = self.shared.connected.subscribe();
        let period = self.shared.config.period;
        // Guard against a degenerate epsilon turning the loop hot.
        let step = period
            .checked_sub(self.shared.config.epsilon)
            .filter(|step| !step.is_zero())
            .unwrap_or(period);

        info!(
            transport = self.transport.transport_name(),
            "stream scheduler started"
        );
        let mut next_deadline = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if !*connected.borrow_and_update() {
                // Block on the connection signal instead of polling.
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    changed = connected.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                // Fresh session: restart the lookahead and the cadence.
                self.prefetch_count = 0;
                next_deadline = Instant::now();
                continue;
            }

            self.tick();

            next_deadline += step;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = time::sleep_until(next_deadline) => {}
            }
        }

        // Teardown: no stale in-flight negotiation survives a restart.
        self.shared.lock_state().negotiator.reset();
        debug!("stream scheduler stopped");
    }

    fn tick(&mut self) {
        let mut events: Vec<FramesEvent> = Vec::new();
        let mut progress = None;

        {
            let mut guard = self.shared.lock_state();
            let state = &mut *guard;

            if !state.paused {
                if state.limit_frame_pending {
                    send_limit_frame(&mut self.transport, state);
                }

                if self.prefetch_count < self.shared.config.prefetch_min {
                    let frames_to_send = self.shared.config.prefetch_max - self.prefetch_count;
                    for _ in 0..frames_to_send {
                        send_next_frame(&mut self.transport, state);
                    }
                    self.prefetch_count += frames_to_send;
                }
                if self.prefetch_count > 0 {
                    self.prefetch_count -= 1;
                }

                let wrapped = state.store.advance_logical_frame();
                let finished = state.store.is_sequence_finished();
                match state.store.playback_mode() {
                    PlaybackMode::Once => {
                        if finished && !state.finished_latch {
                            info!("frame sequence completed");
                            state.store.clear_all();
                            events.push(FramesEvent::Completed);
                        }
                    }
                    PlaybackMode::Loop => {
                        if wrapped && state.store.has_any_data() {
                            debug!("frame sequence wrapped, starting new loop");
                            state.store.reset_frame_progress();
                            events.push(FramesEvent::Looped);
                        }
                    }
                }
                state.finished_latch = finished;
                progress = Some(state.store.frame_position());
            }
        }

        // Observers run outside the engine lock.
        for event in events {
            self.shared.observer.on_frames_event(event);
        }
        if let Some(position) = progress {
            self.shared.observer.on_progress_changed(position);
        }
        self.shared.observer.on_data_sync();
    }
}

/// Send the configured limit frame. Kept pending on transport failure so the
/// next tick retries.
fn send_limit_frame<T: TransportAdapter>(transport: &mut T, state: &mut EngineState) {
    match encode_limit_frame(&state.device.limits.to_frame()) {
        Ok(bytes) => {
            if let Err(err) = transport.send(bytes) {
                warn!(%err, "limit frame send failed");
            } else {
                debug!("limit frame sent");
                state.limit_frame_pending = false;
            }
        }
        Err(err) => {
            warn!(%err, "limit frame rejected by codec");
            state.limit_frame_pending = false;
        }
    }
}

/// Build and send one strength frame from the next buffered waveform unit
/// and the negotiator's selection.
fn send_next_frame<T: TransportAdapter>(transport: &mut T, state: &mut EngineState) {
    let frames = state.store.advance_buffer_for_send();

    // Recorded snapshot targets become the device target before selection.
    for channel in Channel::ALL {
        if let Some(target) = frames[channel.index()].target_strength {
            let limited = target.min(state.device.limit(channel));
            state.device.set_strength(channel, limited);
        }
    }

    let selection = state
        .negotiator
        .next_outgoing_selection(std::time::Instant::now(), &mut state.device);

    let frame = StrengthFrame {
        sequence_no: selection.sequence_no,
        method_a: selection.method_a,
        method_b: selection.method_b,
        strength_a: selection.strength_a,
        strength_b: selection.strength_b,
        pulse_a: frames[Channel::A.index()].pulse,
        pulse_b: frames[Channel::B.index()].pulse,
    };

    match encode_strength_frame(&frame) {
        Ok(bytes) => {
            if let Err(err) = transport.send(bytes) {
                warn!(%err, "strength frame send failed");
            }
        }
        Err(err) => {
            warn!(%err, "strength frame rejected by codec, skipping send");
        }
    }
}

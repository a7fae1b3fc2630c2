use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pulselink_proto::{decode_status_frame, Channel, PulseOperation, STATUS_FRAME_TAG};
use pulselink_transport::TransportAdapter;

use crate::device::{DeviceState, LimitParams};
use crate::error::Result;
use crate::events::{EngineObserver, NoopObserver};
use crate::negotiator::StrengthNegotiator;
use crate::scheduler::{SessionConfig, StreamScheduler};
use crate::store::{ChannelFrame, ChannelStateStore, PlaybackMode};

/// Everything the scheduler tick and the public API mutate, behind one lock.
pub(crate) struct EngineState {
    pub(crate) store: ChannelStateStore,
    pub(crate) negotiator: StrengthNegotiator,
    pub(crate) device: DeviceState,
    pub(crate) paused: bool,
    pub(crate) limit_frame_pending: bool,
    pub(crate) finished_latch: bool,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) connected: watch::Sender<bool>,
    pub(crate) observer: Arc<dyn EngineObserver>,
    pub(crate) config: SessionConfig,
}

impl Shared {
    /// Lock scopes stay short and are never held across an await.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Facade owning one streaming session's state and tasks.
///
/// One controller per active transport; nothing is shared between
/// controllers. The external connection-management layer drives
/// [`set_connected`](DeviceController::set_connected); everything else is
/// the UI/recording surface.
pub struct DeviceController {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DeviceController {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Create a controller with an event sink. The observer is injected
    /// exactly once; there are no per-event callback setters.
    pub fn with_observer(config: SessionConfig, observer: Arc<dyn EngineObserver>) -> Self {
        let state = EngineState {
            store: ChannelStateStore::new(),
            negotiator: StrengthNegotiator::new(config.ack_timeout),
            device: DeviceState::default(),
            paused: false,
            limit_frame_pending: false,
            // An empty store counts as finished; latching it here avoids a
            // spurious completion event on the first tick.
            finished_latch: true,
        };
        let (connected, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                connected,
                observer,
                config,
            }),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn the scheduler and notification pump over a connected transport.
    ///
    /// Starting twice is tolerated as a no-op.
    pub fn start<T: TransportAdapter>(&mut self, mut transport: T) {
        if !self.tasks.is_empty() {
            warn!("controller already started, ignoring");
            return;
        }

        let notifications = transport.take_notifications();
        let scheduler =
            StreamScheduler::new(self.shared.clone(), transport, self.cancel.child_token());
        self.tasks.push(tokio::spawn(scheduler.run()));

        match notifications {
            Some(receiver) => {
                self.tasks.push(tokio::spawn(notification_pump(
                    self.shared.clone(),
                    receiver,
                    self.cancel.child_token(),
                )));
            }
            None => warn!("transport notifications already taken, acknowledgments disabled"),
        }
    }

    /// Cancel the session tasks and reset negotiation state.
    ///
    /// Terminal for this controller; create a new one for a new session.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self.shared.lock_state().negotiator.reset();
    }

    /// Connection-state input from the transport's connection manager.
    ///
    /// Every (re)connection resets negotiation and re-arms the limit frame:
    /// the device forgets its parameters across link drops.
    pub fn set_connected(&self, connected: bool) {
        {
            let mut state = self.shared.lock_state();
            state.negotiator.reset();
            if connected {
                state.limit_frame_pending = true;
            }
        }
        self.shared.connected.send_replace(connected);
        self.shared.observer.on_connection_changed(connected);
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Replace a channel's sequence with plain waveform data and unpause.
    pub fn set_waveform(&self, channel: Channel, pulses: Vec<PulseOperation>) {
        let mut state = self.shared.lock_state();
        state.store.set_waveform(channel, pulses);
        state.paused = false;
        state.finished_latch = false;
    }

    /// Replace a channel's sequence with recorded snapshot frames and
    /// unpause.
    pub fn set_snapshot_frames(&self, channel: Channel, frames: Vec<ChannelFrame>) {
        let mut state = self.shared.lock_state();
        state.store.set_snapshot_frames(channel, frames);
        state.paused = false;
        state.finished_latch = false;
    }

    pub fn clear(&self, channel: Channel) {
        self.shared.lock_state().store.clear(channel);
    }

    pub fn clear_all(&self) {
        self.shared.lock_state().store.clear_all();
    }

    /// Hold playback: the connection stays alive, nothing advances.
    pub fn pause(&self) {
        self.shared.lock_state().paused = true;
    }

    pub fn resume(&self) {
        self.shared.lock_state().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock_state().paused
    }

    pub fn set_playback_mode(&self, mode: PlaybackMode) {
        let old = {
            let mut state = self.shared.lock_state();
            let old = state.store.playback_mode();
            state.store.set_playback_mode(mode);
            old
        };
        self.shared.observer.on_playback_mode_changed(old, mode);
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.shared.lock_state().store.playback_mode()
    }

    pub fn frame_position(&self) -> usize {
        self.shared.lock_state().store.frame_position()
    }

    pub fn set_frame_position(&self, position: usize) {
        let position = {
            let mut state = self.shared.lock_state();
            state.store.set_frame_position(position);
            state.store.frame_position()
        };
        self.shared.observer.on_progress_changed(position);
    }

    /// Pulse at the authoritative playback position of a channel.
    pub fn current_pulse_data(&self, channel: Channel) -> Option<PulseOperation> {
        self.shared.lock_state().store.current_pulse(channel)
    }

    /// Request an absolute channel strength (0-200 device units).
    pub fn request_strength_absolute(&self, channel: Channel, value: u8) -> Result<()> {
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        state.negotiator.request_absolute(channel, value, &state.device)
    }

    /// Request a relative strength change.
    pub fn request_strength_relative(&self, channel: Channel, delta: i32) -> Result<()> {
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        state.negotiator.request_relative(channel, delta, &state.device)
    }

    /// Update soft limits and balance parameters; the frame goes out on the
    /// next tick.
    pub fn configure_limits(&self, params: LimitParams) {
        let mut state = self.shared.lock_state();
        state.device.limits = params;
        state.limit_frame_pending = true;
    }

    /// Last known absolute strengths (A, B).
    pub fn device_strengths(&self) -> (u8, u8) {
        let state = self.shared.lock_state();
        (
            state.device.strength(Channel::A),
            state.device.strength(Channel::B),
        )
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        // A dropped controller must not leave its tasks streaming.
        self.cancel.cancel();
    }
}

/// Consume raw transport notifications: decode status frames, apply
/// acknowledgments, surface strength changes.
async fn notification_pump(
    shared: Arc<Shared>,
    mut notifications: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => break,
            payload = notifications.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        if payload.first() != Some(&STATUS_FRAME_TAG) {
            debug!(len = payload.len(), "ignoring non-status notification");
            continue;
        }

        match decode_status_frame(&payload) {
            Ok(status) => {
                {
                    let mut guard = shared.lock_state();
                    let state = &mut *guard;
                    state.negotiator.on_acknowledgment(
                        status.sequence_no,
                        status.strength_a,
                        status.strength_b,
                        &mut state.device,
                    );
                }
                shared
                    .observer
                    .on_strength_changed(status.strength_a, status.strength_b);
            }
            Err(err) => warn!(%err, "malformed status notification"),
        }
    }
    debug!("notification pump stopped");
}

use std::num::NonZeroU8;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use pulselink_proto::{Channel, ParsingMethod, SEQUENCE_NO_MAX, STRENGTH_MAX};

use crate::device::DeviceState;
use crate::error::EngineError;

/// Strength-change request bookkeeping: nothing outstanding, or exactly one
/// sequence number waiting for its device acknowledgment.
///
/// Sequence 0 is reserved on the wire for "not a request", so the active
/// variant holds a `NonZeroU8` (always 1..=15) instead of overloading 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingSeq {
    None,
    Active { seq: NonZeroU8, since: Instant },
}

/// What the scheduler should put in the strength fields of the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingSelection {
    pub sequence_no: u8,
    pub method_a: ParsingMethod,
    pub method_b: ParsingMethod,
    pub strength_a: u8,
    pub strength_b: u8,
}

/// Flow control for strength changes: at most one request is in flight per
/// session, correlated by a rotating 4-bit sequence number.
///
/// Local requests accumulate as per-channel deltas until the scheduler is
/// ready to put them on the wire. While an acknowledgment is outstanding,
/// further requests keep coalescing into the accumulation; the 1s timeout is
/// checked lazily at each selection, not by a separate timer.
#[derive(Debug)]
pub struct StrengthNegotiator {
    current_sequence: Option<NonZeroU8>,
    pending: PendingSeq,
    accumulated: [i32; 2],
    ack_timeout: Duration,
}

impl StrengthNegotiator {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            current_sequence: None,
            pending: PendingSeq::None,
            accumulated: [0; 2],
            ack_timeout,
        }
    }

    /// True while no request is awaiting its acknowledgment.
    pub fn input_allowed(&self) -> bool {
        matches!(self.pending, PendingSeq::None)
    }

    pub fn pending(&self) -> PendingSeq {
        self.pending
    }

    /// Request an absolute channel strength.
    ///
    /// The accumulation becomes the delta from the last known device
    /// strength to `value`. While a request is in flight the device strength
    /// already carries the optimistic in-flight delta, so the same
    /// assignment coalesces the remainder.
    pub fn request_absolute(
        &mut self,
        channel: Channel,
        value: u8,
        device: &DeviceState,
    ) -> Result<(), EngineError> {
        if value > STRENGTH_MAX {
            return Err(EngineError::StrengthOutOfRange {
                channel,
                requested: value as i32,
            });
        }
        self.accumulated[channel.index()] = value as i32 - device.strength(channel) as i32;
        Ok(())
    }

    /// Request a relative strength change.
    ///
    /// Fails, leaving the accumulation untouched, when the resulting target
    /// would leave the device domain.
    pub fn request_relative(
        &mut self,
        channel: Channel,
        delta: i32,
        device: &DeviceState,
    ) -> Result<(), EngineError> {
        let index = channel.index();
        let target = device.strength(channel) as i32 + self.accumulated[index] + delta;
        if target < 0 || target > STRENGTH_MAX as i32 {
            return Err(EngineError::StrengthOutOfRange {
                channel,
                requested: target,
            });
        }
        self.accumulated[index] += delta;
        Ok(())
    }

    /// Release a request whose acknowledgment never arrived.
    ///
    /// Accumulated deltas are deliberately left untouched; they stay
    /// eligible to be resent on the next tick.
    pub fn check_timeout(&mut self, now: Instant) {
        if let PendingSeq::Active { seq, since } = self.pending {
            if now.duration_since(since) > self.ack_timeout {
                warn!(seq = seq.get(), "acknowledgment timed out, releasing request");
                self.pending = PendingSeq::None;
            }
        }
    }

    /// Apply a decoded status frame.
    ///
    /// Device strengths are authoritative and always applied. The pending
    /// request is released only by its own sequence number; other nonzero
    /// acknowledgments are logged and ignored.
    pub fn on_acknowledgment(
        &mut self,
        ack_seq: u8,
        strength_a: u8,
        strength_b: u8,
        device: &mut DeviceState,
    ) {
        device.set_strength(Channel::A, strength_a);
        device.set_strength(Channel::B, strength_b);

        match self.pending {
            PendingSeq::Active { seq, .. } if seq.get() == ack_seq => {
                debug!(seq = ack_seq, strength_a, strength_b, "request acknowledged");
                self.pending = PendingSeq::None;
            }
            _ if ack_seq != 0 => {
                warn!(seq = ack_seq, "acknowledgment for unknown sequence");
            }
            _ => {}
        }
    }

    /// Decide the strength fields of the next outgoing frame.
    ///
    /// Called at every negotiation decision point; runs the lazy timeout
    /// check first. Allocating a request optimistically folds the sent
    /// deltas into the device state; the next status frame corrects it if
    /// the device disagrees.
    pub fn next_outgoing_selection(
        &mut self,
        now: Instant,
        device: &mut DeviceState,
    ) -> OutgoingSelection {
        self.check_timeout(now);

        if self.input_allowed() && self.accumulated.iter().any(|&delta| delta != 0) {
            let seq = self.allocate();
            self.pending = PendingSeq::Active { seq, since: now };

            let [delta_a, delta_b] = self.accumulated;
            for channel in Channel::ALL {
                let delta = self.accumulated[channel.index()];
                let target = (device.strength(channel) as i32 + delta)
                    .clamp(0, STRENGTH_MAX as i32) as u8;
                device.set_strength(channel, target);
            }
            self.accumulated = [0; 2];

            debug!(
                seq = seq.get(),
                delta_a, delta_b, "allocating strength request"
            );
            return OutgoingSelection {
                sequence_no: seq.get(),
                method_a: method_for(delta_a),
                method_b: method_for(delta_b),
                strength_a: delta_a.unsigned_abs().min(STRENGTH_MAX as u32) as u8,
                strength_b: delta_b.unsigned_abs().min(STRENGTH_MAX as u32) as u8,
            };
        }

        if !self.input_allowed() {
            // Keep-alive while the acknowledgment is outstanding.
            return OutgoingSelection {
                sequence_no: 0,
                method_a: ParsingMethod::NoChange,
                method_b: ParsingMethod::NoChange,
                strength_a: 0,
                strength_b: 0,
            };
        }

        OutgoingSelection {
            sequence_no: 0,
            method_a: ParsingMethod::Absolute,
            method_b: ParsingMethod::Absolute,
            strength_a: device.strength(Channel::A),
            strength_b: device.strength(Channel::B),
        }
    }

    /// Back to defaults. Called on connect, disconnect, and stop so no
    /// stale in-flight state survives a session boundary.
    pub fn reset(&mut self) {
        self.current_sequence = None;
        self.pending = PendingSeq::None;
        self.accumulated = [0; 2];
    }

    fn allocate(&mut self) -> NonZeroU8 {
        let next = self
            .current_sequence
            .map_or(1, |seq| seq.get() % SEQUENCE_NO_MAX + 1);
        // `next` is always in 1..=15.
        let seq = NonZeroU8::new(next).unwrap_or(NonZeroU8::MIN);
        self.current_sequence = Some(seq);
        seq
    }
}

fn method_for(delta: i32) -> ParsingMethod {
    match delta {
        0 => ParsingMethod::NoChange,
        d if d > 0 => ParsingMethod::Increase,
        _ => ParsingMethod::Decrease,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn negotiator() -> (StrengthNegotiator, DeviceState) {
        (StrengthNegotiator::new(TIMEOUT), DeviceState::default())
    }

    #[test]
    fn absolute_request_becomes_signed_delta() {
        let (mut negotiator, mut device) = negotiator();
        device.set_strength(Channel::A, 100);

        negotiator
            .request_absolute(Channel::A, 150, &device)
            .unwrap();

        let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
        assert_eq!(selection.sequence_no, 1);
        assert_eq!(selection.method_a, ParsingMethod::Increase);
        assert_eq!(selection.strength_a, 50);
        assert_eq!(selection.method_b, ParsingMethod::NoChange);
        assert!(!negotiator.input_allowed());

        // Optimistic fold.
        assert_eq!(device.strength(Channel::A), 150);

        negotiator.on_acknowledgment(1, 150, 0, &mut device);
        assert!(negotiator.input_allowed());
    }

    #[test]
    fn decrease_request_carries_magnitude() {
        let (mut negotiator, mut device) = negotiator();
        device.set_strength(Channel::B, 80);

        negotiator.request_absolute(Channel::B, 30, &device).unwrap();
        let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
        assert_eq!(selection.method_b, ParsingMethod::Decrease);
        assert_eq!(selection.strength_b, 50);
        assert_eq!(device.strength(Channel::B), 30);
    }

    #[test]
    fn absolute_request_out_of_range_fails() {
        let (mut negotiator, device) = negotiator();
        assert!(matches!(
            negotiator.request_absolute(Channel::A, 201, &device),
            Err(EngineError::StrengthOutOfRange { requested: 201, .. })
        ));
    }

    #[test]
    fn relative_request_out_of_range_leaves_accumulator_unchanged() {
        let (mut negotiator, mut device) = negotiator();
        device.set_strength(Channel::A, 100);

        assert!(negotiator.request_relative(Channel::A, 500, &device).is_err());
        assert!(negotiator.request_relative(Channel::A, -101, &device).is_err());

        // Nothing accumulated: the next selection is a plain absolute frame.
        let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
        assert_eq!(selection.sequence_no, 0);
        assert_eq!(selection.method_a, ParsingMethod::Absolute);
        assert_eq!(selection.strength_a, 100);
    }

    #[test]
    fn relative_requests_coalesce() {
        let (mut negotiator, mut device) = negotiator();
        device.set_strength(Channel::A, 10);

        negotiator.request_relative(Channel::A, 5, &device).unwrap();
        negotiator.request_relative(Channel::A, 7, &device).unwrap();
        negotiator.request_relative(Channel::A, -2, &device).unwrap();

        let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
        assert_eq!(selection.method_a, ParsingMethod::Increase);
        assert_eq!(selection.strength_a, 10);
    }

    #[test]
    fn awaiting_ack_emits_keepalive_frames() {
        let (mut negotiator, mut device) = negotiator();
        negotiator.request_relative(Channel::A, 20, &device).unwrap();

        let now = Instant::now();
        let first = negotiator.next_outgoing_selection(now, &mut device);
        assert_eq!(first.sequence_no, 1);

        // No acknowledgment yet: wait frames only.
        let second = negotiator.next_outgoing_selection(now, &mut device);
        assert_eq!(second.sequence_no, 0);
        assert_eq!(second.method_a, ParsingMethod::NoChange);
        assert_eq!(second.strength_a, 0);
    }

    #[test]
    fn mismatched_ack_is_ignored_but_strengths_apply() {
        let (mut negotiator, mut device) = negotiator();
        negotiator.request_relative(Channel::A, 20, &device).unwrap();
        negotiator.next_outgoing_selection(Instant::now(), &mut device);

        negotiator.on_acknowledgment(9, 77, 88, &mut device);
        assert!(!negotiator.input_allowed());
        assert_eq!(device.strength(Channel::A), 77);
        assert_eq!(device.strength(Channel::B), 88);

        negotiator.on_acknowledgment(1, 20, 0, &mut device);
        assert!(negotiator.input_allowed());
    }

    #[test]
    fn timeout_releases_pending_request() {
        let (mut negotiator, mut device) = negotiator();
        negotiator.request_relative(Channel::A, 20, &device).unwrap();

        let start = Instant::now();
        negotiator.next_outgoing_selection(start, &mut device);
        assert!(!negotiator.input_allowed());

        // Just under the timeout: still waiting.
        negotiator.check_timeout(start + Duration::from_millis(900));
        assert!(!negotiator.input_allowed());

        negotiator.check_timeout(start + Duration::from_millis(1100));
        assert!(negotiator.input_allowed());

        // Nothing accumulated anymore: behaves as if no request was pending.
        let selection =
            negotiator.next_outgoing_selection(start + Duration::from_millis(1200), &mut device);
        assert_eq!(selection.sequence_no, 0);
        assert_eq!(selection.method_a, ParsingMethod::Absolute);
    }

    #[test]
    fn deltas_accumulated_during_flight_survive_timeout() {
        let (mut negotiator, mut device) = negotiator();
        negotiator.request_relative(Channel::A, 20, &device).unwrap();

        let start = Instant::now();
        negotiator.next_outgoing_selection(start, &mut device);

        // More input arrives while the first request is in flight.
        negotiator.request_relative(Channel::A, 10, &device).unwrap();

        // The lost request times out; the coalesced delta goes out fresh.
        let selection =
            negotiator.next_outgoing_selection(start + Duration::from_secs(2), &mut device);
        assert_eq!(selection.sequence_no, 2);
        assert_eq!(selection.method_a, ParsingMethod::Increase);
        assert_eq!(selection.strength_a, 10);
    }

    #[test]
    fn sequence_numbers_cycle_one_through_fifteen() {
        let (mut negotiator, mut device) = negotiator();

        for round in 0..20u32 {
            let delta = if round % 2 == 0 { 1 } else { -1 };
            negotiator
                .request_relative(Channel::A, delta, &device)
                .unwrap();

            let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
            let expected = (round % 15) as u8 + 1;
            assert_eq!(selection.sequence_no, expected);
            assert_ne!(selection.sequence_no, 0);

            negotiator.on_acknowledgment(
                expected,
                device.strength(Channel::A),
                device.strength(Channel::B),
                &mut device,
            );
        }
    }

    #[test]
    fn reset_restores_defaults() {
        let (mut negotiator, mut device) = negotiator();
        negotiator.request_relative(Channel::A, 20, &device).unwrap();
        negotiator.next_outgoing_selection(Instant::now(), &mut device);
        negotiator.request_relative(Channel::B, 5, &device).unwrap();

        negotiator.reset();
        assert!(negotiator.input_allowed());
        assert_eq!(negotiator.pending(), PendingSeq::None);

        // Rotation also restarts.
        negotiator.request_relative(Channel::A, 1, &device).unwrap();
        let selection = negotiator.next_outgoing_selection(Instant::now(), &mut device);
        assert_eq!(selection.sequence_no, 1);
    }
}

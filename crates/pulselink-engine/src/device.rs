use pulselink_proto::{Channel, LimitFrame};

/// Soft output limits and balance tuning, carried verbatim in limit frames.
///
/// The balance bytes are device-internal parameters; the engine passes them
/// through and never computes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitParams {
    pub limit_a: u8,
    pub limit_b: u8,
    pub freq_balance_a: u8,
    pub freq_balance_b: u8,
    pub strength_balance_a: u8,
    pub strength_balance_b: u8,
}

impl Default for LimitParams {
    fn default() -> Self {
        // Device defaults: full range, centered balance.
        Self {
            limit_a: 200,
            limit_b: 200,
            freq_balance_a: 100,
            freq_balance_b: 100,
            strength_balance_a: 100,
            strength_balance_b: 100,
        }
    }
}

impl LimitParams {
    pub fn to_frame(self) -> LimitFrame {
        LimitFrame {
            limit_a: self.limit_a,
            limit_b: self.limit_b,
            freq_balance_a: self.freq_balance_a,
            freq_balance_b: self.freq_balance_b,
            strength_balance_a: self.strength_balance_a,
            strength_balance_b: self.strength_balance_b,
        }
    }
}

/// Last known device-side state for one session.
///
/// Strengths are updated optimistically when a request goes on the wire and
/// authoritatively by every decoded status frame.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    strengths: [u8; 2],
    pub limits: LimitParams,
}

impl DeviceState {
    /// Last known absolute strength of a channel.
    pub fn strength(&self, channel: Channel) -> u8 {
        self.strengths[channel.index()]
    }

    pub fn set_strength(&mut self, channel: Channel, value: u8) {
        self.strengths[channel.index()] = value;
    }

    /// Configured soft limit of a channel.
    pub fn limit(&self, channel: Channel) -> u8 {
        match channel {
            Channel::A => self.limits.limit_a,
            Channel::B => self.limits.limit_b,
        }
    }
}

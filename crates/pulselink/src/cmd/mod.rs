use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use pulselink_engine::PlaybackMode;
use pulselink_proto::{Channel, ParsingMethod};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod play;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream a waveform to the device.
    Play(PlayArgs),
    /// Build a strength frame and print its wire bytes.
    Encode(EncodeArgs),
    /// Decode a hex-encoded device frame.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Play(args) => play::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ChannelArg {
    A,
    B,
}

impl From<ChannelArg> for Channel {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::A => Channel::A,
            ChannelArg::B => Channel::B,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModeArg {
    Once,
    Loop,
}

impl From<ModeArg> for PlaybackMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Once => PlaybackMode::Once,
            ModeArg::Loop => PlaybackMode::Loop,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum MethodArg {
    NoChange,
    Increase,
    Decrease,
    Absolute,
}

impl From<MethodArg> for ParsingMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::NoChange => ParsingMethod::NoChange,
            MethodArg::Increase => ParsingMethod::Increase,
            MethodArg::Decrease => ParsingMethod::Decrease,
            MethodArg::Absolute => ParsingMethod::Absolute,
        }
    }
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Wireless bridge daemon socket path.
    #[arg(long, value_name = "PATH", conflicts_with = "relay")]
    pub bridge: Option<PathBuf>,

    /// Relay endpoint (host:port).
    #[arg(long, value_name = "ADDR")]
    pub relay: Option<String>,

    /// Waveform file: JSON array of {"frequency": [..4], "strength": [..4]}.
    /// Plays a built-in demo ramp when omitted.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Target channel for the waveform data.
    #[arg(long, default_value = "a")]
    pub channel: ChannelArg,

    /// Interpret waveform frequency values as Hz and convert to protocol
    /// units.
    #[arg(long)]
    pub hz: bool,

    /// Playback mode.
    #[arg(long, default_value = "once")]
    pub mode: ModeArg,

    /// Initial absolute strength request for the target channel (0-200).
    #[arg(long, default_value = "0")]
    pub strength: u8,

    /// Soft strength limit for both channels (0-200).
    #[arg(long, default_value = "200")]
    pub limit: u8,

    /// Stop after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Sequence number (0-15).
    #[arg(long, default_value = "0")]
    pub sequence: u8,

    /// Channel A strength parsing method.
    #[arg(long, default_value = "no-change")]
    pub method_a: MethodArg,

    /// Channel B strength parsing method.
    #[arg(long, default_value = "no-change")]
    pub method_b: MethodArg,

    /// Channel A strength field (0-200).
    #[arg(long, default_value = "0")]
    pub strength_a: u8,

    /// Channel B strength field (0-200).
    #[arg(long, default_value = "0")]
    pub strength_b: u8,

    /// Waveform frequency, protocol units, replicated across both quads.
    #[arg(long, default_value = "10")]
    pub frequency: u8,

    /// Waveform strength (0-100), replicated across both quads.
    #[arg(long, default_value = "0")]
    pub pulse_strength: u8,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded frame bytes (whitespace allowed).
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

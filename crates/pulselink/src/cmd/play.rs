use std::fs;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, info};

use pulselink_engine::{
    DeviceController, EngineObserver, FramesEvent, LimitParams, PlaybackMode, SessionConfig,
};
use pulselink_proto::{clamp_frequency, clamp_pulse_strength, hz_to_protocol, PulseOperation};
#[cfg(unix)]
use pulselink_transport::BridgeTransport;
use pulselink_transport::RelayTransport;

use crate::cmd::PlayArgs;
use crate::exit::{engine_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub fn run(args: PlayArgs, _format: OutputFormat) -> CliResult<i32> {
    if args.bridge.is_none() && args.relay.is_none() {
        return Err(CliError::new(USAGE, "pick a transport: --bridge or --relay"));
    }

    let pulses = load_waveform(&args)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|err| io_error("failed to start async runtime", err))?;
    runtime.block_on(run_session(args, pulses))
}

async fn run_session(args: PlayArgs, pulses: Vec<PulseOperation>) -> CliResult<i32> {
    let mode = PlaybackMode::from(args.mode);
    let channel = args.channel.into();

    let mut config = SessionConfig::default();
    if args.bridge.is_some() {
        // The bridge link adds no relay jitter; keep the lookahead minimal.
        config.prefetch_max = 1;
    }

    let observer = Arc::new(PlayObserver::default());
    let mut controller = DeviceController::with_observer(config, observer.clone());
    controller.configure_limits(LimitParams {
        limit_a: args.limit,
        limit_b: args.limit,
        ..LimitParams::default()
    });
    controller.set_playback_mode(mode);
    controller.set_waveform(channel, pulses);
    if args.strength > 0 {
        controller
            .request_strength_absolute(channel, args.strength)
            .map_err(|err| engine_error("invalid --strength", err))?;
    }

    if let Some(addr) = &args.relay {
        let transport = RelayTransport::connect(addr)
            .await
            .map_err(|err| transport_error("relay connect failed", err))?;
        controller.start(transport);
    } else if let Some(path) = &args.bridge {
        #[cfg(unix)]
        {
            let transport = BridgeTransport::connect(path)
                .await
                .map_err(|err| transport_error("bridge connect failed", err))?;
            controller.start(transport);
        }
        #[cfg(not(unix))]
        {
            let _ = path;
            return Err(CliError::new(
                USAGE,
                "--bridge requires a platform with Unix domain sockets",
            ));
        }
    }
    controller.set_connected(true);

    let completed = async {
        match mode {
            PlaybackMode::Once => observer.completed.notified().await,
            PlaybackMode::Loop => pending().await,
        }
    };
    let timeout = async {
        match args.duration {
            Some(secs) => time::sleep(Duration::from_secs(secs)).await,
            None => pending().await,
        }
    };

    tokio::select! {
        _ = completed => info!("playback completed"),
        _ = timeout => info!("duration elapsed"),
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                info!("interrupted");
            }
        }
    }

    controller.set_connected(false);
    controller.stop().await;
    Ok(SUCCESS)
}

#[derive(Deserialize)]
struct WaveformEntry {
    frequency: [u32; 4],
    strength: [u8; 4],
}

fn load_waveform(args: &PlayArgs) -> CliResult<Vec<PulseOperation>> {
    let Some(path) = &args.file else {
        return Ok(demo_waveform());
    };

    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    let entries: Vec<WaveformEntry> = serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            USAGE,
            format!("{} is not a valid waveform file: {err}", path.display()),
        )
    })?;

    if entries.is_empty() {
        return Err(CliError::new(USAGE, "waveform file contains no frames"));
    }

    let hz = args.hz;
    Ok(entries
        .into_iter()
        .map(|entry| PulseOperation {
            frequency: entry.frequency.map(|value| {
                if hz {
                    hz_to_protocol(value)
                } else {
                    clamp_frequency(value.min(u8::MAX as u32) as u8)
                }
            }),
            strength: entry.strength.map(clamp_pulse_strength),
        })
        .collect())
}

/// Built-in demo: a gentle triangle ramp, ~6 seconds at the 100ms cadence.
fn demo_waveform() -> Vec<PulseOperation> {
    let up = (0..30).map(|i| (i * 100 / 29) as u8);
    let down = (0..30).rev().map(|i| (i * 100 / 29) as u8);
    up.chain(down)
        .map(|strength| PulseOperation::new([50; 4], [strength; 4]))
        .collect()
}

#[derive(Default)]
struct PlayObserver {
    completed: Notify,
}

impl EngineObserver for PlayObserver {
    fn on_frames_event(&self, event: FramesEvent) {
        match event {
            FramesEvent::Completed => self.completed.notify_one(),
            FramesEvent::Looped => debug!("waveform looped"),
        }
    }

    fn on_connection_changed(&self, connected: bool) {
        info!(connected, "connection state changed");
    }

    fn on_strength_changed(&self, strength_a: u8, strength_b: u8) {
        info!(strength_a, strength_b, "device strengths");
    }
}

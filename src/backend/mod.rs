//! Backends — landmark sources and the shared frame loop.
//!
//! A backend is just a [`SampleSource`] plus the calloop run loop that
//! drives both clocks: a render timer at display rate and a detector
//! timer at sensor rate. The detector itself stays external; these
//! sources stand in for it during replay and synthetic runs.

pub mod replay;
pub mod synthetic;

use std::path::PathBuf;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use tracing::info;

use crate::config::CoreConfig;
use crate::hand::landmarks::HandSample;
use crate::ipc::server::IpcServer;
use crate::state::GroveState;

/// Render cadence (~60 Hz).
const RENDER_INTERVAL: Duration = Duration::from_micros(16_667);
/// Detector cadence (~30 Hz). The pipeline throttle is the authority;
/// this just sets how often sources are asked for frames.
const DETECTOR_INTERVAL: Duration = Duration::from_millis(33);

/// Anything that can produce landmark samples on the detector clock.
///
/// A source is polled once per detector tick and answers with at most
/// one hand; if an upstream detector ever reports several, a source must
/// pick one and drop the rest.
pub trait SampleSource {
    /// The sample for the detector tick at `now_ms`, or None for an
    /// empty frame.
    fn sample(&mut self, now_ms: f64) -> Option<HandSample>;

    /// True once the source can never produce another hand (end of a
    /// replay file). The run loop then shuts down.
    fn finished(&self) -> bool {
        false
    }
}

/// Backend type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Replay,
    Synthetic,
}

/// Options shared by every backend.
pub struct RunOptions {
    pub socket_path: PathBuf,
    pub exit_after: Option<u64>,
    pub replay_file: Option<PathBuf>,
}

/// Run the pipeline with the selected backend.
pub fn run(backend: BackendType, config: CoreConfig, options: RunOptions) -> anyhow::Result<()> {
    match backend {
        BackendType::Replay => {
            let path = options
                .replay_file
                .clone()
                .ok_or_else(|| anyhow::anyhow!("replay backend requires --replay <file>"))?;
            let source = replay::ReplaySource::from_file(&path)?;
            run_loop(source, config, options)
        }
        BackendType::Synthetic => {
            let source = synthetic::SyntheticSource::new();
            run_loop(source, config, options)
        }
    }
}

/// The shared frame loop: one executor, two timers, IPC on the side.
fn run_loop<S: SampleSource + 'static>(
    mut source: S,
    config: CoreConfig,
    options: RunOptions,
) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<GroveState>::try_new()?;
    let handle = event_loop.handle();

    let mut state = GroveState::new(config, IpcServer::new(options.socket_path.clone()));
    IpcServer::bind(&options.socket_path, &handle)?;

    // Detector tick: poll the source, feed the pipeline.
    handle.insert_source(
        Timer::immediate(),
        move |_deadline, _: &mut (), state: &mut GroveState| {
            let now = state.now_ms();
            let sample = source.sample(now);
            state.pipeline.detector_tick(now, sample);
            if source.finished() {
                info!("sample source exhausted, shutting down");
                state.running = false;
                return TimeoutAction::Drop;
            }
            TimeoutAction::ToDuration(DETECTOR_INTERVAL)
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to insert detector timer: {e}"))?;

    // Render tick: advance the scene, publish events, pump IPC.
    handle.insert_source(
        Timer::immediate(),
        |_deadline, _: &mut (), state: &mut GroveState| {
            let now = state.now_ms();
            state.pipeline.render_tick(now);
            state.publish_events();
            IpcServer::poll_clients(state);
            TimeoutAction::ToDuration(RENDER_INTERVAL)
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to insert render timer: {e}"))?;

    // Exit timer for scripted runs.
    if let Some(seconds) = options.exit_after {
        info!("will exit after {} seconds", seconds);
        handle.insert_source(
            Timer::from_duration(Duration::from_secs(seconds)),
            |_deadline, _: &mut (), state: &mut GroveState| {
                info!("exit timer fired");
                state.running = false;
                TimeoutAction::Drop
            },
        )
        .map_err(|e| anyhow::anyhow!("failed to insert exit timer: {e}"))?;
    }

    info!("entering frame loop");
    while state.running {
        event_loop.dispatch(Some(Duration::from_millis(100)), &mut state)?;
    }

    // Leave no stale socket behind.
    let _ = std::fs::remove_file(&options.socket_path);
    info!("frame loop stopped");
    Ok(())
}

//! Central state — one struct owns the pipeline, the IPC server, and the
//! run flag, passed as `&mut` to every handler.

use std::time::Instant;

use tracing::info;

use crate::config::CoreConfig;
use crate::ipc::server::IpcServer;
use crate::pipeline::Pipeline;
use crate::scene::photos::TextureHandle;

/// Everything the run loop touches.
pub struct GroveState {
    pub pipeline: Pipeline,
    pub ipc_server: IpcServer,
    /// Monotonic clock origin for both ticks.
    pub epoch: Instant,
    /// Cleared to stop the run loop.
    pub running: bool,
}

impl GroveState {
    pub fn new(config: CoreConfig, ipc_server: IpcServer) -> Self {
        let mut pipeline = Pipeline::new(config);

        // The demo shell owns no real texture uploads; mark every slot
        // ready so picking works out of the box.
        for id in 0..pipeline.photos().len() {
            pipeline.attach_photo_texture(id, TextureHandle(id as u32));
        }

        info!("grove state initialized");
        Self {
            pipeline,
            ipc_server,
            epoch: Instant::now(),
            running: true,
        }
    }

    /// Milliseconds since startup, the shared monotonic timeline.
    pub fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Drain pipeline events onto the IPC bus.
    pub fn publish_events(&mut self) {
        for event in self.pipeline.drain_events() {
            let payload = event.to_sexp();
            IpcServer::broadcast_event(&mut self.ipc_server, &payload);
        }
    }
}

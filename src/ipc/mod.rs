//! IPC control plane — Unix socket, framed s-expression protocol.

pub mod dispatch;
pub mod server;

pub use server::IpcServer;

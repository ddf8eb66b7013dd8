//! Background sync runtime: startup and periodic triggers plus a Unix-socket
//! control server, all admitted through one sync guard.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
    DaemonStatus, SyncSummary, Trigger,
};
pub use runtime::{init_tracing, run, start_blocking, SharedRemote};

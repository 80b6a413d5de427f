use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use rtbuffer_server::{BufferServer, Endpoint, ServerConfig, ShutdownHandle};
use rtbuffer_transport::host_port;
use tracing::info;

use crate::args;
use crate::error;
use crate::types::{RTB_ERR_UNKNOWN_HANDLE, RTB_OK};

fn servers() -> MutexGuard<'static, HashMap<u16, ShutdownHandle>> {
    static SERVERS: OnceLock<Mutex<HashMap<u16, ShutdownHandle>>> = OnceLock::new();
    SERVERS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Start a buffer server on all interfaces at `port` (0 picks a free port).
///
/// The server runs on background threads. Returns the bound port, or a
/// negative error code.
#[no_mangle]
pub extern "C" fn start_server(port: i32) -> i32 {
    crate::ffi_boundary(crate::types::RTB_ERR_INTERNAL, || {
        let Some(port) = args::port_arg(port, true) else {
            return crate::types::RTB_ERR_INVALID_ARGUMENT;
        };
        let endpoint = Endpoint::tcp(host_port("0.0.0.0", port));
        let server = match BufferServer::bind(&endpoint, ServerConfig::default()) {
            Ok(server) => server,
            Err(err) => return error::map_server_error(&err),
        };
        let Some(bound) = server.local_addr().map(|addr| addr.port()) else {
            return error::internal("tcp server has no local address");
        };
        match server.spawn() {
            Ok((handle, _join)) => {
                servers().insert(bound, handle);
                info!(port = bound, "buffer server started");
                i32::from(bound)
            }
            Err(err) => error::map_server_error(&err),
        }
    })
}

/// Stop accepting connections on a server started with [`start_server`].
#[no_mangle]
pub extern "C" fn rtb_stop_server(port: i32) -> i32 {
    crate::ffi_boundary(crate::types::RTB_ERR_INTERNAL, || {
        let Some(port) = args::port_arg(port, false) else {
            return crate::types::RTB_ERR_INVALID_ARGUMENT;
        };
        match servers().remove(&port) {
            Some(handle) => {
                handle.shutdown();
                RTB_OK
            }
            None => {
                error::set_error_message(format!("no server started on port {port}"));
                RTB_ERR_UNKNOWN_HANDLE
            }
        }
    })
}

use std::collections::HashMap;
use std::ffi::{c_char, c_uint, c_void};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use rtbuffer_core::{DataBlock, DataType, HeaderSpec, StoreError, WaitThreshold};
use rtbuffer_server::BufferClient;
use rtbuffer_transport::host_port;

use crate::args::{self, write_out};
use crate::error;
use crate::types::{RTB_ERR_INTERNAL, RTB_ERR_INVALID_ARGUMENT, RTB_ERR_UNKNOWN_HANDLE, RTB_OK};

type SharedClient = Arc<Mutex<BufferClient>>;

fn connections() -> MutexGuard<'static, HashMap<i32, SharedClient>> {
    static CONNECTIONS: OnceLock<Mutex<HashMap<i32, SharedClient>>> = OnceLock::new();
    CONNECTIONS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

static NEXT_HANDLE: AtomicI32 = AtomicI32::new(1);

/// Run `f` on the client behind `handle`.
///
/// The registry lock is released before `f` runs, so a blocked wait on one
/// connection never stalls the others.
fn with_client(handle: i32, f: impl FnOnce(&mut BufferClient) -> i32) -> i32 {
    let Some(client) = connections().get(&handle).cloned() else {
        error::set_error_message(format!("unknown connection handle {handle}"));
        return RTB_ERR_UNKNOWN_HANDLE;
    };
    let mut client = client
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut client)
}

fn datatype_arg(tag: u32) -> Result<DataType, i32> {
    DataType::from_tag(tag).map_err(|err| {
        error::set_error_message(err.to_string());
        crate::types::buffer_error(err.code())
    })
}

fn store_error(err: StoreError) -> i32 {
    error::set_error_message(err.to_string());
    crate::types::buffer_error(err.code())
}

/// Connect to a buffer at `hostname:port`.
///
/// Returns a positive connection handle, or a negative error code.
///
/// # Safety
/// `hostname` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn open_connection(hostname: *const c_char, port: i32) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        // SAFETY: Caller guarantees `hostname` is a valid C string.
        let Some(hostname) = (unsafe { args::required_str_arg(hostname, "hostname") }) else {
            return RTB_ERR_INVALID_ARGUMENT;
        };
        let Some(port) = args::port_arg(port, false) else {
            return RTB_ERR_INVALID_ARGUMENT;
        };
        match BufferClient::connect(&host_port(hostname, port)) {
            Ok(client) => {
                let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
                connections().insert(handle, Arc::new(Mutex::new(client)));
                handle
            }
            Err(err) => error::map_server_error(&err),
        }
    })
}

#[no_mangle]
pub extern "C" fn close_connection(handle: i32) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || match connections().remove(&handle) {
        Some(_) => RTB_OK,
        None => {
            error::set_error_message(format!("unknown connection handle {handle}"));
            RTB_ERR_UNKNOWN_HANDLE
        }
    })
}

/// Read the header. Any out-pointer may be null.
///
/// Counts above `UINT_MAX` are clamped.
///
/// # Safety
/// Every non-null pointer must be valid for a write of its type.
#[no_mangle]
pub unsafe extern "C" fn read_header(
    handle: i32,
    datatype: *mut u32,
    nchans: *mut c_uint,
    fsample: *mut f32,
    nsamples: *mut c_uint,
    nevents: *mut c_uint,
) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        with_client(handle, |client| match client.get_header() {
            Ok(header) => {
                let clamp = |n: u64| c_uint::try_from(n).unwrap_or(c_uint::MAX);
                // SAFETY: Caller guarantees every non-null pointer is writable.
                unsafe {
                    write_out(datatype, header.datatype.tag());
                    write_out(nchans, header.channel_count as c_uint);
                    write_out(fsample, header.sample_rate);
                    write_out(nsamples, clamp(header.sample_count));
                    write_out(nevents, clamp(header.event_count));
                }
                RTB_OK
            }
            Err(err) => error::map_server_error(&err),
        })
    })
}

/// Copy samples `[begsample, endsample)` into `buffer`.
///
/// `buffer` must hold `(endsample - begsample) * nchans * width` bytes, with
/// `nchans` and the datatype width taken from the header.
///
/// # Safety
/// `buffer` must be valid for writes of that many bytes.
#[no_mangle]
pub unsafe extern "C" fn read_data(
    handle: i32,
    begsample: c_uint,
    endsample: c_uint,
    buffer: *mut c_void,
) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        with_client(handle, |client| {
            let block = match client.get_data(begsample as u64, endsample as u64) {
                Ok(block) => block,
                Err(err) => return error::map_server_error(&err),
            };
            if block.data.is_empty() {
                return RTB_OK;
            }
            if buffer.is_null() {
                return error::set_invalid_argument("buffer cannot be null");
            }
            // SAFETY: Caller guarantees `buffer` holds the requested samples.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    block.data.as_ptr(),
                    buffer.cast::<u8>(),
                    block.data.len(),
                );
            }
            RTB_OK
        })
    })
}

/// Define (or replace) the header. Clears all samples and events.
#[no_mangle]
pub extern "C" fn write_header(handle: i32, datatype: u32, nchans: c_uint, fsample: f32) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        let datatype = match datatype_arg(datatype) {
            Ok(datatype) => datatype,
            Err(code) => return code,
        };
        let spec = HeaderSpec::new(datatype, nchans as u32, fsample);
        if let Err(err) = spec.validate() {
            return store_error(err);
        }
        with_client(handle, |client| match client.put_header(&spec) {
            Ok(_) => RTB_OK,
            Err(err) => error::map_server_error(&err),
        })
    })
}

/// Append `nsamples` samples of `nchans` channels from `buffer`.
///
/// # Safety
/// `buffer` must be readable for `nchans * nsamples * width` bytes.
#[no_mangle]
pub unsafe extern "C" fn write_data(
    handle: i32,
    datatype: u32,
    nchans: c_uint,
    nsamples: c_uint,
    buffer: *const c_void,
) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        let datatype = match datatype_arg(datatype) {
            Ok(datatype) => datatype,
            Err(code) => return code,
        };
        let Some(len) = (nchans as usize)
            .checked_mul(nsamples as usize)
            .and_then(|n| n.checked_mul(datatype.width()))
        else {
            return error::set_invalid_argument("nchans * nsamples overflows");
        };
        // SAFETY: Caller guarantees `buffer` is readable for `len` bytes.
        let Some(bytes) = (unsafe { args::bytes_arg(buffer.cast::<u8>(), len, "buffer") }) else {
            return RTB_ERR_INVALID_ARGUMENT;
        };
        let block = match DataBlock::new(
            datatype,
            nchans as u32,
            nsamples as u64,
            Bytes::copy_from_slice(bytes),
        ) {
            Ok(block) => block,
            Err(err) => return store_error(err),
        };
        with_client(handle, |client| match client.put_data(&block) {
            Ok(_) => RTB_OK,
            Err(err) => error::map_server_error(&err),
        })
    })
}

/// Block until the buffer holds `nsamples` samples and `nevents` events,
/// the header is replaced, or `milliseconds` pass.
///
/// Returns the outcome (0 satisfied, 1 timeout, 2 header replaced) or a
/// negative error code.
#[no_mangle]
pub extern "C" fn wait_data(
    handle: i32,
    nsamples: c_uint,
    nevents: c_uint,
    milliseconds: c_uint,
) -> i32 {
    crate::ffi_boundary(RTB_ERR_INTERNAL, || {
        let threshold = WaitThreshold::new(nsamples as u64, nevents as u64);
        let timeout = Duration::from_millis(milliseconds as u64);
        with_client(handle, |client| match client.wait_data(threshold, timeout) {
            Ok(reply) => reply
                .outcome
                .wire_code()
                .and_then(|code| i32::try_from(code).ok())
                .unwrap_or(RTB_ERR_INTERNAL),
            Err(err) => error::map_server_error(&err),
        })
    })
}

//! Command codes carried in the frame header.
//!
//! The high byte groups a request with its responses: `0x01xx` writes,
//! `0x02xx` reads, `0x04xx` blocking waits. Within a group, `0x04` is the
//! success response and `0x05` the error response.

/// Replace the header (starts a new generation).
pub const PUT_HDR: u16 = 0x0101;
/// Append a block of samples.
pub const PUT_DAT: u16 = 0x0102;
/// Append one or more events.
pub const PUT_EVT: u16 = 0x0103;
/// Write succeeded.
pub const PUT_OK: u16 = 0x0104;
/// Write failed.
pub const PUT_ERR: u16 = 0x0105;

/// Read the current header.
pub const GET_HDR: u16 = 0x0201;
/// Read a range of samples.
pub const GET_DAT: u16 = 0x0202;
/// Read a range of events.
pub const GET_EVT: u16 = 0x0203;
/// Read succeeded.
pub const GET_OK: u16 = 0x0204;
/// Read failed.
pub const GET_ERR: u16 = 0x0205;

/// Block until sample/event thresholds are reached.
pub const WAIT_DAT: u16 = 0x0402;
/// Wait finished (satisfied, timed out or generation changed).
pub const WAIT_OK: u16 = 0x0404;
/// Wait could not be started.
pub const WAIT_ERR: u16 = 0x0405;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u16) -> &'static str {
    match code {
        PUT_HDR => "PUT_HDR",
        PUT_DAT => "PUT_DAT",
        PUT_EVT => "PUT_EVT",
        PUT_OK => "PUT_OK",
        PUT_ERR => "PUT_ERR",
        GET_HDR => "GET_HDR",
        GET_DAT => "GET_DAT",
        GET_EVT => "GET_EVT",
        GET_OK => "GET_OK",
        GET_ERR => "GET_ERR",
        WAIT_DAT => "WAIT_DAT",
        WAIT_OK => "WAIT_OK",
        WAIT_ERR => "WAIT_ERR",
        _ => "UNKNOWN",
    }
}

/// The error response code belonging to a request's group.
///
/// Unknown codes are answered in the read group.
pub fn error_response_for(request: u16) -> u16 {
    match request & 0xff00 {
        0x0100 => PUT_ERR,
        0x0400 => WAIT_ERR,
        _ => GET_ERR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_all_requests() {
        for code in [PUT_HDR, PUT_DAT, PUT_EVT, GET_HDR, GET_DAT, GET_EVT, WAIT_DAT] {
            assert_ne!(command_name(code), "UNKNOWN");
        }
        assert_eq!(command_name(0x0999), "UNKNOWN");
    }

    #[test]
    fn error_codes_follow_request_group() {
        assert_eq!(error_response_for(PUT_DAT), PUT_ERR);
        assert_eq!(error_response_for(GET_EVT), GET_ERR);
        assert_eq!(error_response_for(WAIT_DAT), WAIT_ERR);
        assert_eq!(error_response_for(0x0301), GET_ERR);
    }
}

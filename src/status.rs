//! Legacy status-code boundary.
//!
//! The pre-existing call-site ABI expects signed status codes: zero means
//! success, failures are negated errno values. Internally everything is
//! `Result<_, SessionError>`; this module is the one place the two meet.

use crate::errors::SessionError;

pub const OK: i32 = 0;

pub const EIO: i32 = 5;
pub const ENOMEM: i32 = 12;
pub const ENODEV: i32 = 19;
pub const EINVAL: i32 = 22;
pub const ENOSYS: i32 = 38;

/// Collapse a session result to a legacy status code.
pub fn code<T>(res: &Result<T, SessionError>) -> i32 {
    match res {
        Ok(_) => OK,
        Err(e) => -e.errno(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert_eq!(code(&Ok::<(), SessionError>(())), 0);
    }

    #[test]
    fn failures_are_negative() {
        let res: Result<(), _> = Err(SessionError::format_mismatch("bad format"));
        assert_eq!(code(&res), -EINVAL);
        let res: Result<(), _> = Err(SessionError::device_unavailable("gone"));
        assert_eq!(code(&res), -ENODEV);
    }
}

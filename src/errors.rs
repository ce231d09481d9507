//! Session error taxonomy.
//!
//! Internally errors are explicit kind+message values; at the legacy call
//! boundary they collapse to negated errno codes (see [`crate::status`]).

/// Classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Requested preview/output encoding is not the supported one. Hard
    /// failure: the whole configuration delta is discarded.
    FormatMismatch,
    /// Logical format outside the enumerated set, or jpeg requested as a
    /// streaming input.
    UnsupportedFormat,
    /// A capability-gated field's device call failed. Soft failure: other
    /// fields still process.
    HardwareRejected,
    /// Device not connected or not creatable.
    DeviceUnavailable,
    /// Operation invoked in a state that forbids it.
    SequenceError,
    /// Could not produce a configuration snapshot.
    AllocationFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn format_mismatch(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::FormatMismatch,
            message: message.into(),
        }
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::UnsupportedFormat,
            message: message.into(),
        }
    }

    pub fn hardware_rejected(field: &str) -> Self {
        Self {
            kind: SessionErrorKind::HardwareRejected,
            message: format!("device rejected {field}"),
        }
    }

    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::DeviceUnavailable,
            message: message.into(),
        }
    }

    pub fn sequence(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::SequenceError,
            message: message.into(),
        }
    }

    pub fn allocation(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::AllocationFailure,
            message: message.into(),
        }
    }

    /// The positive errno this failure maps to at the legacy boundary.
    pub fn errno(&self) -> i32 {
        match self.kind {
            SessionErrorKind::FormatMismatch | SessionErrorKind::UnsupportedFormat => {
                crate::status::EINVAL
            }
            SessionErrorKind::HardwareRejected => crate::status::EIO,
            SessionErrorKind::DeviceUnavailable => crate::status::ENODEV,
            SessionErrorKind::SequenceError => crate::status::ENOSYS,
            SessionErrorKind::AllocationFailure => crate::status::ENOMEM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = SessionError::sequence("recording requires an active preview");
        assert_eq!(err.to_string(), "recording requires an active preview");
    }

    #[test]
    fn errno_mapping_covers_every_kind() {
        assert_eq!(SessionError::format_mismatch("x").errno(), 22);
        assert_eq!(SessionError::unsupported_format("x").errno(), 22);
        assert_eq!(SessionError::hardware_rejected("zoom").errno(), 5);
        assert_eq!(SessionError::device_unavailable("x").errno(), 19);
        assert_eq!(SessionError::sequence("x").errno(), 38);
        assert_eq!(SessionError::allocation("x").errno(), 12);
    }
}

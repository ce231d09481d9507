//! camhal: session-oriented camera hardware abstraction core.
//!
//! Mediates between a camera client and a physical capture device,
//! presenting a stable session contract: configure, preview,
//! capture/record, teardown. The crate owns the session state machine,
//! parameter negotiation and validation, pixel-format reconciliation, and
//! the fan-out of each captured frame to the display surface and the
//! notification path.
//!
//! The physical device, the display surface and the callback dispatcher
//! are external collaborators, injected as trait objects (see [`device`]).
//!
//! # Usage
//! ```rust
//! use camhal::session::CameraSession;
//! use camhal::testing::{caps_with_all, FakeDevice, FakeNotifier, FakeSurface};
//!
//! let session = CameraSession::new(
//!     FakeDevice::with_sizes(&[(640, 480), (1280, 720)]),
//!     FakeSurface::default(),
//!     FakeNotifier::default(),
//!     caps_with_all(),
//! );
//! session.configure("preview-size=640x480;preview-format=yuv420sp").unwrap();
//! session.start_preview().unwrap();
//! assert!(session.is_previewing());
//! session.stop_preview();
//! session.release().unwrap();
//! ```

pub mod device;
pub mod errors;
pub mod format;
pub mod params;
pub mod session;
pub mod status;
pub mod types;

// Testing utilities - collaborator fakes for offline testing
pub mod testing;

// Re-exports for convenience
pub use device::{CaptureDevice, DeviceCapabilities, Notifier, PreviewSink};
pub use errors::{SessionError, SessionErrorKind};
pub use params::Parameters;
pub use session::CameraSession;
pub use types::{DeviceFormat, Frame, LogicalFormat, SessionState};

/// Initialize logging for the session controller
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camhal=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn crate_metadata() {
        assert_eq!(NAME, "camhal");
        assert!(!VERSION.is_empty());
    }
}

//! Collaborator capability traits.
//!
//! The session controller is constructed with trait objects for the three
//! external collaborators: the capture device, the display-surface sink and
//! the notification path. The real implementations (kernel driver, render
//! surface, callback marshalling) live outside this crate.

use crate::errors::SessionError;
use crate::types::Frame;
use serde::{Deserialize, Serialize};

/// The physical/kernel capture device.
///
/// Start/stop are synchronous: they either succeed or fail outright, with
/// no timeout. `stop` drains the device but must not wait for a delivery
/// callback to return: the session serializes frame delivery against
/// lifecycle calls itself, so a stop issued mid-delivery blocks in the
/// session, not in the device.
pub trait CaptureDevice: Send {
    fn connect(&mut self) -> Result<(), SessionError>;
    fn disconnect(&mut self) -> Result<(), SessionError>;
    fn is_connected(&self) -> bool;

    /// Start streaming at the given negotiated format.
    fn start(&mut self, width: u32, height: u32, fourcc: u32) -> Result<(), SessionError>;
    /// Drain and stop the stream.
    fn stop(&mut self) -> Result<(), SessionError>;
    fn is_started(&self) -> bool;

    /// Begin delivering frames to the session. `single_shot` yields exactly
    /// one frame before implicitly stopping (still capture).
    fn start_frame_delivery(&mut self, single_shot: bool) -> Result<(), SessionError>;
    fn stop_frame_delivery(&mut self);

    /// Clamp a requested size to the nearest hardware-supported one. Never
    /// fails; the returned size may differ from the request.
    fn fit_size(&self, width: u32, height: u32) -> (u32, u32);

    /// Capability setters. `true` on success; a `false` return becomes a
    /// soft `HardwareRejected` validation failure for that field.
    fn set_color_effect(&mut self, effect: &str) -> bool;
    fn set_white_balance(&mut self, wb: &str) -> bool;
    fn set_exposure(&mut self, ev: i32) -> bool;
    fn set_zoom(&mut self, zoom: i32) -> bool;
}

/// The on-screen rendering sink. The latency-critical, always-on consumer:
/// a declined frame aborts that frame's whole fan-out.
pub trait PreviewSink: Send {
    fn enable(&mut self, frame_rate_hint: u32) -> Result<(), SessionError>;
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;

    /// Deliver one frame for rendering. A disabled sink declines the frame
    /// but still reports `true`; `false` means the sink is not in a
    /// deliverable state (torn down mid-flight) and the frame must be
    /// dropped for all sinks.
    fn deliver_frame(&mut self, frame: &Frame) -> bool;
}

/// The callback/notification dispatcher marshalling frames and events to
/// the client, filtered by message-type enable bits and the one-shot
/// capture-armed flag.
pub trait Notifier: Send {
    fn enable_message(&mut self, msg_type: u32);
    fn disable_message(&mut self, msg_type: u32);
    fn is_message_enabled(&self, msg_type: u32) -> bool;

    fn deliver_frame(&mut self, frame: &Frame, is_recording: bool);
    fn report_device_error(&mut self, code: i32);

    /// JPEG quality for the next still capture.
    fn set_output_quality(&mut self, quality: u32);
    /// Arm (or disarm) one-shot picture handling for the next frame.
    fn set_capture_armed(&mut self, armed: bool);
    fn is_capture_armed(&self) -> bool;

    fn enable_recording(&mut self, frame_rate_hint: u32) -> Result<(), SessionError>;
    fn disable_recording(&mut self);
    fn is_recording_enabled(&self) -> bool;
    /// Client returns a retained recording buffer.
    fn release_recording_frame(&mut self, handle: u64);

    /// Frames carry metadata references to hardware-owned storage instead
    /// of pixel data.
    fn store_meta_data_in_buffers(&mut self, enable: bool) -> Result<(), SessionError>;

    /// Teardown hook; must not fail.
    fn cleanup(&mut self);
}

/// Hardware capability report used to seed the default configuration and to
/// gate the optional parameter fields.
///
/// The `supported_*`/`default_*` strings are published verbatim into the
/// parameter store (comma-separated lists, `WxH` sizes), mirroring what the
/// device's own configuration tables advertise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub supported_preview_sizes: String,
    pub default_preview_size: String,
    pub supported_picture_sizes: String,
    pub default_picture_size: String,
    pub supported_frame_rates: String,
    pub default_frame_rate: String,

    pub focus_modes: Option<CapabilityValues>,
    pub color_effects: Option<CapabilityValues>,
    pub flash_modes: Option<CapabilityValues>,
    pub scene_modes: Option<CapabilityValues>,
    pub white_balance: Option<CapabilityValues>,
    pub exposure_compensation: Option<ExposureRange>,
    pub zoom: Option<ZoomRange>,

    pub facing_front: bool,
    pub orientation: i32,
}

/// Supported values and the default for one enumerated capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityValues {
    pub supported: String,
    pub default: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureRange {
    pub min: i32,
    pub max: i32,
    pub step: String,
    pub default: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomRange {
    pub ratios: String,
    pub max: i32,
    pub default: i32,
}

impl DeviceCapabilities {
    pub fn supports_color_effect(&self) -> bool {
        self.color_effects.is_some()
    }

    pub fn supports_white_balance(&self) -> bool {
        self.white_balance.is_some()
    }

    pub fn supports_exposure_compensation(&self) -> bool {
        self.exposure_compensation.is_some()
    }

    pub fn supports_flash_mode(&self) -> bool {
        self.flash_modes.is_some()
    }

    pub fn supports_zoom(&self) -> bool {
        self.zoom.is_some()
    }
}

//! Core value types shared by the negotiator, parameter store and session
//! controller.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Client-facing pixel encodings, independent of device-native codes.
///
/// `Jpeg` is an output-only encoding: it is produced by the notification
/// path from a raw capture frame and is never streamed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalFormat {
    Yuv420Sp,
    Yuv420P,
    Rgba8888,
    Jpeg,
}

impl LogicalFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalFormat::Yuv420Sp => "yuv420sp",
            LogicalFormat::Yuv420P => "yuv420p",
            LogicalFormat::Rgba8888 => "rgba8888",
            LogicalFormat::Jpeg => "jpeg",
        }
    }

    /// Whether the device can stream this encoding natively.
    pub fn is_streamable(&self) -> bool {
        !matches!(self, LogicalFormat::Jpeg)
    }
}

impl FromStr for LogicalFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yuv420sp" => Ok(Self::Yuv420Sp),
            "yuv420p" => Ok(Self::Yuv420P),
            "rgba8888" => Ok(Self::Rgba8888),
            "jpeg" => Ok(Self::Jpeg),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for LogicalFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device-native fourcc codes.
pub mod fourcc {
    const fn code(b: &[u8; 4]) -> u32 {
        (b[0] as u32) | ((b[1] as u32) << 8) | ((b[2] as u32) << 16) | ((b[3] as u32) << 24)
    }

    /// YUV 4:2:0 semiplanar.
    pub const NV12: u32 = code(b"NV12");
    /// YUV 4:2:0 planar.
    pub const YU12: u32 = code(b"YU12");
    /// 32-bit RGBA.
    pub const RGB4: u32 = code(b"RGB4");
}

/// A negotiated (width, height, fourcc) triple. After negotiation the size
/// is always one the hardware reports as supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: u32,
}

/// Lifecycle state owned exclusively by the session controller.
///
/// `Recording` implies a live preview stream underneath; `Capturing` is
/// transient for the flight of a single still frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Previewing,
    Capturing,
    Recording,
}

impl SessionState {
    /// True in every state that implies the device stream is running.
    pub fn device_streaming(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// Frame payload: either pixel data carried inline or a reference to
/// hardware-owned storage (metadata-buffer mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Pixels(Bytes),
    MetadataHandle(u64),
}

/// A single frame delivered by the device collaborator.
///
/// Borrowed by the fan-out path for the duration of delivery; recording
/// retentions are returned through `release_recording_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub timestamp_us: u64,
    pub payload: FramePayload,
}

impl Frame {
    pub fn pixels(timestamp_us: u64, data: Bytes) -> Self {
        Self {
            timestamp_us,
            payload: FramePayload::Pixels(data),
        }
    }

    pub fn metadata(timestamp_us: u64, handle: u64) -> Self {
        Self {
            timestamp_us,
            payload: FramePayload::MetadataHandle(handle),
        }
    }

    /// True when the handle references hardware-owned storage rather than
    /// carrying pixels.
    pub fn is_metadata(&self) -> bool {
        matches!(self.payload, FramePayload::MetadataHandle(_))
    }
}

/// Message-type bits understood by the notification path.
pub mod messages {
    pub const MSG_ERROR: u32 = 0x0001;
    pub const MSG_SHUTTER: u32 = 0x0002;
    pub const MSG_FOCUS: u32 = 0x0004;
    pub const MSG_PREVIEW_FRAME: u32 = 0x0010;
    pub const MSG_VIDEO_FRAME: u32 = 0x0020;
    pub const MSG_RAW_IMAGE: u32 = 0x0080;
    pub const MSG_COMPRESSED_IMAGE: u32 = 0x0100;
    pub const MSG_ALL: u32 = 0xFFFF;
}

/// Facing of the camera module, read back through `camera_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraFacing {
    Back,
    Front,
}

/// Static per-camera info published to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub facing: CameraFacing,
    pub orientation: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_format_round_trips_through_str() {
        for fmt in [
            LogicalFormat::Yuv420Sp,
            LogicalFormat::Yuv420P,
            LogicalFormat::Rgba8888,
            LogicalFormat::Jpeg,
        ] {
            assert_eq!(fmt.as_str().parse::<LogicalFormat>(), Ok(fmt));
        }
        assert!("nv21".parse::<LogicalFormat>().is_err());
    }

    #[test]
    fn only_jpeg_is_not_streamable() {
        assert!(LogicalFormat::Yuv420Sp.is_streamable());
        assert!(LogicalFormat::Yuv420P.is_streamable());
        assert!(LogicalFormat::Rgba8888.is_streamable());
        assert!(!LogicalFormat::Jpeg.is_streamable());
    }

    #[test]
    fn fourcc_codes_are_little_endian_ascii() {
        assert_eq!(fourcc::NV12.to_le_bytes(), *b"NV12");
        assert_eq!(fourcc::YU12.to_le_bytes(), *b"YU12");
    }

    #[test]
    fn streaming_states() {
        assert!(!SessionState::Idle.device_streaming());
        assert!(SessionState::Previewing.device_streaming());
        assert!(SessionState::Capturing.device_streaming());
        assert!(SessionState::Recording.device_streaming());
    }
}

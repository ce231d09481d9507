//! Format negotiation: logical pixel format name to device-native fourcc,
//! with the requested geometry clamped to a hardware-supported size.

use crate::device::CaptureDevice;
use crate::errors::SessionError;
use crate::types::{fourcc, DeviceFormat, LogicalFormat};

/// Map a streamable logical format to its device-native fourcc.
///
/// Jpeg is a derived output encoding produced by the notification path and
/// is rejected as a streaming input.
pub fn stream_fourcc(format: LogicalFormat) -> Result<u32, SessionError> {
    match format {
        LogicalFormat::Yuv420Sp => Ok(fourcc::NV12),
        LogicalFormat::Yuv420P => Ok(fourcc::YU12),
        LogicalFormat::Rgba8888 => Ok(fourcc::RGB4),
        LogicalFormat::Jpeg => Err(SessionError::unsupported_format(
            "jpeg is output-only and cannot be streamed",
        )),
    }
}

/// Fourcc used when streaming the raw frame a jpeg picture is encoded from.
/// The encoder consumes semiplanar YUV, so still capture streams NV12.
pub fn capture_fourcc(picture_format: LogicalFormat) -> Result<u32, SessionError> {
    match picture_format {
        LogicalFormat::Jpeg | LogicalFormat::Yuv420Sp => Ok(fourcc::NV12),
        LogicalFormat::Yuv420P => Ok(fourcc::YU12),
        LogicalFormat::Rgba8888 => Ok(fourcc::RGB4),
    }
}

/// Resolve the effective device format for a requested size and logical
/// format.
///
/// The size is clamped through the device's `fit_size`, so the result may
/// differ from the request; callers must re-read it rather than assume the
/// request was honored verbatim. Pure with respect to session state: the
/// device is only queried, never started or stopped.
pub fn negotiate(
    device: &dyn CaptureDevice,
    width: u32,
    height: u32,
    format: LogicalFormat,
) -> Result<DeviceFormat, SessionError> {
    let code = stream_fourcc(format)?;
    let (width, height) = device.fit_size(width, height);
    Ok(DeviceFormat {
        width,
        height,
        fourcc: code,
    })
}

/// Parse a logical format name from the wire, rejecting unknown values at
/// the boundary.
pub fn parse_logical(name: &str) -> Result<LogicalFormat, SessionError> {
    name.parse::<LogicalFormat>()
        .map_err(|()| SessionError::unsupported_format(format!("unknown pixel format {name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    #[test]
    fn negotiate_clamps_to_supported_size() {
        let device = FakeDevice::with_sizes(&[(640, 480), (1280, 720)]);
        let fmt = negotiate(&device, 700, 500, LogicalFormat::Yuv420Sp).unwrap();
        assert_eq!((fmt.width, fmt.height), (640, 480));
        assert_eq!(fmt.fourcc, fourcc::NV12);
    }

    #[test]
    fn negotiate_passes_supported_size_through() {
        let device = FakeDevice::with_sizes(&[(640, 480), (1280, 720)]);
        let fmt = negotiate(&device, 1280, 720, LogicalFormat::Yuv420P).unwrap();
        assert_eq!((fmt.width, fmt.height), (1280, 720));
        assert_eq!(fmt.fourcc, fourcc::YU12);
    }

    #[test]
    fn jpeg_input_is_rejected() {
        let device = FakeDevice::with_sizes(&[(640, 480)]);
        let err = negotiate(&device, 640, 480, LogicalFormat::Jpeg).unwrap_err();
        assert_eq!(err.kind, crate::errors::SessionErrorKind::UnsupportedFormat);
    }

    #[test]
    fn unknown_format_names_fail_at_the_boundary() {
        assert!(parse_logical("yuv420sp").is_ok());
        assert!(parse_logical("nv21").is_err());
        assert!(parse_logical("").is_err());
    }

    #[test]
    fn jpeg_pictures_capture_as_nv12() {
        assert_eq!(capture_fourcc(LogicalFormat::Jpeg).unwrap(), fourcc::NV12);
    }
}

//! In-memory fakes of the collaborator traits for offline testing.
//!
//! Each fake records the calls it receives and exposes failure knobs so
//! tests can drive the unwinding paths. The `Arc<Mutex<_>>` impls let a
//! test keep a handle for inspection while the session owns the trait
//! object.

use crate::device::{
    CapabilityValues, CaptureDevice, DeviceCapabilities, ExposureRange, Notifier, PreviewSink,
    ZoomRange,
};
use crate::errors::SessionError;
use crate::types::{DeviceFormat, Frame};
use std::sync::{Arc, Mutex};

/// A capability report with every optional capability populated.
pub fn caps_with_all() -> DeviceCapabilities {
    DeviceCapabilities {
        supported_preview_sizes: "640x480,1280x720".to_string(),
        default_preview_size: "640x480".to_string(),
        supported_picture_sizes: "640x480,1280x720,2560x1920".to_string(),
        default_picture_size: "1280x720".to_string(),
        supported_frame_rates: "15,30".to_string(),
        default_frame_rate: "30".to_string(),
        focus_modes: Some(CapabilityValues {
            supported: "auto,fixed".to_string(),
            default: "auto".to_string(),
        }),
        color_effects: Some(CapabilityValues {
            supported: "none,mono,negative,sepia,aqua".to_string(),
            default: "none".to_string(),
        }),
        flash_modes: Some(CapabilityValues {
            supported: "off,on,auto".to_string(),
            default: "off".to_string(),
        }),
        scene_modes: Some(CapabilityValues {
            supported: "auto".to_string(),
            default: "auto".to_string(),
        }),
        white_balance: Some(CapabilityValues {
            supported: "auto,daylight,cloudy-daylight,fluorescent,incandescent".to_string(),
            default: "auto".to_string(),
        }),
        exposure_compensation: Some(ExposureRange {
            min: -4,
            max: 4,
            step: "1".to_string(),
            default: 0,
        }),
        zoom: Some(ZoomRange {
            ratios: "100,150,200".to_string(),
            max: 2,
            default: 0,
        }),
        facing_front: false,
        orientation: 0,
    }
}

/// Fake capture device tracking stream state and capability calls.
#[derive(Debug, Default)]
pub struct FakeDevice {
    supported_sizes: Vec<(u32, u32)>,

    connected: bool,
    started: bool,
    delivering: bool,
    pub single_shot: bool,

    pub fail_connect: bool,
    pub fail_disconnect: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub fail_delivery: bool,
    /// Fail only single-shot delivery, leaving continuous preview intact.
    pub fail_single_shot_delivery: bool,
    pub reject_color_effect: bool,
    pub reject_white_balance: bool,
    pub reject_exposure: bool,
    pub reject_zoom: bool,

    pub connect_count: u32,
    pub stop_count: u32,
    pub starts: Vec<DeviceFormat>,
    pub effect_calls: Vec<String>,
    pub white_balance_calls: Vec<String>,
    pub exposure_calls: Vec<i32>,
    pub zoom_calls: Vec<i32>,
}

impl FakeDevice {
    pub fn with_sizes(sizes: &[(u32, u32)]) -> Self {
        Self {
            supported_sizes: sizes.to_vec(),
            ..Self::default()
        }
    }

    /// Simulate the implicit stop after a single-shot frame is delivered.
    pub fn finish_single_shot(&mut self) {
        self.started = false;
        self.delivering = false;
        self.single_shot = false;
    }

    /// The format of the most recent `start` call.
    pub fn last_start(&self) -> Option<DeviceFormat> {
        self.starts.last().copied()
    }

    // Inherent probes so tests can inspect state through a MutexGuard
    // without importing the trait.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn delivering(&self) -> bool {
        self.delivering
    }
}

impl CaptureDevice for FakeDevice {
    fn connect(&mut self) -> Result<(), SessionError> {
        if self.fail_connect {
            return Err(SessionError::device_unavailable("fake connect failure"));
        }
        self.connected = true;
        self.connect_count += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SessionError> {
        self.connected = false;
        if self.fail_disconnect {
            return Err(SessionError::device_unavailable("fake disconnect failure"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn start(&mut self, width: u32, height: u32, fourcc: u32) -> Result<(), SessionError> {
        if self.fail_start {
            return Err(SessionError::device_unavailable("fake start failure"));
        }
        self.starts.push(DeviceFormat {
            width,
            height,
            fourcc,
        });
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.stop_count += 1;
        self.started = false;
        if self.fail_stop {
            return Err(SessionError::device_unavailable("fake stop failure"));
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn start_frame_delivery(&mut self, single_shot: bool) -> Result<(), SessionError> {
        if self.fail_delivery || (single_shot && self.fail_single_shot_delivery) {
            return Err(SessionError::device_unavailable("fake delivery failure"));
        }
        self.delivering = true;
        self.single_shot = single_shot;
        Ok(())
    }

    fn stop_frame_delivery(&mut self) {
        self.delivering = false;
    }

    fn fit_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.supported_sizes.is_empty() {
            return (width, height);
        }
        *self
            .supported_sizes
            .iter()
            .min_by_key(|(w, h)| {
                (i64::from(*w) - i64::from(width)).abs()
                    + (i64::from(*h) - i64::from(height)).abs()
            })
            .expect("non-empty size list")
    }

    fn set_color_effect(&mut self, effect: &str) -> bool {
        self.effect_calls.push(effect.to_string());
        !self.reject_color_effect
    }

    fn set_white_balance(&mut self, wb: &str) -> bool {
        self.white_balance_calls.push(wb.to_string());
        !self.reject_white_balance
    }

    fn set_exposure(&mut self, ev: i32) -> bool {
        self.exposure_calls.push(ev);
        !self.reject_exposure
    }

    fn set_zoom(&mut self, zoom: i32) -> bool {
        self.zoom_calls.push(zoom);
        !self.reject_zoom
    }
}

impl CaptureDevice for Arc<Mutex<FakeDevice>> {
    fn connect(&mut self) -> Result<(), SessionError> {
        self.lock().expect("lock poisoned").connect()
    }

    fn disconnect(&mut self) -> Result<(), SessionError> {
        self.lock().expect("lock poisoned").disconnect()
    }

    fn is_connected(&self) -> bool {
        self.lock().expect("lock poisoned").is_connected()
    }

    fn start(&mut self, width: u32, height: u32, fourcc: u32) -> Result<(), SessionError> {
        self.lock().expect("lock poisoned").start(width, height, fourcc)
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.lock().expect("lock poisoned").stop()
    }

    fn is_started(&self) -> bool {
        self.lock().expect("lock poisoned").is_started()
    }

    fn start_frame_delivery(&mut self, single_shot: bool) -> Result<(), SessionError> {
        self.lock()
            .expect("lock poisoned")
            .start_frame_delivery(single_shot)
    }

    fn stop_frame_delivery(&mut self) {
        self.lock().expect("lock poisoned").stop_frame_delivery();
    }

    fn fit_size(&self, width: u32, height: u32) -> (u32, u32) {
        self.lock().expect("lock poisoned").fit_size(width, height)
    }

    fn set_color_effect(&mut self, effect: &str) -> bool {
        self.lock().expect("lock poisoned").set_color_effect(effect)
    }

    fn set_white_balance(&mut self, wb: &str) -> bool {
        self.lock().expect("lock poisoned").set_white_balance(wb)
    }

    fn set_exposure(&mut self, ev: i32) -> bool {
        self.lock().expect("lock poisoned").set_exposure(ev)
    }

    fn set_zoom(&mut self, zoom: i32) -> bool {
        self.lock().expect("lock poisoned").set_zoom(zoom)
    }
}

/// Fake display surface. A disabled surface declines frames but still
/// reports success; `fail_delivery` simulates the torn-down fatal case.
#[derive(Debug, Default)]
pub struct FakeSurface {
    enabled: bool,
    pub fail_enable: bool,
    pub fail_delivery: bool,

    pub enable_rates: Vec<u32>,
    pub disable_count: u32,
    pub delivered: Vec<Frame>,
}

impl FakeSurface {
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl PreviewSink for FakeSurface {
    fn enable(&mut self, frame_rate_hint: u32) -> Result<(), SessionError> {
        if self.fail_enable {
            return Err(SessionError::device_unavailable("fake surface failure"));
        }
        self.enabled = true;
        self.enable_rates.push(frame_rate_hint);
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.disable_count += 1;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn deliver_frame(&mut self, frame: &Frame) -> bool {
        if self.fail_delivery {
            return false;
        }
        if self.enabled {
            self.delivered.push(frame.clone());
        }
        true
    }
}

impl PreviewSink for Arc<Mutex<FakeSurface>> {
    fn enable(&mut self, frame_rate_hint: u32) -> Result<(), SessionError> {
        self.lock().expect("lock poisoned").enable(frame_rate_hint)
    }

    fn disable(&mut self) {
        self.lock().expect("lock poisoned").disable();
    }

    fn is_enabled(&self) -> bool {
        self.lock().expect("lock poisoned").is_enabled()
    }

    fn deliver_frame(&mut self, frame: &Frame) -> bool {
        self.lock().expect("lock poisoned").deliver_frame(frame)
    }
}

/// Fake notification path recording deliveries and flag changes.
#[derive(Debug, Default)]
pub struct FakeNotifier {
    message_mask: u32,
    capture_armed: bool,
    recording: bool,
    metadata_mode: bool,

    pub fail_enable_recording: bool,
    /// Sleep inside `deliver_frame` to widen the race window for threaded
    /// tests.
    pub delivery_delay_ms: u64,

    pub output_quality: u32,
    pub recording_rates: Vec<u32>,
    pub delivered: Vec<(Frame, bool)>,
    pub device_errors: Vec<i32>,
    pub released_handles: Vec<u64>,
    pub cleanup_count: u32,
}

impl FakeNotifier {
    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn armed(&self) -> bool {
        self.capture_armed
    }

    pub fn metadata_mode(&self) -> bool {
        self.metadata_mode
    }
}

impl Notifier for FakeNotifier {
    fn enable_message(&mut self, msg_type: u32) {
        self.message_mask |= msg_type;
    }

    fn disable_message(&mut self, msg_type: u32) {
        self.message_mask &= !msg_type;
    }

    fn is_message_enabled(&self, msg_type: u32) -> bool {
        self.message_mask & msg_type == msg_type
    }

    fn deliver_frame(&mut self, frame: &Frame, is_recording: bool) {
        if self.delivery_delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.delivery_delay_ms));
        }
        self.delivered.push((frame.clone(), is_recording));
    }

    fn report_device_error(&mut self, code: i32) {
        self.device_errors.push(code);
    }

    fn set_output_quality(&mut self, quality: u32) {
        self.output_quality = quality;
    }

    fn set_capture_armed(&mut self, armed: bool) {
        self.capture_armed = armed;
    }

    fn is_capture_armed(&self) -> bool {
        self.capture_armed
    }

    fn enable_recording(&mut self, frame_rate_hint: u32) -> Result<(), SessionError> {
        if self.fail_enable_recording {
            return Err(SessionError::device_unavailable(
                "fake recording enable failure",
            ));
        }
        self.recording = true;
        self.recording_rates.push(frame_rate_hint);
        Ok(())
    }

    fn disable_recording(&mut self) {
        self.recording = false;
    }

    fn is_recording_enabled(&self) -> bool {
        self.recording
    }

    fn release_recording_frame(&mut self, handle: u64) {
        self.released_handles.push(handle);
    }

    fn store_meta_data_in_buffers(&mut self, enable: bool) -> Result<(), SessionError> {
        self.metadata_mode = enable;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.recording = false;
        self.capture_armed = false;
        self.message_mask = 0;
        self.cleanup_count += 1;
    }
}

impl Notifier for Arc<Mutex<FakeNotifier>> {
    fn enable_message(&mut self, msg_type: u32) {
        self.lock().expect("lock poisoned").enable_message(msg_type);
    }

    fn disable_message(&mut self, msg_type: u32) {
        self.lock().expect("lock poisoned").disable_message(msg_type);
    }

    fn is_message_enabled(&self, msg_type: u32) -> bool {
        self.lock().expect("lock poisoned").is_message_enabled(msg_type)
    }

    fn deliver_frame(&mut self, frame: &Frame, is_recording: bool) {
        self.lock()
            .expect("lock poisoned")
            .deliver_frame(frame, is_recording);
    }

    fn report_device_error(&mut self, code: i32) {
        self.lock().expect("lock poisoned").report_device_error(code);
    }

    fn set_output_quality(&mut self, quality: u32) {
        self.lock().expect("lock poisoned").set_output_quality(quality);
    }

    fn set_capture_armed(&mut self, armed: bool) {
        self.lock().expect("lock poisoned").set_capture_armed(armed);
    }

    fn is_capture_armed(&self) -> bool {
        self.lock().expect("lock poisoned").is_capture_armed()
    }

    fn enable_recording(&mut self, frame_rate_hint: u32) -> Result<(), SessionError> {
        self.lock()
            .expect("lock poisoned")
            .enable_recording(frame_rate_hint)
    }

    fn disable_recording(&mut self) {
        self.lock().expect("lock poisoned").disable_recording();
    }

    fn is_recording_enabled(&self) -> bool {
        self.lock().expect("lock poisoned").is_recording_enabled()
    }

    fn release_recording_frame(&mut self, handle: u64) {
        self.lock()
            .expect("lock poisoned")
            .release_recording_frame(handle);
    }

    fn store_meta_data_in_buffers(&mut self, enable: bool) -> Result<(), SessionError> {
        self.lock()
            .expect("lock poisoned")
            .store_meta_data_in_buffers(enable)
    }

    fn cleanup(&mut self) {
        self.lock().expect("lock poisoned").cleanup();
    }
}

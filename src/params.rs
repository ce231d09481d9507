//! The authoritative session configuration: a flat key/value store with a
//! `key=value;key=value` wire form, capability-derived defaults, and the
//! validate-and-merge rules applied to client deltas.
//!
//! The store itself is an immutable snapshot. A merge builds a new
//! `Parameters` from the current one; the controller swaps it in atomically
//! only when validation allows, so readers never observe a partially merged
//! configuration.

use crate::device::{CaptureDevice, DeviceCapabilities};
use crate::errors::SessionError;
use std::collections::BTreeMap;

/// Well-known parameter keys. Unknown keys pass through untouched.
pub mod keys {
    pub const PREVIEW_SIZE: &str = "preview-size";
    pub const SUPPORTED_PREVIEW_SIZES: &str = "preview-size-values";
    pub const PREVIEW_FORMAT: &str = "preview-format";
    pub const SUPPORTED_PREVIEW_FORMATS: &str = "preview-format-values";
    pub const PREVIEW_FRAME_RATE: &str = "preview-frame-rate";
    pub const SUPPORTED_PREVIEW_FRAME_RATES: &str = "preview-frame-rate-values";
    pub const PREVIEW_FPS_RANGE: &str = "preview-fps-range";
    pub const SUPPORTED_PREVIEW_FPS_RANGE: &str = "preview-fps-range-values";

    pub const PICTURE_SIZE: &str = "picture-size";
    pub const SUPPORTED_PICTURE_SIZES: &str = "picture-size-values";
    pub const PICTURE_FORMAT: &str = "picture-format";
    pub const SUPPORTED_PICTURE_FORMATS: &str = "picture-format-values";

    pub const VIDEO_SIZE: &str = "video-size";
    pub const SUPPORTED_VIDEO_SIZES: &str = "video-size-values";
    pub const VIDEO_FRAME_FORMAT: &str = "video-frame-format";
    pub const PREFERRED_PREVIEW_SIZE_FOR_VIDEO: &str = "preferred-preview-size-for-video";
    pub const RECORDING_HINT: &str = "recording-hint";

    pub const JPEG_QUALITY: &str = "jpeg-quality";
    pub const JPEG_THUMBNAIL_WIDTH: &str = "jpeg-thumbnail-width";
    pub const JPEG_THUMBNAIL_HEIGHT: &str = "jpeg-thumbnail-height";
    pub const JPEG_THUMBNAIL_QUALITY: &str = "jpeg-thumbnail-quality";
    pub const SUPPORTED_JPEG_THUMBNAIL_SIZES: &str = "jpeg-thumbnail-size-values";

    pub const ROTATION: &str = "rotation";

    pub const FOCUS_MODE: &str = "focus-mode";
    pub const SUPPORTED_FOCUS_MODES: &str = "focus-mode-values";
    pub const FOCAL_LENGTH: &str = "focal-length";

    pub const EFFECT: &str = "effect";
    pub const SUPPORTED_EFFECTS: &str = "effect-values";

    pub const FLASH_MODE: &str = "flash-mode";
    pub const SUPPORTED_FLASH_MODES: &str = "flash-mode-values";

    pub const SCENE_MODE: &str = "scene-mode";
    pub const SUPPORTED_SCENE_MODES: &str = "scene-mode-values";

    pub const WHITE_BALANCE: &str = "whitebalance";
    pub const SUPPORTED_WHITE_BALANCE: &str = "whitebalance-values";

    pub const EXPOSURE_COMPENSATION: &str = "exposure-compensation";
    pub const MIN_EXPOSURE_COMPENSATION: &str = "min-exposure-compensation";
    pub const MAX_EXPOSURE_COMPENSATION: &str = "max-exposure-compensation";
    pub const EXPOSURE_COMPENSATION_STEP: &str = "exposure-compensation-step";

    pub const ZOOM: &str = "zoom";
    pub const ZOOM_SUPPORTED: &str = "zoom-supported";
    pub const ZOOM_RATIOS: &str = "zoom-ratios";
    pub const MAX_ZOOM: &str = "max-zoom";

    pub const HORIZONTAL_VIEW_ANGLE: &str = "horizontal-view-angle";
    pub const VERTICAL_VIEW_ANGLE: &str = "vertical-view-angle";

    pub const FACING: &str = "prop-facing";
    pub const ORIENTATION: &str = "prop-orientation";
}

/// Color effect names the hardware mapping understands. Anything else is a
/// soft validation failure.
const KNOWN_EFFECTS: &[&str] = &["none", "mono", "negative", "sepia", "aqua"];

/// White balance names the hardware mapping understands.
const KNOWN_WHITE_BALANCE: &[&str] = &[
    "auto",
    "incandescent",
    "fluorescent",
    "warm-fluorescent",
    "daylight",
    "cloudy-daylight",
];

const SUPPORTED_STREAM_FORMAT: &str = "yuv420sp";
const SUPPORTED_OUTPUT_FORMAT: &str = "jpeg";
const DEFAULT_JPEG_QUALITY: u32 = 90;
const DEFAULT_FRAME_RATE: u32 = 30;

/// Flat key/value configuration snapshot. Keys are unique, insertion order
/// irrelevant; the flattened wire form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Parameters {
    map: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `key=value;key=value` wire form. Entries without a value
    /// separator are skipped.
    pub fn parse(flat: &str) -> Self {
        let mut map = BTreeMap::new();
        for entry in flat.split(';') {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((key, value)) => {
                    map.insert(key.to_string(), value.to_string());
                }
                None => {
                    log::warn!("no value separator in parameter entry {entry:?}");
                }
            }
        }
        Self { map }
    }

    /// Flatten to the wire form. Round-trips through `parse` without loss.
    pub fn flatten(&self) -> String {
        let entries: Vec<String> = self
            .map
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        entries.join(";")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    /// Parse a `WxH` size value.
    pub fn get_size(&self, key: &str) -> Option<(u32, u32)> {
        let raw = self.get(key)?;
        let (w, h) = raw.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.map.insert(key.to_string(), value.into());
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, value.to_string());
    }

    pub fn set_size(&mut self, key: &str, width: u32, height: u32) {
        self.set(key, format!("{width}x{height}"));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The frame-rate hint passed to the surface and recording paths.
    pub fn preview_frame_rate(&self) -> u32 {
        self.get_int(keys::PREVIEW_FRAME_RATE)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_FRAME_RATE)
    }

    /// JPEG quality for still capture; non-positive values fall back to the
    /// default.
    pub fn jpeg_quality(&self) -> u32 {
        match self.get_int(keys::JPEG_QUALITY) {
            Some(q) if q > 0 => q as u32,
            _ => DEFAULT_JPEG_QUALITY,
        }
    }

    /// Whether the client signalled recording intent for the next preview.
    pub fn recording_hint(&self) -> bool {
        self.get(keys::RECORDING_HINT) == Some("true")
    }

    /// Build the hardware-capability-derived default configuration.
    pub fn defaults(caps: &DeviceCapabilities) -> Self {
        let mut p = Parameters::new();

        p.set(keys::SUPPORTED_PREVIEW_SIZES, &caps.supported_preview_sizes);
        p.set(keys::SUPPORTED_VIDEO_SIZES, &caps.supported_preview_sizes);
        p.set(keys::PREVIEW_SIZE, &caps.default_preview_size);
        p.set(keys::VIDEO_SIZE, &caps.default_preview_size);
        p.set(
            keys::PREFERRED_PREVIEW_SIZE_FOR_VIDEO,
            &caps.default_preview_size,
        );
        p.set(keys::VIDEO_FRAME_FORMAT, SUPPORTED_STREAM_FORMAT);
        p.set(keys::PREVIEW_FORMAT, SUPPORTED_STREAM_FORMAT);
        p.set(keys::SUPPORTED_PREVIEW_FORMATS, SUPPORTED_STREAM_FORMAT);

        p.set(keys::SUPPORTED_PICTURE_SIZES, &caps.supported_picture_sizes);
        p.set(keys::PICTURE_SIZE, &caps.default_picture_size);
        p.set(keys::PICTURE_FORMAT, SUPPORTED_OUTPUT_FORMAT);
        p.set(keys::SUPPORTED_PICTURE_FORMATS, SUPPORTED_OUTPUT_FORMAT);

        p.set(
            keys::SUPPORTED_PREVIEW_FRAME_RATES,
            &caps.supported_frame_rates,
        );
        p.set(keys::PREVIEW_FRAME_RATE, &caps.default_frame_rate);
        p.set(keys::PREVIEW_FPS_RANGE, "15000,30000");
        p.set(keys::SUPPORTED_PREVIEW_FPS_RANGE, "(15000,30000)");

        match &caps.focus_modes {
            Some(values) => {
                p.set(keys::SUPPORTED_FOCUS_MODES, &values.supported);
                p.set(keys::FOCUS_MODE, &values.default);
            }
            None => {
                // Fixed-focus fallback so clients always see a focus mode.
                p.set(keys::SUPPORTED_FOCUS_MODES, "fixed");
                p.set(keys::FOCUS_MODE, "fixed");
                p.set(keys::FOCAL_LENGTH, "3.43");
            }
        }

        if let Some(values) = &caps.color_effects {
            p.set(keys::SUPPORTED_EFFECTS, &values.supported);
            p.set(keys::EFFECT, &values.default);
        }

        if let Some(values) = &caps.flash_modes {
            p.set(keys::SUPPORTED_FLASH_MODES, &values.supported);
            p.set(keys::FLASH_MODE, &values.default);
        }

        if let Some(values) = &caps.scene_modes {
            p.set(keys::SUPPORTED_SCENE_MODES, &values.supported);
            p.set(keys::SCENE_MODE, &values.default);
        }

        if let Some(values) = &caps.white_balance {
            p.set(keys::SUPPORTED_WHITE_BALANCE, &values.supported);
            p.set(keys::WHITE_BALANCE, &values.default);
        }

        if let Some(range) = &caps.exposure_compensation {
            p.set_int(keys::MIN_EXPOSURE_COMPENSATION, range.min.into());
            p.set_int(keys::MAX_EXPOSURE_COMPENSATION, range.max.into());
            p.set(keys::EXPOSURE_COMPENSATION_STEP, &range.step);
            p.set_int(keys::EXPOSURE_COMPENSATION, range.default.into());
        }

        if let Some(zoom) = &caps.zoom {
            p.set(keys::ZOOM_SUPPORTED, "true");
            p.set(keys::ZOOM_RATIOS, &zoom.ratios);
            p.set_int(keys::MAX_ZOOM, zoom.max.into());
            p.set_int(keys::ZOOM, zoom.default.into());
        }

        p.set_int(keys::JPEG_QUALITY, DEFAULT_JPEG_QUALITY.into());
        p.set(keys::SUPPORTED_JPEG_THUMBNAIL_SIZES, "320x240,0x0");
        p.set(keys::JPEG_THUMBNAIL_WIDTH, "320");
        p.set(keys::JPEG_THUMBNAIL_HEIGHT, "240");
        p.set(keys::JPEG_THUMBNAIL_QUALITY, "90");

        p.set_int(keys::ROTATION, 0);

        p.set(keys::HORIZONTAL_VIEW_ANGLE, "51.2");
        p.set(keys::VERTICAL_VIEW_ANGLE, "39.4");

        p.set(
            keys::FACING,
            if caps.facing_front { "front" } else { "back" },
        );
        p.set_int(keys::ORIENTATION, caps.orientation.into());

        p
    }
}

/// Result of a validate-and-merge pass that did not hard-fail.
///
/// `soft_error` carries the last `HardwareRejected` failure, if any; the
/// merged snapshot still contains every field that validated, so best-effort
/// fields land while the failure is still reported.
#[derive(Debug)]
pub struct MergeOutcome {
    pub merged: Parameters,
    pub soft_error: Option<SessionError>,
}

/// Keys interpreted by the merge rules below; everything else is preserved
/// verbatim. Gated fields stay interpreted even when the capability is
/// absent so their accept-without-effect path is explicit.
const INTERPRETED: &[&str] = &[
    keys::PREVIEW_FORMAT,
    keys::PICTURE_FORMAT,
    keys::PICTURE_SIZE,
    keys::PREVIEW_SIZE,
    keys::VIDEO_SIZE,
    keys::JPEG_QUALITY,
    keys::ROTATION,
    keys::EFFECT,
    keys::WHITE_BALANCE,
    keys::EXPOSURE_COMPENSATION,
    keys::FLASH_MODE,
    keys::ZOOM,
];

/// Validate a client delta against the current snapshot and produce the
/// merged successor.
///
/// Format mismatches are hard failures: the error propagates and the caller
/// keeps the old snapshot untouched. Capability-gated fields are best
/// effort: a failed device call skips that field, processing continues, and
/// the last such failure is reported in the outcome.
pub fn validate_and_merge(
    current: &Parameters,
    delta: &Parameters,
    device: &mut dyn CaptureDevice,
    caps: &DeviceCapabilities,
) -> Result<MergeOutcome, SessionError> {
    log_param_diff(current, delta);

    // Hard gates first: the single supported streaming and output formats.
    if let Some(fmt) = delta.get(keys::PREVIEW_FORMAT) {
        if fmt != SUPPORTED_STREAM_FORMAT {
            return Err(SessionError::format_mismatch(format!(
                "only {SUPPORTED_STREAM_FORMAT} preview is supported, got {fmt:?}"
            )));
        }
    }
    if let Some(fmt) = delta.get(keys::PICTURE_FORMAT) {
        if fmt != SUPPORTED_OUTPUT_FORMAT {
            return Err(SessionError::format_mismatch(format!(
                "only {SUPPORTED_OUTPUT_FORMAT} still pictures are supported, got {fmt:?}"
            )));
        }
    }

    let mut merged = current.clone();
    let mut soft_error = None;

    // Unknown keys are preserved but not interpreted.
    for (key, value) in delta.iter() {
        if !INTERPRETED.contains(&key) {
            merged.set(key, value);
        }
    }

    if let Some(fmt) = delta.get(keys::PREVIEW_FORMAT) {
        merged.set(keys::PREVIEW_FORMAT, fmt);
    }
    if let Some(fmt) = delta.get(keys::PICTURE_FORMAT) {
        merged.set(keys::PICTURE_FORMAT, fmt);
    }

    // Picture sizing is resolved at capture time, so the size is accepted
    // as-is when positive in both dimensions.
    if let Some((w, h)) = delta.get_size(keys::PICTURE_SIZE) {
        if w > 0 && h > 0 {
            merged.set_size(keys::PICTURE_SIZE, w, h);
        }
    }

    // Preview and video geometry is clamped to a hardware-supported size.
    for key in [keys::PREVIEW_SIZE, keys::VIDEO_SIZE] {
        if let Some((w, h)) = delta.get_size(key) {
            if w > 0 && h > 0 {
                let (w, h) = device.fit_size(w, h);
                merged.set_size(key, w, h);
            }
        }
    }

    // Out-of-range quality is silently ignored, leaving the prior value.
    if let Some(q) = delta.get_int(keys::JPEG_QUALITY) {
        if (1..=100).contains(&q) {
            merged.set_int(keys::JPEG_QUALITY, q);
        }
    }

    if let Some(rotation) = delta.get_int(keys::ROTATION) {
        if rotation >= 0 {
            merged.set_int(keys::ROTATION, rotation);
        }
    }

    // Capability-gated fields. Hardware-backed ones issue the device call
    // and soft-fail on rejection; when the capability is absent the value
    // is accepted without effect so read-back stays self-consistent.
    if let Some(effect) = delta.get(keys::EFFECT) {
        if caps.supports_color_effect() {
            if !KNOWN_EFFECTS.contains(&effect) {
                log::error!("invalid color effect {effect:?}");
                soft_error = Some(SessionError::hardware_rejected(keys::EFFECT));
            } else if device.set_color_effect(effect) {
                merged.set(keys::EFFECT, effect);
            } else {
                log::error!("device rejected color effect {effect:?}");
                soft_error = Some(SessionError::hardware_rejected(keys::EFFECT));
            }
        } else {
            merged.set(keys::EFFECT, effect);
        }
    }

    if let Some(wb) = delta.get(keys::WHITE_BALANCE) {
        if caps.supports_white_balance() {
            if !KNOWN_WHITE_BALANCE.contains(&wb) {
                log::error!("invalid white balance {wb:?}");
                soft_error = Some(SessionError::hardware_rejected(keys::WHITE_BALANCE));
            } else if device.set_white_balance(wb) {
                merged.set(keys::WHITE_BALANCE, wb);
            } else {
                log::error!("device rejected white balance {wb:?}");
                soft_error = Some(SessionError::hardware_rejected(keys::WHITE_BALANCE));
            }
        } else {
            merged.set(keys::WHITE_BALANCE, wb);
        }
    }

    if let Some(ev) = delta.get_int(keys::EXPOSURE_COMPENSATION) {
        if caps.supports_exposure_compensation() {
            let min = delta
                .get_int(keys::MIN_EXPOSURE_COMPENSATION)
                .or_else(|| current.get_int(keys::MIN_EXPOSURE_COMPENSATION))
                .unwrap_or(i64::MIN);
            let max = delta
                .get_int(keys::MAX_EXPOSURE_COMPENSATION)
                .or_else(|| current.get_int(keys::MAX_EXPOSURE_COMPENSATION))
                .unwrap_or(i64::MAX);
            // Out-of-range compensation is ignored, like quality.
            if (min..=max).contains(&ev) {
                if device.set_exposure(ev as i32) {
                    merged.set_int(keys::EXPOSURE_COMPENSATION, ev);
                } else {
                    log::error!("device rejected exposure compensation {ev}");
                    soft_error = Some(SessionError::hardware_rejected(
                        keys::EXPOSURE_COMPENSATION,
                    ));
                }
            }
        } else {
            merged.set_int(keys::EXPOSURE_COMPENSATION, ev);
        }
    }

    // Flash has no device setter; accepted into the store when supported.
    if let Some(flash) = delta.get(keys::FLASH_MODE) {
        merged.set(keys::FLASH_MODE, flash);
    }

    if let Some(zoom) = delta.get_int(keys::ZOOM) {
        if caps.supports_zoom() {
            if device.set_zoom(zoom as i32) {
                merged.set_int(keys::ZOOM, zoom);
            } else {
                log::error!("device rejected zoom {zoom}");
                soft_error = Some(SessionError::hardware_rejected(keys::ZOOM));
            }
        } else {
            merged.set_int(keys::ZOOM, zoom);
        }
    }

    Ok(MergeOutcome { merged, soft_error })
}

/// Trace changed and new keys at debug level.
fn log_param_diff(current: &Parameters, delta: &Parameters) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    for (key, value) in delta.iter() {
        match current.get(key) {
            Some(old) if old != value => {
                log::debug!("=== value changed: {key}: {old} -> {value}");
            }
            None => {
                log::debug!("+++ new parameter: {key}={value}");
            }
            _ => {}
        }
    }
}

//! The session controller: owns the lifecycle state machine, drives device
//! start/stop and surface enable/disable, and fans each delivered frame out
//! to the display surface and the notification path.
//!
//! Lifecycle calls are expected to arrive one at a time (the framework
//! boundary serializes them); frame delivery runs on the device's producer
//! flow and is concurrent with lifecycle calls. All shared state sits
//! behind mutexes acquired in a fixed order (state, device, surface,
//! notifier), and the fan-out path holds the state lock for the whole
//! synchronous delivery, so a stop call cannot return while a frame is in
//! flight.

use crate::device::{CaptureDevice, DeviceCapabilities, Notifier, PreviewSink};
use crate::errors::SessionError;
use crate::format::{capture_fourcc, negotiate, parse_logical};
use crate::params::{keys, validate_and_merge, Parameters};
use crate::types::{CameraFacing, CameraInfo, Frame, SessionState};
use std::sync::{Arc, Mutex};

struct Inner {
    state: Mutex<SessionState>,
    device: Mutex<Box<dyn CaptureDevice>>,
    surface: Mutex<Box<dyn PreviewSink>>,
    notifier: Mutex<Box<dyn Notifier>>,
    params: Mutex<Arc<Parameters>>,
    caps: DeviceCapabilities,
}

/// Handle to one camera session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CameraSession {
    inner: Arc<Inner>,
}

impl CameraSession {
    /// Construct a session around the three collaborators. The parameter
    /// store is seeded with capability-derived defaults.
    pub fn new<D, S, N>(device: D, surface: S, notifier: N, caps: DeviceCapabilities) -> Self
    where
        D: CaptureDevice + 'static,
        S: PreviewSink + 'static,
        N: Notifier + 'static,
    {
        let defaults = Parameters::defaults(&caps);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::Idle),
                device: Mutex::new(Box::new(device)),
                surface: Mutex::new(Box::new(surface)),
                notifier: Mutex::new(Box::new(notifier)),
                params: Mutex::new(Arc::new(defaults)),
                caps,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("lock poisoned")
    }

    pub fn is_previewing(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Previewing | SessionState::Recording
        )
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Current configuration snapshot. Readers never observe a partially
    /// merged configuration.
    pub fn snapshot(&self) -> Arc<Parameters> {
        self.inner.params.lock().expect("lock poisoned").clone()
    }

    /// The flattened `key=value;...` configuration string. Always returns a
    /// usable string; an empty store flattens to `""`.
    pub fn read_config(&self) -> String {
        self.snapshot().flatten()
    }

    /// Validate and merge a client-submitted delta.
    ///
    /// Format mismatches reject the whole delta and leave the store
    /// untouched. Capability-gated fields are best effort: successful ones
    /// commit even when a later field soft-fails, and the last soft failure
    /// is reported.
    pub fn configure(&self, flat_delta: &str) -> Result<(), SessionError> {
        let delta = Parameters::parse(flat_delta);
        let mut device = self.inner.device.lock().expect("lock poisoned");
        let mut params = self.inner.params.lock().expect("lock poisoned");
        let outcome = validate_and_merge(&params, &delta, device.as_mut(), &self.inner.caps)?;
        *params = Arc::new(outcome.merged);
        match outcome.soft_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Static camera info published to the client, read from the store.
    pub fn camera_info(&self) -> CameraInfo {
        let params = self.snapshot();
        let facing = match params.get(keys::FACING) {
            Some("front") => CameraFacing::Front,
            _ => CameraFacing::Back,
        };
        let orientation = params
            .get_int(keys::ORIENTATION)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(0);
        CameraInfo {
            facing,
            orientation,
        }
    }

    pub fn enable_message(&self, msg_type: u32) {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .enable_message(msg_type);
    }

    pub fn disable_message(&self, msg_type: u32) {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .disable_message(msg_type);
    }

    pub fn is_message_enabled(&self, msg_type: u32) -> bool {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .is_message_enabled(msg_type)
    }

    /// Switch frame delivery to metadata-buffer mode.
    pub fn store_meta_data_in_buffers(&self, enable: bool) -> Result<(), SessionError> {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .store_meta_data_in_buffers(enable)
    }

    /// Start (or restart) the preview stream.
    ///
    /// A running stream is drained and stopped first, so calling this twice
    /// without an intervening stop lands in the same effective device
    /// configuration as a single call. Any failure unwinds whatever was
    /// started and drops the session to `Idle`: by the time an error can
    /// surface the pre-call stream is already gone, and a stale
    /// `Previewing` would claim a stream that no longer exists.
    pub fn start_preview(&self) -> Result<(), SessionError> {
        let params = self.snapshot();
        let mut state = self.inner.state.lock().expect("lock poisoned");
        let mut device = self.inner.device.lock().expect("lock poisoned");

        if device.is_started() {
            device.stop_frame_delivery();
            if let Err(e) = device.stop() {
                log::warn!("restart: device stop failed: {e}");
            }
        }

        match self.start_preview_stream(&params, device.as_mut()) {
            Ok(()) => {
                // A restart while the recording overlay is armed keeps it
                // armed.
                if *state != SessionState::Recording {
                    *state = SessionState::Previewing;
                }
                Ok(())
            }
            Err(e) => {
                let mut notifier = self.inner.notifier.lock().expect("lock poisoned");
                if notifier.is_recording_enabled() {
                    log::warn!("preview failed while recording enabled; disabling recording");
                    notifier.disable_recording();
                }
                *state = SessionState::Idle;
                Err(e)
            }
        }
    }

    fn start_preview_stream(
        &self,
        params: &Parameters,
        device: &mut dyn CaptureDevice,
    ) -> Result<(), SessionError> {
        let mut surface = self.inner.surface.lock().expect("lock poisoned");
        surface.enable(params.preview_frame_rate())?;

        if !device.is_connected() {
            if let Err(e) = device.connect() {
                surface.disable();
                return Err(e);
            }
        }

        // Recording intent selects both the geometry source and the frame
        // format used for callback delivery.
        let recording = params.recording_hint();
        let size = if recording {
            params
                .get_size(keys::VIDEO_SIZE)
                .or_else(|| params.get_size(keys::PREVIEW_SIZE))
        } else {
            params
                .get_size(keys::PREVIEW_SIZE)
                .or_else(|| params.get_size(keys::VIDEO_SIZE))
        };
        let Some((width, height)) = size else {
            surface.disable();
            return Err(SessionError::sequence("no preview size configured"));
        };

        let format_name = if recording {
            params
                .get(keys::VIDEO_FRAME_FORMAT)
                .or_else(|| params.get(keys::PREVIEW_FORMAT))
        } else {
            params.get(keys::PREVIEW_FORMAT)
        };
        let Some(format_name) = format_name else {
            surface.disable();
            return Err(SessionError::unsupported_format("no preview format configured"));
        };
        let logical = match parse_logical(format_name) {
            Ok(f) => f,
            Err(e) => {
                surface.disable();
                return Err(e);
            }
        };
        let fmt = match negotiate(&*device, width, height, logical) {
            Ok(f) => f,
            Err(e) => {
                surface.disable();
                return Err(e);
            }
        };

        log::debug!(
            "starting camera: {}x{} -> {:?}({})",
            fmt.width,
            fmt.height,
            fmt.fourcc.to_le_bytes(),
            logical
        );
        if let Err(e) = device.start(fmt.width, fmt.height, fmt.fourcc) {
            surface.disable();
            return Err(e);
        }
        if let Err(e) = device.start_frame_delivery(false) {
            if let Err(se) = device.stop() {
                log::warn!("unwind: device stop failed: {se}");
            }
            surface.disable();
            return Err(e);
        }

        Ok(())
    }

    /// Stop the preview stream. No-op when not previewing; underlying stop
    /// failures are logged, never propagated, so teardown cannot block.
    pub fn stop_preview(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if !matches!(
            *state,
            SessionState::Previewing | SessionState::Recording
        ) {
            return;
        }

        let mut device = self.inner.device.lock().expect("lock poisoned");
        if device.is_started() {
            device.stop_frame_delivery();
            if let Err(e) = device.stop() {
                log::warn!("stop preview: device stop failed: {e}");
            }
        }
        self.inner
            .surface
            .lock()
            .expect("lock poisoned")
            .disable();

        // The recording overlay does not survive the stream it rides on.
        let mut notifier = self.inner.notifier.lock().expect("lock poisoned");
        if notifier.is_recording_enabled() {
            log::warn!("stop preview while recording enabled; disabling recording");
            notifier.disable_recording();
        }

        *state = SessionState::Idle;
    }

    /// Acquire a single still frame.
    ///
    /// Preview is suspended for the duration of the capture; the device
    /// restarts at the picture-derived frame size and delivers exactly one
    /// frame with the notifier armed. On a start failure the preview is
    /// restored if it was previously active.
    pub fn take_picture(&self) -> Result<(), SessionError> {
        // Resolve everything from the snapshot first so configuration
        // errors surface before the stream is touched.
        let params = self.snapshot();
        let Some((pic_width, pic_height)) = params.get_size(keys::PICTURE_SIZE) else {
            return Err(SessionError::sequence("no picture size configured"));
        };
        let Some(format_name) = params.get(keys::PICTURE_FORMAT) else {
            return Err(SessionError::unsupported_format("no picture format configured"));
        };
        let output = parse_logical(format_name)?;
        let fourcc = capture_fourcc(output)?;
        let quality = params.jpeg_quality();

        if self.state() == SessionState::Capturing {
            return Err(SessionError::sequence("capture already in flight"));
        }

        let preview_was_on = self.is_previewing();
        if preview_was_on {
            self.stop_preview();
        }

        let res = self.start_capture_stream(pic_width, pic_height, fourcc, quality);
        if res.is_err() && preview_was_on {
            if let Err(e) = self.start_preview() {
                log::warn!("failed to restore preview after capture failure: {e}");
            }
        }
        res
    }

    fn start_capture_stream(
        &self,
        pic_width: u32,
        pic_height: u32,
        fourcc: u32,
        quality: u32,
    ) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        let mut device = self.inner.device.lock().expect("lock poisoned");

        // The device must be stopped before the single-shot restart.
        if device.is_started() {
            log::warn!("device still started before capture");
            device.stop_frame_delivery();
            if let Err(e) = device.stop() {
                log::warn!("pre-capture device stop failed: {e}");
            }
        }

        // Hide the surface for the duration of the capture.
        self.inner
            .surface
            .lock()
            .expect("lock poisoned")
            .disable();

        if !device.is_connected() {
            device.connect()?;
        }

        // The capture streams raw at a supported size; encoding to the
        // output format and the final picture size happens downstream.
        let (frame_width, frame_height) = device.fit_size(pic_width, pic_height);
        log::debug!(
            "starting camera for picture: {pic_width}x{pic_height} -> frame {frame_width}x{frame_height}"
        );
        device.start(frame_width, frame_height, fourcc)?;

        {
            let mut notifier = self.inner.notifier.lock().expect("lock poisoned");
            notifier.set_output_quality(quality);
            notifier.set_capture_armed(true);
        }

        if let Err(e) = device.start_frame_delivery(true) {
            self.inner
                .notifier
                .lock()
                .expect("lock poisoned")
                .set_capture_armed(false);
            if let Err(se) = device.stop() {
                log::warn!("unwind: device stop failed: {se}");
            }
            return Err(e);
        }

        *state = SessionState::Capturing;
        Ok(())
    }

    /// Abort a pending still capture. Always succeeds.
    pub fn cancel_picture(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .set_capture_armed(false);
        if *state == SessionState::Capturing {
            let mut device = self.inner.device.lock().expect("lock poisoned");
            if device.is_started() {
                device.stop_frame_delivery();
                if let Err(e) = device.stop() {
                    log::warn!("cancel picture: device stop failed: {e}");
                }
            }
            *state = SessionState::Idle;
        }
    }

    /// Arm the recording fan-out. A logical overlay on Previewing: the
    /// device stream is not touched.
    pub fn start_recording(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if *state != SessionState::Previewing {
            return Err(SessionError::sequence(
                "recording requires an active preview",
            ));
        }
        let rate = self
            .inner
            .params
            .lock()
            .expect("lock poisoned")
            .preview_frame_rate();
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .enable_recording(rate)?;
        *state = SessionState::Recording;
        Ok(())
    }

    /// Disarm the recording fan-out, dropping back to plain preview.
    pub fn stop_recording(&self) -> Result<(), SessionError> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if *state != SessionState::Recording {
            return Err(SessionError::sequence("recording is not active"));
        }
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .disable_recording();
        *state = SessionState::Previewing;
        Ok(())
    }

    /// Client returns a retained recording buffer to the device.
    pub fn release_recording_frame(&self, handle: u64) {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .release_recording_frame(handle);
    }

    /// Fan a delivered frame out to the active sinks.
    ///
    /// The display surface is offered the frame first; a `false` return
    /// from it is fatal to this frame's fan-out and the notification path
    /// never sees it. Returns whether the frame reached the sinks.
    ///
    /// Called on the device's producer flow. Holding the state lock across
    /// the synchronous delivery is what makes a concurrent stop call block
    /// until the in-flight frame completes.
    pub fn on_frame_available(&self, frame: &Frame) -> bool {
        let mut state = self.inner.state.lock().expect("lock poisoned");

        {
            let mut surface = self.inner.surface.lock().expect("lock poisoned");
            if !surface.deliver_frame(frame) {
                log::warn!("display surface declined frame; dropping for all sinks");
                return false;
            }
        }

        let mut notifier = self.inner.notifier.lock().expect("lock poisoned");
        let armed = notifier.is_capture_armed();
        let recording = notifier.is_recording_enabled();
        notifier.deliver_frame(frame, recording);
        if armed {
            // That frame was the picture; the single-shot stream has
            // implicitly stopped underneath us.
            notifier.set_capture_armed(false);
            drop(notifier);
            if *state == SessionState::Capturing {
                *state = SessionState::Idle;
            }
        }
        true
    }

    /// Forward a device-reported error to the notification path.
    pub fn on_device_error(&self, code: i32) {
        self.inner
            .notifier
            .lock()
            .expect("lock poisoned")
            .report_device_error(code);
    }

    /// Tear the session down: stop preview, stop and disconnect the
    /// device, clean the notifier up. Idempotent; continues through
    /// failures, logging each and surfacing only the first, so a partial
    /// teardown never leaves the device unreachable.
    pub fn release(&self) -> Result<(), SessionError> {
        self.stop_preview();

        let mut first: Option<SessionError> = None;
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            let mut device = self.inner.device.lock().expect("lock poisoned");
            if device.is_started() {
                device.stop_frame_delivery();
                if let Err(e) = device.stop() {
                    log::warn!("release: device stop failed: {e}");
                    first.get_or_insert(e);
                }
            }
            if device.is_connected() {
                if let Err(e) = device.disconnect() {
                    log::warn!("release: device disconnect failed: {e}");
                    first.get_or_insert(e);
                }
            }
            *state = SessionState::Idle;
        }

        self.inner.notifier.lock().expect("lock poisoned").cleanup();

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

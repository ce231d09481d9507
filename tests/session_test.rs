//! Session state machine tests: preview lifecycle, recording overlay,
//! teardown, and the device-started invariant.

use camhal::session::CameraSession;
use camhal::status;
use camhal::testing::{caps_with_all, FakeDevice, FakeNotifier, FakeSurface};
use camhal::types::{fourcc, SessionState};
use camhal::SessionErrorKind;
use std::sync::{Arc, Mutex};

type Shared<T> = Arc<Mutex<T>>;

fn rig() -> (
    CameraSession,
    Shared<FakeDevice>,
    Shared<FakeSurface>,
    Shared<FakeNotifier>,
) {
    let device = Arc::new(Mutex::new(FakeDevice::with_sizes(&[
        (640, 480),
        (1280, 720),
        (2560, 1920),
    ])));
    let surface = Arc::new(Mutex::new(FakeSurface::default()));
    let notifier = Arc::new(Mutex::new(FakeNotifier::default()));
    let session = CameraSession::new(
        device.clone(),
        surface.clone(),
        notifier.clone(),
        caps_with_all(),
    );
    (session, device, surface, notifier)
}

/// The state invariant: the device stream runs exactly when the state says
/// it should.
fn assert_invariant(session: &CameraSession, device: &Shared<FakeDevice>) {
    assert_eq!(
        device.lock().unwrap().started(),
        session.state().device_streaming(),
        "device.is_started() must match state {:?}",
        session.state()
    );
}

#[test]
fn start_preview_connects_starts_and_enables_surface() {
    let (session, device, surface, _notifier) = rig();

    session.start_preview().unwrap();

    assert_eq!(session.state(), SessionState::Previewing);
    assert!(session.is_previewing());
    let dev = device.lock().unwrap();
    assert!(dev.connected());
    assert!(dev.started());
    assert!(dev.delivering());
    assert_eq!(
        dev.last_start().map(|f| (f.width, f.height, f.fourcc)),
        Some((640, 480, fourcc::NV12))
    );
    assert!(surface.lock().unwrap().enabled());
}

#[test]
fn stop_preview_when_idle_is_a_noop() {
    let (session, device, surface, _notifier) = rig();

    session.stop_preview();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!device.lock().unwrap().connected());
    assert_eq!(surface.lock().unwrap().disable_count, 0);
    assert_invariant(&session, &device);
}

#[test]
fn double_start_preview_restarts_into_the_same_configuration() {
    let (session, device, _surface, _notifier) = rig();

    session.start_preview().unwrap();
    let first = device.lock().unwrap().last_start();

    session.start_preview().unwrap();

    let dev = device.lock().unwrap();
    assert_eq!(dev.starts.len(), 2);
    assert_eq!(dev.last_start(), first);
    assert_eq!(dev.stop_count, 1);
    drop(dev);
    assert_eq!(session.state(), SessionState::Previewing);
    assert_invariant(&session, &device);
}

#[test]
fn preview_lifecycle_upholds_the_started_invariant() {
    let (session, device, _surface, _notifier) = rig();

    assert_invariant(&session, &device);
    session.start_preview().unwrap();
    assert_invariant(&session, &device);
    session.stop_preview();
    assert_invariant(&session, &device);
    session.stop_preview(); // idempotent
    assert_invariant(&session, &device);
}

#[test]
fn recording_hint_selects_video_geometry() {
    let (session, device, _surface, _notifier) = rig();
    session
        .configure("recording-hint=true;video-size=1280x720")
        .unwrap();

    session.start_preview().unwrap();

    let dev = device.lock().unwrap();
    assert_eq!(
        dev.last_start().map(|f| (f.width, f.height)),
        Some((1280, 720))
    );
}

#[test]
fn surface_enable_failure_aborts_the_start() {
    let (session, device, surface, _notifier) = rig();
    surface.lock().unwrap().fail_enable = true;

    let err = session.start_preview().unwrap_err();

    assert_eq!(err.kind, SessionErrorKind::DeviceUnavailable);
    assert_eq!(session.state(), SessionState::Idle);
    assert_invariant(&session, &device);
}

#[test]
fn device_start_failure_unwinds_the_surface() {
    let (session, device, surface, _notifier) = rig();
    device.lock().unwrap().fail_start = true;

    session.start_preview().unwrap_err();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!surface.lock().unwrap().enabled());
    assert_invariant(&session, &device);
}

#[test]
fn delivery_failure_unwinds_device_and_surface() {
    let (session, device, surface, _notifier) = rig();
    device.lock().unwrap().fail_delivery = true;

    session.start_preview().unwrap_err();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!device.lock().unwrap().started());
    assert!(!surface.lock().unwrap().enabled());
}

#[test]
fn failed_restart_drops_back_to_idle() {
    // The first start succeeded; the restart stops the old stream before
    // anything can fail, so a restart failure must not keep claiming a
    // live preview.
    let (session, device, surface, _notifier) = rig();
    session.start_preview().unwrap();
    surface.lock().unwrap().fail_enable = true;

    session.start_preview().unwrap_err();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_previewing());
    assert!(!device.lock().unwrap().started());
    assert_invariant(&session, &device);
}

#[test]
fn failed_restart_while_recording_disables_the_overlay() {
    let (session, device, _surface, notifier) = rig();
    session.start_preview().unwrap();
    session.start_recording().unwrap();
    device.lock().unwrap().fail_start = true;

    session.start_preview().unwrap_err();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!notifier.lock().unwrap().recording());
    assert_invariant(&session, &device);
}

#[test]
fn connect_failure_disables_the_surface() {
    let (session, _device, surface, _notifier) = rig();
    {
        let mut dev = _device.lock().unwrap();
        dev.fail_connect = true;
    }

    let err = session.start_preview().unwrap_err();

    assert_eq!(err.kind, SessionErrorKind::DeviceUnavailable);
    assert!(!surface.lock().unwrap().enabled());
}

#[test]
fn recording_from_idle_is_a_sequence_error() {
    // Scenario: startRecording while Idle fails and the state is unchanged.
    let (session, device, _surface, notifier) = rig();

    let err = session.start_recording().unwrap_err();

    assert_eq!(err.kind, SessionErrorKind::SequenceError);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!notifier.lock().unwrap().recording());
    assert_invariant(&session, &device);
}

#[test]
fn recording_overlays_preview_without_touching_the_device() {
    let (session, device, _surface, notifier) = rig();
    session.start_preview().unwrap();
    let starts_before = device.lock().unwrap().starts.len();

    session.start_recording().unwrap();

    assert_eq!(session.state(), SessionState::Recording);
    assert!(session.is_recording());
    assert!(session.is_previewing());
    assert!(notifier.lock().unwrap().recording());
    assert_eq!(device.lock().unwrap().starts.len(), starts_before);
    assert_eq!(notifier.lock().unwrap().recording_rates, vec![30]);

    session.stop_recording().unwrap();
    assert_eq!(session.state(), SessionState::Previewing);
    assert!(!notifier.lock().unwrap().recording());
}

#[test]
fn stop_recording_without_recording_is_a_sequence_error() {
    let (session, _device, _surface, _notifier) = rig();
    session.start_preview().unwrap();

    let err = session.stop_recording().unwrap_err();
    assert_eq!(err.kind, SessionErrorKind::SequenceError);
    assert_eq!(session.state(), SessionState::Previewing);
}

#[test]
fn recording_enable_failure_keeps_previewing() {
    let (session, _device, _surface, notifier) = rig();
    session.start_preview().unwrap();
    notifier.lock().unwrap().fail_enable_recording = true;

    session.start_recording().unwrap_err();

    assert_eq!(session.state(), SessionState::Previewing);
}

#[test]
fn stop_preview_disables_a_live_recording_overlay() {
    let (session, _device, _surface, notifier) = rig();
    session.start_preview().unwrap();
    session.start_recording().unwrap();

    session.stop_preview();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!notifier.lock().unwrap().recording());
}

#[test]
fn release_tears_everything_down_and_is_idempotent() {
    let (session, device, surface, notifier) = rig();
    session.start_preview().unwrap();

    session.release().unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    {
        let dev = device.lock().unwrap();
        assert!(!dev.started());
        assert!(!dev.connected());
    }
    assert!(!surface.lock().unwrap().enabled());
    assert_eq!(notifier.lock().unwrap().cleanup_count, 1);

    // Second release is a clean no-op.
    session.release().unwrap();
    assert_eq!(notifier.lock().unwrap().cleanup_count, 2);
}

#[test]
fn release_continues_through_failures_and_surfaces_the_first() {
    let (session, device, _surface, notifier) = rig();
    session.start_preview().unwrap();
    session.stop_preview();
    // Re-start the stream so release itself has to stop the device.
    session.start_preview().unwrap();
    device.lock().unwrap().fail_disconnect = true;

    let err = session.release().unwrap_err();

    assert_eq!(err.kind, SessionErrorKind::DeviceUnavailable);
    // Teardown still completed every step.
    assert!(!device.lock().unwrap().connected());
    assert_eq!(notifier.lock().unwrap().cleanup_count, 1);

    // Once disconnected, a retry succeeds.
    session.release().unwrap();
}

#[test]
fn status_codes_follow_the_negative_errno_convention() {
    let (session, _device, _surface, _notifier) = rig();

    let ok = session.configure("jpeg-quality=80");
    assert_eq!(status::code(&ok), status::OK);

    let bad_format = session.configure("picture-format=png");
    assert_eq!(status::code(&bad_format), -status::EINVAL);

    let bad_sequence = session.start_recording();
    assert_eq!(status::code(&bad_sequence), -status::ENOSYS);
}

#[test]
fn message_type_flags_pass_through_to_the_notifier() {
    use camhal::types::messages;
    let (session, _device, _surface, _notifier) = rig();

    assert!(!session.is_message_enabled(messages::MSG_PREVIEW_FRAME));
    session.enable_message(messages::MSG_PREVIEW_FRAME | messages::MSG_SHUTTER);
    assert!(session.is_message_enabled(messages::MSG_PREVIEW_FRAME));
    assert!(session.is_message_enabled(messages::MSG_SHUTTER));
    session.disable_message(messages::MSG_SHUTTER);
    assert!(!session.is_message_enabled(messages::MSG_SHUTTER));
}

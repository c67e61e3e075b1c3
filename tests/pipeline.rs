use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use stickup_core::backends::virtual_input::VirtualSource;
use stickup_core::catalog::gamepad;
use stickup_core::{
    Device, EventFilter, FilteredListener, ForgetReason, Manager, PollWorker, Seeker, SeekerError,
    SeekerEvent, Settings, TracingLogger, Transport, WorkerEvent,
};

fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

#[test]
fn settings_file_drives_retry_budget_and_replug_recovers() {
    let settings = Settings::from_toml_str(
        r#"
        [seeker]
        scan_interval_ms = 20
        setup_attempts = 2
        "#,
    )
    .unwrap();

    let source = VirtualSource::new();
    let control = source.control();
    let pad = control.plug_pad(0x045e, 0x028e, Transport::Usb);
    control.fail_setup(pad.id(), 10);

    let mut seeker =
        Seeker::with_pressable_config(source, settings.seeker, settings.pressable).unwrap();
    let t0 = Instant::now();

    assert!(seeker.seek_at(at(t0, 0)).unwrap().is_empty());
    assert_eq!(seeker.attempts_left(pad.id()), Some(1));
    // Not due yet: no second attempt.
    seeker.seek_at(at(t0, 10)).unwrap();
    assert_eq!(control.setup_calls(pad.id()), 1);

    let events = seeker.seek_at(at(t0, 20)).unwrap();
    assert!(matches!(
        events.as_slice(),
        [SeekerEvent::Forgotten { reason: ForgetReason::Troubled(_), .. }]
    ));
    for ms in (40..200).step_by(20) {
        seeker.seek_at(at(t0, ms)).unwrap();
    }
    assert_eq!(control.setup_calls(pad.id()), 2);
    assert!(seeker.is_troubled(pad.id()));

    control.replug(pad.id());
    control.fail_setup(pad.id(), 0);
    let events = seeker.seek_at(at(t0, 200)).unwrap();
    assert!(matches!(
        events.as_slice(),
        [SeekerEvent::Discovered { peripheral, .. }] if peripheral == pad.id()
    ));
}

#[test]
fn callback_failure_surfaces_on_the_next_seek() {
    let source = VirtualSource::new();
    let control = source.control();
    let info = control.describe_unplugged(1, 2, Transport::Bluetooth);
    let mut seeker = Seeker::new(source, Settings::default().seeker).unwrap();
    let t0 = Instant::now();
    seeker.seek_at(t0).unwrap();

    let notifier = seeker.notifier();
    let callback = std::thread::spawn(move || {
        notifier.attached(info);
        notifier.guard(|_| Err::<(), _>("device arrival handler failed"));
    });
    callback.join().unwrap();

    match seeker.seek_at(at(t0, 1)) {
        Err(SeekerError::Callback(message)) => {
            assert_eq!(message, "device arrival handler failed")
        }
        other => panic!("expected a callback error, got {other:?}"),
    }
    // The discovery made before the failure is delivered on the next call.
    let events = seeker.seek_at(at(t0, 2)).unwrap();
    assert!(matches!(events.as_slice(), [SeekerEvent::Discovered { .. }]));
}

#[test]
fn manager_feeds_listeners_and_worker_takes_over_polling() {
    let source = VirtualSource::new();
    let control = source.control();
    let pad = control.plug_pad(0x054c, 0x09cc, Transport::Usb);

    let discovered = Arc::new(Mutex::new(Vec::new()));
    let sink = discovered.clone();
    let mut manager =
        Manager::new().with_seeker(Seeker::new(source, Settings::default().seeker).unwrap());
    manager.add_listener(TracingLogger::new(), EventFilter::All, None);
    manager.add_listener(
        FilteredListener::new(
            |e: &SeekerEvent| matches!(e, SeekerEvent::Discovered { .. }),
            move |e: &SeekerEvent| sink.lock().push(e.peripheral().cloned()),
        ),
        EventFilter::All,
        None,
    );

    manager.tick().unwrap();
    assert_eq!(discovered.lock().as_slice(), &[Some(pad.id().clone())]);
    assert!(manager.device_mut(pad.id()).is_some());

    // A host can also poll a standalone device on the worker thread.
    let mut device = pad.clone().into_device(Settings::default().pressable).unwrap();
    device.watch_button(&gamepad::SOUTH).unwrap();
    let worker = PollWorker::new(&Settings::default().worker).unwrap();
    let key = worker.add(Box::new(device)).unwrap();
    let events = worker.events();

    let connected = events
        .recv_timeout(Duration::from_secs(5))
        .map(|e| matches!(e, WorkerEvent::Device { key: k, .. } if k == key))
        .unwrap_or(false);
    assert!(connected);
}

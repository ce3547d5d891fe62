use nunchuk_bridge::nunchuk::{
    decode, Axis, Button, ChannelSink, EventSink, InputDevice, InputEvent, NunchukError,
    PollEngine, ProtocolTiming, Session, SessionState, Transport, TransportError,
    EVENTS_PER_SAMPLE,
};
use nunchuk_bridge::PartialFramePolicy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const FRAME: [u8; 6] = [0x14, 0x72, 0x0A, 0x0A, 0x9A, 0x0A];

/// Transport replying with a fixed number of bytes of `FRAME`
#[derive(Clone)]
struct ScriptedTransport {
    calls: Arc<AtomicUsize>,
    first_call: Arc<Mutex<Option<Instant>>>,
    reply_len: usize,
}

impl ScriptedTransport {
    fn new(reply_len: usize) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            first_call: Arc::new(Mutex::new(None)),
            reply_len,
        }
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.first_call
            .lock()
            .unwrap()
            .get_or_insert_with(Instant::now);
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.touch();
        Ok(bytes.len())
    }

    fn write_byte(&mut self, _byte: u8) -> Result<(), TransportError> {
        self.touch();
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        self.touch();
        buffer[..self.reply_len].copy_from_slice(&FRAME[..self.reply_len]);
        Ok(self.reply_len)
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<InputEvent>>>,
    syncs: Arc<AtomicUsize>,
}

impl EventSink for RecordingSink {
    fn report_axis(&mut self, axis: Axis, value: u16) {
        self.events.lock().unwrap().push(InputEvent::Axis { axis, value });
    }

    fn report_button(&mut self, button: Button, pressed: bool) {
        self.events
            .lock()
            .unwrap()
            .push(InputEvent::Button { button, pressed });
    }

    fn sync(&mut self) {
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_timing() -> ProtocolTiming {
    ProtocolTiming {
        settle: Duration::from_micros(100),
        poll_interval: Duration::from_millis(1),
    }
}

fn session(transport: ScriptedTransport, sink: impl EventSink + 'static) -> Session {
    Session::new(PollEngine::create(
        Box::new(transport),
        Box::new(sink),
        fast_timing(),
        PartialFramePolicy::Drop,
    ))
}

fn wait_for(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_start_begins_polling_and_stop_quiesces() {
    let transport = ScriptedTransport::new(6);
    let calls = transport.calls.clone();
    let sink = RecordingSink::default();
    let syncs = sink.syncs.clone();
    let mut session = session(transport, sink);

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert!(wait_for(Duration::from_secs(1), || syncs.load(Ordering::SeqCst) >= 3));

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    let calls_at_stop = calls.load(Ordering::SeqCst);
    let syncs_at_stop = syncs.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(calls.load(Ordering::SeqCst), calls_at_stop);
    assert_eq!(syncs.load(Ordering::SeqCst), syncs_at_stop);
}

#[test]
fn test_first_bus_call_within_one_cycle() {
    let transport = ScriptedTransport::new(6);
    let first_call = transport.first_call.clone();
    let calls = transport.calls.clone();
    let mut session = session(transport, RecordingSink::default());
    // thread spawn and scheduling jitter
    let slack = Duration::from_millis(50);

    let started = Instant::now();
    session.start().unwrap();
    assert!(wait_for(fast_timing().cycle_budget() + slack, || {
        calls.load(Ordering::SeqCst) > 0
    }));
    session.stop().unwrap();

    let first = first_call.lock().unwrap().expect("transport was never called");
    assert!(first.duration_since(started) <= fast_timing().cycle_budget() + slack);
}

#[test]
fn test_decoded_sample_reaches_sink_in_order() {
    let sink = RecordingSink::default();
    let events = sink.events.clone();
    let syncs = sink.syncs.clone();
    let mut session = session(ScriptedTransport::new(6), sink);

    session.start().unwrap();
    assert!(wait_for(Duration::from_secs(1), || syncs.load(Ordering::SeqCst) >= 1));
    session.stop().unwrap();

    let expected = decode(&FRAME);
    let events = events.lock().unwrap();
    assert_eq!(
        events[..7],
        [
            InputEvent::Axis { axis: Axis::X, value: u16::from(expected.stick_x) },
            InputEvent::Axis { axis: Axis::Y, value: u16::from(expected.stick_y) },
            InputEvent::Axis { axis: Axis::TiltX, value: expected.accel_x },
            InputEvent::Axis { axis: Axis::TiltY, value: expected.accel_y },
            InputEvent::Axis { axis: Axis::Z, value: expected.accel_z },
            InputEvent::Button { button: Button::C, pressed: expected.button_c },
            InputEvent::Button { button: Button::Z, pressed: expected.button_z },
        ]
    );
}

#[test]
fn test_double_start_keeps_single_worker() {
    let mut session = session(ScriptedTransport::new(6), RecordingSink::default());

    session.start().unwrap();
    assert!(matches!(session.start(), Err(NunchukError::AlreadyRunning)));
    session.stop().unwrap();

    // stop twice is harmless
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_short_reads_keep_session_alive() {
    let transport = ScriptedTransport::new(4);
    let calls = transport.calls.clone();
    let sink = RecordingSink::default();
    let syncs = sink.syncs.clone();
    let mut session = session(transport, sink);

    session.start().unwrap();
    // three bus operations per cycle, plus a handshake every tenth
    assert!(wait_for(Duration::from_secs(1), || calls.load(Ordering::SeqCst) >= 30));
    assert!(session.is_running());
    session.stop().unwrap();

    assert_eq!(syncs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_input_device_tracks_readers() {
    let transport = ScriptedTransport::new(6);
    let calls = transport.calls.clone();
    let mut device = InputDevice::new(session(transport, RecordingSink::default()));

    device.open().unwrap();
    device.open().unwrap();
    assert_eq!(device.readers(), 2);
    assert!(device.session().is_running());

    device.close().unwrap();
    assert!(device.session().is_running());

    device.close().unwrap();
    assert_eq!(device.readers(), 0);
    assert!(!device.session().is_running());

    let calls_after_close = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(calls.load(Ordering::SeqCst), calls_after_close);

    // reopening restarts polling
    device.open().unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        calls.load(Ordering::SeqCst) > calls_after_close
    }));
    device.close().unwrap();
}

#[test]
fn test_channel_sink_end_to_end() {
    let (sink, mut packets) = ChannelSink::new(8);
    let mut session = session(ScriptedTransport::new(6), sink);

    session.start().unwrap();
    let packet = packets.blocking_recv().unwrap();
    session.stop().unwrap();

    assert_eq!(packet.events.len(), EVENTS_PER_SAMPLE);
    assert_eq!(
        packet.events[0],
        InputEvent::Axis { axis: Axis::X, value: 26 }
    );
}

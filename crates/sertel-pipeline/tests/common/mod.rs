#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use sertel_frame::{encode_frame, FrameLayout, Packet, CHANNELS};
use sertel_transport::{ByteSource, DatagramSink, TransportError};

/// Serves scripted chunks, then behaves like a quiet serial line: every read
/// times out until the source is closed.
pub struct ScriptedSource {
    chunks: VecDeque<Vec<u8>>,
    timeout: Duration,
    closed: bool,
}

impl ScriptedSource {
    pub fn new(bytes: Vec<u8>, chunk: usize) -> Self {
        Self {
            chunks: bytes.chunks(chunk).map(<[u8]>::to_vec).collect(),
            timeout: Duration::from_millis(1),
            closed: false,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> sertel_transport::Result<usize> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let Some(mut chunk) = self.chunks.pop_front() else {
            std::thread::sleep(self.timeout);
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            self.chunks.push_front(chunk);
        }
        Ok(n)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> sertel_transport::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn reset_input(&mut self) -> sertel_transport::Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Cloneable in-memory log; optionally slow to finish each line.
#[derive(Clone, Default)]
pub struct SharedLog {
    data: Arc<Mutex<Vec<u8>>>,
    delay: Option<Duration>,
}

impl SharedLog {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(delay) = self.delay.filter(|_| buf.contains(&b'\n')) {
            std::thread::sleep(delay);
        }
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects every datagram sent to it.
#[derive(Clone, Default)]
pub struct Collector {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl DatagramSink for Collector {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.lines
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }
}

pub fn packet(sequence: u32, timestamp: u32, first: f32) -> Packet {
    Packet {
        sequence,
        timestamp,
        readings: std::array::from_fn(|i| first + i as f32),
    }
}

/// A leading stop marker (so the first frame is emitted) followed by one
/// default-layout frame per packet.
pub fn wire(packets: &[Packet]) -> Vec<u8> {
    let layout = FrameLayout::default();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(layout.stop_marker());
    for packet in packets {
        encode_frame(packet, &layout, &mut buf);
    }
    buf.to_vec()
}

pub fn ramp_line(sequence: u32, timestamp: u32, values: [f32; CHANNELS]) -> String {
    let mut line = format!("{sequence},{timestamp}");
    for value in values {
        line.push_str(&format!(",{value:.2}"));
    }
    line
}

/// Poll `condition` until it holds or `limit` passes.
pub async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub const CONFIG: &str = r#"
[frame]
read_timeout = "2ms"

[sampler]
interval = "10ms"
collector = "127.0.0.1:8089"

[shutdown]
grace = "2s"

[[streams]]
name = "hv"
port = "/dev/ttyACM0"
raw_log = "hv_raw.log"
calibrated_log = "hv_cal.log"
scale = [2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]
offset = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]

[[streams]]
name = "lv"
port = "/dev/ttyACM1"
raw_log = "lv_raw.log"
calibrated_log = "lv_cal.log"
"#;

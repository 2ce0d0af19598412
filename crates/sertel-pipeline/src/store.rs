use std::sync::{Mutex, PoisonError};

use sertel_frame::CHANNELS;

/// The latest calibrated record of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub readings: [f32; CHANNELS],
    /// Board timestamp (ms) of the packet these readings came from.
    pub timestamp: u32,
    /// Number of updates applied so far; zero until the first packet.
    pub revision: u64,
}

impl Sample {
    /// Whether any packet has been published yet.
    pub fn is_populated(&self) -> bool {
        self.revision > 0
    }
}

/// Single-slot, last-write-wins cache shared between one processor and the
/// sampler.
///
/// `update` and `read` are atomic with respect to each other: a reader never
/// observes readings from one packet paired with the timestamp of another.
#[derive(Debug, Default)]
pub struct SampleStore {
    slot: Mutex<Sample>,
}

impl SampleStore {
    /// A store holding zeros, timestamp 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace readings and timestamp together.
    pub fn update(&self, readings: [f32; CHANNELS], timestamp: u32) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.readings = readings;
        slot.timestamp = timestamp;
        slot.revision += 1;
    }

    /// Copy the current contents.
    pub fn read(&self) -> Sample {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

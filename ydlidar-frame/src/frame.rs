use crate::sample::{RawSample, MAX_SCAN_NODES};

/// Samples of one rotation, in acquisition order.
///
/// The storage is allocated once with room for [`MAX_SCAN_NODES`] samples and
/// reused for every rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    samples: Vec<RawSample>,
}

impl Frame {
    pub fn new() -> Frame {
        Frame {
            samples: Vec::with_capacity(MAX_SCAN_NODES),
        }
    }

    pub fn from_samples(samples: &[RawSample]) -> Frame {
        let mut frame = Frame::new();
        for sample in samples.iter().take(MAX_SCAN_NODES) {
            frame.samples.push(*sample);
        }
        frame
    }

    /// Appends a sample. Returns `false` when the frame is full.
    pub fn push(&mut self, sample: RawSample) -> bool {
        if self.samples.len() >= self.capacity() {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn copy_from(&mut self, other: &Frame) {
        self.samples.clear();
        self.samples.extend_from_slice(&other.samples);
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_SCAN_NODES
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}

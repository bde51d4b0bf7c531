use ydlidar_data::Sample;

/// Reorders one revolution by ascending angle.
///
/// The sort is stable, so samples sharing an angle keep their arrival order
/// and a second call changes nothing.
pub fn ascend_scan_data(samples: &mut [Sample]) {
    samples.sort_by_key(|s| s.angle_q6);
}

/// Samples of the revolution being received.
pub(crate) struct Revolution {
    samples: Vec<Sample>,
    capacity: usize,
    dropped: u64,
}

impl Revolution {
    pub(crate) fn new(capacity: usize) -> Revolution {
        Revolution {
            samples: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Adds one sample. A sync sample closes the running revolution, which is
    /// returned when it holds anything. Samples received before the first
    /// sync belong to no revolution and are ignored.
    pub(crate) fn push(&mut self, sample: Sample) -> Option<Vec<Sample>> {
        if sample.sync {
            let done = std::mem::replace(&mut self.samples, Vec::with_capacity(self.capacity));
            self.samples.push(sample);
            return match done.is_empty() {
                true => None,
                false => Some(done),
            };
        }
        if self.samples.is_empty() {
            return None;
        }
        if self.samples.len() >= self.capacity {
            self.dropped += 1;
            return None;
        }
        self.samples.push(sample);
        None
    }

    /// Forgets the partial revolution, e.g. after the link was lost.
    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    /// Samples dropped so far because a revolution was full.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}

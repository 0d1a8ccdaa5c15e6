//! Ring buffer for rolling averages

pub struct RingBuffer<T> {
    samples: Vec<T>,
    capacity: usize,
    index: usize,
}

impl<T: Clone + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            index: 0,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.index] = sample;
        }
        self.index = (self.index + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// Specialize for f64 (usage averages)
impl RingBuffer<f64> {
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum: f64 = self.samples.iter().sum();
        sum / self.samples.len() as f64
    }

    pub fn min_max(&self) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for &s in &self.samples {
            min = min.min(s);
            max = max.max(s);
        }
        (min, max)
    }
}

// Specialize for usize (byte counts)
impl RingBuffer<usize> {
    pub fn average(&self) -> usize {
        if self.samples.is_empty() {
            return 0;
        }

        let sum: usize = self.samples.iter().sum();
        sum / self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer() {
        let mut buffer = RingBuffer::new(3);

        buffer.push(10.0);
        assert_eq!(buffer.average(), 10.0);

        buffer.push(20.0);
        assert_eq!(buffer.average(), 15.0);

        buffer.push(30.0);
        assert_eq!(buffer.average(), 20.0);

        // Should wrap around
        buffer.push(40.0);
        assert_eq!(buffer.average(), 30.0); // (20 + 30 + 40) / 3
    }
}

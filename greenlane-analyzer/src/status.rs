use std::collections::VecDeque;

/// Number of recent inference timings averaged in the engine status.
pub const INFERENCE_WINDOW: usize = 10;

/// Rolling record of inference durations.
#[derive(Clone, Debug, Default)]
pub struct InferenceStats {
    recent_ms: VecDeque<f64>,
    total: u64,
}

impl InferenceStats {
    pub fn record(&mut self, elapsed_ms: f64) {
        if self.recent_ms.len() == INFERENCE_WINDOW {
            self.recent_ms.pop_front();
        }
        self.recent_ms.push_back(elapsed_ms);
        self.total += 1;
    }

    /// Mean of the most recent timings, `0.0` before the first inference.
    pub fn average_ms(&self) -> f64 {
        if self.recent_ms.is_empty() {
            return 0.0;
        }
        self.recent_ms.iter().sum::<f64>() / self.recent_ms.len() as f64
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = InferenceStats::default();
        assert_eq!(stats.average_ms(), 0.0);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_average_covers_recent_window_only() {
        let mut stats = InferenceStats::default();
        for _ in 0..5 {
            stats.record(1000.0);
        }
        for _ in 0..INFERENCE_WINDOW {
            stats.record(10.0);
        }
        assert_eq!(stats.average_ms(), 10.0);
        assert_eq!(stats.total(), 15);
    }

    #[test]
    fn test_partial_window_average() {
        let mut stats = InferenceStats::default();
        stats.record(100.0);
        stats.record(200.0);
        assert_eq!(stats.average_ms(), 150.0);
    }
}

// SPDX-License-Identifier: MIT

//! Exponentially-weighted moving average, shared between the bus's
//! `averageResponseTime` and the scheduler's historical-success-rate
//! (spec §4.C / §4.F).

#[derive(Debug, Clone, Copy)]
pub struct Ewma {
    alpha: f64,
    value: Option<f64>,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        Self { alpha: alpha.clamp(0.0, 1.0), value: None }
    }

    pub fn observe(&mut self, sample: f64) {
        self.value = Some(match self.value {
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
            None => sample,
        });
    }

    pub fn value(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

impl Default for Ewma {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[derive(Debug, Default, Clone)]
pub struct BusMetrics {
    pub message_count: u64,
    pub failure_count: u64,
    pub average_response_time_ms: Ewma,
    pub per_recipient_counts: std::collections::BTreeMap<String, u64>,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self { average_response_time_ms: Ewma::new(0.3), ..Default::default() }
    }

    pub fn record_delivery(&mut self, recipient_address: &str) {
        self.message_count += 1;
        *self.per_recipient_counts.entry(recipient_address.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn record_response_time(&mut self, elapsed_ms: u64) {
        self.average_response_time_ms.observe(elapsed_ms as f64);
    }

    pub fn failure_rate(&self) -> f64 {
        if self.message_count == 0 {
            return 0.0;
        }
        self.failure_count as f64 / self.message_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_first_sample_is_exact() {
        let mut e = Ewma::new(0.3);
        e.observe(100.0);
        assert_eq!(e.value(), 100.0);
    }

    #[test]
    fn ewma_converges_toward_repeated_sample() {
        let mut e = Ewma::new(0.5);
        e.observe(100.0);
        e.observe(0.0);
        e.observe(0.0);
        e.observe(0.0);
        assert!(e.value() < 20.0);
    }

    #[test]
    fn failure_rate_is_zero_with_no_traffic() {
        let m = BusMetrics::new();
        assert_eq!(m.failure_rate(), 0.0);
    }
}

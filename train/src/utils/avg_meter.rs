use crate::common::*;

pub const AVG_METER_WINDOW: usize = 40;

/// Running mean over the most recent values.
#[derive(Debug, Clone)]
pub struct AvgMeter {
    window: usize,
    values: VecDeque<f64>,
}

impl Default for AvgMeter {
    fn default() -> Self {
        Self::new(AVG_METER_WINDOW)
    }
}

impl AvgMeter {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::new(),
        }
    }

    pub fn update(&mut self, value: f64) {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the window, or NaN when nothing is recorded.
    pub fn show(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }
}

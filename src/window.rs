//! Fixed-capacity FIFO series used for short-term charting

use std::collections::VecDeque;

use crate::{Metric, Sample};

/// Ordered sequence of at most `max_points` values, oldest evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow<T> {
    max_points: usize,
    values: VecDeque<T>,
}

impl<T: Clone> RollingWindow<T> {
    /// # Panics
    ///
    /// Panics if `max_points` is zero.
    pub fn new(max_points: usize) -> Self {
        assert!(max_points > 0, "rolling window needs room for one point");
        Self {
            max_points,
            values: VecDeque::with_capacity(max_points),
        }
    }

    pub fn push(&mut self, value: T) {
        if self.values.len() >= self.max_points {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Chronologically ordered copy of the window.
    pub fn values(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.values.back()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }
}

/// One rolling window per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStore {
    cpu: RollingWindow<f64>,
    ram: RollingWindow<f64>,
    disk: RollingWindow<f64>,
}

impl WindowStore {
    pub fn new(max_points: usize) -> Self {
        Self {
            cpu: RollingWindow::new(max_points),
            ram: RollingWindow::new(max_points),
            disk: RollingWindow::new(max_points),
        }
    }

    pub fn push(&mut self, metric: Metric, value: f64) {
        self.window_mut(metric).push(value);
    }

    /// Push every metric of `sample`.
    pub fn record(&mut self, sample: &Sample) {
        for metric in Metric::ALL {
            self.push(metric, sample.value(metric));
        }
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.window(metric).values()
    }

    pub fn window(&self, metric: Metric) -> &RollingWindow<f64> {
        match metric {
            Metric::Cpu => &self.cpu,
            Metric::Ram => &self.ram,
            Metric::Disk => &self.disk,
        }
    }

    fn window_mut(&mut self, metric: Metric) -> &mut RollingWindow<f64> {
        match metric {
            Metric::Cpu => &mut self.cpu,
            Metric::Ram => &mut self.ram,
            Metric::Disk => &mut self.disk,
        }
    }
}

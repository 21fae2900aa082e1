//! Fixed-capacity history of pointing-ray impact points.

use std::collections::VecDeque;

use crate::blackboard::Vec3;

/// Ring buffer of the most recent impact points, oldest first.
#[derive(Debug, Clone)]
pub struct ImpactHistory {
    points: VecDeque<Vec3>,
    capacity: usize,
}

impl ImpactHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, dropping the oldest one when full.
    pub fn push(&mut self, point: Vec3) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn latest(&self) -> Option<Vec3> {
        self.points.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.points.iter()
    }

    pub fn centroid(&self) -> Option<Vec3> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let sum = self.points.iter().fold(Vec3::ZERO, |acc, p| acc + *p);
        Some(Vec3::new(sum.x / n, sum.y / n, sum.z / n))
    }

    /// Diagonal of the axis-aligned box around all points.
    pub fn diameter(&self) -> Option<f64> {
        let first = *self.points.front()?;
        let (lo, hi) = self
            .points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(lo.distance(&hi))
    }

    /// True once the buffer is full and every point fits inside a box whose
    /// diagonal is at most `max_diameter`.
    pub fn is_stable(&self, max_diameter: f64) -> bool {
        self.is_full() && self.diameter().is_some_and(|d| d <= max_diameter)
    }
}

//! Footprint comparison between dynamic and fixed record layouts.
//!
//! [`DynPoint`] stores its fields in a name-keyed map, so new fields can be
//! attached at runtime and every instance pays for the table and its key
//! strings. [`FixedPoint`] declares its fields up front and occupies exactly
//! its inline size. [`benchmark_layouts`] builds a population of each and
//! reports the per-instance and total footprint difference.

use std::collections::HashMap;
use std::fmt;
use std::hint::black_box;
use std::mem;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

/// Estimated footprint of a value: its inline size plus owned heap bytes.
pub trait DeepSize {
    /// Bytes occupied by the value itself and everything it owns.
    fn deep_size(&self) -> usize;
}

/// A 3-D point whose fields live in a name-keyed map.
///
/// Any field name can be attached after construction; each instance carries
/// its own table and key strings.
#[derive(Debug, Clone, PartialEq)]
pub struct DynPoint {
    fields: HashMap<String, f64>,
}

impl DynPoint {
    /// Create a point with the conventional `x`, `y`, `z` fields.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let mut fields = HashMap::with_capacity(3);
        fields.insert("x".to_string(), x);
        fields.insert("y".to_string(), y);
        fields.insert("z".to_string(), z);
        Self { fields }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// Set a field, attaching it if absent. New fields grow the footprint.
    pub fn set(&mut self, field: impl Into<String>, value: f64) {
        self.fields.insert(field.into(), value);
    }

    /// Number of attached fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

impl DeepSize for DynPoint {
    fn deep_size(&self) -> usize {
        // Each table slot holds a (key, value) pair plus one control byte;
        // key strings own their bytes separately.
        let slot = mem::size_of::<(String, f64)>() + 1;
        let table = self.fields.capacity() * slot;
        let keys: usize = self.fields.keys().map(String::capacity).sum();
        mem::size_of::<Self>() + table + keys
    }
}

/// A 3-D point with a fixed field layout.
///
/// The field set is closed at compile time, so an instance is exactly three
/// floats with no per-instance bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPoint {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
    /// Depth component.
    pub z: f64,
}

impl FixedPoint {
    /// Create a point from its three components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl DeepSize for FixedPoint {
    fn deep_size(&self) -> usize {
        mem::size_of::<Self>()
    }
}

/// Measured footprint and build times for one layout comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutReport {
    /// Instances built per layout.
    pub instances: usize,
    /// Estimated bytes per dynamic instance.
    pub dynamic_bytes_each: usize,
    /// Estimated bytes per fixed instance.
    pub fixed_bytes_each: usize,
    /// Estimated total bytes for the dynamic population.
    pub dynamic_total_bytes: usize,
    /// Estimated total bytes for the fixed population.
    pub fixed_total_bytes: usize,
    /// Wall time to build the dynamic population, in milliseconds.
    pub dynamic_build_ms: f64,
    /// Wall time to build the fixed population, in milliseconds.
    pub fixed_build_ms: f64,
}

impl LayoutReport {
    /// How many times larger a dynamic instance is than a fixed one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.fixed_bytes_each == 0 {
            return 0.0;
        }
        self.dynamic_bytes_each as f64 / self.fixed_bytes_each as f64
    }

    /// Total bytes saved by the fixed layout across the population.
    #[must_use]
    pub fn saved_bytes(&self) -> usize {
        self.dynamic_total_bytes
            .saturating_sub(self.fixed_total_bytes)
    }
}

impl fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instances: dynamic {} B each, fixed {} B each ({:.1}x)",
            self.instances,
            self.dynamic_bytes_each,
            self.fixed_bytes_each,
            self.ratio()
        )
    }
}

/// Build `count` instances of each layout and measure the footprint gap.
///
/// Every instance carries the same three fields, so the per-instance
/// estimate from one sample holds for the whole population.
#[must_use]
pub fn benchmark_layouts(count: usize) -> LayoutReport {
    debug!(count, "building dynamic population");
    let mut v = 0.0_f64;
    let started = Instant::now();
    let dynamic: Vec<DynPoint> = (0..count)
        .map(|_| {
            v += 1.0;
            DynPoint::new(v, v + 1.0, v + 2.0)
        })
        .collect();
    let dynamic_build = started.elapsed();
    let dynamic = black_box(dynamic);

    debug!(count, "building fixed population");
    let mut v = 0.0_f64;
    let started = Instant::now();
    let fixed: Vec<FixedPoint> = (0..count)
        .map(|_| {
            v += 1.0;
            FixedPoint::new(v, v + 1.0, v + 2.0)
        })
        .collect();
    let fixed_build = started.elapsed();
    let fixed = black_box(fixed);

    let dynamic_bytes_each = dynamic
        .first()
        .map_or_else(|| DynPoint::new(0.0, 0.0, 0.0).deep_size(), DeepSize::deep_size);
    let fixed_bytes_each = fixed
        .first()
        .copied()
        .unwrap_or_else(|| FixedPoint::new(0.0, 0.0, 0.0))
        .deep_size();

    LayoutReport {
        instances: count,
        dynamic_bytes_each,
        fixed_bytes_each,
        dynamic_total_bytes: dynamic_bytes_each.saturating_mul(count),
        fixed_total_bytes: fixed_bytes_each.saturating_mul(count),
        dynamic_build_ms: dynamic_build.as_secs_f64() * 1_000.0,
        fixed_build_ms: fixed_build.as_secs_f64() * 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_footprint_is_inline_only() {
        let point = FixedPoint::new(1.0, 2.0, 3.0);
        assert_eq!(point.deep_size(), mem::size_of::<FixedPoint>());
        assert_eq!(point.deep_size(), 24);
    }

    #[test]
    fn test_dyn_point_costs_more_than_fixed() {
        let dynamic = DynPoint::new(1.0, 2.0, 3.0);
        let fixed = FixedPoint::new(1.0, 2.0, 3.0);
        assert!(dynamic.deep_size() > fixed.deep_size());
    }

    #[test]
    fn test_dyn_point_field_access() {
        let mut point = DynPoint::new(1.0, 2.0, 3.0);

        assert_eq!(point.get("y"), Some(2.0));
        assert_eq!(point.get("w"), None);

        point.set("y", 9.0);
        assert_eq!(point.get("y"), Some(9.0));
        assert_eq!(point.field_count(), 3);
    }

    #[test]
    fn test_attaching_a_field_grows_the_footprint() {
        let mut point = DynPoint::new(1.0, 2.0, 3.0);
        let before = point.deep_size();

        point.set("w", 4.0);

        assert_eq!(point.field_count(), 4);
        assert!(point.deep_size() > before);
    }

    #[test]
    fn test_benchmark_report_shape() {
        let report = benchmark_layouts(100);

        assert_eq!(report.instances, 100);
        assert_eq!(report.fixed_bytes_each, mem::size_of::<FixedPoint>());
        assert_eq!(report.fixed_total_bytes, report.fixed_bytes_each * 100);
        assert!(report.ratio() > 1.0);
        assert!(report.saved_bytes() > 0);
    }

    #[test]
    fn test_benchmark_handles_zero_instances() {
        let report = benchmark_layouts(0);

        assert_eq!(report.instances, 0);
        assert_eq!(report.dynamic_total_bytes, 0);
        assert_eq!(report.fixed_total_bytes, 0);
        assert!(report.ratio() > 1.0);
    }

    #[test]
    fn test_report_display() {
        let report = LayoutReport {
            instances: 10,
            dynamic_bytes_each: 120,
            fixed_bytes_each: 24,
            dynamic_total_bytes: 1_200,
            fixed_total_bytes: 240,
            dynamic_build_ms: 0.5,
            fixed_build_ms: 0.1,
        };

        assert_eq!(
            report.to_string(),
            "10 instances: dynamic 120 B each, fixed 24 B each (5.0x)"
        );
    }

    #[test]
    fn test_report_serializes() {
        let report = benchmark_layouts(10);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["instances"], 10);
        assert!(value["dynamic_bytes_each"].as_u64().unwrap() > 0);
    }
}

//! Defines cost model.
//!
//! A [`Cost`] has three dimensions, row count, cpu and io. Comparisons only look at row count,
//! the other two are carried along for arithmetic and diagnostics. A different objective can be
//! plugged in by implementing [`CostModel`].

use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::Add;

use crate::plan::PlanNode;

mod volcano;
pub use volcano::*;

/// Tolerance used by [`Cost::is_eq_with_epsilon`].
pub const COST_EPSILON: f64 = 1.0e-5;

#[derive(Copy, Clone, Debug)]
pub struct Cost {
    rows: f64,
    cpu: f64,
    io: f64,
}

impl Cost {
    pub const ZERO: Cost = Cost::new(0.0, 0.0, 0.0);
    pub const TINY: Cost = Cost::new(1.0, 1.0, 0.0);
    pub const HUGE: Cost = Cost::new(f64::MAX, f64::MAX, f64::MAX);
    pub const INFINITY: Cost = Cost::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);

    pub const fn new(rows: f64, cpu: f64, io: f64) -> Self {
        Self { rows, cpu, io }
    }

    pub fn rows(&self) -> f64 {
        self.rows
    }

    pub fn cpu(&self) -> f64 {
        self.cpu
    }

    pub fn io(&self) -> f64 {
        self.io
    }

    pub fn is_infinite(&self) -> bool {
        self.rows.is_infinite() || self.cpu.is_infinite() || self.io.is_infinite()
    }

    /// Strictly cheaper than `other`.
    ///
    /// Only row count takes part in the comparison.
    pub fn is_lt(&self, other: &Cost) -> bool {
        self.rows < other.rows
    }

    pub fn is_le(&self, other: &Cost) -> bool {
        self == other || self.rows <= other.rows
    }

    pub fn is_eq_with_epsilon(&self, other: &Cost) -> bool {
        self == other
            || ((self.rows - other.rows).abs() < COST_EPSILON
                && (self.cpu - other.cpu).abs() < COST_EPSILON
                && (self.io - other.io).abs() < COST_EPSILON)
    }

    pub fn plus(&self, other: &Cost) -> Cost {
        if self.is_infinite() || other.is_infinite() {
            return Cost::INFINITY;
        }
        Cost::new(
            self.rows + other.rows,
            self.cpu + other.cpu,
            self.io + other.io,
        )
    }

    pub fn minus(&self, other: &Cost) -> Cost {
        if *self == Cost::INFINITY {
            return *self;
        }
        Cost::new(
            self.rows - other.rows,
            self.cpu - other.cpu,
            self.io - other.io,
        )
    }

    pub fn multiply_by(&self, factor: f64) -> Cost {
        if *self == Cost::INFINITY {
            return *self;
        }
        Cost::new(self.rows * factor, self.cpu * factor, self.io * factor)
    }

    /// Geometric mean of the ratios of every dimension where both sides are finite and non-zero.
    pub fn divide_by(&self, other: &Cost) -> f64 {
        let mut product = 1.0;
        let mut n = 0;
        for (this, that) in [
            (self.rows, other.rows),
            (self.cpu, other.cpu),
            (self.io, other.io),
        ] {
            if this != 0.0 && this.is_finite() && that != 0.0 && that.is_finite() {
                product *= this / that;
                n += 1;
            }
        }

        if n == 0 {
            1.0
        } else {
            product.powf(1.0 / n as f64)
        }
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cpu == other.cpu && self.io == other.io
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Self) -> Self::Output {
        self.plus(&rhs)
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Cost::ZERO, |acc, c| acc.plus(&c))
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if *self == Cost::INFINITY {
            write!(f, "{{inf}}")
        } else if *self == Cost::HUGE {
            write!(f, "{{huge}}")
        } else {
            write!(f, "{{{} rows, {} cpu, {} io}}", self.rows, self.cpu, self.io)
        }
    }
}

/// Cost factory and comparator used by planners.
///
/// Planners never compare [`Cost`]s directly, they go through [`CostModel::is_lt`], so that a
/// model can change the objective without touching the planner.
pub trait CostModel: Debug {
    fn make_cost(&self, rows: f64, cpu: f64, io: f64) -> Cost {
        Cost::new(rows, cpu, io)
    }

    fn make_huge_cost(&self) -> Cost {
        Cost::HUGE
    }

    fn make_infinite_cost(&self) -> Cost {
        Cost::INFINITY
    }

    fn make_tiny_cost(&self) -> Cost {
        Cost::TINY
    }

    fn make_zero_cost(&self) -> Cost {
        Cost::ZERO
    }

    fn is_lt(&self, a: &Cost, b: &Cost) -> bool {
        a.is_lt(b)
    }

    /// Estimate cost of current operator without accumulating children's cost.
    ///
    /// `rows` is the estimated output row count of `node`, `input_rows` the estimates of its
    /// inputs in order.
    fn self_cost(&self, node: &PlanNode, rows: f64, input_rows: &[f64]) -> Cost;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs() -> Vec<Cost> {
        vec![
            Cost::ZERO,
            Cost::TINY,
            Cost::new(10.0, 3.0, 0.0),
            Cost::new(10.0, 30.0, 1.0),
            Cost::new(250.0, 1.0, 7.0),
            Cost::HUGE,
            Cost::INFINITY,
        ]
    }

    #[test]
    fn test_is_lt_is_asymmetric() {
        for a in costs() {
            for b in costs() {
                if a.is_lt(&b) {
                    assert!(!b.is_lt(&a), "{} < {} and {} < {}", a, b, b, a);
                }
            }
        }
    }

    #[test]
    fn test_comparison_only_uses_rows() {
        let cheap_cpu = Cost::new(10.0, 1.0, 0.0);
        let expensive_cpu = Cost::new(10.0, 1000.0, 50.0);
        assert!(!cheap_cpu.is_lt(&expensive_cpu));
        assert!(!expensive_cpu.is_lt(&cheap_cpu));
        assert!(cheap_cpu.is_le(&expensive_cpu));
        assert!(expensive_cpu.is_le(&cheap_cpu));
    }

    #[test]
    fn test_plus_and_multiply_keep_non_negative() {
        for a in costs() {
            for b in costs() {
                let sum = a.plus(&b);
                assert!(sum.rows() >= 0.0 && sum.cpu() >= 0.0 && sum.io() >= 0.0);
            }
            let scaled = a.multiply_by(2.5);
            assert!(scaled.rows() >= 0.0 && scaled.cpu() >= 0.0 && scaled.io() >= 0.0);
        }
    }

    #[test]
    fn test_infinity_dominates() {
        for a in costs() {
            assert_eq!(Cost::INFINITY, a.plus(&Cost::INFINITY));
            assert_eq!(Cost::INFINITY, Cost::INFINITY.plus(&a));
            assert!(!Cost::INFINITY.is_lt(&a));
        }
        assert!(Cost::HUGE.is_lt(&Cost::INFINITY));
        assert!(Cost::new(f64::INFINITY, 0.0, 0.0).is_infinite());
        assert_eq!(Cost::INFINITY, Cost::INFINITY.minus(&Cost::TINY));
    }

    #[test]
    fn test_divide_by() {
        let a = Cost::new(8.0, 2.0, 0.0);
        let b = Cost::new(2.0, 1.0, 5.0);
        // io is skipped since one side is zero, sqrt(4 * 2)
        assert!((a.divide_by(&b) - 8f64.sqrt()).abs() < COST_EPSILON);
        assert_eq!(1.0, Cost::ZERO.divide_by(&Cost::TINY));
        assert_eq!(1.0, Cost::INFINITY.divide_by(&Cost::TINY));
    }

    #[test]
    fn test_eq_with_epsilon() {
        let a = Cost::new(1.0, 2.0, 3.0);
        let b = Cost::new(1.0 + 1.0e-7, 2.0 - 1.0e-7, 3.0);
        assert!(a.is_eq_with_epsilon(&b));
        assert_ne!(a, b);
        assert!(!a.is_eq_with_epsilon(&Cost::new(1.1, 2.0, 3.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!("{inf}", Cost::INFINITY.to_string());
        assert_eq!("{huge}", Cost::HUGE.to_string());
        assert_eq!("{1 rows, 1 cpu, 0 io}", Cost::TINY.to_string());
    }

    #[test]
    fn test_sum() {
        let total: Cost = vec![Cost::TINY, Cost::TINY, Cost::new(3.0, 0.0, 2.0)]
            .into_iter()
            .sum();
        assert_eq!(Cost::new(5.0, 2.0, 2.0), total);
    }
}

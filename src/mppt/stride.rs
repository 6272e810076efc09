//! Stride strategies: how far a hill-climbing algorithm moves per cycle.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SimError;
use crate::mppt::Observation;

/// Smallest stride any strategy returns (V).
pub const MIN_STRIDE: f64 = 0.01;
/// Default MPP voltage estimate per series cell (V).
pub const VMPP_PER_CELL: f64 = 0.621;
/// Error margin `k` of the adaptive and optimal strides.
pub const ERROR_MARGIN: f64 = 0.05;

/// Below this power change the bisection stride ignores the slope (W).
const MIN_POWER_DIFF: f64 = 0.01;
/// Below this voltage change the bisection stride ignores the slope (V).
const MIN_VOLTAGE_DIFF: f64 = 0.001;
/// Scales a positive slope into a stride.
const SLOPE_MULTIPLIER: f64 = 0.01;

/// Stride strategy variants selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrideKind {
    /// Constant [`MIN_STRIDE`].
    #[default]
    Fixed,
    /// Exponential in the distance below the MPP estimate.
    Adaptive,
    /// Linear in the distance to the MPP estimate.
    Optimal,
    /// Driven by the measured dP/dV slope.
    Bisection,
}

impl StrideKind {
    /// Accepted configuration names.
    pub const NAMES: &[&str] = &["fixed", "adaptive", "optimal", "bisection"];

    /// Configuration name of this strategy.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Adaptive => "adaptive",
            Self::Optimal => "optimal",
            Self::Bisection => "bisection",
        }
    }
}

impl fmt::Display for StrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrideKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "adaptive" => Ok(Self::Adaptive),
            "optimal" => Ok(Self::Optimal),
            "bisection" => Ok(Self::Bisection),
            _ => Err(SimError::unknown("stride", s, Self::NAMES)),
        }
    }
}

/// A stride strategy with its MPP estimate and private slope memory.
///
/// # Examples
///
/// ```
/// use pv_sim::mppt::Observation;
/// use pv_sim::mppt::stride::{Stride, StrideKind, MIN_STRIDE};
///
/// let mut stride = Stride::new(StrideKind::Fixed, 1);
/// let obs = Observation::new(0.3, 6.0, 1000.0, 25.0);
/// assert_eq!(stride.stride(&obs), MIN_STRIDE);
/// ```
#[derive(Debug, Clone)]
pub struct Stride {
    kind: StrideKind,
    default_vmpp: f64,
    vmpp: f64,
    v_old: f64,
    p_old: f64,
}

impl Stride {
    /// Creates a stride for a string of `num_cells` cells.
    pub fn new(kind: StrideKind, num_cells: u32) -> Self {
        let default_vmpp = VMPP_PER_CELL * f64::from(num_cells.max(1));
        Self {
            kind,
            default_vmpp,
            vmpp: default_vmpp,
            v_old: 0.0,
            p_old: 0.0,
        }
    }

    /// Strategy variant.
    pub fn kind(&self) -> StrideKind {
        self.kind
    }

    /// Current MPP voltage estimate (V).
    pub fn vmpp_estimate(&self) -> f64 {
        self.vmpp
    }

    /// Replaces the MPP voltage estimate, e.g. after a global search.
    pub fn seed(&mut self, vmpp: f64) {
        self.vmpp = vmpp;
    }

    /// Stores `obs` as the slope reference without producing a stride.
    pub fn prime(&mut self, obs: &Observation) {
        self.v_old = obs.voltage;
        self.p_old = obs.power();
    }

    /// Restores the default estimate and clears the slope memory.
    pub fn reset(&mut self) {
        self.vmpp = self.default_vmpp;
        self.v_old = 0.0;
        self.p_old = 0.0;
    }

    /// Error-margin floor `k²/(2(1−k))·V_est`.
    fn error_floor(&self) -> f64 {
        ERROR_MARGIN * ERROR_MARGIN / (2.0 * (1.0 - ERROR_MARGIN)) * self.vmpp
    }

    /// Stride magnitude for the next perturbation.
    ///
    /// # Arguments
    ///
    /// * `obs` - Array operating point of this cycle
    ///
    /// # Returns
    ///
    /// A non-negative voltage step (V).
    pub fn stride(&mut self, obs: &Observation) -> f64 {
        match self.kind {
            StrideKind::Fixed => MIN_STRIDE,
            StrideKind::Adaptive => {
                let term = ((self.vmpp - obs.voltage) / 3.0).exp() - 1.0;
                term.max(0.0) + self.error_floor()
            }
            StrideKind::Optimal => (self.vmpp - obs.voltage).abs() + self.error_floor(),
            StrideKind::Bisection => self.slope_stride(obs),
        }
    }

    fn slope_stride(&mut self, obs: &Observation) -> f64 {
        let power = obs.power();
        let dv = obs.voltage - self.v_old;
        let dp = power - self.p_old;

        let mut stride = 0.0;
        if dp.abs() >= MIN_POWER_DIFF && dv.abs() >= MIN_VOLTAGE_DIFF {
            let slope = dp / dv;
            if slope < 0.0 {
                stride = (obs.voltage + self.v_old) / 2.0 - self.v_old;
            } else if slope > 0.0 {
                stride = slope * SLOPE_MULTIPLIER;
            }
        }
        self.v_old = obs.voltage;
        self.p_old = power;
        stride.abs().max(MIN_STRIDE)
    }
}

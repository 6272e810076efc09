//! Maximum power point tracking.
//!
//! A tracker is a stack of three parts: a global algorithm that searches the
//! whole P-V curve for the highest peak, the local algorithm it hands the
//! winning bracket to, and the stride strategy the local algorithm steps by.
//! [`Mppt`] builds such a stack from configuration kinds.

pub mod global;
pub mod local;
pub mod stride;

use serde::Serialize;

use crate::source::MAX_CELL_VOLTAGE;
pub use global::{GlobalAlgorithm, GlobalKind};
pub use local::{LocalAlgorithm, LocalKind};
pub use stride::{Stride, StrideKind};

/// Operating point of the array for one cycle, measured after it settled
/// to the previous reference voltage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Observation {
    /// Array voltage (V).
    pub voltage: f64,
    /// Array current (A).
    pub current: f64,
    /// Irradiance (W/m²).
    pub irradiance: f64,
    /// Cell temperature (°C).
    pub temperature: f64,
}

impl Observation {
    pub fn new(voltage: f64, current: f64, irradiance: f64, temperature: f64) -> Self {
        Self {
            voltage,
            current,
            irradiance,
            temperature,
        }
    }

    /// Extracted power (W).
    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}

/// Closed voltage interval `[left, right]` believed to hold one peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bracket {
    pub left: f64,
    pub right: f64,
}

impl Bracket {
    /// Builds a bracket, swapping the bounds if given out of order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            left: a.min(b),
            right: a.max(b),
        }
    }

    /// Limits `voltage` to the bracket.
    pub fn clamp(&self, voltage: f64) -> f64 {
        voltage.max(self.left).min(self.right)
    }

    pub fn midpoint(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn contains(&self, voltage: f64) -> bool {
        voltage >= self.left && voltage <= self.right
    }
}

/// Last cycle's sample, kept by every algorithm to form differences.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct History {
    pub v_old: f64,
    pub i_old: f64,
    pub p_old: f64,
    pub irr_old: f64,
    pub t_old: f64,
}

impl History {
    /// Stores `obs` as the previous sample.
    pub fn record(&mut self, obs: &Observation) {
        self.v_old = obs.voltage;
        self.i_old = obs.current;
        self.p_old = obs.power();
        self.irr_old = obs.irradiance;
        self.t_old = obs.temperature;
    }
}

/// Highest voltage a tracker for `num_cells` cells may command (V).
pub fn max_voltage(num_cells: u32) -> f64 {
    MAX_CELL_VOLTAGE * f64::from(num_cells.max(1))
}

/// The kinds a tracker stack is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MpptKinds {
    pub global: GlobalKind,
    pub local: LocalKind,
    pub stride: StrideKind,
}

/// Complete tracker: global algorithm wrapping a local one.
///
/// # Examples
///
/// ```
/// use pv_sim::mppt::{GlobalKind, LocalKind, Mppt, StrideKind};
///
/// let mut mppt = Mppt::new(1, GlobalKind::Default, LocalKind::PandO, StrideKind::Fixed, 0);
/// let vref = mppt.reference_voltage(0.0, 0.0, 1000.0, 25.0);
/// assert!((vref - 0.01).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct Mppt {
    kinds: MpptKinds,
    num_cells: u32,
    global: Box<dyn GlobalAlgorithm>,
}

impl Mppt {
    /// Builds a tracker for a string of `num_cells` cells.
    ///
    /// # Arguments
    ///
    /// * `num_cells` - Series cells of the source; fixes the voltage ceiling
    /// * `global` - Global search algorithm
    /// * `local` - Local algorithm the global search hands off to
    /// * `stride` - Stride strategy of the local algorithm
    /// * `seed` - Seed of the stochastic global algorithms
    pub fn new(
        num_cells: u32,
        global: GlobalKind,
        local: LocalKind,
        stride: StrideKind,
        seed: u64,
    ) -> Self {
        let local_alg = local.build(num_cells, stride);
        Self {
            kinds: MpptKinds {
                global,
                local,
                stride,
            },
            num_cells,
            global: global.build(num_cells, local_alg, seed),
        }
    }

    pub fn kinds(&self) -> MpptKinds {
        self.kinds
    }

    pub fn num_cells(&self) -> u32 {
        self.num_cells
    }

    /// Voltage ceiling of this tracker (V).
    pub fn max_voltage(&self) -> f64 {
        max_voltage(self.num_cells)
    }

    /// Bracket the local algorithm is currently confined to.
    pub fn bracket(&self) -> Bracket {
        self.global.bracket()
    }

    /// Next reference voltage from this cycle's array sample.
    ///
    /// # Arguments
    ///
    /// * `voltage` - Array voltage (V), normally last cycle's reference
    /// * `current` - Array current at that voltage (A)
    /// * `irradiance` - Irradiance (W/m²)
    /// * `temperature` - Cell temperature (°C)
    pub fn reference_voltage(
        &mut self,
        voltage: f64,
        current: f64,
        irradiance: f64,
        temperature: f64,
    ) -> f64 {
        let obs = Observation::new(voltage, current, irradiance, temperature);
        self.global.reference_voltage(&obs)
    }

    /// Clears all algorithm state, local and global.
    pub fn reset(&mut self) {
        self.global.reset();
    }
}

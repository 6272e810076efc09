//! Single-diode PV cell models tuned to a Maxeon III reference cell.
//!
//! Two closed-form variants are provided:
//! - **Ideal**: the diode equation evaluated directly.
//! - **Nonideal**: series and shunt resistance make the current implicit; it
//!   is found by a fixed-step forward search that stops at the first residual
//!   increase.

use std::fmt;
use std::str::FromStr;

use crate::error::SimError;

/// Highest voltage a single cell is swept to (V).
pub const MAX_CELL_VOLTAGE: f64 = 0.8;
/// Smallest voltage step allowed for I-V sweeps (V).
pub const MIN_RESOLUTION: f64 = 0.001;
/// Substitute for exact-zero voltage or irradiance inputs.
pub const INPUT_EPSILON: f64 = 0.001;

/// Reference irradiance at STC (W/m²).
pub const REF_IRRADIANCE: f64 = 1000.0;
/// Reference cell temperature at STC (K).
pub const REF_TEMPERATURE_K: f64 = 298.15;
/// Short-circuit current at STC (A).
pub const REF_SC_CURRENT: f64 = 6.15;
/// Open-circuit voltage at STC (V).
pub const REF_OC_VOLTAGE: f64 = 0.721;

/// Boltzmann constant (J/K).
const BOLTZMANN: f64 = 1.381e-23;
/// Elementary charge (C).
const CHARGE: f64 = 1.602e-19;
/// Series resistance of the nonideal model (Ω).
const R_SERIES: f64 = 0.032;
/// Shunt resistance of the nonideal model (Ω).
const R_SHUNT: f64 = 36.1;

/// Isc temperature coefficient (1/K).
const ALPHA_ISC: f64 = 6e-4;
/// Voc temperature coefficient (V/K).
const BETA_VOC: f64 = 2.2e-3;

/// Trial current increment of the nonideal solver (A).
const SOLVER_STEP: f64 = 0.001;
/// Upper bound on solver iterations (caps the search at 10 A).
const SOLVER_MAX_STEPS: usize = 10_000;

/// Cell model variants selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellModelKind {
    /// Closed-form single-diode model.
    Ideal,
    /// Single-diode model with series/shunt resistance, solved iteratively.
    Nonideal,
}

impl CellModelKind {
    /// Accepted configuration names.
    pub const NAMES: &[&str] = &["ideal", "nonideal"];

    /// Human-readable model name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ideal => "Ideal",
            Self::Nonideal => "Nonideal",
        }
    }

    /// Evaluates the model's current for a series string of cells.
    ///
    /// # Arguments
    ///
    /// * `num_cells` - Number of cells in series
    /// * `voltage` - Voltage across the string (V)
    /// * `irradiance` - Incident irradiance (W/m²)
    /// * `temperature` - Cell temperature (°C)
    ///
    /// # Returns
    ///
    /// String current in amperes.
    pub fn current(self, num_cells: u32, voltage: f64, irradiance: f64, temperature: f64) -> f64 {
        match self {
            Self::Ideal => ideal_current(num_cells, voltage, irradiance, temperature),
            Self::Nonideal => nonideal_current(num_cells, voltage, irradiance, temperature),
        }
    }
}

impl fmt::Display for CellModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellModelKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ideal" => Ok(Self::Ideal),
            "nonideal" => Ok(Self::Nonideal),
            _ => Err(SimError::unknown("cell model", s, Self::NAMES)),
        }
    }
}

/// Irradiance/temperature corrected diode parameters.
struct DiodeParams {
    /// Photovoltaic (short-circuit) current (A).
    pv_current: f64,
    /// Open-circuit voltage (V).
    oc_voltage: f64,
    /// Reverse saturation current (A).
    sat_current: f64,
    /// Thermal voltage kT/q (V).
    thermal_voltage: f64,
}

impl DiodeParams {
    /// `ln_scale` multiplies the irradiance term of Voc.
    fn new(ln_scale: f64, irradiance: f64, temperature: f64) -> Self {
        let cell_k = temperature + 273.15;
        let delta_t = cell_k - REF_TEMPERATURE_K;
        let thermal_voltage = BOLTZMANN * cell_k / CHARGE;

        let pv_current = irradiance / REF_IRRADIANCE * REF_SC_CURRENT * (1.0 + ALPHA_ISC * delta_t);
        let oc_voltage = REF_OC_VOLTAGE - BETA_VOC * delta_t
            + ln_scale * thermal_voltage * (irradiance / REF_IRRADIANCE).ln();
        let sat_current = (pv_current.ln() - oc_voltage / thermal_voltage).exp();

        Self {
            pv_current,
            oc_voltage,
            sat_current,
            thermal_voltage,
        }
    }
}

fn guard_zero(value: f64) -> f64 {
    if value == 0.0 { INPUT_EPSILON } else { value }
}

/// Ideal single-diode current for a string of `num_cells` cells.
///
/// The cell count acts as the diode ideality scale, so a string of `n`
/// cells reaches open circuit at `n · V_OC`. Beyond that point the diode
/// absorbs the whole photocurrent and the output is zero.
pub fn ideal_current(num_cells: u32, voltage: f64, irradiance: f64, temperature: f64) -> f64 {
    let voltage = guard_zero(voltage);
    let irradiance = guard_zero(irradiance);
    let n = f64::from(num_cells.max(1));

    let p = DiodeParams::new(n, irradiance, temperature);
    let diode_current = if voltage <= n * p.oc_voltage {
        p.sat_current * ((voltage / (n * p.thermal_voltage)).exp() - 1.0)
    } else {
        p.pv_current
    };

    p.pv_current - diode_current
}

/// Nonideal single-diode current for a string of `num_cells` cells.
///
/// Each cell sees `voltage / num_cells`. The implicit equation
/// `I = I_pv − I_0·(exp((V + I·Rs)/Vt) − 1) − (V + I·Rs)/Rsh` is solved by
/// stepping the trial current up from zero in fixed increments and stopping
/// at the first step where the squared residual no longer decreases. The
/// last improving trial is returned, not the first non-improving one, so
/// the result sits one solver step (0.001 A) below a search that reports
/// the trial it stopped on.
///
/// The search is capped at `SOLVER_MAX_STEPS` trials.
pub fn nonideal_current(num_cells: u32, voltage: f64, irradiance: f64, temperature: f64) -> f64 {
    let irradiance = guard_zero(irradiance);
    let cell_voltage = voltage / f64::from(num_cells.max(1));
    let p = DiodeParams::new(1.0, irradiance, temperature);

    let residual = |trial: f64| {
        let diode_voltage = cell_voltage + trial * R_SERIES;
        let diode = p.sat_current * ((diode_voltage / p.thermal_voltage).exp() - 1.0);
        let shunt = diode_voltage / R_SHUNT;
        let rhs = p.pv_current - diode - shunt;
        (trial - rhs).powi(2)
    };

    let mut trial = 0.0;
    let mut best = residual(trial);
    for step in 1..=SOLVER_MAX_STEPS {
        let next = step as f64 * SOLVER_STEP;
        let r = residual(next);
        if r >= best {
            break;
        }
        trial = next;
        best = r;
    }
    trial
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_stc_short_circuit_near_reference() {
        let i = ideal_current(1, 0.0, 1000.0, 25.0);
        assert!(i > 0.0);
        assert!((i - REF_SC_CURRENT).abs() < 0.01, "got {i}");
    }

    #[test]
    fn ideal_zero_beyond_open_circuit() {
        assert_eq!(ideal_current(1, 0.75, 1000.0, 25.0), 0.0);
    }

    #[test]
    fn ideal_zero_irradiance_is_guarded() {
        let i = ideal_current(1, 0.0, 0.0, 25.0);
        assert!(i.is_finite());
        assert!(i.abs() < 1e-4);
    }

    #[test]
    fn ideal_current_drops_with_voltage() {
        let low = ideal_current(1, 0.2, 1000.0, 25.0);
        let high = ideal_current(1, 0.65, 1000.0, 25.0);
        assert!(low > high);
    }

    #[test]
    fn ideal_string_scales_open_circuit() {
        // Two cells in series still conduct where one cell is already dead.
        assert_eq!(ideal_current(1, 1.0, 1000.0, 25.0), 0.0);
        assert!(ideal_current(2, 1.0, 1000.0, 25.0) > 0.0);
    }

    #[test]
    fn nonideal_short_circuit_below_ideal() {
        let ideal = ideal_current(1, 0.0, 1000.0, 25.0);
        let nonideal = nonideal_current(1, 0.0, 1000.0, 25.0);
        assert!(nonideal > 6.0);
        assert!(nonideal <= ideal);
    }

    #[test]
    fn nonideal_zero_past_open_circuit() {
        assert_eq!(nonideal_current(1, 0.79, 1000.0, 25.0), 0.0);
    }

    #[test]
    fn nonideal_solver_is_bounded() {
        // Absurd irradiance would need more than the step cap.
        let i = nonideal_current(1, 0.0, 5000.0, 25.0);
        assert!(i <= SOLVER_STEP * SOLVER_MAX_STEPS as f64 + 1e-9);
    }

    #[test]
    fn nonideal_returns_last_improving_trial() {
        let i = nonideal_current(1, 0.3, 1000.0, 25.0);
        let n = (i / SOLVER_STEP).round() as usize;
        assert!((n as f64 * SOLVER_STEP - i).abs() < 1e-12);

        let p = DiodeParams::new(1.0, 1000.0, 25.0);
        let residual = |k: usize| {
            let trial = k as f64 * SOLVER_STEP;
            let diode_voltage = 0.3 + trial * R_SERIES;
            let diode = p.sat_current * ((diode_voltage / p.thermal_voltage).exp() - 1.0);
            (trial - (p.pv_current - diode - diode_voltage / R_SHUNT)).powi(2)
        };
        assert!(residual(n) < residual(n - 1));
        assert!(residual(n + 1) >= residual(n));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Ideal".parse::<CellModelKind>().ok(), Some(CellModelKind::Ideal));
        assert_eq!(
            "nonideal".parse::<CellModelKind>().ok(),
            Some(CellModelKind::Nonideal)
        );
        assert!("default".parse::<CellModelKind>().is_err());
    }
}

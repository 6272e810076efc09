use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// Voltage emitted on the first cycle (V).
const SEED_VOLTAGE: f64 = 0.05;
/// Open-circuit voltage per cell used to cap the output (V).
const VOC_PER_CELL: f64 = 0.721;
/// MPP power per cell used to normalise ΔP (W).
const PMPP_PER_CELL: f64 = 3.63;
/// Short-circuit current used to normalise ΔI (A).
const MAX_CURRENT: f64 = 6.15;
/// Distance kept below the voltage cap (V).
const CAP_MARGIN: f64 = 0.01;

/// ΔP% membership: NB, NS, ZE, PS, PB, each `(lower, upper]`.
const POWER_TERMS: [(f64, f64); 5] = [
    (-100.0, -10.0),
    (-10.0, -3.0),
    (-3.0, 3.0),
    (3.0, 10.0),
    (10.0, 100.0),
];
/// ΔI% membership: N, Z, P, each `(lower, upper]`.
const CURRENT_TERMS: [(f64, f64); 3] = [(-100.0, -1.0), (-1.0, 1.0), (1.0, 100.0)];
/// Terms used when a percentage falls outside every band.
const POWER_DEFAULT: usize = 2;
const CURRENT_DEFAULT: usize = 1;

/// Output term indexed by `[ΔI term][ΔP term]`.
const RULES: [[usize; 5]; 3] = [[1, 1, 1, 3, 4], [3, 3, 2, 3, 4], [4, 3, 3, 1, 1]];
/// Voltage shift of each output term (V).
const SHIFTS: [f64; 5] = [-0.04, -0.02, 0.01, 0.02, 0.04];

fn classify(value: f64, terms: &[(f64, f64)], fallback: usize) -> usize {
    terms
        .iter()
        .position(|&(lo, hi)| value > lo && value <= hi)
        .unwrap_or(fallback)
}

/// Rule-table controller on percentage changes of power and current.
#[derive(Debug, Clone)]
pub struct FuzzyLogic {
    core: LocalCore,
    max_voltage: f64,
    max_power: f64,
    first: bool,
}

impl FuzzyLogic {
    pub fn new(core: LocalCore, num_cells: u32) -> Self {
        let cells = f64::from(num_cells.max(1));
        Self {
            core,
            max_voltage: VOC_PER_CELL * cells,
            max_power: PMPP_PER_CELL * cells,
            first: true,
        }
    }

    /// Voltage shift the rule table assigns to this sample.
    fn shift(&self, obs: &Observation) -> f64 {
        let h = &self.core.history;
        let dp_pct = (obs.power() - h.p_old) * 100.0 / self.max_power;
        let di_pct = (obs.current - h.i_old) * 100.0 / MAX_CURRENT;
        let p_term = classify(dp_pct, &POWER_TERMS, POWER_DEFAULT);
        let i_term = classify(di_pct, &CURRENT_TERMS, CURRENT_DEFAULT);
        SHIFTS[RULES[i_term][p_term]]
    }
}

impl LocalAlgorithm for FuzzyLogic {
    fn kind(&self) -> LocalKind {
        LocalKind::Fuzzy
    }

    fn core(&self) -> &LocalCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LocalCore {
        &mut self.core
    }

    // A handoff already places the array near a peak, so skip the seed voltage.
    fn restart(&mut self) {
        self.first = false;
    }

    fn reset_state(&mut self) {
        self.first = true;
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        let mut vref = if self.first {
            self.first = false;
            SEED_VOLTAGE
        } else {
            obs.voltage + self.shift(obs)
        };
        self.core.history.record(obs);
        if vref >= self.max_voltage {
            vref = self.max_voltage - CAP_MARGIN;
        }
        vref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::local::test_support::drive;
    use crate::mppt::stride::StrideKind;

    fn fuzzy() -> FuzzyLogic {
        FuzzyLogic::new(LocalCore::new(1, StrideKind::Fixed), 1)
    }

    #[test]
    fn first_cycle_emits_seed_voltage() {
        let mut alg = fuzzy();
        let v = alg.reference_voltage(&Observation::new(0.4, 6.0, 1000.0, 25.0));
        assert_eq!(v, SEED_VOLTAGE);
    }

    #[test]
    fn classification_uses_half_open_bands() {
        assert_eq!(classify(-10.0, &POWER_TERMS, POWER_DEFAULT), 0);
        assert_eq!(classify(-9.9, &POWER_TERMS, POWER_DEFAULT), 1);
        assert_eq!(classify(3.0, &POWER_TERMS, POWER_DEFAULT), 2);
        assert_eq!(classify(500.0, &POWER_TERMS, POWER_DEFAULT), POWER_DEFAULT);
        assert_eq!(classify(0.0, &CURRENT_TERMS, CURRENT_DEFAULT), 1);
    }

    #[test]
    fn big_power_gain_with_steady_current_pushes_hard() {
        let mut alg = fuzzy();
        alg.reference_voltage(&Observation::default());
        alg.prime(&Observation::new(0.25, 2.0, 1000.0, 25.0));
        // ΔP = +0.5 W (13.8 %), ΔI = 0: rule [Z][PB] -> +0.04 V.
        let v = alg.reference_voltage(&Observation::new(0.5, 2.0, 1000.0, 25.0));
        assert!((v - 0.54).abs() < 1e-12);
    }

    #[test]
    fn output_is_capped_below_open_circuit() {
        let mut alg = fuzzy();
        alg.reference_voltage(&Observation::default());
        alg.prime(&Observation::new(0.3, 5.0, 1000.0, 25.0));
        let v = alg.reference_voltage(&Observation::new(0.72, 5.0, 1000.0, 25.0));
        assert!((v - (VOC_PER_CELL - CAP_MARGIN)).abs() < 1e-12);
    }

    #[test]
    fn restart_skips_seed_and_reset_restores_it() {
        let mut alg = fuzzy();
        alg.restart();
        let v = alg.reference_voltage(&Observation::new(0.4, 0.0, 1000.0, 25.0));
        assert_ne!(v, SEED_VOLTAGE);
        alg.reset();
        let v = alg.reference_voltage(&Observation::new(0.4, 0.0, 1000.0, 25.0));
        assert_eq!(v, SEED_VOLTAGE);
    }

    #[test]
    fn stays_within_voltage_range_on_ideal_cell() {
        let mut alg = fuzzy();
        let refs = drive(&mut alg, 100);
        assert!(refs.iter().all(|v| *v < VOC_PER_CELL));
    }
}

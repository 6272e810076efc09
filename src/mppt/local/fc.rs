use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// |dP/dV| below this is treated as the MPP.
const ERROR_BAND: f64 = 0.05;
/// Perturbation applied when the voltage did not move (V).
const FORCED_PERTURBATION: f64 = 0.005;

/// Feedback control on the dP/dV slope.
#[derive(Debug, Clone)]
pub struct FeedbackControl {
    core: LocalCore,
}

impl FeedbackControl {
    pub fn new(core: LocalCore) -> Self {
        Self { core }
    }
}

impl LocalAlgorithm for FeedbackControl {
    fn kind(&self) -> LocalKind {
        LocalKind::Fc
    }

    fn core(&self) -> &LocalCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LocalCore {
        &mut self.core
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        let stride = self.core.stride.stride(obs);
        let dv = obs.voltage - self.core.history.v_old;
        let dp = obs.power() - self.core.history.p_old;

        let vref = if dv == 0.0 {
            obs.voltage + FORCED_PERTURBATION
        } else {
            let slope = dp / dv;
            if slope.abs() < ERROR_BAND {
                obs.voltage
            } else if slope > 0.0 {
                obs.voltage + stride
            } else {
                obs.voltage - stride
            }
        };
        self.core.history.record(obs);
        vref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::local::test_support::{drive, tail_deviation};
    use crate::mppt::stride::StrideKind;

    #[test]
    fn zero_dv_forces_a_move() {
        let mut alg = FeedbackControl::new(LocalCore::new(1, StrideKind::Fixed));
        let v = alg.reference_voltage(&Observation::new(0.0, 0.0, 1000.0, 25.0));
        assert!((v - FORCED_PERTURBATION).abs() < 1e-12);
    }

    #[test]
    fn slope_sign_sets_direction() {
        let mut alg = FeedbackControl::new(LocalCore::new(1, StrideKind::Fixed));
        alg.prime(&Observation::new(0.7, 3.0, 1000.0, 25.0));
        // Moving down raised power: slope negative, keep going down.
        let v = alg.reference_voltage(&Observation::new(0.69, 3.5, 1000.0, 25.0));
        assert!((v - 0.68).abs() < 1e-12);
    }

    #[test]
    fn converges_on_ideal_cell() {
        let mut alg = FeedbackControl::new(LocalCore::new(1, StrideKind::Fixed));
        let refs = drive(&mut alg, 100);
        assert!(tail_deviation(&refs, 20) <= 0.02);
    }
}

use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// Half-width of the band around dP/dV = 0 treated as the MPP.
const ERROR_BAND: f64 = 0.01;

/// Incremental conductance.
///
/// At the MPP `dP/dV = I + V·dI/dV = 0`. The sign of `dI·V + I·dV`,
/// corrected for the direction of the last move, says which side of the MPP
/// the array sits on. With no voltage change, the sign of `dI` alone is used.
#[derive(Debug, Clone)]
pub struct IncrementalConductance {
    core: LocalCore,
}

impl IncrementalConductance {
    pub fn new(core: LocalCore) -> Self {
        Self { core }
    }
}

impl LocalAlgorithm for IncrementalConductance {
    fn kind(&self) -> LocalKind {
        LocalKind::Ic
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
        let di = obs.current - self.core.history.i_old;

        let conductance = if dv == 0.0 {
            di
        } else {
            let x = di * obs.voltage + obs.current * dv;
            if dv < 0.0 { -x } else { x }
        };

        let vref = if conductance.abs() < ERROR_BAND {
            obs.voltage
        } else if conductance > 0.0 {
            obs.voltage + stride
        } else {
            obs.voltage - stride
        };
        self.core.history.record(obs);
        vref
    }
}

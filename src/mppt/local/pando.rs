use crate::mppt::Observation;
use crate::mppt::local::{LocalAlgorithm, LocalCore, LocalKind};

/// Perturb and observe.
///
/// Keeps moving in the same direction while power rises and reverses when it
/// falls. Equal power counts as a fall, so the tracker never stalls.
#[derive(Debug, Clone)]
pub struct PerturbObserve {
    core: LocalCore,
}

impl PerturbObserve {
    pub fn new(core: LocalCore) -> Self {
        Self { core }
    }
}

impl LocalAlgorithm for PerturbObserve {
    fn kind(&self) -> LocalKind {
        LocalKind::PandO
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

        let rising = dv > 0.0;
        let vref = match (dp > 0.0, rising) {
            (true, true) | (false, false) => obs.voltage + stride,
            (true, false) | (false, true) => obs.voltage - stride,
        };
        self.core.history.record(obs);
        vref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppt::local::test_support::{STC_VMPP, drive, settled_band, tail_deviation};
    use crate::mppt::stride::{MIN_STRIDE, StrideKind};

    fn pando(stride: StrideKind) -> PerturbObserve {
        PerturbObserve::new(LocalCore::new(1, stride))
    }

    #[test]
    fn four_case_table() {
        let mut alg = pando(StrideKind::Fixed);
        alg.prime(&Observation::new(0.5, 4.0, 1000.0, 25.0));
        // Power up, voltage up: keep climbing.
        let v = alg.reference_voltage(&Observation::new(0.6, 4.0, 1000.0, 25.0));
        assert!((v - 0.61).abs() < 1e-12);
        // Power down, voltage up: turn back.
        let v = alg.reference_voltage(&Observation::new(0.61, 2.0, 1000.0, 25.0));
        assert!((v - 0.60).abs() < 1e-12);
        // Power up, voltage down: keep descending.
        let v = alg.reference_voltage(&Observation::new(0.60, 3.0, 1000.0, 25.0));
        assert!((v - 0.59).abs() < 1e-12);
        // Power down, voltage down: turn back.
        let v = alg.reference_voltage(&Observation::new(0.59, 1.0, 1000.0, 25.0));
        assert!((v - 0.60).abs() < 1e-12);
    }

    #[test]
    fn fixed_stride_settles_one_stride_around_mpp() {
        let mut alg = pando(StrideKind::Fixed);
        let refs = drive(&mut alg, 100);
        let first = refs.iter().position(|v| (v - STC_VMPP).abs() <= MIN_STRIDE);
        assert!(first.is_some_and(|c| c < 100));

        let (lo, hi) = settled_band(&refs, 20);
        assert!(hi - lo <= 2.0 * MIN_STRIDE + 1e-9);
        assert!(((lo + hi) / 2.0 - STC_VMPP).abs() <= MIN_STRIDE);
    }

    #[test]
    fn adaptive_stride_converges_faster() {
        let mut alg = pando(StrideKind::Adaptive);
        let refs = drive(&mut alg, 40);
        let first = refs.iter().position(|v| (v - STC_VMPP).abs() <= 2.0 * MIN_STRIDE);
        assert!(first.is_some_and(|c| c < 20));
        assert!(tail_deviation(&refs, 10) < 0.005);
    }
}

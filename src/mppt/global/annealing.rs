use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::mppt::global::{
    ChangeDetector, Delegate, GlobalAlgorithm, GlobalKind, Trigger, span_around,
};
use crate::mppt::local::LocalAlgorithm;
use crate::mppt::Observation;

/// Starting temperature.
pub const INIT_TEMP: f64 = 25.0;
/// Geometric cooling factor.
const ALPHA: f64 = 0.8;
/// Evaluated samples between two cooling steps.
const COOL_EVERY: usize = 4;
/// Scales ΔP in the acceptance probability.
const ACCEPT_GAIN: f64 = 15.0;
/// Temperature at which the classic search stops.
const CLASSIC_MIN_TEMP: f64 = 0.3;
/// Temperature at which the improved search stops.
const IMPROVED_MIN_TEMP: f64 = 0.2;
/// Relative fall of the running power average that restarts the search.
const POWER_DROP: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    /// Samples anywhere on `[0, MAX_V]`.
    Classic,
    /// Samples in a window around the accepted point that narrows as it cools.
    Improved,
}

/// Simulated annealing over the reference voltage.
///
/// Each emitted sample is scored on the following cycle, once the array
/// has settled to it. Better samples are always accepted, worse ones with
/// probability `exp(15·ΔP / temperature)`. Every fourth evaluation cools
/// the temperature by `ALPHA`; once it falls to the minimum the best sample
/// seen is handed to the local algorithm.
#[derive(Debug)]
pub struct SimulatedAnnealing {
    variant: Variant,
    max_v: f64,
    seed: u64,
    rng: StdRng,
    delegate: Delegate,
    searching: bool,
    pending: bool,
    temperature: f64,
    evaluated: usize,
    accepted: (f64, f64),
    best: (f64, f64),
    detector: ChangeDetector,
}

impl SimulatedAnnealing {
    fn with_variant(variant: Variant, max_v: f64, local: Box<dyn LocalAlgorithm>, seed: u64) -> Self {
        Self {
            variant,
            max_v,
            seed,
            rng: StdRng::seed_from_u64(seed),
            delegate: Delegate::new(local, max_v),
            searching: true,
            pending: false,
            temperature: INIT_TEMP,
            evaluated: 0,
            accepted: (0.0, 0.0),
            best: (0.0, 0.0),
            detector: ChangeDetector::new(Trigger::Drop(POWER_DROP)),
        }
    }

    /// Uniform sampling over the whole curve.
    pub fn classic(max_v: f64, local: Box<dyn LocalAlgorithm>, seed: u64) -> Self {
        Self::with_variant(Variant::Classic, max_v, local, seed)
    }

    /// Sampling narrowed around the accepted point.
    pub fn improved(max_v: f64, local: Box<dyn LocalAlgorithm>, seed: u64) -> Self {
        Self::with_variant(Variant::Improved, max_v, local, seed)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Best `(voltage, power)` sample of the current search.
    pub fn best(&self) -> (f64, f64) {
        self.best
    }

    fn min_temp(&self) -> f64 {
        match self.variant {
            Variant::Classic => CLASSIC_MIN_TEMP,
            Variant::Improved => IMPROVED_MIN_TEMP,
        }
    }

    fn evaluate(&mut self, obs: &Observation) {
        let power = obs.power();
        let delta = power - self.accepted.1;
        let accept = delta > 0.0
            || self.rng.random::<f64>() < (ACCEPT_GAIN * delta / self.temperature).exp();
        if accept {
            self.accepted = (obs.voltage, power);
        }
        if power > self.best.1 {
            self.best = (obs.voltage, power);
        }
        self.evaluated += 1;
        if self.evaluated % COOL_EVERY == 0 {
            self.temperature *= ALPHA;
            tracing::debug!(temperature = self.temperature, "annealing cooled");
        }
    }

    fn sample(&mut self) -> f64 {
        self.pending = true;
        let r = self.rng.random::<f64>();
        match self.variant {
            Variant::Classic => r * self.max_v,
            Variant::Improved => {
                let width = self.max_v * self.temperature / INIT_TEMP;
                let lo = (self.accepted.0 - width / 2.0).max(0.0);
                let hi = (self.accepted.0 + width / 2.0).min(self.max_v);
                lo + r * (hi - lo)
            }
        }
    }

    fn clear_search(&mut self) {
        self.searching = true;
        self.pending = false;
        self.temperature = INIT_TEMP;
        self.evaluated = 0;
        self.accepted = (0.0, 0.0);
        self.best = (0.0, 0.0);
        self.detector.arm();
        self.delegate.reset(self.max_v);
    }
}

impl GlobalAlgorithm for SimulatedAnnealing {
    fn kind(&self) -> GlobalKind {
        match self.variant {
            Variant::Classic => GlobalKind::SimulatedAnnealing,
            Variant::Improved => GlobalKind::ImprovedSa,
        }
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        if !self.searching {
            if self.detector.push(obs.power()) {
                tracing::info!(power = obs.power(), "power dropped, restarting annealing");
                self.clear_search();
                return self.sample();
            }
            return self.delegate.step(obs);
        }

        if self.pending {
            self.evaluate(obs);
        }
        if self.temperature <= self.min_temp() {
            self.searching = false;
            self.detector.arm();
            let vmpp = self.best.0;
            return self.delegate.begin(vmpp, span_around(vmpp, self.max_v));
        }
        self.sample()
    }

    fn reset(&mut self) {
        self.clear_search();
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn local(&self) -> &dyn LocalAlgorithm {
        self.delegate.local()
    }
}

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::mppt::global::{Delegate, GlobalAlgorithm, GlobalKind, span_around};
use crate::mppt::local::LocalAlgorithm;
use crate::mppt::Observation;

pub const NUM_AGENTS: usize = 4;
/// Cognitive (personal best) weight.
const C1: f64 = 0.02;
/// Social (global best) weight.
const C2: f64 = 0.5;
/// Inertia weight.
const W: f64 = 0.4;
/// Evaluations before the swarm hands off.
pub const CYCLE_BUDGET: usize = 45;

/// One particle: a candidate reference voltage with momentum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    pub position: f64,
    pub velocity: f64,
    pub best_voltage: f64,
    pub best_power: f64,
}

/// Particle swarm optimisation over the reference voltage.
///
/// Agents start spread over the lower four fifths of `[0, MAX_V]` and are
/// evaluated round-robin, one per cycle. After the first lap each agent
/// moves by `v' = W·v + C1·r1·(pBest − x) + C2·r2·(gBest − x)` before its
/// next evaluation. When the budget is spent the global best goes to the
/// local algorithm.
#[derive(Debug)]
pub struct ParticleSwarm {
    max_v: f64,
    seed: u64,
    rng: StdRng,
    delegate: Delegate,
    agents: Vec<Agent>,
    global_best: (f64, f64),
    pending: Option<usize>,
    evaluated: usize,
    searching: bool,
}

impl ParticleSwarm {
    pub fn new(max_v: f64, local: Box<dyn LocalAlgorithm>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = Self::spawn(&mut rng, max_v);
        Self {
            max_v,
            seed,
            rng,
            delegate: Delegate::new(local, max_v),
            agents,
            global_best: (0.0, 0.0),
            pending: None,
            evaluated: 0,
            searching: true,
        }
    }

    fn spawn(rng: &mut StdRng, max_v: f64) -> Vec<Agent> {
        let interval = max_v / 5.0;
        (0..NUM_AGENTS)
            .map(|i| {
                let position = rng.random::<f64>() * interval + interval * i as f64;
                Agent {
                    position,
                    velocity: 0.0,
                    best_voltage: position,
                    best_power: 0.0,
                }
            })
            .collect()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Best `(voltage, power)` seen by any agent.
    pub fn global_best(&self) -> (f64, f64) {
        self.global_best
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    fn evaluate(&mut self, k: usize, obs: &Observation) {
        let power = obs.power();
        let agent = &mut self.agents[k];
        if power > agent.best_power {
            agent.best_power = power;
            agent.best_voltage = obs.voltage;
        }
        if power > self.global_best.1 {
            self.global_best = (obs.voltage, power);
        }
        self.evaluated += 1;
    }

    fn advance(&mut self, k: usize) {
        let r1 = self.rng.random::<f64>();
        let r2 = self.rng.random::<f64>();
        let g = self.global_best.0;
        let agent = &mut self.agents[k];
        agent.velocity = W * agent.velocity
            + C1 * r1 * (agent.best_voltage - agent.position)
            + C2 * r2 * (g - agent.position);
        agent.position = (agent.position + agent.velocity).clamp(0.0, self.max_v);
    }
}

impl GlobalAlgorithm for ParticleSwarm {
    fn kind(&self) -> GlobalKind {
        GlobalKind::ParticleSwarm
    }

    fn reference_voltage(&mut self, obs: &Observation) -> f64 {
        if !self.searching {
            return self.delegate.step(obs);
        }
        if let Some(k) = self.pending {
            self.evaluate(k, obs);
        }
        if self.evaluated >= CYCLE_BUDGET {
            self.searching = false;
            let vmpp = self.global_best.0;
            return self.delegate.begin(vmpp, span_around(vmpp, self.max_v));
        }
        let next = self.pending.map_or(0, |k| (k + 1) % NUM_AGENTS);
        if self.evaluated >= NUM_AGENTS {
            self.advance(next);
        }
        self.pending = Some(next);
        self.agents[next].position
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.agents = Self::spawn(&mut self.rng, self.max_v);
        self.global_best = (0.0, 0.0);
        self.pending = None;
        self.evaluated = 0;
        self.searching = true;
        self.delegate.reset(self.max_v);
    }

    fn local(&self) -> &dyn LocalAlgorithm {
        self.delegate.local()
    }
}

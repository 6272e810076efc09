//! Per-cycle records accumulated by the pipeline.

use std::fmt;

use serde::Serialize;

use crate::environment::EnvironmentReading;
use crate::mppt::MpptKinds;
use crate::source::{EdgeCharacteristics, IvCurve, SourceDefinition};

/// What the PV source produced in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOutput {
    /// Source current at the applied reference voltage (A).
    pub current: f64,
    /// Full I-V sweep under this cycle's conditions.
    pub iv_curve: IvCurve,
    /// Edge characteristics of `iv_curve`.
    pub edge: EdgeCharacteristics,
}

/// Complete record of one simulated cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    /// Cycle index.
    pub cycle: usize,
    /// Module definitions at the applied reference voltage.
    pub source_definition: SourceDefinition,
    /// Cell-weighted environment of the cycle.
    pub environment: EnvironmentReading,
    /// Reference voltage applied to the array during the cycle (V).
    pub vref_in: f64,
    pub source_output: SourceOutput,
    /// Reference voltage the tracker chose for the next cycle (V).
    pub vref_out: f64,
    /// Converter duty cycle for `vref_out`.
    pub pulse_width: f64,
}

impl CycleRecord {
    /// Power extracted during the cycle (W).
    pub fn power(&self) -> f64 {
        self.vref_in * self.source_output.current
    }

    /// Power available at the true MPP of the cycle (W).
    pub fn available_power(&self) -> f64 {
        self.source_output.edge.p_mpp()
    }
}

impl fmt::Display for CycleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "c={:03} G={:7.1} T={:5.1} | V={:.3} I={:.3} P={:.3} (Pmpp={:.3} @ {:.3} V) | vref={:.3} D={:.3}",
            self.cycle,
            self.environment.irradiance,
            self.environment.temperature,
            self.vref_in,
            self.source_output.current,
            self.power(),
            self.available_power(),
            self.source_output.edge.v_mpp,
            self.vref_out,
            self.pulse_width,
        )
    }
}

/// Static description of a configured run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Cell model name.
    pub model: String,
    pub use_lookup: bool,
    #[serde(flatten)]
    pub mppt: MpptKinds,
    /// Series cells of the whole source.
    pub num_cells: u32,
    /// Last cycle of the run.
    pub max_cycles: usize,
    /// Records accumulated so far.
    pub cycles_run: usize,
    pub finished: bool,
}

//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use pv_sim::environment::{EnvironmentProfile, EnvironmentSpec};
use pv_sim::mppt::{GlobalKind, LocalKind, MpptKinds, StrideKind};
use pv_sim::sim::pipeline::{Pipeline, PipelineSetup};
use pv_sim::sim::types::CycleRecord;
use pv_sim::source::CellModelKind;

/// Voltage of the ideal cell's MPP at STC (V).
pub const STC_VMPP: f64 = 0.637;

/// One 1x1 cell at 1000 W/m² and 25 °C.
pub fn stc() -> EnvironmentSpec {
    EnvironmentSpec::Step {
        irradiance: 1000.0,
        temperature: 25.0,
    }
}

/// Two modules: a lit 1x1 and a 1x2 that is shaded from cycle 40.
pub const SHADING_PROFILE: &str = r#"{
  "name": "Passing cloud",
  "description": "The second module is shaded from cycle 40.",
  "num_modules": 2,
  "pv_model": {
    "0": { "module_type": "1x1", "env_type": "Step", "env_regime": [1000, 25] },
    "1": { "module_type": "1x2", "env_type": "Array",
           "env_regime": [[0, 1000, 25], [40, 300, 25]] }
  }
}"#;

/// The parsed [`SHADING_PROFILE`].
pub fn shading_profile() -> EnvironmentSpec {
    EnvironmentProfile::from_json_str(SHADING_PROFILE)
        .map(EnvironmentSpec::Profile)
        .unwrap()
}

pub fn kinds(global: GlobalKind, local: LocalKind, stride: StrideKind) -> MpptKinds {
    MpptKinds {
        global,
        local,
        stride,
    }
}

/// Runs an ideal-cell pipeline to completion and returns its records.
pub fn run(environment: EnvironmentSpec, max_cycles: usize, mppt: MpptKinds) -> Vec<CycleRecord> {
    let setup = PipelineSetup::new(CellModelKind::Ideal, environment, max_cycles, mppt);
    let mut pipeline = Pipeline::new(setup).unwrap();
    pipeline.run().unwrap().to_vec()
}

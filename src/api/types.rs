//! API response and query types.
//!
//! Cycle fields follow the CSV export columns.

use serde::{Deserialize, Serialize};

use crate::sim::kpi::TrackingReport;
use crate::sim::types::{CycleRecord, RunSummary};

/// Combined state response: summary, tracking report and latest cycle.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub summary: RunSummary,
    pub report: TrackingReport,
    /// Last recorded cycle; `None` before the first cycle.
    pub latest_cycle: Option<CycleView>,
}

/// One cycle without its full I-V curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleView {
    pub cycle: usize,
    pub irradiance: f64,
    pub temperature: f64,
    pub vref_in: f64,
    pub current: f64,
    pub power: f64,
    pub v_oc: f64,
    pub i_sc: f64,
    pub v_mpp: f64,
    pub i_mpp: f64,
    pub p_mpp: f64,
    pub vref_out: f64,
    pub pulse_width: f64,
}

impl From<&CycleRecord> for CycleView {
    fn from(r: &CycleRecord) -> Self {
        let edge = &r.source_output.edge;
        Self {
            cycle: r.cycle,
            irradiance: r.environment.irradiance,
            temperature: r.environment.temperature,
            vref_in: r.vref_in,
            current: r.source_output.current,
            power: r.power(),
            v_oc: edge.v_oc,
            i_sc: edge.i_sc,
            v_mpp: edge.v_mpp,
            i_mpp: edge.i_mpp,
            p_mpp: edge.p_mpp(),
            vref_out: r.vref_out,
            pulse_width: r.pulse_width,
        }
    }
}

/// Optional range query parameters for the cycles endpoint.
#[derive(Debug, Deserialize)]
pub struct CyclesQuery {
    /// First cycle (inclusive).
    pub from: Option<usize>,
    /// Last cycle (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentReading;
    use crate::sim::types::SourceOutput;
    use crate::source::{EdgeCharacteristics, IvCurve, SourceDefinition};

    #[test]
    fn cycle_view_flattens_record() {
        let record = CycleRecord {
            cycle: 3,
            source_definition: SourceDefinition::new(),
            environment: EnvironmentReading {
                irradiance: 900.0,
                temperature: 30.0,
            },
            vref_in: 0.5,
            source_output: SourceOutput {
                current: 4.0,
                iv_curve: IvCurve::default(),
                edge: EdgeCharacteristics {
                    v_oc: 0.7,
                    i_sc: 5.5,
                    v_mpp: 0.6,
                    i_mpp: 5.0,
                },
            },
            vref_out: 0.51,
            pulse_width: 0.2,
        };
        let view = CycleView::from(&record);
        assert_eq!(view.cycle, 3);
        assert_eq!(view.irradiance, 900.0);
        assert!((view.power - 2.0).abs() < 1e-12);
        assert!((view.p_mpp - 3.0).abs() < 1e-12);
        assert_eq!(view.vref_out, 0.51);
    }
}

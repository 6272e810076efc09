//! Post-hoc tracking performance derived from a run's records.

use std::fmt;

use serde::Serialize;

use super::types::CycleRecord;

/// Fraction of MPP power that counts as having reached the MPP.
pub const REACHED_FRACTION: f64 = 0.99;

/// How well the tracker followed the true maximum power point.
///
/// Energies are in watt-cycles: the sum of per-cycle power.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingReport {
    /// Cycles included.
    pub cycles: usize,
    /// Energy extracted at the applied reference voltages.
    pub extracted_energy: f64,
    /// Energy available at the true MPP.
    pub available_energy: f64,
    /// `extracted / available` in percent.
    pub efficiency_pct: f64,
    /// First cycle whose power reached [`REACHED_FRACTION`] of the MPP power.
    pub cycles_to_mpp: Option<usize>,
    /// Mean |vref − V_MPP| (V).
    pub mean_voltage_error: f64,
}

impl TrackingReport {
    /// Computes the report from the accumulated series.
    ///
    /// # Arguments
    ///
    /// * `records` - Cycle records in cycle order
    ///
    /// # Returns
    ///
    /// A zeroed report for an empty series.
    pub fn from_records(records: &[CycleRecord]) -> Self {
        if records.is_empty() {
            return Self {
                cycles: 0,
                extracted_energy: 0.0,
                available_energy: 0.0,
                efficiency_pct: 0.0,
                cycles_to_mpp: None,
                mean_voltage_error: 0.0,
            };
        }

        let mut extracted = 0.0;
        let mut available = 0.0;
        let mut error_sum = 0.0;
        let mut reached = None;

        for r in records {
            let power = r.power();
            let p_mpp = r.available_power();
            extracted += power;
            available += p_mpp;
            error_sum += (r.vref_in - r.source_output.edge.v_mpp).abs();
            if reached.is_none() && p_mpp > 0.0 && power >= REACHED_FRACTION * p_mpp {
                reached = Some(r.cycle);
            }
        }

        let efficiency_pct = if available > 0.0 {
            100.0 * extracted / available
        } else {
            0.0
        };

        Self {
            cycles: records.len(),
            extracted_energy: extracted,
            available_energy: available,
            efficiency_pct,
            cycles_to_mpp: reached,
            mean_voltage_error: error_sum / records.len() as f64,
        }
    }
}

impl fmt::Display for TrackingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Tracking Report ---")?;
        writeln!(f, "Cycles:                {}", self.cycles)?;
        writeln!(f, "Extracted energy:      {:.3} W·cycle", self.extracted_energy)?;
        writeln!(f, "Available energy:      {:.3} W·cycle", self.available_energy)?;
        writeln!(f, "Tracking efficiency:   {:.1}%", self.efficiency_pct)?;
        match self.cycles_to_mpp {
            Some(c) => writeln!(f, "Reached 99% of MPP:    cycle {c}")?,
            None => writeln!(f, "Reached 99% of MPP:    never")?,
        }
        write!(f, "Mean |vref - V_MPP|:   {:.4} V", self.mean_voltage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentReading;
    use crate::sim::types::SourceOutput;
    use crate::source::{EdgeCharacteristics, IvCurve, SourceDefinition};

    fn record(cycle: usize, vref_in: f64, current: f64) -> CycleRecord {
        CycleRecord {
            cycle,
            source_definition: SourceDefinition::new(),
            environment: EnvironmentReading {
                irradiance: 1000.0,
                temperature: 25.0,
            },
            vref_in,
            source_output: SourceOutput {
                current,
                iv_curve: IvCurve::default(),
                edge: EdgeCharacteristics {
                    v_oc: 0.72,
                    i_sc: 6.15,
                    v_mpp: 0.6,
                    i_mpp: 5.0,
                },
            },
            vref_out: vref_in,
            pulse_width: 0.0,
        }
    }

    #[test]
    fn empty_series_is_zeroed() {
        let report = TrackingReport::from_records(&[]);
        assert_eq!(report.cycles, 0);
        assert_eq!(report.efficiency_pct, 0.0);
        assert_eq!(report.cycles_to_mpp, None);
    }

    #[test]
    fn efficiency_and_first_reach() {
        // MPP power 3 W; cycles extract 0, 1.5 and 3 W.
        let records = vec![record(0, 0.0, 6.0), record(1, 0.3, 5.0), record(2, 0.6, 5.0)];
        let report = TrackingReport::from_records(&records);
        assert!((report.extracted_energy - 4.5).abs() < 1e-12);
        assert!((report.available_energy - 9.0).abs() < 1e-12);
        assert!((report.efficiency_pct - 50.0).abs() < 1e-9);
        assert_eq!(report.cycles_to_mpp, Some(2));
        assert!((report.mean_voltage_error - 0.3).abs() < 1e-12);
    }

    #[test]
    fn display_mentions_efficiency() {
        let report = TrackingReport::from_records(&[record(0, 0.6, 5.0)]);
        let text = report.to_string();
        assert!(text.contains("Tracking efficiency:   100.0%"));
        assert!(text.contains("cycle 0"));
    }
}

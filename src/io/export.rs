//! CSV export for the per-cycle series.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::CycleRecord;

/// Column header for CSV telemetry export.
const HEADER: &str = "cycle,irradiance,temperature,vref_in,current,power,\
                      v_oc,i_sc,v_mpp,i_mpp,p_mpp,vref_out,pulse_width";

/// Exports the cycle series to a CSV file at the given path.
///
/// Writes a header row followed by one data row per cycle. The full I-V
/// curve of each cycle is summarised by its edge characteristics.
///
/// # Arguments
///
/// * `records` - Accumulated cycle records
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[CycleRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes the cycle series as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[CycleRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        let edge = &r.source_output.edge;
        wtr.write_record(&[
            r.cycle.to_string(),
            format!("{:.3}", r.environment.irradiance),
            format!("{:.3}", r.environment.temperature),
            format!("{:.4}", r.vref_in),
            format!("{:.6}", r.source_output.current),
            format!("{:.6}", r.power()),
            format!("{:.4}", edge.v_oc),
            format!("{:.6}", edge.i_sc),
            format!("{:.4}", edge.v_mpp),
            format!("{:.6}", edge.i_mpp),
            format!("{:.6}", edge.p_mpp()),
            format!("{:.4}", r.vref_out),
            format!("{:.6}", r.pulse_width),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

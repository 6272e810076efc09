//! Fixed-resolution lookup tables for cell current.
//!
//! A table is a dense voltage × irradiance × temperature grid with voltage as
//! the outermost key. Each axis starts at zero and advances by a fixed
//! resolution, so a query resolves to its row in O(1):
//!
//! ```text
//! index(axis) = round(value / resolution)
//! row = (i_v · n_g + i_g) · n_t + i_t
//! ```
//!
//! Tables are per cell. Queries for a string divide the voltage by the cell
//! count before indexing.
//!
//! A table remembers the cell model it was evaluated from. On disk the model
//! is a `# model: <name>` line ahead of the column header.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cell::{CellModelKind, INPUT_EPSILON};
use crate::error::{SimError, SimResult};

/// CSV column header for lookup tables.
pub const HEADER: [&str; 4] = ["v_ref (V)", "irrad (G)", "temp (C)", "current (A)"];
/// Prefix of the comment line naming the table's cell model.
pub const MODEL_PREFIX: &str = "# model: ";

/// One axis of the lookup grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    /// Step between neighbouring grid points.
    pub resolution: f64,
    /// Number of grid points, starting at zero.
    pub count: usize,
}

impl Axis {
    /// Creates an axis with `count` points spaced by `resolution`.
    pub const fn new(resolution: f64, count: usize) -> Self {
        Self { resolution, count }
    }

    /// Grid value at `index`.
    pub fn value(&self, index: usize) -> f64 {
        index as f64 * self.resolution
    }

    /// Largest value on the axis.
    pub fn max_value(&self) -> f64 {
        self.value(self.count.saturating_sub(1))
    }

    fn index_of(&self, axis: &'static str, value: f64) -> SimResult<usize> {
        let scaled = (value / self.resolution).round();
        // NaN and infinities saturate in the cast; keep them out of range.
        let index = if scaled.is_finite() { scaled as i64 } else { -1 };
        if index < 0 || index as usize >= self.count {
            return Err(SimError::LookupOutOfBounds {
                axis,
                value,
                index,
                count: self.count,
            });
        }
        Ok(index as usize)
    }
}

/// Grid layout of a lookup table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupParams {
    /// Cell voltage axis (V).
    pub voltage: Axis,
    /// Irradiance axis (W/m²).
    pub irradiance: Axis,
    /// Temperature axis (°C).
    pub temperature: Axis,
}

impl Default for LookupParams {
    /// 0-0.8 V by 0.01, 0-1000 W/m² by 50, 0-80 °C by 0.5.
    fn default() -> Self {
        Self {
            voltage: Axis::new(0.01, 81),
            irradiance: Axis::new(50.0, 21),
            temperature: Axis::new(0.5, 161),
        }
    }
}

impl LookupParams {
    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.voltage.count * self.irradiance.count * self.temperature.count
    }

    /// Whether any axis is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flatten(&self, iv: usize, ig: usize, it: usize) -> usize {
        (iv * self.irradiance.count + ig) * self.temperature.count + it
    }

    fn unflatten(&self, row: usize) -> (usize, usize, usize) {
        let it = row % self.temperature.count;
        let rest = row / self.temperature.count;
        (rest / self.irradiance.count, rest % self.irradiance.count, it)
    }

    /// Grid coordinates of `row`, with zero irradiance/temperature nudged off zero.
    fn point(&self, row: usize) -> (f64, f64, f64) {
        let (iv, ig, it) = self.unflatten(row);
        let nudge = |x: f64| if x == 0.0 { INPUT_EPSILON } else { x };
        (
            self.voltage.value(iv),
            nudge(self.irradiance.value(ig)),
            nudge(self.temperature.value(it)),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LookupRow {
    #[serde(rename = "v_ref (V)")]
    voltage: f64,
    #[serde(rename = "irrad (G)")]
    irradiance: f64,
    #[serde(rename = "temp (C)")]
    temperature: f64,
    #[serde(rename = "current (A)")]
    current: f64,
}

/// Read-only current table over a fixed grid.
#[derive(Debug, Clone)]
pub struct LookupTable {
    model: CellModelKind,
    params: LookupParams,
    currents: Vec<f64>,
}

impl LookupTable {
    /// Evaluates `model` for a single cell at every grid point.
    ///
    /// This is an offline batch job; with the `parallel` feature the grid is
    /// evaluated across threads.
    pub fn build(model: CellModelKind, params: LookupParams) -> Self {
        let eval = |row: usize| {
            let (v, g, t) = params.point(row);
            model.current(1, v, g, t)
        };

        #[cfg(feature = "parallel")]
        let currents: Vec<f64> = (0..params.len()).into_par_iter().map(eval).collect();
        #[cfg(not(feature = "parallel"))]
        let currents: Vec<f64> = (0..params.len()).map(eval).collect();

        tracing::info!(model = %model, rows = currents.len(), "built lookup table");
        Self {
            model,
            params,
            currents,
        }
    }

    /// Cell model the currents were evaluated from.
    pub fn model(&self) -> CellModelKind {
        self.model
    }

    /// Checks that the table can stand in for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LookupModelMismatch`] for any other model.
    pub fn ensure_model(&self, model: CellModelKind) -> SimResult<()> {
        if self.model != model {
            return Err(SimError::LookupModelMismatch {
                table: self.model,
                model,
            });
        }
        Ok(())
    }

    /// Grid layout.
    pub fn params(&self) -> &LookupParams {
        &self.params
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.currents.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.currents.is_empty()
    }

    /// Looks up the current for a string of `num_cells` cells.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LookupOutOfBounds`] when any axis index falls
    /// outside the table. Values are never clamped.
    pub fn current(
        &self,
        num_cells: u32,
        voltage: f64,
        irradiance: f64,
        temperature: f64,
    ) -> SimResult<f64> {
        let cell_voltage = voltage / f64::from(num_cells.max(1));
        let iv = self.params.voltage.index_of("voltage", cell_voltage)?;
        let ig = self.params.irradiance.index_of("irradiance", irradiance)?;
        let it = self.params.temperature.index_of("temperature", temperature)?;
        Ok(self.currents[self.params.flatten(iv, ig, it)])
    }

    /// Writes the table to a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn export_csv(&self, path: &Path) -> SimResult<()> {
        let file = File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }

    /// Writes the table as CSV to any writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_csv(&self, mut writer: impl Write) -> SimResult<()> {
        writeln!(writer, "{MODEL_PREFIX}{}", self.model.name().to_ascii_lowercase())?;
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(HEADER)?;
        for (row, current) in self.currents.iter().enumerate() {
            let (iv, ig, it) = self.params.unflatten(row);
            wtr.write_record(&[
                format!("{:.3}", self.params.voltage.value(iv)),
                format!("{:.3}", self.params.irradiance.value(ig)),
                format!("{:.3}", self.params.temperature.value(it)),
                format!("{current:.6}"),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Loads a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a dense grid.
    pub fn from_csv_file(path: &Path) -> SimResult<Self> {
        let file = File::open(path)?;
        Self::read_csv(io::BufReader::new(file))
    }

    /// Parses a table from CSV, inferring the grid from the rows.
    ///
    /// The first line must name the cell model (`# model: nonideal`). Rows
    /// must be sorted with voltage outermost and temperature innermost,
    /// every axis starting at zero with a constant step.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidLookup`] if the model line is missing or
    /// the rows do not form a dense grid, and [`SimError::UnknownKind`] for
    /// an unknown model name.
    pub fn read_csv(mut reader: impl Read) -> SimResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let model: CellModelKind = text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(MODEL_PREFIX))
            .ok_or_else(|| SimError::InvalidLookup("missing \"# model:\" line".into()))?
            .trim()
            .parse()?;

        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());
        let rows: Vec<LookupRow> = rdr.deserialize().collect::<Result<_, _>>()?;
        if rows.is_empty() {
            return Err(SimError::InvalidLookup("table has no rows".into()));
        }

        let distinct = |f: fn(&LookupRow) -> f64| {
            let mut values: Vec<f64> = Vec::new();
            for r in &rows {
                let x = f(r);
                if !values.iter().any(|v| (v - x).abs() < 1e-9) {
                    values.push(x);
                }
            }
            values
        };
        let axis = |values: Vec<f64>, name: &str| -> SimResult<Axis> {
            let count = values.len();
            let max = values.iter().copied().fold(f64::MIN, f64::max);
            let resolution = if count > 1 { max / (count - 1) as f64 } else { 1.0 };
            if resolution <= 0.0 {
                return Err(SimError::InvalidLookup(format!("{name} axis has no extent")));
            }
            Ok(Axis::new(resolution, count))
        };

        let params = LookupParams {
            voltage: axis(distinct(|r| r.voltage), "voltage")?,
            irradiance: axis(distinct(|r| r.irradiance), "irradiance")?,
            temperature: axis(distinct(|r| r.temperature), "temperature")?,
        };
        if params.len() != rows.len() {
            return Err(SimError::InvalidLookup(format!(
                "{} rows do not fill a {}x{}x{} grid",
                rows.len(),
                params.voltage.count,
                params.irradiance.count,
                params.temperature.count
            )));
        }

        let tolerance = |axis: &Axis| axis.resolution * 0.5;
        let mut currents = Vec::with_capacity(rows.len());
        for (row, r) in rows.iter().enumerate() {
            let (iv, ig, it) = params.unflatten(row);
            let aligned = (r.voltage - params.voltage.value(iv)).abs() < tolerance(&params.voltage)
                && (r.irradiance - params.irradiance.value(ig)).abs()
                    < tolerance(&params.irradiance)
                && (r.temperature - params.temperature.value(it)).abs()
                    < tolerance(&params.temperature);
            if !aligned {
                return Err(SimError::InvalidLookup(format!(
                    "row {} is out of order",
                    row + 1
                )));
            }
            currents.push(r.current);
        }

        Ok(Self {
            model,
            params,
            currents,
        })
    }
}

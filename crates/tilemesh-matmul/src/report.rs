use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use thiserror::Error;
use tilemesh_common::{BufferType, ComputeGrid, DataType, MathFidelity};

use crate::analysis::PerformanceSample;

/// Columns of the report, in order.
pub const REPORT_HEADER: [&str; 16] = [
    "m",
    "k",
    "n",
    "use_trace",
    "grid_size",
    "in0_sharded",
    "out_sharded",
    "in0_storage_type",
    "in1_storage_type",
    "out_storage_type",
    "dtype",
    "math_fidelity",
    "inference_time_avg (ns)",
    "TFLOPs (avg)",
    "Utilization (vs user grid)",
    "Utilization (vs 8x8 full grid)",
];

/// One benchmarked case with its measurement.
#[derive(new, Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Rows of the output.
    pub m: u32,
    /// Reduction dimension.
    pub k: u32,
    /// Columns of the output.
    pub n: u32,
    /// Measured through trace replay.
    pub use_trace: bool,
    /// Cores used.
    pub grid: ComputeGrid,
    /// First operand sharded.
    pub in0_sharded: bool,
    /// Output sharded.
    pub out_sharded: bool,
    /// Memory holding the first operand.
    pub in0_storage_type: BufferType,
    /// Memory holding the second operand.
    pub in1_storage_type: BufferType,
    /// Memory holding the output.
    pub out_storage_type: BufferType,
    /// Element format.
    pub dtype: DataType,
    /// Matrix engine fidelity.
    pub math_fidelity: MathFidelity,
    /// Measurement.
    pub sample: PerformanceSample,
}

impl ReportRow {
    /// Column names, in order.
    pub fn header() -> &'static [&'static str] {
        &REPORT_HEADER
    }

    /// Column values, formatted for the report.
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.m.to_string(),
            self.k.to_string(),
            self.n.to_string(),
            python_bool(self.use_trace),
            self.grid.to_string(),
            python_bool(self.in0_sharded),
            python_bool(self.out_sharded),
            self.in0_storage_type.to_string(),
            self.in1_storage_type.to_string(),
            self.out_storage_type.to_string(),
            self.dtype.to_string(),
            self.math_fidelity.to_string(),
            format!("{:.2}", self.sample.avg_inference_time.as_secs_f64() * 1e9),
            format!("{:.2}", self.sample.tflops),
            percentage(self.sample.utilization_user_grid),
            percentage(self.sample.utilization_full_grid),
        ]
    }
}

fn python_bool(value: bool) -> String {
    match value {
        true => "True".to_string(),
        false => "False".to_string(),
    }
}

fn percentage(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Errors that can occur while writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The report couldn't be written.
    #[error("Unable to write the report\nCaused by:\n  {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of benchmark results.
pub trait ReportSink {
    /// Add one row to the report.
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError>;

    /// Flush everything recorded so far.
    fn finish(&mut self) -> Result<(), ReportError>;
}

/// Report written as comma separated values, one row per case after a header row.
pub struct CsvReport<W: Write> {
    writer: W,
}

impl CsvReport<BufWriter<File>> {
    /// Create the report file, and its parent directories if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Writing the report to {}", path.display());
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> CsvReport<W> {
    /// Start a report on `writer` by writing the header.
    pub fn new(mut writer: W) -> Result<Self, ReportError> {
        write_record(&mut writer, ReportRow::header())?;
        Ok(Self { writer })
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for CsvReport<W> {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        write_record(&mut self.writer, &row.fields())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn write_record<W: Write, S: AsRef<str>>(writer: &mut W, fields: &[S]) -> Result<(), ReportError> {
    let line = fields
        .iter()
        .map(|field| quote(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");

    writeln!(writer, "{line}")?;
    Ok(())
}

fn quote(field: &str) -> String {
    match field.contains([',', '"', '\n']) {
        true => format!("\"{}\"", field.replace('"', "\"\"")),
        false => field.to_string(),
    }
}

/// Report kept in memory.
#[derive(Debug, Default)]
pub struct MemoryReport {
    /// Rows recorded so far.
    pub rows: Vec<ReportRow>,
}

impl ReportSink for MemoryReport {
    fn record(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::{num::NonZeroU32, time::Duration};
    use pretty_assertions::assert_eq;

    fn row(use_trace: bool) -> ReportRow {
        let sample = PerformanceSample {
            elapsed: Duration::from_micros(100),
            iterations: NonZeroU32::new(10).unwrap(),
            avg_inference_time: Duration::from_nanos(10_500),
            tflops: 25.5678,
            utilization_user_grid: 0.83421,
            utilization_full_grid: 1.2,
        };

        ReportRow::new(
            512,
            1024,
            2048,
            use_trace,
            ComputeGrid::new(8, 8),
            true,
            false,
            BufferType::L1,
            BufferType::Dram,
            BufferType::Dram,
            DataType::Bfloat8B,
            MathFidelity::HiFi2,
            sample,
        )
    }

    #[test]
    fn fields_follow_the_report_format() {
        assert_eq!(
            row(true).fields(),
            vec![
                "512", "1024", "2048", "True", "(8, 8)", "True", "False", "L1", "DRAM", "DRAM",
                "BFLOAT8_B", "HiFi2", "10500.00", "25.57", "83.42%", "120.00%",
            ]
        );
        assert_eq!(row(false).fields()[3], "False");
    }

    #[test]
    fn csv_quotes_the_grid() {
        let mut report = CsvReport::new(Vec::new()).unwrap();
        report.record(&row(false)).unwrap();
        report.finish().unwrap();

        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], REPORT_HEADER.join(","));
        assert_eq!(
            lines[1],
            "512,1024,2048,False,\"(8, 8)\",True,False,L1,DRAM,DRAM,BFLOAT8_B,HiFi2,10500.00,25.57,83.42%,120.00%"
        );
    }

    #[test]
    fn csv_report_creates_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated").join("report.csv");

        let mut report = CsvReport::create(&path).unwrap();
        report.record(&row(true)).unwrap();
        report.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("m,k,n,use_trace,grid_size,"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn memory_report_keeps_rows() {
        let mut report = MemoryReport::default();
        report.record(&row(true)).unwrap();

        assert_eq!(report.rows, vec![row(true)]);
    }
}

//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::CsvWriteOptions;
use flowcast_excel::{ExportCell, ExportPlan};

/// CSV writer for export plans and result series
pub struct CsvWriter;

impl CsvWriter {
    /// Write an export plan to a CSV file
    pub fn write_export_file<P: AsRef<Path>>(
        plan: &ExportPlan,
        period_labels: &[String],
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write_export(plan, period_labels, file, options)
    }

    /// Write an export plan, one `key, name, cells...` row per calculation
    ///
    /// Cells hold the formula text, or the static number where the formula
    /// could not be converted.
    pub fn write_export<W: Write>(
        plan: &ExportPlan,
        period_labels: &[String],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let rows = plan.rows.iter().map(|row| {
            let cells = row.cells.iter().map(|cell| match cell {
                ExportCell::Formula(formula) => formula.clone(),
                ExportCell::Static(value) => value.to_string(),
            });
            (row.id.to_string(), row.name.clone(), cells.collect())
        });
        Self::write_rows(rows, period_labels, writer, options)
    }

    /// Write labelled series, one `key, name, values...` row each
    pub fn write_series<'a, W: Write>(
        series: impl IntoIterator<Item = (String, String, &'a [f64])>,
        period_labels: &[String],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let rows = series.into_iter().map(|(key, name, values)| {
            let values = values.iter().map(f64::to_string).collect();
            (key, name, values)
        });
        Self::write_rows(rows, period_labels, writer, options)
    }

    fn write_rows<W: Write>(
        rows: impl Iterator<Item = (String, String, Vec<String>)>,
        period_labels: &[String],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(options.line_terminator.to_csv())
            .flexible(true)
            .from_writer(writer);

        if options.write_header {
            let mut header = vec!["key".to_string(), "name".to_string()];
            header.extend(period_labels.iter().cloned());
            csv_writer.write_record(&header)?;
        }

        for (key, name, cells) in rows {
            let mut record = Vec::with_capacity(cells.len() + 2);
            record.push(key);
            record.push(name);
            record.extend(cells);
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LineTerminator;
    use flowcast_core::{Calculation, SheetLayout};
    use flowcast_excel::ExportSource;
    use pretty_assertions::assert_eq;

    fn to_string(write: impl FnOnce(&mut Vec<u8>) -> CsvResult<()>) -> String {
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_export() {
        let calcs = vec![
            Calculation::new(1, "Revenue").with_formula("CUMSUM(R1)"),
            Calculation::new(2, "Growth").with_formula("CUMPROD_Y(R1)"),
        ];
        let layout = SheetLayout::builder()
            .place(calcs[0].reference_key(), "Calcs")
            .place(calcs[1].reference_key(), "Calcs")
            .build();
        let values = vec![1.0, 2.5];
        let sources = calcs.iter().map(|calc| ExportSource {
            calculation: calc,
            values: &values,
            has_error: false,
        });
        let plan = ExportPlan::build(sources, &layout, 2).unwrap();
        let labels = vec!["Jan 2025".to_string(), "Feb 2025".to_string()];

        let csv = to_string(|out| {
            CsvWriter::write_export(&plan, &labels, out, &CsvWriteOptions::default())
        });

        assert_eq!(
            csv,
            "key,name,Jan 2025,Feb 2025\n\
             R1,Revenue,=SUM($E$2:E$2),=SUM($E$2:F$2)\n\
             R2,Growth,1,2.5\n"
        );
    }

    #[test]
    fn test_write_series_without_header() {
        let options = CsvWriteOptions {
            write_header: false,
            line_terminator: LineTerminator::CRLF,
            ..Default::default()
        };
        let values = [0.5, -3.0];
        let csv = to_string(|out| {
            CsvWriter::write_series(
                [("R1".to_string(), "Net, after tax".to_string(), &values[..])],
                &[],
                out,
                &options,
            )
        });

        assert_eq!(csv, "R1,\"Net, after tax\",0.5,-3\r\n");
    }

    #[test]
    fn test_write_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");

        CsvWriter::write_export_file(&ExportPlan::default(), &[], &path, &CsvWriteOptions::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "key,name\n");
    }
}

//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;
use flowcast_core::{ReferenceKey, ReferenceMap, Timeline};
use tracing::debug;

/// CSV input reader
pub struct CsvReader;

impl CsvReader {
    /// Read input series from a CSV file
    pub fn read_reference_map_file<P: AsRef<Path>>(
        path: P,
        timeline: &Timeline,
        options: &CsvReadOptions,
    ) -> CsvResult<ReferenceMap> {
        let file = File::open(path)?;
        Self::read_reference_map(file, timeline, options)
    }

    /// Read input series, one `key, v0, v1, ...` row per reference
    ///
    /// The returned map has the timeline's `T.` constants bound. Each row must
    /// hold exactly one value per period; an empty field reads as `0`.
    pub fn read_reference_map<R: Read>(
        reader: R,
        timeline: &Timeline,
        options: &CsvReadOptions,
    ) -> CsvResult<ReferenceMap> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(options.has_header)
            .trim(if options.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .flexible(true)
            .from_reader(reader);

        let mut map = ReferenceMap::for_timeline(timeline);
        let first_row = if options.has_header { 2 } else { 1 };

        for (index, result) in csv_reader.records().enumerate() {
            let record = result?;
            let row = first_row + index;

            let mut fields = record.iter();
            let key_field = fields.next().unwrap_or_default();
            let key = ReferenceKey::parse(key_field).map_err(|e| CsvError::Parse {
                row,
                column: 1,
                message: e.to_string(),
            })?;

            // `T.` constants come pre-bound and may be overridden
            if map.contains(&key) && key.name().is_none() {
                return Err(CsvError::Parse {
                    row,
                    column: 1,
                    message: format!("duplicate key {}", key),
                });
            }

            let values = fields
                .enumerate()
                .map(|(i, field)| Self::parse_value(field, row, i + 2))
                .collect::<CsvResult<Vec<f64>>>()?;

            map.insert(key, values)?;
        }

        debug!(references = map.len(), "read reference map");
        Ok(map)
    }

    fn parse_value(field: &str, row: usize, column: usize) -> CsvResult<f64> {
        if field.is_empty() {
            return Ok(0.0);
        }
        field.parse::<f64>().map_err(|_| CsvError::Parse {
            row,
            column,
            message: format!("'{}' is not a number", field),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read(input: &str, options: &CsvReadOptions) -> CsvResult<ReferenceMap> {
        let timeline = Timeline::monthly(2025, 1, 3).unwrap();
        CsvReader::read_reference_map(input.as_bytes(), &timeline, options)
    }

    fn key(s: &str) -> ReferenceKey {
        ReferenceKey::parse(s).unwrap()
    }

    #[test]
    fn test_read_inputs() {
        let map = read("V1,1,2,3\nC1.10, 0.5 ,0.5,\n", &CsvReadOptions::default()).unwrap();

        assert_eq!(map.get(&key("V1")), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(map.get(&key("C1.10")), Some(&[0.5, 0.5, 0.0][..]));
        assert!(map.contains(&key("T.DiM")));
    }

    #[test]
    fn test_header_skipped() {
        let options = CsvReadOptions {
            has_header: true,
            ..Default::default()
        };
        let map = read("key,Jan,Feb,Mar\nV1,1,2,3\n", &options).unwrap();
        assert!(map.contains(&key("V1")));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = read("V1,1,2\n", &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CsvError::Core(flowcast_core::Error::LengthMismatch { actual: 2, .. })
        ));
    }

    #[test]
    fn test_parse_errors_located() {
        let err = read("V1,1,2,3\nV2,1,x,3\n", &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(err, CsvError::Parse { row: 2, column: 3, .. }));

        let err = read("Revenue,1,2,3\n", &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(err, CsvError::Parse { row: 1, column: 1, .. }));

        let err = read("V1,1,2,3\nV1,1,2,3\n", &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(err, CsvError::Parse { row: 2, .. }));
    }
}

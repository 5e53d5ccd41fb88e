//! JSON model files
//!
//! ```json
//! {
//!   "timeline": { "start": "2025-01", "periods": 12, "fiscalYearEndMonth": 6 },
//!   "inputs": { "V1": [100, 100, ...] },
//!   "calculations": [{ "id": 1, "name": "Revenue", "formula": "V1 * 2", "type": "flow" }]
//! }
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use flowcast::{Calculation, Model, Timeline};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSpec {
    /// First month, `YYYY-MM`
    pub start: String,
    pub periods: usize,
    #[serde(default)]
    pub fiscal_year_end_month: Option<u32>,
}

impl TimelineSpec {
    pub fn build(&self) -> Result<Timeline> {
        let first = NaiveDate::parse_from_str(&format!("{}-01", self.start.trim()), "%Y-%m-%d")
            .with_context(|| format!("Invalid timeline start '{}', expected YYYY-MM", self.start))?;
        if let Some(month) = self.fiscal_year_end_month {
            if !(1..=12).contains(&month) {
                bail!("Invalid fiscal year end month {}", month);
            }
        }
        Ok(Timeline::monthly(first.year(), first.month(), self.periods)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    pub timeline: TimelineSpec,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub calculations: Vec<Calculation>,
}

impl ModelFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse model file '{}'", path.display()))
    }

    /// Build the model; nothing is evaluated yet
    pub fn into_model(self) -> Result<Model> {
        let mut model = Model::new(self.timeline.build()?);

        for (key, values) in self.inputs {
            model
                .set_input(&key, values)
                .with_context(|| format!("Invalid input '{}'", key))?;
        }
        for calculation in self.calculations {
            let label = calculation.id.to_string();
            model
                .add_calculation(calculation)
                .with_context(|| format!("Invalid calculation {}", label))?;
        }

        debug!(calculations = model.len(), "model loaded");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcast::CalculationId;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const MODEL: &str = r#"{
        "timeline": { "start": "2025-11", "periods": 3 },
        "inputs": { "V1": [1, 2, 3] },
        "calculations": [
            { "id": 1, "name": "Running", "formula": "CUMSUM(V1)", "type": "stock" },
            { "id": 2, "name": "Empty" }
        ]
    }"#;

    #[test]
    fn test_load_and_evaluate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, MODEL).unwrap();

        let mut model = ModelFile::load(&path).unwrap().into_model().unwrap();
        assert!(model.timeline().is_year_start(2));
        model.recompute_all();

        assert_eq!(model.values(CalculationId(1)).unwrap(), &[1.0, 3.0, 6.0]);
        assert_eq!(model.values(CalculationId(2)).unwrap(), &[0.0; 3]);
    }

    #[test]
    fn test_rejects_bad_files() {
        let spec = |start: &str| TimelineSpec {
            start: start.to_string(),
            periods: 3,
            fiscal_year_end_month: None,
        };
        assert!(spec("2025-13").build().is_err());
        assert!(spec("January").build().is_err());

        let file: ModelFile = serde_json::from_str(
            r#"{ "timeline": { "start": "2025-01", "periods": 2 }, "inputs": { "V1": [1] } }"#,
        )
        .unwrap();
        let error = file.into_model().unwrap_err();
        assert!(format!("{:#}", error).contains("Invalid input 'V1'"));

        let missing = TempDir::new().unwrap().path().join("nope.json");
        assert!(ModelFile::load(&missing).is_err());
    }
}

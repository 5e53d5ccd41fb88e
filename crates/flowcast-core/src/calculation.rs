//! Calculation records

use crate::reference::ReferenceKey;
use std::fmt;

/// Stable identifier of a calculation; referenced from formulas as `R<id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CalculationId(pub u32);

impl CalculationId {
    /// The `R<id>` key other formulas use to reference this calculation
    pub fn reference_key(self) -> ReferenceKey {
        ReferenceKey::calculation(self.0)
    }
}

impl fmt::Display for CalculationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl From<u32> for CalculationId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Temporal semantics of a calculation, used only for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CalculationType {
    /// Summed within a period
    #[default]
    Flow,
    /// Point-in-time balance; a period shows its last month
    Stock,
    /// Opening balance; a period shows its first month
    StockStart,
}

/// A computed line item
///
/// Owned by the authoring UI; the engine only reads it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Calculation {
    pub id: CalculationId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tab_id: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub group_id: Option<u32>,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub formula: String,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub calc_type: CalculationType,
}

impl Calculation {
    /// A new flow calculation with an empty formula
    pub fn new(id: impl Into<CalculationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tab_id: None,
            group_id: None,
            name: name.into(),
            formula: String::new(),
            calc_type: CalculationType::Flow,
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    pub fn with_type(mut self, calc_type: CalculationType) -> Self {
        self.calc_type = calc_type;
        self
    }

    /// `R<id>`
    pub fn reference_key(&self) -> ReferenceKey {
        self.id.reference_key()
    }
}

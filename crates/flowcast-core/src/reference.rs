//! Reference keys
//!
//! Every time series a formula can name is addressed by a typed key such as
//! `V1`, `C1.10`, `F3.Start`, `L1.2.1`, `T.DiM` or `R17`. Keys are parsed once
//! into a [`ReferenceKey`] and compared structurally from then on.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The family a reference belongs to, identified by its prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// Raw input value array (`V`)
    Input,
    /// Series input (`S`)
    Series,
    /// Group-scoped constant (`C`)
    Constant,
    /// Boolean-like flag (`F`)
    Flag,
    /// Index, e.g. escalation (`I`)
    Index,
    /// Lookup (`L`)
    Lookup,
    /// Named time constant (`T.`)
    TimeConstant,
    /// Module output (`M`)
    ModuleOutput,
    /// Another calculation's result (`R`)
    Calculation,
    /// Reserved group reference (`G`)
    Group,
}

impl ReferenceKind {
    /// All reference families, in prefix order
    pub const ALL: [ReferenceKind; 10] = [
        ReferenceKind::Input,
        ReferenceKind::Series,
        ReferenceKind::Constant,
        ReferenceKind::Flag,
        ReferenceKind::Index,
        ReferenceKind::Lookup,
        ReferenceKind::TimeConstant,
        ReferenceKind::ModuleOutput,
        ReferenceKind::Calculation,
        ReferenceKind::Group,
    ];

    /// The textual prefix of this family
    pub fn prefix(self) -> &'static str {
        match self {
            ReferenceKind::Input => "V",
            ReferenceKind::Series => "S",
            ReferenceKind::Constant => "C",
            ReferenceKind::Flag => "F",
            ReferenceKind::Index => "I",
            ReferenceKind::Lookup => "L",
            ReferenceKind::TimeConstant => "T.",
            ReferenceKind::ModuleOutput => "M",
            ReferenceKind::Calculation => "R",
            ReferenceKind::Group => "G",
        }
    }

    /// Family for a single-letter prefix (`T.` is handled separately)
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'V' => Some(ReferenceKind::Input),
            'S' => Some(ReferenceKind::Series),
            'C' => Some(ReferenceKind::Constant),
            'F' => Some(ReferenceKind::Flag),
            'I' => Some(ReferenceKind::Index),
            'L' => Some(ReferenceKind::Lookup),
            'M' => Some(ReferenceKind::ModuleOutput),
            'R' => Some(ReferenceKind::Calculation),
            'G' => Some(ReferenceKind::Group),
            _ => None,
        }
    }

    /// Allowed number of numeric path segments (min, max)
    fn segment_bounds(self) -> (usize, usize) {
        match self {
            ReferenceKind::Input | ReferenceKind::Series => (1, 2),
            ReferenceKind::Constant | ReferenceKind::ModuleOutput => (2, 2),
            ReferenceKind::Lookup => (1, 3),
            ReferenceKind::TimeConstant => (0, 0),
            ReferenceKind::Flag
            | ReferenceKind::Index
            | ReferenceKind::Calculation
            | ReferenceKind::Group => (1, 1),
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReferenceKind::Input => "input",
            ReferenceKind::Series => "series",
            ReferenceKind::Constant => "constant",
            ReferenceKind::Flag => "flag",
            ReferenceKind::Index => "index",
            ReferenceKind::Lookup => "lookup",
            ReferenceKind::TimeConstant => "time constant",
            ReferenceKind::ModuleOutput => "module output",
            ReferenceKind::Calculation => "calculation",
            ReferenceKind::Group => "group",
        };
        f.write_str(name)
    }
}

/// Edge qualifier on a flag (`F3.Start`, `F3.End`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlagEdge {
    Start,
    End,
}

impl FlagEdge {
    fn as_str(self) -> &'static str {
        match self {
            FlagEdge::Start => "Start",
            FlagEdge::End => "End",
        }
    }
}

/// A parsed reference key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct ReferenceKey {
    kind: ReferenceKind,
    path: Vec<u32>,
    name: Option<String>,
    edge: Option<FlagEdge>,
}

impl ReferenceKey {
    /// Create a key from a family and its numeric path
    pub fn new(kind: ReferenceKind, path: impl Into<Vec<u32>>) -> Result<Self> {
        let key = Self {
            kind,
            path: path.into(),
            name: None,
            edge: None,
        };
        key.validate()?;
        Ok(key)
    }

    /// `R<id>`
    pub fn calculation(id: u32) -> Self {
        Self {
            kind: ReferenceKind::Calculation,
            path: vec![id],
            name: None,
            edge: None,
        }
    }

    /// `T.<name>`
    pub fn time_constant(name: &str) -> Self {
        Self {
            kind: ReferenceKind::TimeConstant,
            path: Vec::new(),
            name: Some(name.to_string()),
            edge: None,
        }
    }

    /// Parse a key such as `C1.10` or `F3.Start`
    ///
    /// # Examples
    /// ```
    /// use flowcast_core::{ReferenceKey, ReferenceKind};
    ///
    /// let key = ReferenceKey::parse("L1.2.1").unwrap();
    /// assert_eq!(key.kind(), ReferenceKind::Lookup);
    /// assert_eq!(key.path(), &[1, 2, 1]);
    ///
    /// assert!(ReferenceKey::parse("R1.2").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidReference(s.to_string());

        if let Some(name) = s.strip_prefix("T.") {
            let mut chars = name.chars();
            let valid = chars.next().map_or(false, |c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(invalid());
            }
            return Ok(Self::time_constant(name));
        }

        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(ReferenceKind::from_letter)
            .ok_or_else(invalid)?;
        let rest = chars.as_str();

        let mut segments: Vec<&str> = rest.split('.').collect();
        let mut edge = None;
        if kind == ReferenceKind::Flag && segments.len() > 1 {
            edge = match segments.last().copied() {
                Some("Start") => Some(FlagEdge::Start),
                Some("End") => Some(FlagEdge::End),
                _ => None,
            };
            if edge.is_some() {
                segments.pop();
            }
        }

        let mut path = Vec::with_capacity(segments.len());
        for segment in segments {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            path.push(segment.parse::<u32>().map_err(|_| invalid())?);
        }

        let key = Self {
            kind,
            path,
            name: None,
            edge,
        };
        key.validate().map_err(|_| invalid())?;
        Ok(key)
    }

    fn validate(&self) -> Result<()> {
        if self.kind == ReferenceKind::TimeConstant && self.name.is_none() {
            return Err(Error::InvalidReference(
                "time constants are built with ReferenceKey::time_constant".into(),
            ));
        }
        let (min, max) = self.kind.segment_bounds();
        if self.path.len() < min || self.path.len() > max {
            return Err(Error::InvalidReference(format!(
                "{} expects {}..={} segments, got {}",
                self.kind,
                min,
                max,
                self.path.len()
            )));
        }
        Ok(())
    }

    /// Reference family
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Numeric path segments (`C1.10` → `[1, 10]`)
    pub fn path(&self) -> &[u32] {
        &self.path
    }

    /// Name of a time constant (`T.DiM` → `DiM`)
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Flag edge qualifier, if any
    pub fn edge(&self) -> Option<FlagEdge> {
        self.edge
    }

    /// Calculation id for `R` keys
    pub fn calculation_id(&self) -> Option<u32> {
        match self.kind {
            ReferenceKind::Calculation => self.path.first().copied(),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.prefix())?;
        if let Some(name) = &self.name {
            f.write_str(name)?;
        }
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        if let Some(edge) = self.edge {
            write!(f, ".{}", edge.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for ReferenceKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReferenceKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ReferenceKey> for String {
    fn from(key: ReferenceKey) -> Self {
        key.to_string()
    }
}

//! # Regression Coefficients
//!
//! The weights of the fitted percentile equation. A `CoefficientSet` is built
//! once and never mutated: fields are private and only readable through
//! accessors, so an estimator holding one can be shared freely.
//!
//! The reference fit (the `Default`) comes from a Stata OLS regression of JEE
//! Mains percentile on gender, tenth-grade math and science marks (with
//! quadratic terms), stream and social category. ST is the reference
//! category and carries a weight of exactly zero.
//!
//! Sets can be saved to and loaded from a human-readable TOML file so an
//! alternate fit can be substituted without recompiling.

use ndarray::{Array1, array};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Names of the equation terms, in the order the weights are summed.
pub const TERM_NAMES: [&str; 11] = [
    "const",
    "female",
    "tenth_math_final",
    "tenth_math_final_sq",
    "tenth_sci_final",
    "tenth_sci_final_sq",
    "pcm",
    "obc",
    "sc",
    "st",
    "general",
];

/// Errors raised while reading, writing or validating a coefficient file.
#[derive(Error, Debug)]
pub enum CoefficientError {
    #[error("Failed to read or write coefficient file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML coefficient file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize coefficients to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The weight for term '{term}' is not a finite number (found {value}).")]
    NonFinite { term: &'static str, value: f64 },
    #[error("Unknown coefficient term '{0}'. Expected one of: {terms}", terms = TERM_NAMES.join(", "))]
    UnknownTerm(String),
    #[error("The coefficient term '{0}' was given more than once.")]
    DuplicateTerm(&'static str),
    #[error("No weight was given for the coefficient term '{0}'.")]
    MissingTerm(&'static str),
}

/// The immutable weight table of the percentile equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoefficientSet {
    /// The intercept.
    #[serde(rename = "const")]
    intercept: f64,
    female: f64,
    tenth_math_final: f64,
    tenth_math_final_sq: f64,
    tenth_sci_final: f64,
    tenth_sci_final_sq: f64,
    pcm: f64,
    general: f64,
    obc: f64,
    sc: f64,
    st: f64,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self {
            intercept: 196.1998,
            female: -6.343773,
            tenth_math_final: -2.527548,
            tenth_math_final_sq: 0.0201622,
            tenth_sci_final: -2.540661,
            tenth_sci_final_sq: 0.0197534,
            pcm: 3.020236,
            general: -0.3160913,
            obc: -0.8654527,
            sc: -0.6053456,
            st: 0.0,
        }
    }
}

impl CoefficientSet {
    /// Builds a set from `(term, weight)` pairs. Terms are matched by name, in
    /// any order; every name in `TERM_NAMES` must appear exactly once.
    pub fn from_terms<'a>(
        terms: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, CoefficientError> {
        let mut given: [Option<f64>; 11] = [None; 11];
        for (name, weight) in terms {
            let index = TERM_NAMES
                .iter()
                .position(|term| *term == name)
                .ok_or_else(|| CoefficientError::UnknownTerm(name.to_string()))?;
            if given[index].replace(weight).is_some() {
                return Err(CoefficientError::DuplicateTerm(TERM_NAMES[index]));
            }
        }

        let mut weights = [0.0; 11];
        for ((slot, weight), term) in weights.iter_mut().zip(given).zip(TERM_NAMES) {
            *slot = weight.ok_or(CoefficientError::MissingTerm(term))?;
        }

        let [
            intercept,
            female,
            tenth_math_final,
            tenth_math_final_sq,
            tenth_sci_final,
            tenth_sci_final_sq,
            pcm,
            obc,
            sc,
            st,
            general,
        ] = weights;
        let set = Self {
            intercept,
            female,
            tenth_math_final,
            tenth_math_final_sq,
            tenth_sci_final,
            tenth_sci_final_sq,
            pcm,
            general,
            obc,
            sc,
            st,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn female(&self) -> f64 {
        self.female
    }

    pub fn tenth_math_final(&self) -> f64 {
        self.tenth_math_final
    }

    pub fn tenth_math_final_sq(&self) -> f64 {
        self.tenth_math_final_sq
    }

    pub fn tenth_sci_final(&self) -> f64 {
        self.tenth_sci_final
    }

    pub fn tenth_sci_final_sq(&self) -> f64 {
        self.tenth_sci_final_sq
    }

    pub fn pcm(&self) -> f64 {
        self.pcm
    }

    pub fn general(&self) -> f64 {
        self.general
    }

    pub fn obc(&self) -> f64 {
        self.obc
    }

    pub fn sc(&self) -> f64 {
        self.sc
    }

    pub fn st(&self) -> f64 {
        self.st
    }

    /// The weights as a vector aligned with `TERM_NAMES`.
    pub fn as_array(&self) -> Array1<f64> {
        array![
            self.intercept,
            self.female,
            self.tenth_math_final,
            self.tenth_math_final_sq,
            self.tenth_sci_final,
            self.tenth_sci_final_sq,
            self.pcm,
            self.obc,
            self.sc,
            self.st,
            self.general,
        ]
    }

    /// Pairs each term name with its weight, in summation order.
    pub fn terms(&self) -> impl Iterator<Item = (&'static str, f64)> + use<> {
        TERM_NAMES.into_iter().zip(self.as_array().to_vec())
    }

    fn validate(&self) -> Result<(), CoefficientError> {
        for (term, value) in self.terms() {
            if !value.is_finite() {
                return Err(CoefficientError::NonFinite { term, value });
            }
        }
        Ok(())
    }

    /// Renders the coefficient set as TOML.
    pub fn to_toml(&self) -> Result<String, CoefficientError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, CoefficientError> {
        let set: Self = toml::from_str(text)?;
        set.validate()?;
        Ok(set)
    }

    /// Saves the coefficient set to a file in TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoefficientError> {
        let toml_string = self.to_toml()?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a coefficient set from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoefficientError> {
        let toml_string = fs::read_to_string(path)?;
        Self::from_toml(&toml_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_matches_reference_fit() {
        let coef = CoefficientSet::default();
        assert_eq!(coef.intercept(), 196.1998);
        assert_eq!(coef.female(), -6.343773);
        assert_eq!(coef.tenth_math_final_sq(), 0.0201622);
        assert_eq!(coef.general(), -0.3160913);
        assert_eq!(coef.st(), 0.0, "ST is the reference category");
    }

    #[test]
    fn terms_follow_term_names() {
        let coef = CoefficientSet::default();
        let terms: Vec<_> = coef.terms().collect();
        assert_eq!(terms.len(), TERM_NAMES.len());
        assert_eq!(terms[0], ("const", 196.1998));
        assert_eq!(terms[6], ("pcm", 3.020236));
        assert_eq!(terms[10], ("general", -0.3160913));
    }

    // Listed in the order the terms are usually quoted, with general before obc.
    const QUOTED_ORDER: [(&str, f64); 11] = [
        ("const", 0.0),
        ("female", 1.0),
        ("tenth_math_final", 2.0),
        ("tenth_math_final_sq", 3.0),
        ("tenth_sci_final", 4.0),
        ("tenth_sci_final_sq", 5.0),
        ("pcm", 6.0),
        ("general", 7.0),
        ("obc", 8.0),
        ("sc", 9.0),
        ("st", 10.0),
    ];

    #[test]
    fn from_terms_matches_weights_by_name() {
        let coef = CoefficientSet::from_terms(QUOTED_ORDER).unwrap();
        assert_eq!(coef.intercept(), 0.0);
        assert_eq!(coef.general(), 7.0);
        assert_eq!(coef.obc(), 8.0);
        assert_eq!(coef.sc(), 9.0);
        assert_eq!(coef.st(), 10.0);

        let mut reversed = QUOTED_ORDER;
        reversed.reverse();
        assert_eq!(CoefficientSet::from_terms(reversed).unwrap(), coef);
    }

    #[test]
    fn from_terms_reproduces_default() {
        let coef = CoefficientSet::default();
        assert_eq!(CoefficientSet::from_terms(coef.terms()).unwrap(), coef);
    }

    #[test]
    fn from_terms_rejects_unknown_duplicate_and_missing_terms() {
        let mut unknown = QUOTED_ORDER;
        unknown[7].0 = "General";
        match CoefficientSet::from_terms(unknown) {
            Err(CoefficientError::UnknownTerm(name)) => assert_eq!(name, "General"),
            other => panic!("Expected UnknownTerm error, got {:?}", other),
        }

        let mut duplicate = QUOTED_ORDER;
        duplicate[8].0 = "general";
        assert!(matches!(
            CoefficientSet::from_terms(duplicate),
            Err(CoefficientError::DuplicateTerm("general"))
        ));

        assert!(matches!(
            CoefficientSet::from_terms(QUOTED_ORDER.into_iter().filter(|(t, _)| *t != "pcm")),
            Err(CoefficientError::MissingTerm("pcm"))
        ));
    }

    #[test]
    fn from_terms_rejects_non_finite() {
        let mut terms = QUOTED_ORDER;
        terms[4].1 = f64::NAN;
        match CoefficientSet::from_terms(terms) {
            Err(CoefficientError::NonFinite { term, .. }) => assert_eq!(term, "tenth_sci_final"),
            other => panic!("Expected NonFinite error, got {:?}", other),
        }
    }

    #[test]
    fn toml_file_round_trip_preserves_weights() {
        let file = NamedTempFile::new().unwrap();
        let coef = CoefficientSet::default();
        coef.save(file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("const = 196.1998"), "got:\n{text}");

        let loaded = CoefficientSet::load(file.path()).unwrap();
        assert_eq!(loaded, coef);
    }

    #[test]
    fn toml_with_unknown_term_is_rejected() {
        let mut text = CoefficientSet::default().to_toml().unwrap();
        text.push_str("bonus = 1.0\n");
        assert!(matches!(
            CoefficientSet::from_toml(&text),
            Err(CoefficientError::TomlParseError(_))
        ));
    }

    #[test]
    fn toml_with_missing_term_is_rejected() {
        let text = "const = 1.0\nfemale = 2.0\n";
        assert!(matches!(
            CoefficientSet::from_toml(text),
            Err(CoefficientError::TomlParseError(_))
        ));
    }
}

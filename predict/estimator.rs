//! # Percentile Estimator
//!
//! The prediction transform. Each student row is expanded into the design
//! vector of the fitted equation
//!
//! ```text
//! [1, female, math, math², sci, sci², pcm, obc, sc, st, general]
//! ```
//!
//! and multiplied term by term with the coefficient vector, summed left to
//! right in that order. The result is the raw linear
//! predictor: it is neither rounded nor clamped, so inputs outside the
//! natural mark range yield percentiles outside [0, 100].
//!
//! The estimator is pure. It performs no I/O, never logs, and only reads its
//! `CoefficientSet`, so one instance can serve any number of callers.

use crate::coefficients::CoefficientSet;
use crate::row::{FieldValue, Record, RowError, StudentRow};
use ndarray::{Array1, array};
use thiserror::Error;

/// Name of the derived prediction column.
pub const PREDICTED_PERCENTILE: &str = "predicted_percentile";
/// Name of the derived squared math column.
pub const MATH_SQ: &str = "math_sq";
/// Name of the derived squared science column.
pub const SCI_SQ: &str = "sci_sq";

/// Failure of a batch prediction. Row indices are zero-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("Row {row}: the required field '{field}' is missing. Please check spelling and case.")]
    MissingField { row: usize, field: &'static str },
    #[error("Row {row}: the field '{field}' has value '{value}', which cannot be converted to a number.")]
    TypeCoercion {
        row: usize,
        field: &'static str,
        value: String,
    },
}

impl EstimateError {
    fn at_row(row: usize, err: RowError) -> Self {
        match err {
            RowError::MissingField(field) => EstimateError::MissingField { row, field },
            RowError::TypeCoercion { field, value } => {
                EstimateError::TypeCoercion { row, field, value }
            }
        }
    }
}

/// One input row together with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedRow {
    /// The input fields, untouched.
    pub record: Record,
    pub math_sq: f64,
    pub sci_sq: f64,
    pub predicted_percentile: f64,
}

impl PredictedRow {
    /// Flattens into a single record: the input fields followed by the derived ones.
    pub fn into_record(self) -> Record {
        let mut record = self.record;
        record.insert(MATH_SQ, FieldValue::Float(self.math_sq));
        record.insert(SCI_SQ, FieldValue::Float(self.sci_sq));
        record.insert(
            PREDICTED_PERCENTILE,
            FieldValue::Float(self.predicted_percentile),
        );
        record
    }
}

/// Applies a fixed `CoefficientSet` to student rows.
#[derive(Debug, Clone)]
pub struct PercentileEstimator {
    coefficients: CoefficientSet,
    weights: Array1<f64>,
}

impl Default for PercentileEstimator {
    fn default() -> Self {
        Self::new(CoefficientSet::default())
    }
}

impl PercentileEstimator {
    pub fn new(coefficients: CoefficientSet) -> Self {
        let weights = coefficients.as_array();
        Self {
            coefficients,
            weights,
        }
    }

    pub fn coefficients(&self) -> &CoefficientSet {
        &self.coefficients
    }

    /// Predicts the percentile of a single student.
    pub fn predict_row(&self, row: &StudentRow) -> PredictedRow {
        let (math_sq, sci_sq, predicted_percentile) = self.evaluate(row);
        PredictedRow {
            record: row.to_record(),
            math_sq,
            sci_sq,
            predicted_percentile,
        }
    }

    /// Predicts every row, preserving order and length.
    pub fn predict_rows(&self, rows: &[StudentRow]) -> Vec<PredictedRow> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Predicts a table of loosely-typed records.
    ///
    /// Every record is converted before any prediction is made, so the first
    /// missing or non-numeric field aborts the whole table and no partial
    /// output is returned. Fields beyond the eight predictors are carried
    /// through to the output unchanged.
    pub fn predict(&self, records: &[Record]) -> Result<Vec<PredictedRow>, EstimateError> {
        let rows = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                StudentRow::from_record(record).map_err(|e| EstimateError::at_row(i, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records
            .iter()
            .zip(&rows)
            .map(|(record, row)| {
                let (math_sq, sci_sq, predicted_percentile) = self.evaluate(row);
                PredictedRow {
                    record: record.clone(),
                    math_sq,
                    sci_sq,
                    predicted_percentile,
                }
            })
            .collect())
    }

    fn evaluate(&self, row: &StudentRow) -> (f64, f64, f64) {
        let math_sq = row.tenth_math_final.powi(2);
        let sci_sq = row.tenth_sci_final.powi(2);
        let design = design_vector(row, math_sq, sci_sq);
        // Summed left to right in TERM_NAMES order so results are reproducible
        // against a hand substitution into the equation.
        let predicted = design
            .iter()
            .zip(&self.weights)
            .fold(0.0, |sum, (x, w)| sum + x * w);
        (math_sq, sci_sq, predicted)
    }
}

/// The design vector for one row, aligned with `coefficients::TERM_NAMES`.
fn design_vector(row: &StudentRow, math_sq: f64, sci_sq: f64) -> Array1<f64> {
    array![
        1.0,
        row.female,
        row.tenth_math_final,
        math_sq,
        row.tenth_sci_final,
        sci_sq,
        row.pcm,
        row.obc,
        row.sc,
        row.st,
        row.general,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::TERM_NAMES;
    use approx::assert_abs_diff_eq;

    fn student(values: [f64; 8]) -> StudentRow {
        StudentRow::from_values(values)
    }

    fn by_substitution(c: &CoefficientSet, r: &StudentRow) -> f64 {
        c.intercept()
            + c.female() * r.female
            + c.tenth_math_final() * r.tenth_math_final
            + c.tenth_math_final_sq() * (r.tenth_math_final * r.tenth_math_final)
            + c.tenth_sci_final() * r.tenth_sci_final
            + c.tenth_sci_final_sq() * (r.tenth_sci_final * r.tenth_sci_final)
            + c.pcm() * r.pcm
            + c.obc() * r.obc
            + c.sc() * r.sc
            + c.st() * r.st
            + c.general() * r.general
    }

    #[test]
    fn reference_category_yields_intercept() {
        let estimator = PercentileEstimator::default();
        let out = estimator.predict_row(&StudentRow::default());
        assert_eq!(out.predicted_percentile, 196.1998);
        assert_eq!(out.math_sq, 0.0);
        assert_eq!(out.sci_sq, 0.0);
    }

    #[test]
    fn known_student_matches_direct_substitution() {
        let estimator = PercentileEstimator::default();
        let row = student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        let out = estimator.predict_row(&row);

        // 196.1998 - 6.343773 - 2.527548*95 + 0.0201622*9025
        //   - 2.540661*92 + 0.0197534*8464 + 3.020236 - 0.8654527
        assert_abs_diff_eq!(out.predicted_percentile, 67.3095709, epsilon = 1e-6);
        assert_abs_diff_eq!(
            out.predicted_percentile,
            by_substitution(estimator.coefficients(), &row),
            epsilon = 1e-9
        );
        assert_eq!(out.math_sq, 9025.0);
        assert_eq!(out.sci_sq, 8464.0);
    }

    #[test]
    fn terms_are_summed_in_equation_order() {
        let estimator = PercentileEstimator::default();
        let rows = [
            student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]),
            student([0.0, 88.0, 85.0, 1.0, 1.0, 0.0, 0.0, 0.0]),
            student([1.0, 76.0, 79.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            student([0.0, 82.5, 88.25, 1.0, 0.0, 0.0, 0.0, 1.0]),
            student([1.0, 33.3, 41.7, 0.0, 1.0, 1.0, 1.0, 1.0]),
        ];
        for row in &rows {
            let expected = by_substitution(estimator.coefficients(), row);
            assert_eq!(
                estimator.predict_row(row).predicted_percentile.to_bits(),
                expected.to_bits(),
                "row {row:?}"
            );
        }
    }

    #[test]
    fn prediction_is_bitwise_deterministic() {
        let estimator = PercentileEstimator::default();
        let row = student([0.0, 82.5, 88.25, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let first = estimator.predict_row(&row).predicted_percentile;
        let second = estimator.predict_row(&row).predicted_percentile;
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn out_of_range_marks_are_not_clamped() {
        let estimator = PercentileEstimator::default();
        let out = estimator.predict_row(&student([0.0, 200.0, 80.0, 1.0, 0.0, 0.0, 0.0, 0.0]));
        assert!(out.predicted_percentile > 100.0);
        assert_abs_diff_eq!(out.predicted_percentile, 423.367316, epsilon = 1e-6);
    }

    #[test]
    fn out_of_domain_indicators_are_used_as_is() {
        let estimator = PercentileEstimator::default();
        let base = estimator.predict_row(&student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]));
        let doubled = estimator.predict_row(&student([2.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]));
        assert_abs_diff_eq!(
            doubled.predicted_percentile - base.predicted_percentile,
            -6.343773,
            epsilon = 1e-9
        );
    }

    #[test]
    fn alternate_coefficients_substitute_cleanly() {
        let coefficients = CoefficientSet::from_terms(TERM_NAMES.map(|term| {
            let weight = match term {
                "const" => 10.0,
                "tenth_math_final" => 1.0,
                "general" => 5.0,
                _ => 0.0,
            };
            (term, weight)
        }))
        .unwrap();
        let estimator = PercentileEstimator::new(coefficients);
        let out = estimator.predict_row(&student([1.0, 50.0, 60.0, 1.0, 1.0, 0.0, 0.0, 0.0]));
        assert_eq!(out.predicted_percentile, 65.0);
    }

    #[test]
    fn batch_preserves_length_and_order() {
        let estimator = PercentileEstimator::default();
        let rows = vec![
            student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]),
            student([0.0, 88.0, 85.0, 1.0, 1.0, 0.0, 0.0, 0.0]),
            student([1.0, 76.0, 79.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ];
        let out = estimator.predict_rows(&rows);
        assert_eq!(out.len(), rows.len());
        for (row, predicted) in rows.iter().zip(&out) {
            assert_eq!(StudentRow::from_record(&predicted.record).unwrap(), *row);
            assert_eq!(
                predicted.predicted_percentile,
                estimator.predict_row(row).predicted_percentile
            );
        }
    }

    #[test]
    fn empty_inputs_yield_empty_outputs() {
        let estimator = PercentileEstimator::default();
        assert!(estimator.predict_rows(&[]).is_empty());
        assert_eq!(estimator.predict(&[]), Ok(Vec::new()));
    }

    #[test]
    fn predict_keeps_extra_fields_and_appends_derived_ones() {
        let estimator = PercentileEstimator::default();
        let mut record = student([0.0, 88.0, 85.0, 1.0, 1.0, 0.0, 0.0, 0.0]).to_record();
        record.insert("roll_number", "A-17");

        let out = estimator.predict(std::slice::from_ref(&record)).unwrap();
        assert_eq!(out[0].record, record);

        let flat = out[0].clone().into_record();
        let names: Vec<&str> = flat.iter().map(|(k, _)| k).collect();
        assert_eq!(
            &names[names.len() - 4..],
            &["roll_number", MATH_SQ, SCI_SQ, PREDICTED_PERCENTILE]
        );
        assert_abs_diff_eq!(
            flat.get(PREDICTED_PERCENTILE).and_then(FieldValue::as_f64).unwrap(),
            59.3779275,
            epsilon = 1e-6
        );
    }

    #[test]
    fn missing_field_aborts_whole_table() {
        let estimator = PercentileEstimator::default();
        let good = student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]).to_record();
        let mut bad = good.clone();
        bad.remove("pcm");

        let result = estimator.predict(&[good.clone(), bad, good]);
        assert_eq!(
            result,
            Err(EstimateError::MissingField {
                row: 1,
                field: "pcm"
            })
        );
    }

    #[test]
    fn non_numeric_field_aborts_whole_table() {
        let estimator = PercentileEstimator::default();
        let mut record = student([1.0, 95.0, 92.0, 1.0, 0.0, 1.0, 0.0, 0.0]).to_record();
        record.insert("obc", "yes");

        match estimator.predict(&[record]) {
            Err(EstimateError::TypeCoercion { row, field, value }) => {
                assert_eq!(row, 0);
                assert_eq!(field, "obc");
                assert_eq!(value, "yes");
            }
            other => panic!("Expected TypeCoercion error, got {:?}", other),
        }
    }

    #[test]
    fn estimator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PercentileEstimator>();
    }
}

//! Human-readable documentation of the model, printed by the `about` command.

use crate::coefficients::CoefficientSet;
use crate::row::REQUIRED_FIELDS;
use std::fmt::Write;

/// Display label and weight of each term, in the order the equation is written.
fn display_terms(coef: &CoefficientSet) -> [(&'static str, f64); 10] {
    [
        ("Female", coef.female()),
        ("Math", coef.tenth_math_final()),
        ("Math²", coef.tenth_math_final_sq()),
        ("Science", coef.tenth_sci_final()),
        ("Science²", coef.tenth_sci_final_sq()),
        ("PCM", coef.pcm()),
        ("General", coef.general()),
        ("OBC", coef.obc()),
        ("SC", coef.sc()),
        ("ST", coef.st()),
    ]
}

// Small weights (the quadratic terms) need more decimals to be legible.
fn rounded(weight: f64) -> String {
    if weight.abs() < 0.1 {
        format!("{:.4}", weight.abs())
    } else {
        format!("{:.2}", weight.abs())
    }
}

/// The equation with rounded weights; terms with a zero weight are omitted.
pub fn equation(coef: &CoefficientSet) -> String {
    let mut text = format!("Predicted Percentile = {:.2}", coef.intercept());
    for (label, weight) in display_terms(coef) {
        if weight == 0.0 {
            continue;
        }
        let sign = if weight < 0.0 { '-' } else { '+' };
        // Writing to a String cannot fail.
        let _ = write!(text, " {sign} {} × {label}", rounded(weight));
    }
    text
}

fn column_help(field: &str) -> &'static str {
    match field {
        "female" => "0 for female and 1 for male",
        "tenth_math_final" => "10th CBSE Mathematics score out of 100",
        "tenth_sci_final" => "10th CBSE Science score out of 100",
        "pcm" => "1 for PCM and 0 for PCMB",
        "general" => "1 for general student and 0 otherwise",
        "obc" => "1 for OBC and 0 otherwise",
        "sc" => "1 for SC and 0 otherwise",
        "st" => "1 for ST and 0 otherwise",
        _ => "",
    }
}

/// The full model description: method, predictors, equation, accuracy and data requirements.
pub fn model_description(coef: &CoefficientSet) -> String {
    let mut text = String::new();
    text.push_str("JEE Mains Percentile Predictor\n\n");

    text.push_str("What regression means\n");
    text.push_str(
        "  Regression relates one outcome (here, the JEE Mains percentile) to a set of\n  \
         predictors (gender, class 10 math and science marks, PCM vs PCMB, social\n  \
         category). It finds the best-fitting equation for predicting the outcome.\n\n",
    );

    text.push_str("About this model\n");
    text.push_str("  - Gender\n");
    text.push_str("  - Class 10 Math and Science scores (with quadratic terms)\n");
    text.push_str("  - PCM stream indicator (PCM vs PCMB)\n");
    text.push_str("  - Social category (General, OBC, SC, ST; ST is the reference)\n\n");

    text.push_str("Regression equation\n");
    text.push_str(&format!("  {}\n\n", equation(coef)));

    text.push_str("Accuracy (from regression)\n");
    text.push_str("  R² = 0.428: about 43% of the variation in percentiles is explained\n");
    text.push_str("  Adj R² = 0.368\n");
    text.push_str("  Root MSE = 19.0: the average prediction error is about 19 percentile points\n\n");

    text.push_str("Accuracy (from prediction)\n");
    text.push_str("  Accuracy = 80.2%: students correctly predicted as qualified or not qualified\n");
    text.push_str("  Sensitivity = 48.0%: qualified students correctly predicted as qualified\n");
    text.push_str("  Specificity = 92.9%: non-qualified students correctly predicted as not qualified\n");
    text.push_str("  Sensitivity (true positives / qualified detected) = 72.6%\n\n");

    text.push_str("Data requirements\n");
    text.push_str("  An Excel (.xlsx), CSV or TSV file whose header names these columns exactly:\n");
    for field in REQUIRED_FIELDS {
        text.push_str(&format!("  - {field:<17} {}\n", column_help(field)));
    }
    text
}

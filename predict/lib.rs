#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod about;
pub mod coefficients;
pub mod estimator;
pub mod export;
pub mod row;
pub mod summary;
pub mod table;

pub use coefficients::CoefficientSet;
pub use estimator::{EstimateError, PercentileEstimator, PredictedRow};
pub use row::{FieldValue, Record, StudentRow};

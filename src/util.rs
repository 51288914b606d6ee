use crate::error::{Error, Result};

/// Checks that a numerical value is in the closed interval `[a,b]`
///
/// ### Example
/// ```ignore
/// check_interval("gamma", 2.0, 0.0, 1.0)?;
/// ```
/// This fails with the message "invalid value for \`gamma\` (2): must be in the interval \[0, 1\]"
pub(crate) fn check_interval(name: &'static str, value: f64, a: f64, b: f64) -> Result<()> {
    (value >= a && value <= b)
        .then_some(())
        .ok_or(Error::OutOfInterval {
            name,
            value,
            low: a,
            high: b,
        })
}

/// Checks that a numerical value is strictly positive
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    (value > 0.0)
        .then_some(())
        .ok_or(Error::InvalidHyperparameter {
            name,
            value,
            reason: "must be greater than zero",
        })
}

//! Fitness distance between actual and ideal property values.
//!
//! Follows the W3C Media Capture "fitness distance" rule: every compared
//! field yields an `(actual, ideal)` pair of textual values, and the
//! distance of a candidate is the sum of the per-field contributions.
//!
//! | actual / ideal              | contribution                          |
//! |-----------------------------|---------------------------------------|
//! | textually equal             | `0`                                   |
//! | both numeric                | `\|a - i\| / max(\|a\|, \|i\|)`       |
//! | both non-numeric, different | `1`                                   |
//! | numeric vs non-numeric      | panic (inconsistent property kinds)   |
//!
//! Normalizing numeric differences keeps fields of very different scale
//! (pixels vs. bits per second) comparable.

use std::fmt::Display;

/// An ordered set of `(actual, ideal)` pairs to score.
#[derive(Debug, Default, Clone)]
pub struct Comparisons {
    pairs: Vec<(String, String)>,
}

impl Comparisons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the evaluation set.
    pub fn add(&mut self, actual: impl Display, ideal: impl Display) {
        self.pairs.push((actual.to_string(), ideal.to_string()));
    }

    /// Add a field only if the ideal is constrained. Unconstrained fields
    /// stay out of the evaluation set entirely.
    pub fn add_constrained<T: Display>(&mut self, actual: impl Display, ideal: Option<T>) {
        if let Some(ideal) = ideal {
            self.add(actual, ideal);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Sum of [`field_distance`] over every pair.
    pub fn fitness_distance(&self) -> f64 {
        self.pairs
            .iter()
            .map(|(actual, ideal)| field_distance(actual, ideal))
            .sum()
    }
}

/// Distance contribution of a single field.
///
/// # Panics
///
/// Panics if exactly one of the two values is numeric. A property and its
/// constraint must agree in kind; scoring them anyway would silently rank
/// candidates on garbage.
pub fn field_distance(actual: &str, ideal: &str) -> f64 {
    if actual == ideal {
        return 0.0;
    }

    match (actual.parse::<f64>(), ideal.parse::<f64>()) {
        (Ok(a), Ok(i)) => {
            let scale = a.abs().max(i.abs());
            if scale == 0.0 {
                // "0" vs "0.0"
                0.0
            } else {
                (a - i).abs() / scale
            }
        }
        (Err(_), Err(_)) => 1.0,
        _ => panic!("fitness distance can't mix numeric and non-numeric values: {actual:?} vs {ideal:?}"),
    }
}

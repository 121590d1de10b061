//! Refinements narrow what an unknown value may turn out to be.
//!
//! A refinement never widens: combining two refinement sets with
//! [`Refinements::intersect`] keeps the strongest fact from each side.
//!
//! ```
//! use corner_provider::refinement::{refine_not_null, refine_string_prefix};
//! use corner_provider::value::{Type, Value};
//!
//! let v = refine_string_prefix(refine_not_null(Value::unknown(Type::String)), "x-");
//! let r = v.refinements().unwrap();
//! assert!(r.definitely_not_null);
//! assert_eq!(r.string_prefix.as_deref(), Some("x-"));
//! ```

use serde::{Deserialize, Serialize};

use crate::value::{Type, Value};

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberBound {
    /// The bound itself.
    pub value: f64,
    /// Whether the bound is part of the range.
    pub inclusive: bool,
}

impl NumberBound {
    /// An inclusive bound.
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    /// An exclusive bound.
    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// Which ends of a numeric range are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeInclusivity {
    /// Lower bound inclusive.
    pub lower: bool,
    /// Upper bound inclusive.
    pub upper: bool,
}

impl RangeInclusivity {
    /// Both ends inclusive.
    pub const CLOSED: Self = Self {
        lower: true,
        upper: true,
    };
}

/// Facts known about an unknown value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Refinements {
    /// The value will not be null.
    pub definitely_not_null: bool,
    /// A string value will start with this prefix.
    pub string_prefix: Option<String>,
    /// A number will be at least this.
    pub number_lower: Option<NumberBound>,
    /// A number will be at most this.
    pub number_upper: Option<NumberBound>,
    /// A collection will have at least this many elements.
    pub length_lower: Option<u64>,
    /// A collection will have at most this many elements.
    pub length_upper: Option<u64>,
}

impl Refinements {
    /// No refinements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no fact is recorded.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Record that the value will not be null.
    pub fn not_null(mut self) -> Self {
        self.definitely_not_null = true;
        self
    }

    /// Record a string prefix.
    pub fn with_string_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.string_prefix = Some(prefix.into());
        self
    }

    /// Record a numeric range.
    pub fn with_number_range(
        mut self,
        lower: Option<f64>,
        upper: Option<f64>,
        inclusivity: RangeInclusivity,
    ) -> Self {
        self.number_lower = lower.map(|value| NumberBound {
            value,
            inclusive: inclusivity.lower,
        });
        self.number_upper = upper.map(|value| NumberBound {
            value,
            inclusive: inclusivity.upper,
        });
        self
    }

    /// Record a collection length range.
    pub fn with_length_range(mut self, lower: Option<u64>, upper: Option<u64>) -> Self {
        self.length_lower = lower;
        self.length_upper = upper;
        self
    }

    /// Keep only the facts meaningful for values of `ty`.
    pub fn restricted_to(mut self, ty: &Type) -> Self {
        if *ty != Type::String {
            self.string_prefix = None;
        }
        if *ty != Type::Number {
            self.number_lower = None;
            self.number_upper = None;
        }
        if !ty.is_collection() {
            self.length_lower = None;
            self.length_upper = None;
        }
        self
    }

    /// Combine two refinement sets, keeping the strongest fact from each.
    ///
    /// Contradictory string prefixes cannot be intersected; `self` wins.
    pub fn intersect(&self, other: &Refinements) -> Refinements {
        let string_prefix = match (&self.string_prefix, &other.string_prefix) {
            (Some(a), Some(b)) if b.starts_with(a.as_str()) => Some(b.clone()),
            (Some(a), _) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Refinements {
            definitely_not_null: self.definitely_not_null || other.definitely_not_null,
            string_prefix,
            number_lower: tighter(self.number_lower, other.number_lower, |a, b| a > b),
            number_upper: tighter(self.number_upper, other.number_upper, |a, b| a < b),
            length_lower: match (self.length_lower, other.length_lower) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
            length_upper: match (self.length_upper, other.length_upper) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// Whether a concrete value satisfies every recorded fact.
    ///
    /// Unknown values always pass.
    pub fn admits(&self, value: &Value) -> bool {
        match value {
            Value::Unknown(..) => true,
            Value::Null(_) => !self.definitely_not_null,
            Value::String(s) => self
                .string_prefix
                .as_ref()
                .map_or(true, |prefix| s.starts_with(prefix.as_str())),
            Value::Number(n) => {
                let above = self.number_lower.map_or(true, |lo| {
                    if lo.inclusive {
                        *n >= lo.value
                    } else {
                        *n > lo.value
                    }
                });
                let below = self.number_upper.map_or(true, |hi| {
                    if hi.inclusive {
                        *n <= hi.value
                    } else {
                        *n < hi.value
                    }
                });
                above && below
            }
            other => match other.length() {
                Some(len) => {
                    let len = len as u64;
                    self.length_lower.map_or(true, |lo| len >= lo)
                        && self.length_upper.map_or(true, |hi| len <= hi)
                }
                None => true,
            }
        }
    }
}

fn tighter(
    a: Option<NumberBound>,
    b: Option<NumberBound>,
    stricter: impl Fn(f64, f64) -> bool,
) -> Option<NumberBound> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if a.value == b.value {
                Some(NumberBound {
                    value: a.value,
                    inclusive: a.inclusive && b.inclusive,
                })
            } else if stricter(a.value, b.value) {
                Some(a)
            } else {
                Some(b)
            }
        }
        (a, b) => a.or(b),
    }
}

fn refine(value: Value, extra: Refinements) -> Value {
    match value {
        Value::Unknown(ty, existing) => {
            let merged = existing.intersect(&extra).restricted_to(&ty);
            Value::Unknown(ty, merged)
        }
        known => known,
    }
}

/// Mark an unknown value as definitely not null. Known values are returned as-is.
pub fn refine_not_null(value: Value) -> Value {
    refine(value, Refinements::new().not_null())
}

/// Attach a string prefix to an unknown string.
pub fn refine_string_prefix(value: Value, prefix: impl Into<String>) -> Value {
    refine(value, Refinements::new().with_string_prefix(prefix))
}

/// Attach a numeric range to an unknown number.
pub fn refine_number_range(
    value: Value,
    lower: Option<f64>,
    upper: Option<f64>,
    inclusivity: RangeInclusivity,
) -> Value {
    refine(
        value,
        Refinements::new().with_number_range(lower, upper, inclusivity),
    )
}

/// Attach a length range to an unknown collection.
pub fn refine_collection_length(value: Value, lower: Option<u64>, upper: Option<u64>) -> Value {
    refine(value, Refinements::new().with_length_range(lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_known_value_is_noop() {
        let v = refine_not_null(Value::string("known"));
        assert_eq!(v, Value::string("known"));
    }

    #[test]
    fn test_refine_accumulates() {
        let v = refine_string_prefix(refine_not_null(Value::unknown(Type::String)), "x-");
        let r = v.refinements().unwrap();
        assert!(r.definitely_not_null);
        assert_eq!(r.string_prefix.as_deref(), Some("x-"));
    }

    #[test]
    fn test_inapplicable_refinements_dropped() {
        let v = refine_string_prefix(Value::unknown(Type::Number), "x-");
        assert!(v.refinements().unwrap().is_empty());

        let v = refine_collection_length(Value::unknown(Type::String), Some(1), None);
        assert!(v.refinements().unwrap().is_empty());
    }

    #[test]
    fn test_intersect_prefix_keeps_longer() {
        let a = Refinements::new().with_string_prefix("x-");
        let b = Refinements::new().with_string_prefix("x-abc");
        assert_eq!(a.intersect(&b).string_prefix.as_deref(), Some("x-abc"));
        assert_eq!(b.intersect(&a).string_prefix.as_deref(), Some("x-abc"));
    }

    #[test]
    fn test_intersect_conflicting_prefix_keeps_self() {
        let a = Refinements::new().with_string_prefix("x-");
        let b = Refinements::new().with_string_prefix("y-");
        assert_eq!(a.intersect(&b).string_prefix.as_deref(), Some("x-"));
    }

    #[test]
    fn test_intersect_number_range() {
        let a =
            Refinements::new().with_number_range(Some(0.0), Some(100.0), RangeInclusivity::CLOSED);
        let b = Refinements::new().with_number_range(
            Some(0.0),
            Some(50.0),
            RangeInclusivity {
                lower: false,
                upper: true,
            },
        );
        let r = a.intersect(&b);
        assert_eq!(r.number_lower, Some(NumberBound::exclusive(0.0)));
        assert_eq!(r.number_upper, Some(NumberBound::inclusive(50.0)));
    }

    #[test]
    fn test_intersect_length_and_nullness() {
        let a = Refinements::new().with_length_range(Some(1), Some(10));
        let b = Refinements::new().not_null().with_length_range(Some(2), None);
        let r = a.intersect(&b);
        assert!(r.definitely_not_null);
        assert_eq!(r.length_lower, Some(2));
        assert_eq!(r.length_upper, Some(10));
    }

    #[test]
    fn test_intersect_never_weakens() {
        let strong = Refinements::new().not_null().with_string_prefix("x-");
        let r = strong.intersect(&Refinements::new());
        assert_eq!(r, strong);
    }

    #[test]
    fn test_admits() {
        let r = Refinements::new().not_null().with_string_prefix("x-");
        assert!(r.admits(&Value::string("x-1")));
        assert!(!r.admits(&Value::string("y-1")));
        assert!(!r.admits(&Value::null(Type::String)));
        assert!(r.admits(&Value::unknown(Type::String)));

        let r = Refinements::new().with_number_range(
            Some(1.0),
            Some(5.0),
            RangeInclusivity {
                lower: true,
                upper: false,
            },
        );
        assert!(r.admits(&Value::number(1.0)));
        assert!(!r.admits(&Value::number(5.0)));

        let r = Refinements::new().with_length_range(Some(1), None);
        let empty = Value::list(Type::String, vec![]).unwrap();
        assert!(!r.admits(&empty));
    }
}

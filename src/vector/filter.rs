//! Typed filter expressions over payload fields.
//!
//! A filter is a conjunction of predicates: equality, set-membership, and
//! ISO-date range. MCP tool arguments build these; the store adapter owns
//! the translation to the backend's query language (see
//! [`qdrant`](super::qdrant)), including mapping date ranges onto the
//! numeric `date_num` shadow field.

use chrono::NaiveDate;

/// One predicate over a payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the given keyword.
    Eq {
        /// Payload field name.
        field: String,
        /// Expected value.
        value: String,
    },
    /// Field matches any of the given keywords.
    AnyOf {
        /// Payload field name.
        field: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Publication date within the inclusive range.
    DateRange {
        /// Earliest date, inclusive.
        from: Option<NaiveDate>,
        /// Latest date, inclusive.
        to: Option<NaiveDate>,
    },
}

/// Conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Predicates, all of which must hold.
    pub predicates: Vec<Predicate>,
}

impl Filter {
    /// Creates an empty filter (matches everything).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Adds an equality predicate.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a set-membership predicate. A single value degrades to equality;
    /// an empty set adds nothing.
    #[must_use]
    pub fn any_of(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        match values.len() {
            0 => {}
            1 => {
                if let Some(value) = values.into_iter().next() {
                    self.predicates.push(Predicate::Eq {
                        field: field.into(),
                        value,
                    });
                }
            }
            _ => self.predicates.push(Predicate::AnyOf {
                field: field.into(),
                values,
            }),
        }
        self
    }

    /// Adds a date-range predicate. No-op when both bounds are absent.
    #[must_use]
    pub fn date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        if from.is_some() || to.is_some() {
            self.predicates.push(Predicate::DateRange { from, to });
        }
        self
    }

    /// Whether the filter constrains anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

//! Incremental aggregate functions.
//!
//! Every accumulator takes rows with a signed multiplicity (`+1` when a row
//! enters its group, `-1` when it leaves) and reports its current value as a
//! [`Value`]. Null inputs are skipped by everything but `COUNT(*)`.

use alloc::collections::BTreeMap;
use alloc::string::String;
use ripple_core::{Row, Value};

/// Aggregate function kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One aggregate column of a grouped query: `function(column) AS alias`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Aggregate {
    pub function: AggregateFn,
    /// `None` only for `COUNT(*)`.
    pub column: Option<String>,
    pub alias: String,
}

impl Aggregate {
    pub fn new(function: AggregateFn, column: Option<&str>, alias: impl Into<String>) -> Self {
        Self {
            function,
            column: column.map(String::from),
            alias: alias.into(),
        }
    }

    /// `COUNT(*) AS alias`.
    pub fn count(alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Count, None, alias)
    }

    /// Creates an empty accumulator for this aggregate.
    pub fn accumulator(&self) -> Accumulator {
        let column = self.column.clone();
        match self.function {
            AggregateFn::Count => Accumulator::Count(IncrementalCount::new(column)),
            AggregateFn::Sum => Accumulator::Sum(IncrementalSum::new(column)),
            AggregateFn::Avg => Accumulator::Avg(IncrementalAvg::new(column)),
            AggregateFn::Min => Accumulator::Min(IncrementalMin::new(column)),
            AggregateFn::Max => Accumulator::Max(IncrementalMax::new(column)),
        }
    }
}

static COUNT_STAR: Value = Value::Null;

/// Reads the aggregated input of `row`, `None` meaning "skip".
fn input_of<'a>(column: &Option<String>, row: &'a Row) -> Option<&'a Value> {
    match column {
        Some(c) => {
            let v = row.get(c);
            if v.is_null() {
                None
            } else {
                Some(v)
            }
        }
        None => Some(&COUNT_STAR),
    }
}

/// COUNT. Counts every row for `COUNT(*)`, non-null values otherwise.
#[derive(Clone, Debug, Default)]
pub struct IncrementalCount {
    column: Option<String>,
    count: i64,
}

impl IncrementalCount {
    pub fn new(column: Option<String>) -> Self {
        Self { column, count: 0 }
    }

    pub fn apply(&mut self, row: &Row, diff: i64) {
        if input_of(&self.column, row).is_some() {
            self.count += diff;
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.count
    }
}

/// SUM over numeric values. Null when no value has been seen.
#[derive(Clone, Debug, Default)]
pub struct IncrementalSum {
    column: Option<String>,
    sum: f64,
    count: i64,
}

impl IncrementalSum {
    pub fn new(column: Option<String>) -> Self {
        Self {
            column,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn apply(&mut self, row: &Row, diff: i64) {
        if let Some(num) = input_of(&self.column, row).and_then(Value::as_f64) {
            self.sum += num * diff as f64;
            self.count += diff;
        }
    }

    pub fn get(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum)
        }
    }
}

/// AVG, kept as a running sum and count.
#[derive(Clone, Debug, Default)]
pub struct IncrementalAvg {
    column: Option<String>,
    sum: f64,
    count: i64,
}

impl IncrementalAvg {
    pub fn new(column: Option<String>) -> Self {
        Self {
            column,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn apply(&mut self, row: &Row, diff: i64) {
        if let Some(num) = input_of(&self.column, row).and_then(Value::as_f64) {
            self.sum += num * diff as f64;
            self.count += diff;
        }
    }

    /// Returns the current average, or None if no value is present.
    pub fn get(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Multiset of values, so MIN and MAX survive deletions without a rescan.
#[derive(Clone, Debug, Default)]
struct ValueCounts {
    counts: BTreeMap<Value, u64>,
}

impl ValueCounts {
    fn apply(&mut self, value: &Value, diff: i64) {
        if diff >= 0 {
            *self.counts.entry(value.clone()).or_insert(0) += diff as u64;
            return;
        }
        let remove = diff.unsigned_abs();
        if let Some(count) = self.counts.get_mut(value) {
            if *count <= remove {
                self.counts.remove(value);
            } else {
                *count -= remove;
            }
        }
    }
}

/// MIN.
#[derive(Clone, Debug, Default)]
pub struct IncrementalMin {
    column: Option<String>,
    values: ValueCounts,
}

impl IncrementalMin {
    pub fn new(column: Option<String>) -> Self {
        Self {
            column,
            values: ValueCounts::default(),
        }
    }

    pub fn apply(&mut self, row: &Row, diff: i64) {
        if let Some(v) = input_of(&self.column, row) {
            self.values.apply(v, diff);
        }
    }

    pub fn get(&self) -> Option<&Value> {
        self.values.counts.keys().next()
    }
}

/// MAX.
#[derive(Clone, Debug, Default)]
pub struct IncrementalMax {
    column: Option<String>,
    values: ValueCounts,
}

impl IncrementalMax {
    pub fn new(column: Option<String>) -> Self {
        Self {
            column,
            values: ValueCounts::default(),
        }
    }

    pub fn apply(&mut self, row: &Row, diff: i64) {
        if let Some(v) = input_of(&self.column, row) {
            self.values.apply(v, diff);
        }
    }

    pub fn get(&self) -> Option<&Value> {
        self.values.counts.keys().next_back()
    }
}

/// Any of the incremental aggregates.
#[derive(Clone, Debug)]
pub enum Accumulator {
    Count(IncrementalCount),
    Sum(IncrementalSum),
    Avg(IncrementalAvg),
    Min(IncrementalMin),
    Max(IncrementalMax),
}

impl Accumulator {
    pub fn apply(&mut self, row: &Row, diff: i64) {
        match self {
            Accumulator::Count(a) => a.apply(row, diff),
            Accumulator::Sum(a) => a.apply(row, diff),
            Accumulator::Avg(a) => a.apply(row, diff),
            Accumulator::Min(a) => a.apply(row, diff),
            Accumulator::Max(a) => a.apply(row, diff),
        }
    }

    /// Current value. Count is `Int64`, sum and avg are `Float64`, and
    /// every aggregate but count is null over an empty input.
    pub fn value(&self) -> Value {
        match self {
            Accumulator::Count(a) => Value::Int64(a.get()),
            Accumulator::Sum(a) => a.get().map_or(Value::Null, Value::Float64),
            Accumulator::Avg(a) => a.get().map_or(Value::Null, Value::Float64),
            Accumulator::Min(a) => a.get().cloned().unwrap_or(Value::Null),
            Accumulator::Max(a) => a.get().cloned().unwrap_or(Value::Null),
        }
    }
}

//! Query AST.

use super::condition::Condition;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::SortOrder;
use ripple_incremental::Aggregate;

/// `parent.parent_field = child.child_field`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Correlation {
    pub parent_field: String,
    pub child_field: String,
}

impl Correlation {
    pub fn new(parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            child_field: child_field.into(),
        }
    }
}

/// A subquery attached to each parent row through a correlation.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatedSubquery {
    pub correlation: Correlation,
    pub subquery: Ast,
    /// Name the subquery is known by in the query.
    pub alias: String,
    /// Relationship name in the output. Defaults to `alias`.
    pub relationship_name: Option<String>,
    /// Hidden relationships are flattened away by views.
    pub hidden: bool,
}

impl CorrelatedSubquery {
    pub fn new(correlation: Correlation, subquery: Ast, alias: impl Into<String>) -> Self {
        Self {
            correlation,
            subquery,
            alias: alias.into(),
            relationship_name: None,
            hidden: false,
        }
    }

    pub fn relationship(&self) -> &str {
        self.relationship_name.as_deref().unwrap_or(&self.alias)
    }
}

/// A query over one table, with nested subqueries.
#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    pub table: String,
    pub where_: Option<Condition>,
    pub order_by: SortOrder,
    pub subqueries: Vec<CorrelatedSubquery>,
    pub limit: Option<i64>,
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
}

impl Ast {
    /// `SELECT * FROM table`, ordered by nothing but the primary key.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_: None,
            order_by: SortOrder::new(),
            subqueries: Vec::new(),
            limit: None,
            group_by: Vec::new(),
            aggregates: Vec::new(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.where_ = Some(condition);
        self
    }

    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order_by = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn related(mut self, subquery: CorrelatedSubquery) -> Self {
        self.subqueries.push(subquery);
        self
    }

    pub fn group_by<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.group_by = columns.iter().map(|c| String::from(c.as_ref())).collect();
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Returns true if the query groups or aggregates.
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates.is_empty()
    }
}

//! Pipeline builder.
//!
//! Compiles an [`Ast`] into a wired operator graph. Every failure is a build
//! error; a pipeline that builds never fails at push time.
//!
//! Per query level the chain is:
//!
//! ```text
//! source ─▶ Filter ─▶ exists joins ─▶ Exists… ─▶ GroupBy ─▶ Take ─▶ Join…
//! ```
//!
//! Subqueries are built first, so each `Join` is constructed over a fully
//! built child.

use crate::ast::{Ast, Condition, CorrelatedSubquery, LogicalOp};
use crate::context::BuilderContext;
use crate::predicate;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use ripple_core::{Error, Result};
use ripple_incremental::{
    Exists, ExistsType, Filter, GroupBy, Input, Join, JoinArgs, SourceSchema, Take,
};

/// Limit applied to the subquery behind an `EXISTS`. Membership only needs
/// to know whether the relationship is empty.
pub const EXISTS_LIMIT: i64 = 3;

/// Builds the operator graph for `ast`.
///
/// # Errors
///
/// - `SourceNotFound` if a table has no source in `ctx`
/// - `ColumnNotFound` if an ordering or condition names an unknown column
/// - `InvalidCorrelation` if a correlation field is missing on either side
/// - `InvalidPattern` for a malformed `LIKE` / `ILIKE`
/// - `InvalidLimit` for a negative limit
/// - `InvalidOperation` for an `EXISTS` nested under `OR`, or grouping in a
///   subquery
pub fn build_pipeline(ast: &Ast, ctx: &impl BuilderContext) -> Result<Rc<dyn Input>> {
    build_level(ast, ctx, None)
}

/// Splits a `where` into the `EXISTS` terms of its top-level `AND` and the
/// remaining row condition.
fn split_where(condition: &Condition) -> Result<(Vec<&Condition>, Option<Condition>)> {
    let terms: Vec<&Condition> = match condition {
        Condition::Conjunction {
            op: LogicalOp::And,
            conditions,
        } => conditions.iter().collect(),
        other => vec![other],
    };

    let mut exists = Vec::new();
    let mut rest = Vec::new();
    for term in terms {
        match term {
            Condition::Exists { .. } => exists.push(term),
            _ if term.has_exists() => {
                return Err(Error::invalid_operation(
                    "EXISTS is only supported in the top-level AND of a where clause",
                ));
            }
            _ => rest.push(term.clone()),
        }
    }

    let rest = match rest.len() {
        0 => None,
        1 => rest.pop(),
        _ => Some(Condition::and(rest)),
    };
    Ok((exists, rest))
}

fn check_limit(limit: Option<i64>) -> Result<Option<usize>> {
    match limit {
        None => Ok(None),
        Some(n) => usize::try_from(n)
            .map(Some)
            .map_err(|_| Error::invalid_limit(n)),
    }
}

fn check_fields(schema: &SourceSchema, condition: &Condition) -> Result<()> {
    for field in condition.fields() {
        if !schema.columns.contains_key(field) {
            return Err(Error::column_not_found(&schema.table_name, field));
        }
    }
    Ok(())
}

fn build_level(
    ast: &Ast,
    ctx: &impl BuilderContext,
    partition: Option<&str>,
) -> Result<Rc<dyn Input>> {
    let limit = check_limit(ast.limit)?;
    if partition.is_some() && ast.is_grouped() {
        return Err(Error::invalid_operation(format!(
            "subquery on {} cannot group or aggregate",
            ast.table
        )));
    }

    let source = ctx
        .get_source(&ast.table)
        .ok_or_else(|| Error::source_not_found(&ast.table))?;

    let (exists_terms, row_condition) = match &ast.where_ {
        Some(condition) => split_where(condition)?,
        None => (Vec::new(), None),
    };
    let row_predicate = row_condition.as_ref().map(predicate::compile).transpose()?;

    let conn = source.connect(ast.order_by.clone(), row_predicate.clone())?;
    if let Some(condition) = &row_condition {
        check_fields(conn.schema(), condition)?;
    }
    let mut end: Rc<dyn Input> = conn;
    // Source connections filter scans only. The Filter turns pushes that
    // cross the condition into adds and removes before Exists caches sizes.
    if let Some(predicate) = row_predicate {
        end = Filter::new(end, predicate);
    }

    for (n, term) in exists_terms.into_iter().enumerate() {
        let Condition::Exists { op, subquery } = term else {
            continue;
        };
        let mut related = (**subquery).clone();
        related.subquery.limit = Some(EXISTS_LIMIT);
        // Several EXISTS over the same alias must not share a relationship.
        let relationship = format!("{}_{}", related.relationship(), n);
        related.relationship_name = Some(relationship.clone());
        end = attach(end, &related, ctx)?;
        end = Exists::new(end, ctx.create_storage(), relationship, *op);
    }

    if ast.is_grouped() {
        end = GroupBy::new(end, ast.group_by.clone(), ast.aggregates.clone());
    }

    if let Some(limit) = limit {
        let partition_key = partition.map(|p| vec![String::from(p)]);
        end = Take::new(end, ctx.create_storage(), limit, partition_key);
    }

    for related in &ast.subqueries {
        end = attach(end, related, ctx)?;
    }

    Ok(end)
}

/// Builds `related` and joins it under `parent`.
fn attach(
    parent: Rc<dyn Input>,
    related: &CorrelatedSubquery,
    ctx: &impl BuilderContext,
) -> Result<Rc<dyn Input>> {
    let correlation = &related.correlation;
    if !parent.schema().columns.contains_key(&correlation.parent_field) {
        return Err(Error::invalid_correlation(format!(
            "{} has no column {}",
            parent.schema().table_name,
            correlation.parent_field
        )));
    }

    let child = build_level(&related.subquery, ctx, Some(&correlation.child_field))?;
    if !child.schema().columns.contains_key(&correlation.child_field) {
        return Err(Error::invalid_correlation(format!(
            "{} has no column {}",
            child.schema().table_name,
            correlation.child_field
        )));
    }

    let join: Rc<dyn Input> = Join::new(JoinArgs {
        parent,
        child,
        storage: ctx.create_storage(),
        parent_key: vec![correlation.parent_field.clone()],
        child_key: vec![correlation.child_field.clone()],
        relationship: related.relationship().into(),
        hidden: related.hidden,
    });
    Ok(join)
}

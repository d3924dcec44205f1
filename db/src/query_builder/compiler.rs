//! Lowering builder state into a clause list, and the clause list into SQL.
//!
//! Clause order is fixed: SELECT, FROM, JOIN, WHERE, GROUP BY, HAVING,
//! ORDER BY, LIMIT, OFFSET. Values only ever appear as `$n` placeholders;
//! LIMIT and OFFSET are integers and are written inline.

use super::escape::{escape_column, escape_identifier};
use super::params::{CompiledQuery, ParamBuilder};
use super::state::{
    AggregateSpec, Condition, JoinSpec, Operator, OrderSpec, Predicate, QueryBuilderState,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Clause {
    Select(Vec<String>),
    From(String),
    Join(String),
    Where(Vec<String>),
    GroupBy(Vec<String>),
    Having(Vec<String>),
    OrderBy(Vec<String>),
    Limit(u64),
    Offset(u64),
}

impl Clause {
    fn render(&self) -> String {
        match self {
            Clause::Select(parts) => format!("SELECT {}", parts.join(", ")),
            Clause::From(table) => format!("FROM {table}"),
            Clause::Join(join) => join.clone(),
            Clause::Where(parts) => format!("WHERE {}", parts.join(" ")),
            Clause::GroupBy(parts) => format!("GROUP BY {}", parts.join(", ")),
            Clause::Having(parts) => format!("HAVING {}", parts.join(" ")),
            Clause::OrderBy(parts) => format!("ORDER BY {}", parts.join(", ")),
            Clause::Limit(n) => format!("LIMIT {n}"),
            Clause::Offset(n) => format!("OFFSET {n}"),
        }
    }
}

pub(crate) fn compile(state: &QueryBuilderState) -> CompiledQuery {
    let mut params = ParamBuilder::new();
    let clauses = lower(state, &mut params);
    let sql = clauses
        .iter()
        .map(Clause::render)
        .collect::<Vec<_>>()
        .join(" ");
    CompiledQuery {
        sql,
        params: params.finish(),
    }
}

pub(crate) fn lower(state: &QueryBuilderState, params: &mut ParamBuilder) -> Vec<Clause> {
    let mut clauses = vec![
        Clause::Select(select_list(state)),
        Clause::From(escape_identifier(&state.table).into_owned()),
    ];

    clauses.extend(state.joins.iter().map(|j| Clause::Join(join(&state.table, j))));

    if !state.where_clauses.is_empty() {
        clauses.push(Clause::Where(predicates(&state.where_clauses, params)));
    }
    if !state.group_by.is_empty() {
        clauses.push(Clause::GroupBy(
            state.group_by.iter().map(|c| escape_column(c)).collect(),
        ));
    }
    if !state.having.is_empty() {
        clauses.push(Clause::Having(predicates(&state.having, params)));
    }
    if !state.order_by.is_empty() {
        clauses.push(Clause::OrderBy(state.order_by.iter().map(order).collect()));
    }
    if let Some(limit) = state.limit {
        clauses.push(Clause::Limit(limit));
    }
    if let Some(offset) = state.offset {
        clauses.push(Clause::Offset(offset));
    }
    clauses
}

/// Explicit columns first, then aggregates. With aggregates but no explicit
/// columns, the GROUP BY columns are projected so each group is labelled.
fn select_list(state: &QueryBuilderState) -> Vec<String> {
    let mut parts: Vec<String> = state.columns.iter().map(|c| escape_column(c)).collect();
    if !state.aggregates.is_empty() {
        if parts.is_empty() {
            parts.extend(state.group_by.iter().map(|c| escape_column(c)));
        }
        parts.extend(state.aggregates.iter().map(aggregate));
    }
    if parts.is_empty() {
        parts.push("*".to_string());
    }
    parts
}

fn aggregate(spec: &AggregateSpec) -> String {
    let distinct = if spec.distinct { "DISTINCT " } else { "" };
    format!(
        "{}({}{}) AS {}",
        spec.function.as_sql(),
        distinct,
        escape_column(&spec.column),
        escape_identifier(&spec.output_name())
    )
}

fn join(base: &str, spec: &JoinSpec) -> String {
    let table = escape_identifier(&spec.table);
    format!(
        "{} JOIN {table} ON {}.{} = {table}.{}",
        spec.kind.as_sql(),
        escape_identifier(base),
        escape_identifier(&spec.left_column),
        escape_identifier(&spec.right_column),
    )
}

fn order(spec: &OrderSpec) -> String {
    format!(
        "{} {}",
        escape_column(&spec.column),
        spec.direction.as_sql()
    )
}

fn predicates(list: &[Predicate], params: &mut ParamBuilder) -> Vec<String> {
    list.iter()
        .enumerate()
        .map(|(i, p)| {
            let condition = condition(&p.condition, params);
            match p.connector {
                Some(c) if i > 0 => format!("{} {condition}", c.as_sql()),
                _ => condition,
            }
        })
        .collect()
}

fn condition(condition: &Condition, params: &mut ParamBuilder) -> String {
    match condition {
        Condition::Compare { column, op, value } => {
            let placeholder = params.push(value.clone());
            if matches!(op, Operator::In | Operator::NotIn) {
                format!("{} {op} ({placeholder})", escape_column(column))
            } else {
                format!("{} {op} {placeholder}", escape_column(column))
            }
        }
        Condition::InList {
            values, negated, ..
        } if values.is_empty() => {
            // Nothing is in an empty list.
            let always = if *negated { "1 = 1" } else { "1 = 0" };
            always.to_string()
        }
        Condition::InList {
            column,
            values,
            negated,
        } => {
            let keyword = if *negated { "NOT IN" } else { "IN" };
            let placeholders = params.push_all(values.iter().cloned());
            format!(
                "{} {keyword} ({})",
                escape_column(column),
                placeholders.join(", ")
            )
        }
        Condition::Between { column, low, high } => {
            let low = params.push(low.clone());
            let high = params.push(high.clone());
            format!("{} BETWEEN {low} AND {high}", escape_column(column))
        }
        Condition::Null { column, negated } => {
            let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
            format!("{} {keyword}", escape_column(column))
        }
    }
}

//! Builder state: a plain, serializable description of one statement.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::backend::Value;
use crate::error::DbError;

/// Comparison operators accepted by `where_`/`and`/`or`/`having`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "ILIKE" => Ok(Operator::ILike),
            "NOT LIKE" => Ok(Operator::NotLike),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            _ => Err(DbError::invalid_config(format!("Unknown operator: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Compare {
        column: String,
        op: Operator,
        value: Value,
    },
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
}

/// One WHERE or HAVING entry. The connector joins it to the previous entry
/// and is `None` only for the first one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub connector: Option<Connector>,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        }
    }
}

/// `<base>.<left_column> = <table>.<right_column>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinSpec {
    pub kind: JoinType,
    pub table: String,
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSpec {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSpec {
    pub function: AggregateFn,
    pub column: String,
    pub alias: Option<String>,
    pub distinct: bool,
}

impl AggregateSpec {
    pub fn new(function: AggregateFn, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
            alias: None,
            distinct: false,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// The explicit alias, or `count` for `COUNT(*)`, or `<fn>_<column>`.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None if self.column == "*" => self.function.as_sql().to_lowercase(),
            None => format!(
                "{}_{}",
                self.function.as_sql().to_lowercase(),
                self.column
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryBuilderState {
    pub table: String,
    /// Empty means every column.
    pub columns: Vec<String>,
    pub where_clauses: Vec<Predicate>,
    pub joins: Vec<JoinSpec>,
    pub group_by: Vec<String>,
    pub having: Vec<Predicate>,
    pub order_by: Vec<OrderSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub aggregates: Vec<AggregateSpec>,
}

impl QueryBuilderState {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub(crate) fn push_where(&mut self, connector: Connector, condition: Condition) {
        push_predicate(&mut self.where_clauses, connector, condition);
    }

    pub(crate) fn push_having(&mut self, connector: Connector, condition: Condition) {
        push_predicate(&mut self.having, connector, condition);
    }
}

fn push_predicate(list: &mut Vec<Predicate>, connector: Connector, condition: Condition) {
    let connector = (!list.is_empty()).then_some(connector);
    list.push(Predicate {
        connector,
        condition,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("=", Operator::Eq)]
    #[case("<>", Operator::Ne)]
    #[case("!=", Operator::Ne)]
    #[case(">=", Operator::Ge)]
    #[case("ilike", Operator::ILike)]
    #[case("not   like", Operator::NotLike)]
    #[case("NOT IN", Operator::NotIn)]
    fn test_operator_parse(#[case] input: &str, #[case] expected: Operator) {
        assert_eq!(input.parse::<Operator>().unwrap(), expected);
    }

    #[rstest]
    fn test_unknown_operator_is_invalid_config() {
        let err = "~=".parse::<Operator>().unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig { .. }));
        assert_eq!(err.to_string(), "Invalid configuration: Unknown operator: ~=");
    }

    #[rstest]
    #[case(AggregateSpec::new(AggregateFn::Count, "*"), "count")]
    #[case(AggregateSpec::new(AggregateFn::Avg, "quality"), "avg_quality")]
    #[case(AggregateSpec::new(AggregateFn::Max, "depth").alias("deepest"), "deepest")]
    fn test_aggregate_output_name(#[case] spec: AggregateSpec, #[case] expected: &str) {
        assert_eq!(spec.output_name(), expected);
    }

    #[rstest]
    fn test_first_predicate_has_no_connector() {
        let mut state = QueryBuilderState::new("variants");
        let cond = || Condition::Null {
            column: "gene".to_string(),
            negated: false,
        };
        state.push_where(Connector::Or, cond());
        state.push_where(Connector::Or, cond());
        assert_eq!(state.where_clauses[0].connector, None);
        assert_eq!(state.where_clauses[1].connector, Some(Connector::Or));
    }
}

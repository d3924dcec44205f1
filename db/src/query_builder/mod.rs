//! Fluent, parameterized SQL construction over one table.
//!
//! Every chained call consumes and returns the builder, recording into a
//! plain [`QueryBuilderState`]. Nothing touches the engine until one of the
//! execution methods (`execute`, `fetch_as`, `get_count`, `first`,
//! `paginate`) runs the compiled statement through the [`Client`].
//!
//! ```ignore
//! let page = client
//!     .table("variants")
//!     .select(["gene", "chromosome", "position"])
//!     .where_("chromosome", Operator::Eq, "chr17")
//!     .and("quality", Operator::Ge, 30)
//!     .order_by("position", SortDirection::Asc)
//!     .paginate(1, 50)
//!     .await?;
//! ```

mod compiler;
mod escape;
pub(crate) mod params;
mod state;

use serde::de::DeserializeOwned;

use crate::backend::Value;
use crate::client::Client;
use crate::error::DbError;
use crate::types::{PaginatedResult, QueryResult, Row};

pub use escape::{escape_column, escape_identifier};
pub use params::CompiledQuery;
pub use state::{
    AggregateFn, AggregateSpec, Condition, Connector, JoinSpec, JoinType, Operator, OrderSpec,
    Predicate, QueryBuilderState, SortDirection,
};

/// Builder bound to a client for execution. Cloning deep-copies the state.
#[derive(Clone)]
pub struct QueryBuilder<'a> {
    client: &'a Client,
    state: QueryBuilderState,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(client: &'a Client, table: &str) -> Self {
        Self::from_state(client, QueryBuilderState::new(table))
    }

    pub fn from_state(client: &'a Client, state: QueryBuilderState) -> Self {
        Self { client, state }
    }

    pub fn state(&self) -> &QueryBuilderState {
        &self.state
    }

    /// Project these columns. Replaces any earlier projection.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn select_all(mut self) -> Self {
        self.state.columns = vec!["*".to_string()];
        self
    }

    /// Add a predicate, joined to any previous one with AND.
    pub fn where_(self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, op, value.into())
    }

    pub fn and(self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, op, value.into())
    }

    pub fn or(self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, op, value.into())
    }

    fn compare(mut self, connector: Connector, column: &str, op: Operator, value: Value) -> Self {
        self.state.push_where(
            connector,
            Condition::Compare {
                column: column.to_string(),
                op,
                value,
            },
        );
        self
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_list(column, values, false)
    }

    /// `column NOT IN (...)`. An empty list matches everything.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_list(column, values, true)
    }

    fn in_list<I, V>(mut self, column: &str, values: I, negated: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.state.push_where(
            Connector::And,
            Condition::InList {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated,
            },
        );
        self
    }

    /// Inclusive on both ends.
    pub fn where_between(
        mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.state.push_where(
            Connector::And,
            Condition::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
            },
        );
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.null_check(column, false)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.null_check(column, true)
    }

    fn null_check(mut self, column: &str, negated: bool) -> Self {
        self.state.push_where(
            Connector::And,
            Condition::Null {
                column: column.to_string(),
                negated,
            },
        );
        self
    }

    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_(column, Operator::Like, pattern)
    }

    pub fn where_ilike(self, column: &str, pattern: &str) -> Self {
        self.where_(column, Operator::ILike, pattern)
    }

    /// Inner join on `<table>.<left_column> = <other>.<right_column>`.
    pub fn join(self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.join_with(JoinType::Inner, table, left_column, right_column)
    }

    pub fn left_join(self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.join_with(JoinType::Left, table, left_column, right_column)
    }

    pub fn right_join(self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.join_with(JoinType::Right, table, left_column, right_column)
    }

    pub fn join_with(
        mut self,
        kind: JoinType,
        table: &str,
        left_column: &str,
        right_column: &str,
    ) -> Self {
        self.state.joins.push(JoinSpec {
            kind,
            table: table.to_string(),
            left_column: left_column.to_string(),
            right_column: right_column.to_string(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.state.order_by.push(OrderSpec {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.state.limit = Some(count);
        self
    }

    pub fn offset(mut self, count: u64) -> Self {
        self.state.offset = Some(count);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// HAVING predicates are always joined with AND.
    pub fn having(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.state.push_having(
            Connector::And,
            Condition::Compare {
                column: column.to_string(),
                op,
                value: value.into(),
            },
        );
        self
    }

    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.state.aggregates.push(spec);
        self
    }

    /// `COUNT(*) AS count`
    pub fn count(self) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Count, "*"))
    }

    pub fn count_distinct(self, column: &str) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Count, column).distinct())
    }

    pub fn sum(self, column: &str) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Sum, column))
    }

    pub fn avg(self, column: &str) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Avg, column))
    }

    pub fn min(self, column: &str) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Min, column))
    }

    pub fn max(self, column: &str) -> Self {
        self.aggregate(AggregateSpec::new(AggregateFn::Max, column))
    }

    /// Compile to SQL plus positional parameters. Deterministic: building an
    /// unchanged builder twice gives identical output.
    pub fn build(&self) -> CompiledQuery {
        compiler::compile(&self.state)
    }

    pub fn to_sql(&self) -> String {
        self.build().sql
    }

    pub async fn execute(&self) -> Result<QueryResult, DbError> {
        let CompiledQuery { sql, params } = self.build();
        self.client.execute(&sql, &params).await
    }

    /// Execute and decode every row into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, DbError> {
        self.execute().await?.decode()
    }

    /// Count matching rows with the same WHERE and JOIN state, without
    /// projecting any columns.
    pub async fn get_count(&self) -> Result<u64, DbError> {
        let mut state = QueryBuilderState::new(self.state.table.clone());
        state.where_clauses = self.state.where_clauses.clone();
        state.joins = self.state.joins.clone();
        let CompiledQuery { sql, params } = QueryBuilder::from_state(self.client, state)
            .count()
            .build();
        self.client.execute_count(&sql, &params).await
    }

    pub async fn first(self) -> Result<Option<Row>, DbError> {
        Ok(self.limit(1).execute().await?.into_rows().into_iter().next())
    }

    /// Run the count query and then the page query. The two are not isolated
    /// from each other, so concurrent writes can make `total` disagree with
    /// the rows returned. `page` and `page_size` are clamped to at least 1;
    /// a page whose offset does not fit in a `u64` is rejected before any
    /// query runs.
    pub async fn paginate(self, page: u64, page_size: u64) -> Result<PaginatedResult, DbError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            DbError::invalid_config(format!(
                "page {page} with page size {page_size} is out of range"
            ))
        })?;
        let total = self.get_count().await?;
        let result = self
            .limit(page_size)
            .offset(offset)
            .execute()
            .await?;
        Ok(PaginatedResult::new(result, total, page, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_utils::{raw_result, MockEngine};
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    #[fixture]
    fn client() -> Client {
        Client::with_engine(ClientConfig::default(), Arc::new(MockEngine::new()))
    }

    #[rstest]
    fn test_connectors(client: Client) {
        let compiled = client
            .table("t")
            .where_("a", Operator::Eq, 1)
            .and("b", Operator::Eq, 2)
            .or("c", Operator::Eq, 3)
            .build();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM t WHERE a = $1 AND b = $2 OR c = $3"
        );
        assert_eq!(
            compiled.params,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[rstest]
    fn test_leading_or_has_no_connector(client: Client) {
        let sql = client.table("t").or("a", Operator::Gt, 1).to_sql();
        assert_eq!(sql, "SELECT * FROM t WHERE a > $1");
    }

    #[rstest]
    fn test_empty_where_in_is_always_false(client: Client) {
        let compiled = client
            .table("variants")
            .where_in("gene", Vec::<String>::new())
            .build();
        assert_eq!(compiled.sql, "SELECT * FROM variants WHERE 1 = 0");
        assert!(compiled.params.is_empty());
    }

    #[rstest]
    fn test_build_is_deterministic(client: Client) {
        let builder = client
            .table("variants")
            .select(["gene", "position"])
            .where_in("chromosome", ["chr1", "chr2"])
            .where_between("position", 100, 200)
            .order_by("position", SortDirection::Desc)
            .limit(10);
        assert_eq!(builder.build(), builder.build());
    }

    #[rstest]
    fn test_full_clause_order(client: Client) {
        let compiled = client
            .table("variants")
            .left_join("samples", "sampleId", "id")
            .where_not_null("gene")
            .and("quality", Operator::Ge, 20.5)
            .group_by(["gene"])
            .count()
            .avg("quality")
            .having("count", Operator::Gt, 3)
            .order_by("count", SortDirection::Desc)
            .limit(5)
            .offset(10)
            .build();
        assert_eq!(
            compiled.sql,
            "SELECT gene, COUNT(*) AS count, AVG(quality) AS avg_quality \
             FROM variants \
             LEFT JOIN samples ON variants.sampleId = samples.id \
             WHERE gene IS NOT NULL AND quality >= $1 \
             GROUP BY gene \
             HAVING count > $2 \
             ORDER BY count DESC \
             LIMIT 5 OFFSET 10"
        );
        assert_eq!(compiled.params, vec![Value::Float(20.5), Value::Int(3)]);
    }

    #[rstest]
    fn test_explicit_columns_precede_aggregates(client: Client) {
        let sql = client
            .table("variants")
            .select(["chromosome"])
            .max("position")
            .group_by(["chromosome"])
            .to_sql();
        assert_eq!(
            sql,
            "SELECT chromosome, MAX(position) AS max_position FROM variants GROUP BY chromosome"
        );
    }

    #[rstest]
    fn test_values_are_never_interpolated(client: Client) {
        let compiled = client
            .table("variants")
            .where_like("gene", "BRCA%' OR '1'='1")
            .build();
        assert_eq!(compiled.sql, "SELECT * FROM variants WHERE gene LIKE $1");
        assert_eq!(compiled.params, vec![Value::from("BRCA%' OR '1'='1")]);
    }

    #[rstest]
    fn test_identifiers_are_escaped(client: Client) {
        let sql = client
            .table("my variants")
            .select(["allele \"freq\""])
            .to_sql();
        assert_eq!(sql, "SELECT \"allele \"\"freq\"\"\" FROM \"my variants\"");
    }

    #[rstest]
    fn test_clone_is_independent(client: Client) {
        let base = client.table("variants").where_("gene", Operator::Eq, "TP53");
        let narrowed = base.clone().and("quality", Operator::Gt, 30);
        assert_eq!(base.state().where_clauses.len(), 1);
        assert_eq!(narrowed.state().where_clauses.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_paginate_issues_count_then_page() {
        let engine = MockEngine::new().with_responder(|sql, _| {
            if sql.contains("COUNT(*)") {
                Ok(raw_result(&["count"], vec![vec![Value::Int(97)]]))
            } else {
                Ok(raw_result(&["id"], vec![vec![Value::from("v81")]]))
            }
        });
        let client = Client::with_engine(ClientConfig::default(), Arc::new(engine.clone()));
        client.initialize().await.unwrap();

        let page = client
            .table("variants")
            .select(["id"])
            .where_("gene", Operator::Eq, "BRCA2")
            .order_by("id", SortDirection::Asc)
            .paginate(5, 20)
            .await
            .unwrap();

        assert_eq!(page.total, 97);
        assert_eq!(page.total_pages, 5);
        assert!(!page.has_next_page);
        assert!(page.has_previous_page);
        assert_eq!(page.rows().len(), 1);
        assert_eq!(
            engine.executed_sql(),
            vec![
                "SELECT COUNT(*) AS count FROM variants WHERE gene = $1".to_string(),
                "SELECT id FROM variants WHERE gene = $1 ORDER BY id ASC LIMIT 20 OFFSET 80"
                    .to_string(),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_paginate_clamps_page_zero() {
        let engine = MockEngine::new().with_responder(|_, _| {
            Ok(raw_result(&["count"], vec![vec![Value::Int(3)]]))
        });
        let client = Client::with_engine(ClientConfig::default(), Arc::new(engine.clone()));
        client.initialize().await.unwrap();

        let page = client.table("variants").paginate(0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 3);
        assert!(engine.executed_sql()[1].ends_with("LIMIT 1 OFFSET 0"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_paginate_rejects_offset_overflow() {
        let engine = MockEngine::new();
        let client = Client::with_engine(ClientConfig::default(), Arc::new(engine.clone()));
        client.initialize().await.unwrap();

        let err = client
            .table("variants")
            .paginate(u64::MAX, 10_000)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig { .. }));
        assert!(engine.executed_sql().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_fetch_as_decodes_rows() {
        #[derive(serde::Deserialize)]
        struct Gene {
            gene: String,
        }

        let engine = MockEngine::new().with_responder(|_, _| {
            Ok(raw_result(
                &["gene"],
                vec![vec![Value::from("BRCA1")], vec![Value::from("TP53")]],
            ))
        });
        let client = Client::with_engine(ClientConfig::default(), Arc::new(engine));
        client.initialize().await.unwrap();

        let genes: Vec<Gene> = client.table("variants").select(["gene"]).fetch_as().await.unwrap();
        let names: Vec<&str> = genes.iter().map(|g| g.gene.as_str()).collect();
        assert_eq!(names, vec!["BRCA1", "TP53"]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_first_limits_to_one() {
        let engine = MockEngine::new();
        let client = Client::with_engine(ClientConfig::default(), Arc::new(engine.clone()));
        client.initialize().await.unwrap();

        let row = client.table("variants").first().await.unwrap();
        assert!(row.is_none());
        assert_eq!(engine.executed_sql(), vec!["SELECT * FROM variants LIMIT 1"]);
    }
}

use std::error::Error;
use std::sync::Arc;

use genoquery_db::{Client, PaginatedResult, QueryResult};
use serde::Serialize;

use super::SelectCmd;
use crate::commands::Execute;

/// Plain rows, or one page of rows with the total count.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SelectResult {
    Rows(QueryResult),
    Page(PaginatedResult),
}

impl Execute for SelectCmd {
    type Output = SelectResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let mut builder = client.table(&self.table);
        if !self.columns.is_empty() {
            builder = builder.select(&self.columns);
        }
        for filter in &self.filters {
            builder = filter.apply(builder);
        }
        for key in &self.order_by {
            builder = builder.order_by(&key.column, key.direction);
        }

        if let Some(page) = self.page {
            return Ok(SelectResult::Page(builder.paginate(page, self.page_size).await?));
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        Ok(SelectResult::Rows(builder.execute().await?))
    }
}

use std::error::Error;
use std::sync::Arc;

use genoquery_db::{Client, QueryResult, Value};

use super::SqlCmd;
use crate::commands::{Execute, parse_value};

impl Execute for SqlCmd {
    type Output = QueryResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let params: Vec<Value> = self.params.iter().map(|p| parse_value(p)).collect();
        Ok(client.execute(&self.sql, &params).await?)
    }
}

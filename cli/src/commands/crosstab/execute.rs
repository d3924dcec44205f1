use std::error::Error;
use std::sync::Arc;

use genoquery_db::{Client, CrossTabParams, CrossTabResult, StatisticsService, TableLayout};

use super::CrossTabCmd;
use crate::commands::Execute;

impl Execute for CrossTabCmd {
    type Output = CrossTabResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let layout = TableLayout::default().with_table(&self.table);
        let mut params = CrossTabParams::new(self.row_field, self.column_field);
        params.include_totals = !self.no_totals;
        if !self.samples.is_empty() {
            params.filters.push(layout.sample_filter(&self.samples));
        }
        let service = StatisticsService::with_layout(Arc::clone(client), layout);
        Ok(service.get_cross_tab(&params).await?)
    }
}

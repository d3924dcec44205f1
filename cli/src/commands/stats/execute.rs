use std::error::Error;
use std::sync::Arc;

use genoquery_db::{Client, Statistics, StatisticsParams, StatisticsService, TableLayout};

use super::StatsCmd;
use crate::commands::Execute;

impl Execute for StatsCmd {
    type Output = Statistics;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let layout = TableLayout::default().with_table(&self.table);
        let mut filters = Vec::new();
        if !self.samples.is_empty() {
            filters.push(layout.sample_filter(&self.samples));
        }
        let params = StatisticsParams {
            filters,
            group_by: (!self.group_by.is_empty()).then_some(self.group_by),
            numeric_fields: (!self.numeric.is_empty()).then_some(self.numeric),
        };
        let service = StatisticsService::with_layout(Arc::clone(client), layout);
        Ok(service.get_statistics(&params).await?)
    }
}

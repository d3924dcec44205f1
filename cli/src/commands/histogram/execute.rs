use std::error::Error;
use std::sync::Arc;

use genoquery_db::{Client, HistogramParams, HistogramResult, StatisticsService, TableLayout};

use super::HistogramCmd;
use crate::commands::Execute;

impl Execute for HistogramCmd {
    type Output = HistogramResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let layout = TableLayout::default().with_table(&self.table);
        let mut params = HistogramParams::new(&self.field)
            .with_bins(self.bins)
            .with_range(self.min, self.max);
        if !self.samples.is_empty() {
            params = params.with_filter(layout.sample_filter(&self.samples));
        }
        let service = StatisticsService::with_layout(Arc::clone(client), layout);
        Ok(service.get_histogram(&params).await?)
    }
}

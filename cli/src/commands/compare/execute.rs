use std::error::Error;
use std::sync::Arc;

use genoquery_db::{
    Client, CompareGroupsParams, ComparisonResult, SampleGroup, StatisticsService, TableLayout,
};

use super::CompareCmd;
use crate::commands::Execute;

impl Execute for CompareCmd {
    type Output = ComparisonResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let params = CompareGroupsParams {
            group1: SampleGroup::new(self.name1, self.group1),
            group2: SampleGroup::new(self.name2, self.group2),
            fields: (!self.fields.is_empty()).then_some(self.fields),
            include_overlap: !self.no_overlap,
        };
        let layout = TableLayout::default().with_table(&self.table);
        let service = StatisticsService::with_layout(Arc::clone(client), layout);
        Ok(service.compare_groups(&params).await?)
    }
}

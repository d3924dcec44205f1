use std::error::Error;
use std::sync::Arc;

use genoquery_db::{
    Client, GeneRef, PaginatedResult, VariantFilter, VariantQueryService,
};
use serde::Serialize;

use super::VariantsCmd;
use crate::commands::Execute;

/// A page of variants, or just the match count with `--count`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VariantsResult {
    Page(PaginatedResult),
    Count { count: u64 },
}

impl VariantsCmd {
    fn filter(&self) -> VariantFilter {
        let gene = self.gene.as_ref().map(|g| {
            if g.to_ascii_uppercase().starts_with("ENSG") {
                GeneRef::EnsemblId(g.clone())
            } else {
                GeneRef::Symbol(g.clone())
            }
        });
        VariantFilter {
            region: self.region.clone(),
            gene,
            variant_types: self.types.clone(),
            clinical_significance: self.significance.clone(),
            max_population_frequency: self.max_frequency,
            min_cadd_score: self.min_cadd,
            min_quality: self.min_quality,
            sample_ids: self.samples.clone(),
            ..Default::default()
        }
    }
}

impl Execute for VariantsCmd {
    type Output = VariantsResult;

    async fn execute(self, client: &Arc<Client>) -> Result<Self::Output, Box<dyn Error>> {
        let service = VariantQueryService::with_table(Arc::clone(client), self.table.clone());
        let filter = self.filter();
        if self.count {
            let count = service.count_variants(&filter).await?;
            return Ok(VariantsResult::Count { count });
        }
        let page = service
            .query_variants(&filter, self.page, self.page_size)
            .await?;
        Ok(VariantsResult::Page(page))
    }
}

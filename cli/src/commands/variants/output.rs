//! Output formatting for variants command results.

use genoquery_db::QueryResult;

use super::execute::VariantsResult;
use crate::output::Outputable;

impl Outputable for VariantsResult {
    fn row_set(&self) -> Option<&QueryResult> {
        match self {
            VariantsResult::Page(page) => Some(&page.result),
            VariantsResult::Count { .. } => None,
        }
    }

    fn to_table(&self) -> String {
        match self {
            VariantsResult::Page(page) => page.to_table(),
            VariantsResult::Count { count } => format!("Matching variants: {count}"),
        }
    }
}

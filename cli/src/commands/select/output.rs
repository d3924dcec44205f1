//! Output formatting for select command results.

use genoquery_db::QueryResult;

use super::execute::SelectResult;
use crate::output::Outputable;

impl Outputable for SelectResult {
    fn row_set(&self) -> Option<&QueryResult> {
        match self {
            SelectResult::Rows(result) => Some(result),
            SelectResult::Page(page) => Some(&page.result),
        }
    }

    fn to_table(&self) -> String {
        match self {
            SelectResult::Rows(result) => result.to_table(),
            SelectResult::Page(page) => page.to_table(),
        }
    }
}

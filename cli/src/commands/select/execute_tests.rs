//! Execute tests for select command.

#[cfg(test)]
mod tests {
    use super::super::{SelectCmd, SelectResult};
    use crate::commands::{OrderArg, parse_where};
    use genoquery_db::SortDirection;

    fn cmd() -> SelectCmd {
        SelectCmd {
            table: "variants".to_string(),
            columns: vec![],
            filters: vec![],
            order_by: vec![],
            limit: None,
            page: None,
            page_size: 50,
        }
    }

    crate::execute_test! {
        test_name: test_select_filtered_and_ordered,
        cmd: SelectCmd {
            columns: vec!["id".to_string(), "quality".to_string()],
            filters: vec![parse_where("gene = BRCA1").unwrap()],
            order_by: vec![OrderArg { column: "quality".to_string(), direction: SortDirection::Desc }],
            ..cmd()
        },
        assertions: |result| {
            let SelectResult::Rows(rows) = result else { panic!("Expected plain rows") };
            let qualities: Vec<f64> = rows.rows().iter().filter_map(|r| r.get_f64("quality")).collect();
            assert_eq!(qualities, vec![60.0, 50.0, 30.0]);
            assert_eq!(rows.column_names(), vec!["id", "quality"]);
        },
    }

    crate::execute_test! {
        test_name: test_select_in_list,
        cmd: SelectCmd {
            filters: vec![parse_where("sampleId IN S2,S3").unwrap()],
            ..cmd()
        },
        assertions: |result| {
            let SelectResult::Rows(rows) = result else { panic!("Expected plain rows") };
            assert_eq!(rows.len(), 2);
        },
    }

    crate::execute_test! {
        test_name: test_select_limit,
        cmd: SelectCmd { limit: Some(1), ..cmd() },
        assertions: |result| {
            let SelectResult::Rows(rows) = result else { panic!("Expected plain rows") };
            assert_eq!(rows.len(), 1);
        },
    }

    crate::execute_test! {
        test_name: test_select_paginated,
        cmd: SelectCmd {
            order_by: vec![OrderArg { column: "position".to_string(), direction: SortDirection::Asc }],
            page: Some(2),
            page_size: 3,
            ..cmd()
        },
        assertions: |result| {
            let SelectResult::Page(page) = result else { panic!("Expected a page") };
            assert_eq!(page.total, 4);
            assert_eq!(page.total_pages, 2);
            assert_eq!(page.rows().len(), 1);
            assert_eq!(page.rows()[0].get_i64("position"), Some(200));
        },
    }

    crate::execute_error_test! {
        test_name: test_select_missing_table,
        cmd: (SelectCmd { table: "genes".to_string(), ..cmd() }),
        contains: "genes",
    }
}

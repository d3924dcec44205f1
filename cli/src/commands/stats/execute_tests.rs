//! Execute tests for stats command.

#[cfg(test)]
mod tests {
    use super::super::StatsCmd;

    fn cmd() -> StatsCmd {
        StatsCmd {
            samples: vec![],
            group_by: vec![],
            numeric: vec![],
            table: "variants".to_string(),
        }
    }

    crate::execute_test! {
        test_name: test_stats_whole_table,
        cmd: cmd(),
        assertions: |result| {
            assert_eq!(result.total_count, 4);
            assert_eq!(result.breakdowns["variantType"]["SNV"], 3);
            assert_eq!(result.numeric["caddScore"].null_count, 1);
        },
    }

    crate::execute_test! {
        test_name: test_stats_for_samples,
        cmd: StatsCmd {
            samples: vec!["S1".to_string()],
            group_by: vec!["gene".to_string()],
            numeric: vec!["quality".to_string()],
            ..cmd()
        },
        assertions: |result| {
            assert_eq!(result.total_count, 2);
            assert_eq!(result.breakdowns.len(), 1);
            assert_eq!(result.breakdowns["gene"]["BRCA1"], 2);
            assert_eq!(result.numeric["quality"].mean, Some(45.0));
        },
    }
}

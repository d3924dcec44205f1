//! CLI parsing tests for select command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::Command;
    use clap::Parser;
    use genoquery_db::{Operator, SortDirection};
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "select",
        test_name: test_select_requires_table,
        required_arg: "<TABLE>",
    }

    crate::cli_option_test! {
        command: "select",
        variant: Select,
        test_name: test_select_columns_split_on_comma,
        args: ["variants", "-c", "id,position"],
        field: columns,
        expected: vec!["id".to_string(), "position".to_string()],
    }

    crate::cli_option_test! {
        command: "select",
        variant: Select,
        test_name: test_select_with_page,
        args: ["variants", "--page", "3"],
        field: page,
        expected: Some(3),
    }

    crate::cli_defaults_test! {
        command: "select",
        variant: Select,
        required_args: ["variants"],
        defaults: {
            page: None,
            limit: None,
            page_size: 50,
        },
    }

    crate::cli_error_test! {
        command: "select",
        test_name: test_select_page_zero_rejected,
        args: ["variants", "--page", "0"],
    }

    crate::cli_error_test! {
        command: "select",
        test_name: test_select_page_size_too_large,
        args: ["variants", "--page-size", "10001"],
    }

    crate::cli_error_test! {
        command: "select",
        test_name: test_select_bad_filter_rejected,
        args: ["variants", "-w", "quality"],
    }

    #[rstest]
    fn test_select_filters_and_order() {
        let args = Args::try_parse_from([
            "genoquery",
            "select",
            "variants",
            "-w",
            "quality >= 30",
            "--where",
            "gene LIKE BRCA%",
            "--order-by",
            "position:desc",
        ])
        .unwrap();
        match args.command {
            Command::Select(cmd) => {
                assert_eq!(cmd.filters.len(), 2);
                assert_eq!(cmd.filters[0].op, Operator::Ge);
                assert_eq!(cmd.filters[1].op, Operator::Like);
                assert_eq!(cmd.order_by[0].direction, SortDirection::Desc);
            }
            _ => panic!("Expected Select command"),
        }
    }
}

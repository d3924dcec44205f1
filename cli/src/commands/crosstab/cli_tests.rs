//! CLI parsing tests for crosstab command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "crosstab",
        test_name: test_crosstab_requires_fields,
        required_arg: "<ROW_FIELD>",
    }

    crate::cli_error_test! {
        command: "crosstab",
        test_name: test_crosstab_requires_column_field,
        args: ["variantType"],
    }

    crate::cli_defaults_test! {
        command: "crosstab",
        variant: CrossTab,
        required_args: ["variantType", "gene"],
        defaults: {
            row_field: "variantType",
            column_field: "gene",
            no_totals: false,
        },
    }
}

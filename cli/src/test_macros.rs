//! Declarative macros for generating CLI tests.
//!
//! Parsing tests expect `Args`, `Parser` and `rstest` in scope at the call
//! site. Execute tests run the command against a seeded in-memory database.

/// Generate a test for default values when a command is invoked with minimal args.
#[macro_export]
macro_rules! cli_defaults_test {
    (
        command: $cmd:literal,
        variant: $variant:ident,
        required_args: [$($req_arg:literal),*],
        defaults: {
            $($def_field:ident : $def_expected:expr),* $(,)?
        } $(,)?
    ) => {
        #[rstest]
        fn test_defaults() {
            let args = Args::try_parse_from(["genoquery", $cmd, $($req_arg),*]).unwrap();
            match args.command {
                crate::commands::Command::$variant(cmd) => {
                    $(
                        assert_eq!(cmd.$def_field, $def_expected,
                            concat!("Default value mismatch for field: ", stringify!($def_field)));
                    )*
                }
                _ => panic!(concat!("Expected ", stringify!($variant), " command")),
            }
        }
    };
}

/// Generate a single CLI option test.
#[macro_export]
macro_rules! cli_option_test {
    (
        command: $cmd:literal,
        variant: $variant:ident,
        test_name: $test_name:ident,
        args: [$($arg:literal),+],
        field: $field:ident,
        expected: $expected:expr $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let args = Args::try_parse_from([
                "genoquery",
                $cmd,
                $($arg),+
            ]).unwrap();
            match args.command {
                crate::commands::Command::$variant(cmd) => {
                    assert_eq!(cmd.$field, $expected,
                        concat!("Field ", stringify!($field), " mismatch"));
                }
                _ => panic!(concat!("Expected ", stringify!($variant), " command")),
            }
        }
    };
}

/// Generate a test that verifies a command fails without its required argument.
#[macro_export]
macro_rules! cli_required_arg_test {
    (
        command: $cmd:literal,
        test_name: $test_name:ident,
        required_arg: $arg:literal $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let result = Args::try_parse_from(["genoquery", $cmd]);
            assert!(result.is_err(), concat!("Command should require ", $arg));
            assert!(
                result.unwrap_err().to_string().contains($arg),
                concat!("Error should mention ", $arg)
            );
        }
    };
}

/// Generate a test that verifies parsing fails with specific invalid args.
#[macro_export]
macro_rules! cli_error_test {
    (
        command: $cmd:literal,
        test_name: $test_name:ident,
        args: [$($arg:literal),+] $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let result = Args::try_parse_from([
                "genoquery",
                $cmd,
                $($arg),+
            ]);
            assert!(result.is_err());
        }
    };
}

// =============================================================================
// Execute Test Macros
// =============================================================================

/// Generate a test that runs a command against the seeded database.
///
/// # Example
/// ```ignore
/// execute_test! {
///     test_name: test_sql_count,
///     cmd: SqlCmd { sql: "SELECT 1".into(), params: vec![] },
///     assertions: |result| {
///         assert_eq!(result.len(), 1);
///     },
/// }
/// ```
#[macro_export]
macro_rules! execute_test {
    (
        test_name: $test_name:ident,
        cmd: $cmd:expr,
        assertions: |$result:ident| $assertions:block $(,)?
    ) => {
        #[cfg(feature = "backend-duckdb")]
        #[tokio::test]
        async fn $test_name() {
            use crate::commands::Execute;
            let client = crate::commands::test_support::seeded_client().await;
            let $result = $cmd.execute(&client).await.expect("Execute should succeed");
            $assertions
        }
    };
}

/// Generate a test that verifies a command fails against the seeded database.
#[macro_export]
macro_rules! execute_error_test {
    (
        test_name: $test_name:ident,
        cmd: $cmd:expr,
        contains: $needle:literal $(,)?
    ) => {
        #[cfg(feature = "backend-duckdb")]
        #[tokio::test]
        async fn $test_name() {
            use crate::commands::Execute;
            let client = crate::commands::test_support::seeded_client().await;
            let err = match $cmd.execute(&client).await {
                Ok(_) => panic!("Execute should fail"),
                Err(err) => err,
            };
            assert!(
                err.to_string().contains($needle),
                "Error '{}' should contain '{}'", err, $needle
            );
        }
    };
}

// =============================================================================
// Output Test Macros
// =============================================================================

/// Generate a test that verifies table output contains expected strings.
#[macro_export]
macro_rules! output_table_contains_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        contains: [$($needle:literal),* $(,)?] $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::Outputable;
            let output = $fixture.to_table();
            $(
                assert!(output.contains($needle), concat!("Table output should contain: ", $needle));
            )*
        }
    };
}

/// Generate a test that verifies JSON output is valid and contains expected fields.
#[macro_export]
macro_rules! output_json_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        assertions: { $($field:literal : $expected:expr),* $(,)? } $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::{Outputable, OutputFormat};
            let output = $fixture.format(OutputFormat::Json);
            let parsed: serde_json::Value = serde_json::from_str(&output)
                .expect("Should produce valid JSON");
            $(
                assert_eq!(parsed[$field], $expected, concat!("JSON field mismatch: ", $field));
            )*
        }
    };
}

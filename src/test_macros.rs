//! Declarative macros for generating command tests.
//!
//! CLI macros parse through `parse_args`, which supplies the binary name.
//! Execute macros take an rstest fixture yielding an `Arc<Session>`. Every
//! macro expects `rstest::rstest` in scope.

/// Parse `dbreg <args...>`.
#[cfg(test)]
pub(crate) fn parse_args(args: &[&str]) -> Result<crate::cli::Args, clap::Error> {
    use clap::Parser;
    crate::cli::Args::try_parse_from(std::iter::once("dbreg").chain(args.iter().copied()))
}

/// Parse a command line that must yield `Command::$variant`.
#[macro_export]
macro_rules! parse_command {
    ($variant:ident, [$($arg:expr),*]) => {
        match $crate::test_macros::parse_args(&[$($arg),*]).expect("arguments should parse").command {
            $crate::commands::Command::$variant(cmd) => cmd,
            other => panic!("expected {} command, got {:?}", stringify!($variant), other),
        }
    };
}

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
            let cmd = $crate::parse_command!($variant, [$cmd $(, $req_arg)*]);
            $(
                assert_eq!(cmd.$def_field, $def_expected, concat!("default of ", stringify!($def_field)));
            )*
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
            let cmd = $crate::parse_command!($variant, [$cmd $(, $arg)+]);
            assert_eq!(cmd.$field, $expected, concat!("value of ", stringify!($field)));
        }
    };
}

/// Generate a test that verifies a command fails without a required argument.
///
/// # Example
///
/// ```ignore
/// cli_required_arg_test! {
///     command: "get",
///     test_name: test_requires_table,
///     required_arg: "<TABLE>",
/// }
/// ```
#[macro_export]
macro_rules! cli_required_arg_test {
    (
        command: $cmd:literal,
        test_name: $test_name:ident,
        required_arg: $arg:literal $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let message = $crate::test_macros::parse_args(&[$cmd])
                .expect_err(concat!("missing ", $arg, " should be rejected"))
                .to_string();
            assert!(message.contains($arg), "{message:?} should mention {}", $arg);
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
            assert!($crate::test_macros::parse_args(&[$cmd $(, $arg)+]).is_err());
        }
    };
}

// =============================================================================
// Execute Test Macros
// =============================================================================

/// Generate a test that executes a command against a session fixture.
///
/// # Example
///
/// ```ignore
/// execute_test! {
///     test_name: test_get_existing_row,
///     fixture: session,
///     cmd: GetCmd { .. },
///     assertions: |result| {
///         assert!(result.found);
///     },
/// }
/// ```
#[macro_export]
macro_rules! execute_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        cmd: $cmd:expr,
        assertions: |$result:ident| $assertions:block $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: std::sync::Arc<crate::record::Session>) {
            use crate::commands::Execute;
            let $result = $cmd.execute(&$fixture).expect("Execute should succeed");
            $assertions
        }
    };
}

/// Generate a test that verifies command execution fails with a message.
#[macro_export]
macro_rules! execute_error_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        cmd: $cmd:expr,
        contains: $needle:literal $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: std::sync::Arc<crate::record::Session>) {
            use crate::commands::Execute;
            let err = $cmd.execute(&$fixture).expect_err("Execute should fail");
            assert!(
                err.to_string().contains($needle),
                "error {:?} should contain {:?}", err.to_string(), $needle
            );
        }
    };
}

// =============================================================================
// Output Test Macros
// =============================================================================

/// Generate a test comparing the table rendering of a fixture.
#[macro_export]
macro_rules! output_table_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        expected: $expected:expr $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::Outputable;
            assert_eq!($fixture.to_table(), $expected);
        }
    };
}

/// Generate a test that checks top-level fields of the JSON rendering.
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
            let parsed: serde_json::Value = serde_json::from_str(&$fixture.format(OutputFormat::Json))
                .expect("output should be JSON");
            $(
                assert_eq!(parsed[$field], $expected, concat!("JSON field ", $field));
            )*
        }
    };
}

/// Generate a test that checks the toon rendering for substrings.
#[macro_export]
macro_rules! output_toon_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        contains: [$($needle:literal),* $(,)?] $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::{Outputable, OutputFormat};
            let output = $fixture.format(OutputFormat::Toon);
            $(
                assert!(output.contains($needle), "{output:?} should contain {:?}", $needle);
            )*
        }
    };
}

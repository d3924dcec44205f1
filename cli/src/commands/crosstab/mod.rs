mod cli_tests;
mod execute;

use clap::Args;

/// Cross-tabulate two categorical fields
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery crosstab variantType clinicalSignificance
  genoquery crosstab chromosome variantType -s S1,S2 --no-totals
")]
pub struct CrossTabCmd {
    /// Field whose values label the rows
    pub row_field: String,

    /// Field whose values label the columns
    pub column_field: String,

    /// Restrict to these samples (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Leave out row and column totals
    #[arg(long)]
    pub no_totals: bool,

    /// Table holding the variants
    #[arg(long, default_value = "variants")]
    pub table: String,
}

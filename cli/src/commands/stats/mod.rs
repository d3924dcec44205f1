mod execute;
mod execute_tests;

use clap::Args;

/// Summary statistics: counts, categorical breakdowns, numeric summaries
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery stats                               # Whole table
  genoquery stats -s S1,S2                      # Only these samples
  genoquery stats -g gene -n quality,depth      # Pick the fields to summarize
")]
pub struct StatsCmd {
    /// Restrict to these samples (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Categorical fields to break down (comma-separated)
    #[arg(short = 'g', long = "group-by", value_delimiter = ',')]
    pub group_by: Vec<String>,

    /// Numeric fields to summarize (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub numeric: Vec<String>,

    /// Table holding the variants
    #[arg(long, default_value = "variants")]
    pub table: String,
}

mod execute;

use clap::Args;

/// Compare two sample groups
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery compare --group1 S1,S2 --group2 S3,S4
  genoquery compare --group1 S1 --group2 S2 --name1 tumor --name2 normal -f quality
  genoquery compare --group1 S1 --group2 S2 --no-overlap
")]
pub struct CompareCmd {
    /// Samples in the first group (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub group1: Vec<String>,

    /// Samples in the second group (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub group2: Vec<String>,

    /// Label for the first group
    #[arg(long, default_value = "group1")]
    pub name1: String,

    /// Label for the second group
    #[arg(long, default_value = "group2")]
    pub name2: String,

    /// Numeric fields to compare (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Skip the shared/unique variant overlap
    #[arg(long)]
    pub no_overlap: bool,

    /// Table holding the variants
    #[arg(long, default_value = "variants")]
    pub table: String,
}

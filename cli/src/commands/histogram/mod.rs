mod execute;

use clap::Args;

/// Dense histogram of a numeric field
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery histogram quality                   # 20 bins over the observed range
  genoquery histogram caddScore -b 10 --min 0 --max 50
  genoquery histogram depth -s S1,S2
")]
pub struct HistogramCmd {
    /// Numeric field to bin
    pub field: String,

    /// Number of equal-width bins
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub bins: u32,

    /// Lower bound; the observed minimum when omitted
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Upper bound; the observed maximum when omitted
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Restrict to these samples (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Table holding the variants
    #[arg(long, default_value = "variants")]
    pub table: String,
}

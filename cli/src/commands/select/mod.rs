mod cli_tests;
mod execute;
mod execute_tests;
mod output;

pub use execute::SelectResult;

use clap::Args;

use crate::commands::{OrderArg, WhereArg, parse_order, parse_where};

/// Query a table with filters, ordering and pagination
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery select variants -w 'gene = BRCA1'
  genoquery select variants -c id,position -w 'quality >= 30' --order-by position:desc
  genoquery select variants -w 'variantType IN SNV,DELETION' --page 2 --page-size 25
")]
pub struct SelectCmd {
    /// Table to query
    pub table: String,

    /// Columns to return (comma-separated); all columns when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Filter as '<column> <op> <value>'; repeated filters are ANDed
    #[arg(short = 'w', long = "where", value_parser = parse_where)]
    pub filters: Vec<WhereArg>,

    /// Sort key as `column` or `column:desc`; repeatable
    #[arg(long = "order-by", value_parser = parse_order)]
    pub order_by: Vec<OrderArg>,

    /// Maximum number of rows (ignored with --page)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Page number, starting at 1; also reports the total count
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: Option<u64>,

    /// Rows per page
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..=10000))]
    pub page_size: u64,
}

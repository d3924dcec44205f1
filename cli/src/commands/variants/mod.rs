mod execute;
mod output;

pub use execute::VariantsResult;

use clap::Args;
use genoquery_db::Region;
use genoquery_db::variants::{ClinicalSignificance, DEFAULT_PAGE_SIZE, VariantType};

/// Look up variants by region, gene or attribute filters
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery variants -r chr17:43,044,295-43,125,483    # BRCA1 locus
  genoquery variants -g BRCA1 -s S1                     # Gene symbol, one sample
  genoquery variants -g ENSG00000012048                 # Ensembl gene id
  genoquery variants -t SNV --significance PATHOGENIC,LIKELY_PATHOGENIC --count
")]
pub struct VariantsCmd {
    /// Genomic region as `chrom:start-end` (inclusive; commas allowed)
    #[arg(short, long, value_parser = parse_region)]
    pub region: Option<Region>,

    /// Gene symbol, or Ensembl id when it starts with ENSG
    #[arg(short, long)]
    pub gene: Option<String>,

    /// Variant types (comma-separated)
    #[arg(short = 't', long = "type", value_delimiter = ',', value_parser = parse_variant_type)]
    pub types: Vec<VariantType>,

    /// Clinical significance classes (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_significance)]
    pub significance: Vec<ClinicalSignificance>,

    /// Restrict to these samples (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Maximum population allele frequency
    #[arg(long)]
    pub max_frequency: Option<f64>,

    /// Minimum CADD score
    #[arg(long)]
    pub min_cadd: Option<f64>,

    /// Minimum call quality
    #[arg(long)]
    pub min_quality: Option<f64>,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,

    /// Variants per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u64).range(1..=10000))]
    pub page_size: u64,

    /// Print only the number of matching variants
    #[arg(long)]
    pub count: bool,

    /// Table holding the variants
    #[arg(long, default_value = "variants")]
    pub table: String,
}

pub fn parse_region(s: &str) -> Result<Region, String> {
    let invalid = || format!("expected 'chrom:start-end', got '{s}'");
    let (chromosome, span) = s.rsplit_once(':').ok_or_else(invalid)?;
    let (start, end) = span.split_once('-').ok_or_else(invalid)?;
    let number = |raw: &str| raw.trim().replace(',', "").parse::<i64>().map_err(|_| invalid());
    let region = Region::new(chromosome.trim(), number(start)?, number(end)?);
    if region.chromosome.is_empty() {
        return Err(invalid());
    }
    if region.start > region.end {
        return Err(format!("region start {} is after end {}", region.start, region.end));
    }
    Ok(region)
}

fn parse_variant_type(s: &str) -> Result<VariantType, String> {
    s.parse().map_err(|e: genoquery_db::DbError| e.to_string())
}

fn parse_significance(s: &str) -> Result<ClinicalSignificance, String> {
    s.parse().map_err(|e: genoquery_db::DbError| e.to_string())
}

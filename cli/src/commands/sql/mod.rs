mod execute;

use clap::Args;

/// Run a raw SQL statement
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  genoquery sql 'SELECT COUNT(*) FROM variants'
  genoquery sql 'SELECT * FROM variants WHERE gene = $1' -p BRCA1
  genoquery sql 'SELECT * FROM variants WHERE quality > $1 LIMIT $2' -p 30 -p 10
")]
pub struct SqlCmd {
    /// SQL statement, with `$1`, `$2`, ... placeholders for parameters
    pub sql: String,

    /// Parameter values in placeholder order (numbers, true/false, null, or text)
    #[arg(short, long = "param")]
    pub params: Vec<String>,
}

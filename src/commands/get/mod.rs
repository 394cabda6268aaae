mod execute;
mod output;
mod output_tests;

use clap::Args;

/// Load one record and show its data
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbreg get users 1                          # Row with id = 1
  dbreg get users ES --key code              # Keyed by another column
  dbreg get user_tags 5,admin --key user_id,tag  # Composite key
  dbreg get users 1 --raw --format json      # Values without HTML escaping")]
pub struct GetCmd {
    /// Table name
    pub table: String,

    /// Key value(s), comma-separated for composite keys
    pub id: String,

    /// Key field(s), comma-separated for composite keys
    #[arg(short, long, default_value = "id")]
    pub key: String,

    /// Show stored values without HTML escaping
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

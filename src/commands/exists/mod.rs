mod execute;
mod output;

use clap::Args;

/// Report whether a row exists
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbreg exists users 1                              # Row with id = 1?
  dbreg exists user_tags 5,admin --key user_id,tag  # Composite key")]
pub struct ExistsCmd {
    /// Table name
    pub table: String,

    /// Key value(s), comma-separated for composite keys
    pub id: String,

    /// Key field(s), comma-separated for composite keys
    #[arg(short, long, default_value = "id")]
    pub key: String,
}

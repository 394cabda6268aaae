mod execute;
mod output;

use clap::Args;

/// Show the field metadata of a table
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  dbreg fields users                     # Columns of the users table
  dbreg fields users --format json       # Same, as JSON
  dbreg --db ./app.sqlite fields orders  # Against a specific database")]
pub struct FieldsCmd {
    /// Table name
    pub table: String,
}

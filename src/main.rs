use clap::Parser;

use dbreg::cli::Args;
use dbreg::config::ConfigFile;
use dbreg::db::{DatabaseConfig, RetryPolicy};
use dbreg::record::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let database = match &args.db {
        Some(url) => DatabaseConfig::from_url(url)?,
        None => DatabaseConfig::resolve()?,
    };
    let retry = ConfigFile::load_optional()?
        .map(|config| config.retry_policy())
        .unwrap_or_else(RetryPolicy::default);

    let session = Session::open(&database, retry)?;
    let output = args.command.run(&session, args.format)?;
    println!("{}", output);
    Ok(())
}

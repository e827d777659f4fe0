//! Command-line interface for converting `o5m` extracts into SQLite.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Parser, Subcommand};

mod convert;
mod error;

use convert::ConvertArgs;
pub use error::{CliError, render_error};

const ARG_O5M: &str = "o5m";
const ARG_DATABASE: &str = "database";
const ENV_O5M: &str = "O5M2SQLITE_CMDS_CONVERT_O5M";
const ENV_DATABASE: &str = "O5M2SQLITE_CMDS_CONVERT_DATABASE";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let stdout = io::stdout();
    dispatch(cli.command, &mut stdout.lock())
}

fn dispatch(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Convert(args) => convert::run_convert(args, out),
        Command::Schema(args) => print_schema(&args, out),
    }
}

fn print_schema(args: &SchemaArgs, out: &mut impl Write) -> Result<(), CliError> {
    let sql = o5m_data::schema_sql(&args.index_key)?;
    out.write_all(sql.as_bytes())
        .and_then(|()| out.flush())
        .map_err(CliError::WriteOutput)
}

#[derive(Debug, Parser)]
#[command(
    name = "o5m2sqlite",
    about = "Convert o5m OpenStreetMap extracts into SQLite databases",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load an o5m file into a new SQLite database.
    Convert(ConvertArgs),
    /// Print the SQL schema of the generated database.
    Schema(SchemaArgs),
}

/// CLI arguments for the `schema` subcommand.
#[derive(Debug, Clone, Parser)]
struct SchemaArgs {
    /// Tag key naming the spatial index table.
    #[arg(long = "index-key", value_name = "key", default_value = o5m_data::DEFAULT_INDEX_KEY)]
    index_key: String,
}

#[cfg(test)]
mod tests;

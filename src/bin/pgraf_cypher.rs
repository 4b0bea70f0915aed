//! Command-line translator: Cypher in, SQL plus parameter positions out.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pgraf_cypher::{translate_with_options, TranslateOptions};

#[derive(Parser)]
#[command(name = "pgraf-cypher", about = "Translate Cypher to pgraf SQL")]
struct Cli {
    /// The Cypher query; reads stdin when neither this nor --file is given.
    query: Option<String>,

    /// Read the query from a file.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Schema holding the nodes/edges tables.
    #[arg(long, default_value = "pgraf")]
    schema: String,

    /// Maximum depth for unbounded variable-length traversals.
    #[arg(long, default_value_t = 10)]
    max_depth: u32,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let source = match read_source(&cli) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = TranslateOptions {
        schema: cli.schema,
        max_variable_path_depth: cli.max_depth,
    };

    match translate_with_options(&source, &options) {
        Ok(translation) => {
            println!("{}", translation.sql);
            if !translation.parameters.is_empty() {
                let params = serde_json::to_string_pretty(&translation.parameters)
                    .expect("parameter map serializes");
                println!("-- parameters: {params}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let diagnostic = e.diagnostic();
            eprintln!(
                "{}: {} (line {}, column {})",
                diagnostic.kind, diagnostic.message, diagnostic.span.line, diagnostic.span.column
            );
            ExitCode::FAILURE
        }
    }
}

fn read_source(cli: &Cli) -> Result<String, std::io::Error> {
    if let Some(query) = &cli.query {
        return Ok(query.clone());
    }
    if let Some(path) = &cli.file {
        return std::fs::read_to_string(path);
    }
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

//! Compile a lexer rule file to a serialized transition table, or drive the
//! table over stdin

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::Context;
use relex::{Configuration, Lexer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Opts {
    /// Rule file with one ruleName=pattern per line
    rules: PathBuf,

    /// Tokenize stdin with the compiled table instead of printing the table
    #[arg(long)]
    scan: bool,

    /// Compile rules case-insensitively
    #[arg(short = 'i', long)]
    case_insensitive: bool,

    /// Log filter, using env_logger-like syntax
    #[arg(long, env = "RUST_LOG")]
    log_filter: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opts: Opts = clap::Parser::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(opts.log_filter.as_deref().unwrap_or("info")))
        .with_writer(std::io::stderr)
        .init();

    let text = fs::read_to_string(&opts.rules)
        .with_context(|| format!("Error reading rule file {:?}", opts.rules))?;
    let config = Configuration::parse_str(&text, opts.case_insensitive)
        .context("Error parsing rule file")?;
    let table = config.compile().context("Error compiling rules")?;

    if opts.scan {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Error reading stdin")?;

        let mut lexer = Lexer::new(&table, &input);
        while let Some(token) = lexer.next() {
            match token {
                Ok(token) => {
                    let eof = token.is_eof();
                    println!("{token:?}");
                    if eof {
                        break;
                    }
                },
                Err(err) => {
                    eprintln!("{err}, skipping one character");
                    Lexer::skip(&mut lexer);
                },
            }
        }
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&table).context("Error serializing table")?
        );
    }

    Ok(())
}

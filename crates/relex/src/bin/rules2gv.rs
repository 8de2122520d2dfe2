//! Convert a lexer rule file to a Graphviz DOT document

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

use std::{fs, path::PathBuf};

use anyhow::Context;
use relex::Configuration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Opts {
    /// Rule file with one ruleName=pattern per line
    rules: PathBuf,

    /// Determinize the automaton before printing it
    #[arg(long)]
    dfa: bool,

    /// Collapse redundant epsilon chains before printing
    #[arg(long)]
    simplify: bool,

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

    let mut automaton = config.build_automaton().context("Error building automaton")?;
    if opts.simplify {
        automaton.simplify();
    }
    let automaton = if opts.dfa && !automaton.is_deterministic() {
        automaton
            .determinize(|candidates| config.resolve_ambiguity(candidates))
            .context("Error determinizing automaton")?
    } else {
        automaton
    };

    println!("{}", automaton.dot_with(|r| config.rule(r).name.as_str().into()));
    Ok(())
}

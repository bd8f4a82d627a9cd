//! Translate presentation-language definitions into Rust type declarations.
//!
//! Usage:
//!   tlspl2rs [OPTIONS] [FILE ...]
//!   tlspl2rs < handshake.tls
//!
//! Each file is compiled on its own; outputs are written one after another, separated by a blank
//! line. Exit code 1 if any file failed to compile.

use anyhow::Context;
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tlspl::{compile, compile_checked, Error, GenOptions, NamingScheme, SyntaxError};

#[derive(Parser, Debug)]
#[command(name = "tlspl2rs", version, about = "Compile TLS presentation language to Rust types")]
struct Args {
    /// Input files; reads stdin when none are given
    inputs: Vec<PathBuf>,

    /// Write output to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Name nested anonymous structures after their immediate parent only
    #[arg(long)]
    shallow_names: bool,

    /// Do not emit #[repr] hints for enums with a width marker
    #[arg(long)]
    no_width_hints: bool,

    /// Emit names that are Rust keywords verbatim
    #[arg(long)]
    keep_keywords: bool,

    /// Skip duplicate-name, bound and select-coverage checks
    #[arg(long)]
    no_validate: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn gen_options(&self) -> GenOptions {
        GenOptions {
            naming: if self.shallow_names {
                NamingScheme::Shallow
            } else {
                NamingScheme::FullPath
            },
            enum_width_hints: !self.no_width_hints,
            escape_keywords: !self.keep_keywords,
        }
    }
}

/// `path:line:col: error: ...`, the offending line and a caret under the column.
fn print_syntax_error(path: &str, source: &str, err: &SyntaxError) {
    let pos = err.position;
    eprintln!(
        "{}:{}:{}: error: {}: {}",
        path, pos.line, pos.column, err.kind, err.message
    );
    let line_text = source.lines().nth(pos.line.saturating_sub(1)).unwrap_or("");
    eprintln!("  {}", line_text);
    eprintln!("  {}^", " ".repeat(pos.column.saturating_sub(1)));
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let options = args.gen_options();
    let mut sources = Vec::new();
    if args.inputs.is_empty() {
        let mut src = String::new();
        io::stdin()
            .read_to_string(&mut src)
            .context("reading stdin")?;
        sources.push(("<stdin>".to_string(), src));
    } else {
        for path in &args.inputs {
            let src = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            sources.push((path.display().to_string(), src));
        }
    }

    let mut outputs = Vec::new();
    let mut failures = 0usize;
    for (path, src) in &sources {
        log::info!("compiling {}", path);
        let result = if args.no_validate {
            compile(src, &options)
        } else {
            compile_checked(src, &options)
        };
        match result {
            Ok(code) => outputs.push(code),
            Err(Error::Syntax(err)) => {
                print_syntax_error(path, src, &err);
                failures += 1;
            }
            Err(err) => {
                eprintln!("{}: error: {}", path, err);
                failures += 1;
            }
        }
    }

    let mut text = outputs
        .into_iter()
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }
    match &args.output {
        Some(path) => std::fs::write(path, &text)
            .with_context(|| format!("writing {}", path.display()))?,
        None => io::stdout()
            .write_all(text.as_bytes())
            .context("writing stdout")?,
    }

    if failures > 0 {
        eprintln!("tlspl2rs: {} of {} input(s) failed", failures, sources.len());
        std::process::exit(1);
    }
    Ok(())
}

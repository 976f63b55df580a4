use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;
use wasm2bpl::source::load_module;
use wasm2bpl::{parse_module, translate_module, TranslateOptions};

/// wasm2bpl — WebAssembly text to verification IR translator.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input WebAssembly text module (.wat)
    input: PathBuf,

    /// Output program file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Contract name recorded in the program header
    #[arg(long)]
    contract: Option<String>,

    /// Omit stack-balance assertions and postconditions
    #[arg(long)]
    no_stack_assert: bool,

    /// Emit every scope label, even ones no branch targets
    #[arg(long)]
    keep_labels: bool,

    /// Skip the duplicate-label check
    #[arg(long)]
    no_verify_labels: bool,

    /// Write the program without indentation
    #[arg(long)]
    raw: bool,

    /// Print the parsed AST instead of translating
    #[arg(long)]
    dump_ast: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> TranslateOptions {
        TranslateOptions {
            stack_assert: !self.no_stack_assert,
            prune_unused_labels: !self.keep_labels,
            verify_labels: !self.no_verify_labels,
            pretty: !self.raw,
            contract_name: self.contract.clone(),
        }
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides -v
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    eprintln!("wasm2bpl: translating {}", cli.input.display());

    let wat_text = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let source = load_module(&wat_text).context("failed to load WebAssembly module")?;

    if cli.dump_ast {
        let module = parse_module(&source)?;
        print!("{}", wasm2bpl::ast::dump(&module));
        return Ok(());
    }

    let options = cli.options();
    let translation = translate_module(&source, &options).context("translation failed")?;

    for diagnostic in &translation.diagnostics {
        eprintln!("wasm2bpl: approximated: {diagnostic}");
    }

    let program = translation.text(options.pretty);
    if let Some(output_path) = cli.output {
        fs::write(&output_path, &program)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        eprintln!("wasm2bpl: wrote {}", output_path.display());
    } else {
        print!("{}", program);
    }

    eprintln!(
        "wasm2bpl: translation complete ({} diagnostics)",
        translation.diagnostics.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["wasm2bpl", "input.wat"]);
        assert_eq!(cli.input, PathBuf::from("input.wat"));
        assert!(cli.output.is_none());
        let options = cli.options();
        assert!(options.stack_assert);
        assert!(options.prune_unused_labels);
        assert!(options.pretty);
        assert_eq!(cli.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn cli_flags_turn_options_off() {
        let cli = Cli::parse_from([
            "wasm2bpl",
            "input.wat",
            "--no-stack-assert",
            "--keep-labels",
            "--raw",
            "--contract",
            "Vault",
            "-vv",
        ]);
        let options = cli.options();
        assert!(!options.stack_assert);
        assert!(!options.prune_unused_labels);
        assert!(!options.pretty);
        assert_eq!(options.contract_name.as_deref(), Some("Vault"));
        assert_eq!(cli.log_level(), LevelFilter::Debug);
    }
}

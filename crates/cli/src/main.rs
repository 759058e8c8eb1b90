use alloy_primitives::hex;
use clap::Parser;
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};
use vyc::{AssemblyMode, CompileError, Config};

#[derive(Parser)]
#[command(name = "vyc")]
#[command(about = "Contract language to EVM bytecode compiler", long_about = None)]
#[command(version)]
struct Cli {
    /// Input file (use '-' or omit for stdin)
    input: Option<PathBuf>,

    /// Print the runtime code instead of the init code
    #[arg(long)]
    runtime: bool,

    /// Print the selector of every external entry point
    #[arg(long)]
    method_identifiers: bool,

    /// Use maximized assembly mode (default: minimized)
    #[arg(long)]
    maximized: bool,
}

fn read_input(input: Option<&PathBuf>) -> io::Result<String> {
    match input {
        Some(path) if path.to_str() != Some("-") => fs::read_to_string(path),
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match read_input(cli.input.as_ref()) {
        Ok(source) => source,
        Err(err) => {
            let name = cli.input.as_ref().map_or("stdin".into(), |path| path.display().to_string());
            eprintln!("failed to read {name}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let assembly = if cli.maximized { AssemblyMode::Maximized } else { AssemblyMode::Minimized };
    let contract = match vyc::compile_with_config(&source, Config { assembly }) {
        Ok(contract) => contract,
        Err(CompileError::Diagnostic(diagnostic)) => {
            eprint!("{}", diagnostic.render(&source));
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.method_identifiers {
        for (signature, selector) in &contract.method_identifiers {
            println!("{}: {signature}", hex::encode(selector));
        }
        return ExitCode::SUCCESS;
    }
    let code = if cli.runtime { &contract.runtime_code } else { &contract.init_code };
    println!("{}", hex::encode_prefixed(code));
    ExitCode::SUCCESS
}

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use dfa_calc::{Automaton, CalcConfig, Calculator};
use miette::IntoDiagnostic;
use miette::WrapErr;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Builds an automaton from a description file and checks inputs against it
    Dfa {
        filename: PathBuf,
        /// Strings to test
        inputs: Vec<String>,
        /// Print the states and transitions
        #[arg(long)]
        show: bool,
    },
    /// Evaluates every line of a calculator file
    Calc {
        filename: PathBuf,
        #[arg(long, default_value_t = 13)]
        decimals: u32,
        /// Start in radian mode
        #[arg(long)]
        rad: bool,
        /// Operator names to install (regex, repeatable)
        #[arg(long)]
        allowed: Vec<String>,
        /// Operator names to leave out (regex, repeatable)
        #[arg(long)]
        illegals: Vec<String>,
    },
}

fn read(filename: &PathBuf) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn main() -> miette::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Dfa {
            filename,
            inputs,
            show,
        } => {
            let file_contents = read(&filename)?;
            let dfa = Automaton::build(&file_contents);
            if show {
                print!("{dfa}");
            }
            for input in inputs {
                let verdict = if dfa.accepts(&input) {
                    "accepted"
                } else {
                    "rejected"
                };
                println!("{input:?}: {verdict}");
            }
        }
        Commands::Calc {
            filename,
            decimals,
            rad,
            allowed,
            illegals,
        } => {
            let file_contents = read(&filename)?;
            let config = CalcConfig::default()
                .decimals(decimals)
                .deg(!rad)
                .allowed(allowed)
                .illegals(illegals);
            let mut calculator = Calculator::new(config).wrap_err("invalid calculator options")?;
            for result in calculator.calc(&file_contents) {
                println!("{result}");
            }
        }
    }
    Ok(())
}

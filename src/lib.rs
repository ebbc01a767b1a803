pub mod calc;
pub mod dfa;
pub mod lex;
pub mod parse;
pub mod token;

pub use calc::{CalcConfig, CalcError, Calculator, LineResult};
pub use dfa::Automaton;
pub use lex::{Lexer, Rules};
pub use parse::Parser;

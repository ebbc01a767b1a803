//! Line oriented calculator.
//!
//! Every input line is lexed, converted to postfix and evaluated on its own.
//! Results are remembered as `r1`, `r2`, ... (and `r` for the latest) and
//! can be stored under names with a trailing `-> name` clause:
//!
//! ```text
//! 2 * 3 -> a      r1: 2 * 3 = 6 -> a
//! a + 1           r2: 6 + 1 = 7
//! p1 * 2          r3: 7 * 2 = 14      (p1 is one row back)
//! ```

use std::{collections::HashMap, fmt::Display};

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::{
    lex::{LexError, Lexeme, Lexer, Rules},
    parse::{ParseError, Parser},
    token::{CATALOGUE, OpKind, Token, format_number, parse_number, round_to_nearest},
};

#[derive(Error, Debug, Diagnostic)]
pub enum CalcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("Unknown variable '{0}'")]
    #[diagnostic(help("store a value first, e.g. `1 -> {0}`"))]
    UnknownVariable(String),

    #[error("Not a number '{0}'")]
    Number(String),

    #[error("invalid operator pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcConfig {
    /// Decimals kept by every rounding step.
    pub decimals: u32,
    /// Start in degree mode.
    pub deg: bool,
    /// Operator name patterns to install, empty for all.
    pub allowed: Vec<String>,
    /// Operator name patterns never installed.
    pub illegals: Vec<String>,
}

impl Default for CalcConfig {
    fn default() -> Self {
        CalcConfig {
            decimals: 13,
            deg: true,
            allowed: Vec::new(),
            illegals: Vec::new(),
        }
    }
}

impl CalcConfig {
    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn deg(mut self, deg: bool) -> Self {
        self.deg = deg;
        self
    }

    pub fn allowed<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.allowed = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn illegals<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.illegals = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// State shared by the lines of one calculator.
#[derive(Debug, Clone)]
pub struct Context {
    mem: HashMap<String, Option<f64>>,
    last_result: f64,
    row: usize,
    deg: bool,
    decimals: u32,
}

impl Context {
    fn new(config: &CalcConfig) -> Self {
        Context {
            mem: HashMap::new(),
            last_result: 0.0,
            row: 0,
            deg: config.deg,
            decimals: config.decimals,
        }
    }

    /// Resolves an operand: empty and `p` give the last result, `pN` the
    /// result N rows back, other lowercase names a stored value and anything
    /// else is read as a number.
    pub fn get_num(&self, s: &str) -> Result<f64, CalcError> {
        let s = s.trim();
        if s.is_empty() || s == "p" {
            return Ok(self.last_result);
        }
        if let Some(back) = s.strip_prefix('p') {
            let digits = back.find(|c: char| !c.is_ascii_digit()).unwrap_or(back.len());
            let Ok(back) = back[..digits].parse::<usize>() else {
                return Ok(0.0);
            };
            let idx = self.row.saturating_sub(back).min(self.row.saturating_sub(1));
            return Ok(self.mem.get(&format!("r{idx}")).copied().flatten().unwrap_or(0.0));
        }
        if s.starts_with(|c: char| c.is_ascii_lowercase()) {
            return match self.mem.get(s) {
                Some(Some(value)) => Ok(*value),
                _ => Err(CalcError::UnknownVariable(s.to_string())),
            };
        }
        parse_number(s).ok_or_else(|| CalcError::Number(s.to_string()))
    }

    fn to_angle(&self, a: f64) -> f64 {
        if self.deg {
            a * std::f64::consts::PI / 180.0
        } else {
            a
        }
    }

    fn round(&self, v: f64) -> f64 {
        round_to_nearest(v, self.decimals)
    }
}

/// Outcome of one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineResult {
    pub row: usize,
    /// `None` when the line failed or left nothing on the stack.
    pub res: Option<f64>,
    /// Echo of the computation, or the error message.
    pub calc: String,
    /// The ` -> name` tail of the line, if any.
    pub assign: String,
}

impl Display for LineResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}: {}{}", self.row, self.calc, self.assign)
    }
}

pub struct Calculator {
    config: CalcConfig,
    rules: Rules<Token, Context, CalcError>,
    ctx: Context,
}

impl Calculator {
    pub fn new(config: CalcConfig) -> Result<Self, CalcError> {
        let allowed = compile_filters(&config.allowed)?;
        let illegals = compile_filters(&config.illegals)?;

        let mut rules: Rules<Token, Context, CalcError> = Rules::new();
        for kind in CATALOGUE {
            if !is_in(&allowed, kind, true) || is_in(&illegals, kind, false) {
                log::debug!("operator {:?} not installed", kind.name());
                continue;
            }
            rules.add_rule(kind.pattern(), move |lexeme: &str, ctx: &Context| {
                lex_token(kind, lexeme, ctx).map(Lexeme::Token)
            })?;
        }
        rules.add_rule(r"\s+", |_, _| Ok(Lexeme::Skip))?;

        let ctx = Context::new(&config);
        Ok(Calculator { config, rules, ctx })
    }

    pub fn config(&self) -> &CalcConfig {
        &self.config
    }

    pub fn last_result(&self) -> f64 {
        self.ctx.last_result
    }

    pub fn is_deg(&self) -> bool {
        self.ctx.deg
    }

    /// A stored value, `None` if unset or stored from a failed line.
    pub fn memory(&self, name: &str) -> Option<f64> {
        self.ctx.mem.get(name).copied().flatten()
    }

    /// Evaluates every line of `text`, one result per non-blank line.
    pub fn calc(&mut self, text: &str) -> Vec<LineResult> {
        self.ctx.mem.retain(|name, _| !is_row_name(name));

        let mut results = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            let row = i + 1;
            self.ctx.row = row;
            self.ctx.mem.insert("r".into(), Some(self.ctx.last_result));

            let line = line.find('#').map_or(line, |hash| &line[..hash]).trim();
            if line.is_empty() {
                continue;
            }

            let (expr, assign, targets) = match line.find("->") {
                Some(arrow) => (
                    &line[..arrow],
                    format!(" {}", &line[arrow..]),
                    &line[arrow + 2..],
                ),
                None => (line, String::new(), ""),
            };
            let expr = expr.trim();

            let mut result = if expr.is_empty() {
                LineResult {
                    row,
                    res: Some(self.ctx.last_result),
                    calc: String::new(),
                    assign: String::new(),
                }
            } else {
                self.calc_one(expr)
            };
            result.assign = assign;

            self.ctx.mem.insert(format!("r{row}"), result.res);
            self.ctx.mem.insert("r".into(), Some(self.ctx.last_result));
            for name in targets
                .split("->")
                .flat_map(|part| part.split(','))
                .map(str::trim)
                .filter(|name| !name.is_empty())
            {
                self.ctx.mem.insert(name.to_string(), result.res);
            }

            results.push(result);
        }
        results
    }

    /// Evaluates a single expression. Failures become the result's text.
    pub fn calc_one(&mut self, expr: &str) -> LineResult {
        let row = self.ctx.row;
        match self.evaluate(expr) {
            Ok((res, calc)) => LineResult {
                row,
                res,
                calc,
                assign: String::new(),
            },
            Err(e) => {
                log::debug!("line {row} failed: {e}");
                LineResult {
                    row,
                    res: None,
                    calc: e.to_string(),
                    assign: String::new(),
                }
            }
        }
    }

    fn evaluate(&mut self, expr: &str) -> Result<(Option<f64>, String), CalcError> {
        let mut tokens = Vec::new();
        let mut last = Token::LeftBracket;
        for token in Lexer::new(&self.rules, expr, &self.ctx) {
            let token = token?.check_sign(&last);
            tokens.push(token);
            last = token;
        }

        let postfix = Parser::parse(&tokens)?;
        let mut stack = Vec::new();
        for token in &postfix {
            self.apply(token, &mut stack);
        }

        let mut calc = String::new();
        let mut extra = "";
        for token in &tokens {
            calc.push_str(&token.output(extra));
            extra = token.extra_space_after();
        }

        let res = stack.pop();
        if let Some(res) = res {
            self.ctx.last_result = res;
            calc.push_str(" = ");
            calc.push_str(&format_number(res));
        }
        Ok((res, calc))
    }

    /// Runs one postfix token. Missing operands fall back to the last result.
    fn apply(&mut self, token: &Token, stack: &mut Vec<f64>) {
        let last = self.ctx.last_result;
        let pop = |stack: &mut Vec<f64>| stack.pop().unwrap_or(last);

        let value = match *token {
            Token::LeftBracket | Token::RightBracket | Token::SignPlus => return,
            Token::Deg => {
                self.ctx.deg = true;
                return;
            }
            Token::Rad => {
                self.ctx.deg = false;
                return;
            }
            Token::Plus | Token::Minus | Token::Mul | Token::Div => {
                let b = pop(stack);
                let a = pop(stack);
                match token {
                    Token::Plus => a + b,
                    Token::Minus => a - b,
                    Token::Mul => a * b,
                    _ => a / b,
                }
            }
            Token::SignMinus => -pop(stack),
            Token::Sin => self.ctx.to_angle(pop(stack)).sin(),
            Token::Cos => self.ctx.to_angle(pop(stack)).cos(),
            Token::Sqrt => pop(stack).sqrt(),
            Token::Num(v) | Token::Mem(v) => v,
            Token::Pi => std::f64::consts::PI,
        };
        stack.push(self.ctx.round(value));
    }
}

fn lex_token(kind: OpKind, lexeme: &str, ctx: &Context) -> Result<Token, CalcError> {
    Ok(match kind {
        OpKind::LeftBracket => Token::LeftBracket,
        OpKind::RightBracket => Token::RightBracket,
        OpKind::Plus => Token::Plus,
        OpKind::Minus => Token::Minus,
        OpKind::SignMinus => Token::SignMinus,
        OpKind::SignPlus => Token::SignPlus,
        OpKind::Mul => Token::Mul,
        OpKind::Div => Token::Div,
        OpKind::Sin => Token::Sin,
        OpKind::Cos => Token::Cos,
        OpKind::Sqrt => Token::Sqrt,
        OpKind::Deg => Token::Deg,
        OpKind::Rad => Token::Rad,
        OpKind::Num => Token::Num(
            parse_number(lexeme).ok_or_else(|| CalcError::Number(lexeme.to_string()))?,
        ),
        OpKind::Pi => Token::Pi,
        OpKind::Mem => Token::Mem(ctx.get_num(lexeme)?),
    })
}

fn compile_filters(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = match pattern.as_str() {
                "+" | "*" => format!(r"\{pattern}"),
                _ => pattern.clone(),
            };
            Regex::new(&format!("^(?:{pattern})$"))
        })
        .collect()
}

fn is_in(filters: &[Regex], kind: OpKind, default: bool) -> bool {
    if filters.is_empty() {
        return default;
    }
    filters.iter().any(|re| re.is_match(kind.name()))
}

/// `r1`, `r2`, ... as written by [`Calculator::calc`].
fn is_row_name(name: &str) -> bool {
    name.strip_prefix('r')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

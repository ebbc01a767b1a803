use std::fmt::Display;

/// Operator kinds in the order their rules are installed into the lexer.
/// The order decides ties between equally long matches.
pub const CATALOGUE: [OpKind; 16] = [
    OpKind::LeftBracket,
    OpKind::RightBracket,
    OpKind::Plus,
    OpKind::Minus,
    OpKind::SignMinus,
    OpKind::SignPlus,
    OpKind::Mul,
    OpKind::Div,
    OpKind::Sin,
    OpKind::Cos,
    OpKind::Sqrt,
    OpKind::Deg,
    OpKind::Rad,
    OpKind::Num,
    OpKind::Pi,
    OpKind::Mem,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence {
    pub level: u8,
    pub associativity: Associativity,
}

impl Precedence {
    pub const FACTOR: Precedence = Precedence {
        level: 2,
        associativity: Associativity::Left,
    };
    pub const TERM: Precedence = Precedence {
        level: 1,
        associativity: Associativity::Left,
    };
    pub const FUNC: Precedence = Precedence {
        level: 1,
        associativity: Associativity::Right,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    LeftBracket,
    RightBracket,
    Plus,
    Minus,
    SignMinus,
    SignPlus,
    Mul,
    Div,
    Sin,
    Cos,
    Sqrt,
    Deg,
    Rad,
    Num,
    Pi,
    Mem,
}

impl OpKind {
    /// Regex matching the lexeme. Binary `+`/`-` demand a following space so
    /// that a bare `-2` lexes as a sign.
    pub fn pattern(self) -> &'static str {
        match self {
            OpKind::LeftBracket => "[(]",
            OpKind::RightBracket => "[)]",
            OpKind::Plus => r" *\+ ",
            OpKind::Minus => " *- ",
            OpKind::SignMinus => " *-",
            OpKind::SignPlus => r" *\+",
            OpKind::Mul => r"\*",
            OpKind::Div => "/",
            OpKind::Sin => "sin",
            OpKind::Cos => "cos",
            OpKind::Sqrt => "sqrt",
            OpKind::Deg => "deg",
            OpKind::Rad => "rad",
            OpKind::Num => "[0-9]+(?:[.,][0-9]*)?(?:[eE]-?[0-9]+)?",
            OpKind::Pi => "pi|π",
            OpKind::Mem => "[a-z][a-z0-9]*",
        }
    }

    /// Name matched by the `allowed`/`illegals` filters.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::LeftBracket => "(",
            OpKind::RightBracket => ")",
            OpKind::Plus => "+",
            OpKind::Minus => "-",
            OpKind::SignMinus => " -",
            OpKind::SignPlus => " +",
            OpKind::Mul => "*",
            OpKind::Div => "/",
            OpKind::Sin => "sin",
            OpKind::Cos => "cos",
            OpKind::Sqrt => "sqrt",
            OpKind::Deg => "deg",
            OpKind::Rad => "rad",
            OpKind::Num => "num",
            OpKind::Pi => "pi",
            OpKind::Mem => "mem",
        }
    }
}

/// A lexed operation. Memory references are resolved to their value while
/// lexing, so every value token carries its number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    LeftBracket,
    RightBracket,
    Plus,
    Minus,
    SignMinus,
    SignPlus,
    Mul,
    Div,
    Sin,
    Cos,
    Sqrt,
    Deg,
    Rad,
    Num(f64),
    Pi,
    Mem(f64),
}

impl Token {
    pub fn kind(&self) -> OpKind {
        match self {
            Token::LeftBracket => OpKind::LeftBracket,
            Token::RightBracket => OpKind::RightBracket,
            Token::Plus => OpKind::Plus,
            Token::Minus => OpKind::Minus,
            Token::SignMinus => OpKind::SignMinus,
            Token::SignPlus => OpKind::SignPlus,
            Token::Mul => OpKind::Mul,
            Token::Div => OpKind::Div,
            Token::Sin => OpKind::Sin,
            Token::Cos => OpKind::Cos,
            Token::Sqrt => OpKind::Sqrt,
            Token::Deg => OpKind::Deg,
            Token::Rad => OpKind::Rad,
            Token::Num(_) => OpKind::Num,
            Token::Pi => OpKind::Pi,
            Token::Mem(_) => OpKind::Mem,
        }
    }

    /// `None` for brackets, values and commands.
    pub fn precedence(&self) -> Option<Precedence> {
        match self {
            Token::Plus | Token::Minus => Some(Precedence::TERM),
            Token::Mul | Token::Div => Some(Precedence::FACTOR),
            Token::SignMinus | Token::SignPlus | Token::Sin | Token::Cos | Token::Sqrt => {
                Some(Precedence::FUNC)
            }
            _ => None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Token::Num(n) | Token::Mem(n) => Some(*n),
            Token::Pi => Some(std::f64::consts::PI),
            _ => None,
        }
    }

    fn symbol(&self) -> String {
        match self {
            Token::LeftBracket => "(".into(),
            Token::RightBracket => ")".into(),
            Token::Plus | Token::SignPlus => "+".into(),
            Token::Minus | Token::SignMinus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Sin => "sin".into(),
            Token::Cos => "cos".into(),
            Token::Sqrt => "sqrt".into(),
            Token::Deg => "deg".into(),
            Token::Rad => "rad".into(),
            Token::Num(n) | Token::Mem(n) => format_number(*n),
            Token::Pi => format_number(std::f64::consts::PI),
        }
    }

    /// Echo of this token given the spacing the previous token asked for.
    pub fn output(&self, extra_before: &str) -> String {
        match self {
            Token::LeftBracket | Token::RightBracket => self.symbol(),
            Token::Plus
            | Token::Minus
            | Token::Mul
            | Token::Div
            | Token::Deg
            | Token::Rad => format!(" {} ", self.symbol()),
            _ => format!("{extra_before}{}", self.symbol()),
        }
    }

    /// Spacing requested before the next token.
    pub fn extra_space_after(&self) -> &'static str {
        match self {
            Token::Sin | Token::Cos | Token::Sqrt => " ",
            _ => "",
        }
    }

    /// Whether a `+`/`-` right after this token is a sign.
    pub fn allow_sign_right(&self) -> bool {
        !matches!(
            self,
            Token::RightBracket | Token::Num(_) | Token::Pi | Token::Mem(_)
        )
    }

    /// Turns a sign into the binary operator when `last` ends an operand.
    pub fn check_sign(self, last: &Token) -> Token {
        match self {
            Token::SignMinus if !last.allow_sign_right() => Token::Minus,
            Token::SignPlus if !last.allow_sign_right() => Token::Plus,
            token => token,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Largest number of decimals [`round_to_nearest`] honours.
pub const MAX_DECIMALS: u32 = 300;

/// Rounds to `decimals` places, first scaling large magnitudes below ten so
/// the epsilon nudge stays proportionate.
pub fn round_to_nearest(num: f64, decimals: u32) -> f64 {
    if !num.is_finite() {
        return num;
    }
    // keeps `10 * p` finite
    let decimals = decimals.min(MAX_DECIMALS);
    let p = 10f64.powi(decimals as i32);
    let mut p2 = p;
    let mut num = num;
    while num.abs() > 10.0 {
        p2 /= 10.0;
        num /= 10.0;
    }
    let n = (num * p) * (1.0 + f64::EPSILON);
    js_round(n) / p2
}

/// Halves round toward positive infinity.
fn js_round(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 { floor + 1.0 } else { floor }
}

/// Shortest round-trip rendering in the style of JavaScript's
/// `Number.prototype.toString`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{n}");
    }
    let exp = format!("{n:e}");
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
        _ => exp,
    }
}

/// Parses a number lexeme, accepting `,` as decimal separator.
pub fn parse_number(lexeme: &str) -> Option<f64> {
    let lexeme = lexeme.trim().replacen(',', ".", 1);
    let lexeme = lexeme.strip_suffix('.').unwrap_or(&lexeme);
    lexeme.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_hides_float_noise() {
        assert_eq!(round_to_nearest(0.1 + 0.2, 13), 0.3);
        assert_eq!(round_to_nearest(0.49999999999999994, 13), 0.5);
        assert_eq!(round_to_nearest(2.0, 13), 2.0);
        assert_eq!(round_to_nearest(-1.0, 13), -1.0);
    }

    #[test]
    fn rounding_scales_large_values() {
        assert_eq!(round_to_nearest(12345.0, 13), 12345.0);
        // magnitude is scaled away first, so `decimals` bounds significant digits
        assert!((round_to_nearest(1234.5678, 2) - 1230.0).abs() < 1e-9);
        assert_eq!(round_to_nearest(2.5, 0), 3.0);
        // the epsilon nudge pushes negative halves away from zero
        assert_eq!(round_to_nearest(-2.5, 0), -3.0);
    }

    #[test]
    fn rounding_clamps_huge_decimals() {
        for decimals in [MAX_DECIMALS + 1, 400, u32::MAX] {
            let rounded = round_to_nearest(1.5, decimals);
            assert!((rounded - 1.5).abs() < 1e-12, "{decimals}: {rounded}");
        }
        assert!(round_to_nearest(0.1 + 0.2, u32::MAX).is_finite());
    }

    #[test]
    fn rounding_keeps_non_finite() {
        assert_eq!(round_to_nearest(f64::INFINITY, 13), f64::INFINITY);
        assert!(round_to_nearest(f64::NAN, 13).is_nan());
    }

    #[test]
    fn numbers_render_like_javascript() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(std::f64::consts::PI), "3.141592653589793");
    }

    #[test]
    fn number_lexemes() {
        assert_eq!(parse_number("2,5"), Some(2.5));
        assert_eq!(parse_number("3."), Some(3.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("1.5E-1"), Some(0.15));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn signs_follow_previous_token() {
        assert_eq!(Token::SignMinus.check_sign(&Token::LeftBracket), Token::SignMinus);
        assert_eq!(Token::SignMinus.check_sign(&Token::Mul), Token::SignMinus);
        assert_eq!(Token::SignMinus.check_sign(&Token::Num(2.0)), Token::Minus);
        assert_eq!(Token::SignPlus.check_sign(&Token::RightBracket), Token::Plus);
        assert_eq!(Token::Mul.check_sign(&Token::Num(2.0)), Token::Mul);
    }

    #[test]
    fn output_spacing() {
        assert_eq!(Token::Plus.output(""), " + ");
        assert_eq!(Token::SignMinus.output(""), "-");
        assert_eq!(Token::Num(30.0).output(" "), " 30");
        assert_eq!(Token::LeftBracket.output(" "), "(");
        assert_eq!(Token::Sin.output(""), "sin");
        assert_eq!(Token::Sin.extra_space_after(), " ");
        assert_eq!(Token::Deg.output(""), " deg ");
    }

    #[test]
    fn catalogue_patterns_compile() {
        for kind in CATALOGUE {
            assert!(regex::Regex::new(kind.pattern()).is_ok(), "{kind:?}");
        }
    }
}

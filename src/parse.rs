use miette::Diagnostic;
use thiserror::Error;

use crate::token::{Associativity, Token};

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ParseError {
    #[error("Missing (.")]
    #[diagnostic(help("a `)` has no matching `(` before it"))]
    MissingOpen,
    #[error("Missing ).")]
    #[diagnostic(help("close every `(` with a `)`"))]
    MissingClose,
}

/// Shunting-yard conversion of infix tokens into postfix order.
pub struct Parser;

impl Parser {
    pub fn parse(tokens: &[Token]) -> Result<Vec<Token>, ParseError> {
        let mut output = Vec::with_capacity(tokens.len());
        let mut stack: Vec<Token> = Vec::new();

        for &token in tokens {
            match token {
                Token::LeftBracket => stack.push(token),
                Token::RightBracket => loop {
                    match stack.pop() {
                        Some(Token::LeftBracket) => break,
                        Some(op) => output.push(op),
                        None => return Err(ParseError::MissingOpen),
                    }
                },
                _ => {
                    let Some(incoming) = token.precedence() else {
                        output.push(token);
                        continue;
                    };
                    while let Some(top) = stack.last() {
                        let Some(antecedence) = top.precedence() else {
                            break;
                        };
                        if incoming.level > antecedence.level
                            || (incoming.level == antecedence.level
                                && incoming.associativity == Associativity::Right)
                        {
                            break;
                        }
                        output.extend(stack.pop());
                    }
                    stack.push(token);
                }
            }
        }

        while let Some(token) = stack.pop() {
            if token == Token::LeftBracket {
                return Err(ParseError::MissingClose);
            }
            output.push(token);
        }

        log::trace!("postfix: {output:?}");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix(tokens: &[Token]) -> String {
        Parser::parse(tokens)
            .unwrap()
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        use Token::*;
        assert_eq!(postfix(&[Num(2.0), Plus, Num(3.0), Mul, Num(4.0)]), "2 3 4 * +");
        assert_eq!(postfix(&[Num(2.0), Mul, Num(3.0), Plus, Num(4.0)]), "2 3 * 4 +");
    }

    #[test]
    fn left_associative_chain() {
        use Token::*;
        assert_eq!(postfix(&[Num(10.0), Minus, Num(4.0), Minus, Num(3.0)]), "10 4 - 3 -");
        assert_eq!(postfix(&[Num(8.0), Div, Num(4.0), Div, Num(2.0)]), "8 4 / 2 /");
    }

    #[test]
    fn brackets_group() {
        use Token::*;
        assert_eq!(
            postfix(&[LeftBracket, Num(2.0), Plus, Num(3.0), RightBracket, Mul, Num(2.0)]),
            "2 3 + 2 *"
        );
    }

    #[test]
    fn prefix_functions_nest_right() {
        use Token::*;
        assert_eq!(postfix(&[SignMinus, Sin, Num(30.0)]), "30 sin -");
        assert_eq!(postfix(&[Sin, Num(30.0), Plus, Num(1.0)]), "30 sin 1 +");
    }

    #[test]
    fn commands_pass_through() {
        use Token::*;
        assert_eq!(postfix(&[Rad, Cos, Num(0.0)]), "rad 0 cos");
    }

    #[test]
    fn unbalanced_brackets() {
        use Token::*;
        assert_eq!(
            Parser::parse(&[LeftBracket, Num(2.0), Plus, Num(3.0)]),
            Err(ParseError::MissingClose)
        );
        assert_eq!(
            Parser::parse(&[Num(2.0), Plus, Num(3.0), RightBracket]),
            Err(ParseError::MissingOpen)
        );
        assert_eq!(Parser::parse(&[RightBracket]), Err(ParseError::MissingOpen));
    }
}

//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(CompileError::lexer(
                    format!("unexpected character: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_tokenize_empty() {
        let tokens = tokenize("").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("let const fn if else true false null"),
            vec![
                Token::Let,
                Token::Const,
                Token::Fn,
                Token::If,
                Token::Else,
                Token::True,
                Token::False,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_tokenize_integer_literal() {
        assert_eq!(kinds("42"), vec![Token::IntLit(42)]);
        assert_eq!(kinds("1_000"), vec![Token::IntLit(1000)]);
        assert_eq!(kinds("0xFF"), vec![Token::IntLit(255)]);
    }

    #[test]
    fn test_tokenize_float_literal() {
        let tokens = kinds("1.5 2e3");
        assert!(matches!(tokens[0], Token::FloatLit(f) if (f - 1.5).abs() < f64::EPSILON));
        assert!(matches!(tokens[1], Token::FloatLit(f) if (f - 2000.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_tokenize_string_literal() {
        assert_eq!(
            kinds(r#""hello""#),
            vec![Token::StrLit("hello".to_string())]
        );
        assert_eq!(
            kinds(r#""a\nb\t\"c\"""#),
            vec![Token::StrLit("a\nb\t\"c\"".to_string())]
        );
    }

    #[test]
    fn test_tokenize_char_literal() {
        assert_eq!(kinds("'x'"), vec![Token::CharLit('x')]);
        assert_eq!(kinds(r"'\n'"), vec![Token::CharLit('\n')]);
        assert_eq!(kinds(r"'\''"), vec![Token::CharLit('\'')]);
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("+ += ++ == = && & <= <"),
            vec![
                Token::Plus,
                Token::PlusEq,
                Token::PlusPlus,
                Token::EqEq,
                Token::Eq,
                Token::AndAnd,
                Token::Amp,
                Token::Le,
                Token::Lt,
            ]
        );
    }

    #[test]
    fn test_tokenize_line_comment() {
        assert_eq!(kinds("1 // two\n3"), vec![Token::IntLit(1), Token::IntLit(3)]);
    }

    #[test]
    fn test_tokenize_block_comment() {
        assert_eq!(
            kinds("1 /* two\nthree */ 4"),
            vec![Token::IntLit(1), Token::IntLit(4)]
        );
    }

    #[test]
    fn test_tokenize_identifier_vs_keyword() {
        assert_eq!(
            kinds("lettuce let"),
            vec![Token::Ident("lettuce".to_string()), Token::Let]
        );
    }

    #[test]
    fn test_tokenize_type_keywords() {
        assert_eq!(
            kinds("int float bool char string"),
            vec![
                Token::TyInt,
                Token::TyFloat,
                Token::TyBool,
                Token::TyChar,
                Token::TyString,
            ]
        );
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        assert!(tokenize("let @ = 1;").is_err());
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("let x").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 3));
        assert_eq!(tokens[1].1, Span::new(4, 5));
    }
}

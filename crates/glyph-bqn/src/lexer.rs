//! Lexer for BQN source text.
//!
//! Built on logos. BQN's syntactic role of a name is carried by its
//! spelling, so the lexer already separates subjects (`abc`), functions
//! (`Abc`), 1-modifiers (`_abc`), and 2-modifiers (`_abc_`).

use logos::{Lexer, Logos};

use crate::error::{BqnError, Result};

fn number(lex: &mut Lexer<Token>) -> Option<f64> {
    let raw = lex.slice();
    let (negative, body) = match raw.strip_prefix('¯') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude = match body {
        "∞" => f64::INFINITY,
        "π" => std::f64::consts::PI,
        _ => body.replace('¯', "-").parse::<f64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn character(lex: &mut Lexer<Token>) -> Option<char> {
    let raw = lex.slice();
    raw.strip_prefix('\'')?.strip_suffix('\'')?.chars().next()
}

fn string(lex: &mut Lexer<Token>) -> Option<String> {
    let raw = lex.slice();
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.replace("\"\"", "\""))
}

fn glyph(lex: &mut Lexer<Token>) -> Option<char> {
    lex.slice().chars().next()
}

fn name(lex: &mut Lexer<Token>) -> String {
    lex.slice().to_owned()
}

/// A single BQN token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r]+|#[^\n]*)")]
pub enum Token {
    #[regex(r"¯?([0-9]+(\.[0-9]+)?([eE]¯?[0-9]+)?|∞|π)", number)]
    Number(f64),

    #[regex(r"'.'", character)]
    Char(char),

    #[regex(r#""([^"]|"")*""#, string)]
    Str(String),

    #[regex(r"[a-z][A-Za-z0-9]*", name)]
    Subject(String),

    #[regex(r"[A-Z][A-Za-z0-9]*", name)]
    Function(String),

    #[regex(r"_[A-Za-z][A-Za-z0-9]*", name)]
    Mod1Name(String),

    #[regex(r"_[A-Za-z][A-Za-z0-9]*_", name)]
    Mod2Name(String),

    #[token("𝕩")]
    X,
    #[token("𝕨")]
    W,
    #[token("𝕏")]
    FnX,
    #[token("𝕎")]
    FnW,
    #[token("𝕊")]
    FnSelf,
    #[token("𝕤")]
    SelfSubject,

    #[regex(r"[+\-×÷⋆√⌊⌈|¬∧∨<>≠=≤≥≡≢⊣⊢⥊∾≍⋈↑↓↕«»⌽⍉/⍋⍒⊏⊑⊐⊒∊⍷⊔!]", glyph)]
    PrimFn(char),

    #[regex(r"[˙˜˘¨⌜⁼´˝`]", glyph)]
    PrimMod1(char),

    #[regex(r"[∘○⊸⟜⌾⊘◶⎉⚇⍟⎊]", glyph)]
    PrimMod2(char),

    #[token("·")]
    Nothing,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("⟨")]
    LAngle,
    #[token("⟩")]
    RAngle,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("‿")]
    Strand,
    #[token("←")]
    Define,
    #[token("↩")]
    Change,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("?")]
    Question,
    #[token("⋄")]
    Diamond,
    #[token(",")]
    Comma,
    #[token("\n")]
    Newline,
}

impl Token {
    /// Statement separators: `⋄`, `,`, and newlines.
    pub fn is_separator(&self) -> bool {
        matches!(self, Token::Diamond | Token::Comma | Token::Newline)
    }
}

/// A token paired with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize a whole program.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(next) = lexer.next() {
        let offset = lexer.span().start;
        match next {
            Ok(token) => tokens.push(Spanned { token, offset }),
            Err(()) => {
                return Err(BqnError::Lex {
                    position: source[..offset].chars().count(),
                    text: lexer.slice().to_owned(),
                });
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
            .expect("should tokenize")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn numbers_with_high_minus_and_exponents() {
        assert_eq!(
            kinds("3 ¯2 0.5 1e3 2E¯1 ∞ ¯∞"),
            vec![
                Token::Number(3.0),
                Token::Number(-2.0),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(0.2),
                Token::Number(f64::INFINITY),
                Token::Number(f64::NEG_INFINITY),
            ]
        );
    }

    #[test]
    fn names_carry_their_role() {
        assert_eq!(
            kinds("abc Abc _abc _abc_"),
            vec![
                Token::Subject("abc".into()),
                Token::Function("Abc".into()),
                Token::Mod1Name("_abc".into()),
                Token::Mod2Name("_abc_".into()),
            ]
        );
    }

    #[test]
    fn strings_and_characters() {
        assert_eq!(
            kinds(r#"'a' "say ""hi""" ''' "#),
            vec![
                Token::Char('a'),
                Token::Str("say \"hi\"".into()),
                Token::Char('\''),
            ]
        );
    }

    #[test]
    fn glyphs_split_by_role() {
        assert_eq!(
            kinds("+´ ↕∘≠ {𝕨⌽𝕩}"),
            vec![
                Token::PrimFn('+'),
                Token::PrimMod1('´'),
                Token::PrimFn('↕'),
                Token::PrimMod2('∘'),
                Token::PrimFn('≠'),
                Token::LBrace,
                Token::W,
                Token::PrimFn('⌽'),
                Token::X,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # one\n2"),
            vec![Token::Number(1.0), Token::Newline, Token::Number(2.0)]
        );
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = tokenize("1 + $").unwrap_err();
        assert_eq!(
            err,
            BqnError::Lex {
                position: 4,
                text: "$".into()
            }
        );
    }
}

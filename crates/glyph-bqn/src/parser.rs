//! Parser from tokens to [`Expr`] trees.
//!
//! Roles come from token spelling and propagate through parentheses.
//! Modifiers bind first (left to right), then a term sequence is read
//! right to left: ending in a subject it is a value expression, ending in a
//! function it is a train. Inside a block, `;` separates bodies, a leading
//! `header:` restricts a body, and `cond ?` guards the rest of it.

use std::rc::Rc;

use crate::ast::{Block, BlockKind, Body, Expr, Header, Pattern, Role, Special, normalize_name};
use crate::error::{BqnError, Result};
use crate::lexer::{Spanned, Token, tokenize};

/// Parse a whole program into its top-level statements.
pub fn parse(source: &str) -> Result<Vec<Expr>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        blocks: Vec::new(),
    };
    let body = parser.statements(None)?;
    if let Some(token) = parser.peek() {
        return Err(BqnError::syntax(format!("Unexpected {}", describe(token))));
    }
    Ok(body)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// One entry per open block: whether it references `𝕩`/`𝕨`/`𝕊`.
    blocks: Vec<bool>,
}

fn is_closer(token: &Token) -> bool {
    matches!(
        token,
        Token::RParen | Token::RBrace | Token::RAngle | Token::RBracket
    )
}

/// Punctuation that only has meaning between the braces of a block.
fn is_case_mark(token: &Token) -> bool {
    matches!(token, Token::Colon | Token::Semicolon | Token::Question)
}

enum HeaderItem {
    Function(Option<String>),
    Pattern(Pattern),
}

fn describe(token: &Token) -> String {
    match token {
        Token::RParen => "\")\"".into(),
        Token::RBrace => "\"}\"".into(),
        Token::RAngle => "\"⟩\"".into(),
        Token::RBracket => "\"]\"".into(),
        Token::Define => "\"←\"".into(),
        Token::Change => "\"↩\"".into(),
        Token::Colon => "\":\"".into(),
        Token::Semicolon => "\";\"".into(),
        Token::Question => "\"?\"".into(),
        other => format!("{other:?}"),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, want: Token, what: &str) -> Result<()> {
        match self.advance() {
            Some(ref got) if *got == want => Ok(()),
            Some(got) => Err(BqnError::syntax(format!(
                "Expected {what}, found {}",
                describe(&got)
            ))),
            None => Err(BqnError::syntax(format!("Unclosed {what}"))),
        }
    }

    fn mark_argument_use(&mut self) {
        if let Some(uses) = self.blocks.last_mut() {
            *uses = true;
        }
    }

    /// Statements up to `closer` (not consumed) or end of input.
    fn statements(&mut self, closer: Option<&Token>) -> Result<Vec<Expr>> {
        let mut body = Vec::new();
        loop {
            while self.peek().is_some_and(Token::is_separator) {
                self.pos += 1;
            }
            match (self.peek(), closer) {
                (None, None) => break,
                (None, Some(close)) => {
                    return Err(BqnError::syntax(format!(
                        "Unclosed bracket, expected {}",
                        describe(close)
                    )));
                }
                (Some(token), Some(close)) if token == close => break,
                (Some(token), _) if is_closer(token) => {
                    return Err(BqnError::syntax(format!("Unexpected {}", describe(token))));
                }
                (Some(token), _) if is_case_mark(token) => {
                    return Err(BqnError::syntax(format!(
                        "{} is only allowed in a block body",
                        describe(token)
                    )));
                }
                _ => {}
            }
            let (expr, _) = self.expression()?;
            body.push(expr);
        }
        Ok(body)
    }

    /// Block bodies separated by `;`, up to the closing brace (not consumed).
    fn bodies(&mut self) -> Result<Vec<Body>> {
        let mut bodies = Vec::new();
        loop {
            self.skip_separators();
            let header = if self.header_ahead() {
                Some(self.header()?)
            } else {
                None
            };
            let statements = self.body_statements()?;
            if statements.is_empty() {
                return Err(BqnError::syntax("Empty block"));
            }
            bodies.push(Body { header, statements });
            if self.peek() != Some(&Token::Semicolon) {
                return Ok(bodies);
            }
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(Token::is_separator) {
            self.pos += 1;
        }
    }

    /// Statements of one body, up to `;` or `}`.
    fn body_statements(&mut self) -> Result<Vec<Expr>> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err(BqnError::syntax("Unclosed bracket, expected \"}\"")),
                Some(Token::RBrace | Token::Semicolon) => return Ok(body),
                Some(token) if is_closer(token) || is_case_mark(token) => {
                    return Err(BqnError::syntax(format!("Unexpected {}", describe(token))));
                }
                _ => {}
            }
            let (expr, _) = self.expression()?;
            if self.peek() == Some(&Token::Question) {
                self.pos += 1;
                body.push(Expr::Guard(Box::new(expr)));
            } else {
                body.push(expr);
            }
        }
    }

    /// Whether the body starting here opens with `header:`.
    fn header_ahead(&self) -> bool {
        let mut depth = 0usize;
        for spanned in &self.tokens[self.pos..] {
            match &spanned.token {
                Token::LParen | Token::LBrace | Token::LAngle | Token::LBracket => depth += 1,
                token if is_closer(token) => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::Colon if depth == 0 => return true,
                token if depth == 0 && (token.is_separator() || is_case_mark(token)) => {
                    return false;
                }
                _ => {}
            }
        }
        false
    }

    /// `[left] F [right]:` where `F` is `𝕊` or a function name.
    fn header(&mut self) -> Result<Header> {
        self.mark_argument_use();
        let mut items = Vec::new();
        while self.peek() != Some(&Token::Colon) {
            let item = match self.peek() {
                Some(Token::FnSelf) => {
                    self.pos += 1;
                    HeaderItem::Function(None)
                }
                Some(Token::Function(name)) => {
                    let name = normalize_name(name);
                    self.pos += 1;
                    HeaderItem::Function(Some(name))
                }
                _ => HeaderItem::Pattern(self.header_pattern()?),
            };
            items.push(item);
        }
        self.pos += 1;
        let mut items = items.into_iter();
        let header = match (items.next(), items.next(), items.next(), items.next()) {
            (Some(HeaderItem::Function(name)), None, None, None) => Header {
                name,
                left: None,
                right: None,
            },
            (Some(HeaderItem::Function(name)), Some(HeaderItem::Pattern(right)), None, None) => {
                Header {
                    name,
                    left: None,
                    right: Some(right),
                }
            }
            (
                Some(HeaderItem::Pattern(left)),
                Some(HeaderItem::Function(name)),
                Some(HeaderItem::Pattern(right)),
                None,
            ) => Header {
                name,
                left: Some(left),
                right: Some(right),
            },
            _ => return Err(BqnError::Unsupported("This block header form".into())),
        };
        Ok(header)
    }

    fn header_pattern(&mut self) -> Result<Pattern> {
        let first = self.pattern_atom()?;
        if self.peek() != Some(&Token::Strand) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek() == Some(&Token::Strand) {
            self.pos += 1;
            items.push(self.pattern_atom()?);
        }
        Ok(Pattern::List(items))
    }

    fn pattern_atom(&mut self) -> Result<Pattern> {
        let Some(token) = self.advance() else {
            return Err(BqnError::syntax("Unclosed block header"));
        };
        let pattern = match token {
            Token::X | Token::W => Pattern::Arg,
            Token::Nothing => Pattern::Nothing,
            Token::Subject(name) => Pattern::Bind(normalize_name(&name)),
            Token::Number(n) => Pattern::Constant(Expr::Number(n)),
            Token::Char(c) => Pattern::Constant(Expr::Char(c)),
            Token::Str(s) => Pattern::Constant(Expr::Str(s)),
            Token::LParen => {
                let inner = self.header_pattern()?;
                self.expect(Token::RParen, "\")\"")?;
                inner
            }
            Token::LAngle => {
                let mut items = Vec::new();
                loop {
                    self.skip_separators();
                    if self.peek() == Some(&Token::RAngle) {
                        self.pos += 1;
                        break;
                    }
                    items.push(self.header_pattern()?);
                }
                Pattern::List(items)
            }
            other => {
                return Err(BqnError::syntax(format!(
                    "Unexpected {} in a block header",
                    describe(&other)
                )));
            }
        };
        Ok(pattern)
    }

    fn expression(&mut self) -> Result<(Expr, Role)> {
        let mut terms = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(token) if token.is_separator() || is_closer(token) || is_case_mark(token) => {
                    break;
                }
                _ => {}
            }
            if let Some((name, role, change)) = self.assignment_target() {
                let (value, value_role) = self.expression()?;
                if value_role != role {
                    return Err(BqnError::syntax(format!(
                        "Role of the value assigned to {name} does not match its spelling"
                    )));
                }
                terms.push((
                    Expr::Assign {
                        name,
                        change,
                        value: Box::new(value),
                    },
                    role,
                ));
                break;
            }
            terms.push(self.term()?);
        }
        build(terms)
    }

    fn assignment_target(&mut self) -> Option<(String, Role, bool)> {
        let change = match self.peek_at(1) {
            Some(Token::Define) => false,
            Some(Token::Change) => true,
            _ => return None,
        };
        let (name, role) = match self.peek()? {
            Token::Subject(n) => (normalize_name(n), Role::Subject),
            Token::Function(n) => (normalize_name(n), Role::Function),
            _ => return None,
        };
        self.pos += 2;
        Some((name, role, change))
    }

    /// An operand followed by any number of modifiers.
    fn term(&mut self) -> Result<(Expr, Role)> {
        let (mut expr, mut role) = self.strand()?;
        loop {
            match self.peek() {
                Some(Token::PrimMod1(glyph)) => {
                    let glyph = *glyph;
                    self.pos += 1;
                    expr = Expr::Mod1 {
                        operand: Box::new(expr),
                        glyph,
                    };
                    role = Role::Function;
                }
                Some(Token::PrimMod2(glyph)) => {
                    let glyph = *glyph;
                    self.pos += 1;
                    let (right, _) = self.strand()?;
                    expr = Expr::Mod2 {
                        left: Box::new(expr),
                        glyph,
                        right: Box::new(right),
                    };
                    role = Role::Function;
                }
                Some(Token::Mod1Name(_) | Token::Mod2Name(_)) => {
                    return Err(BqnError::Unsupported("User-defined modifiers".into()));
                }
                _ => break,
            }
        }
        Ok((expr, role))
    }

    fn strand(&mut self) -> Result<(Expr, Role)> {
        let first = self.primary()?;
        if self.peek() != Some(&Token::Strand) {
            return Ok(first);
        }
        let mut items = vec![first.0];
        while self.peek() == Some(&Token::Strand) {
            self.pos += 1;
            let (item, _) = self.primary()?;
            items.push(item);
        }
        Ok((Expr::List(items), Role::Subject))
    }

    fn primary(&mut self) -> Result<(Expr, Role)> {
        let Some(token) = self.advance() else {
            return Err(BqnError::syntax("Unexpected end of input"));
        };
        let parsed = match token {
            Token::Number(n) => (Expr::Number(n), Role::Subject),
            Token::Char(c) => (Expr::Char(c), Role::Subject),
            Token::Str(s) => (Expr::Str(s), Role::Subject),
            Token::Nothing => (Expr::Nothing, Role::Subject),
            Token::Subject(n) => (Expr::Name(normalize_name(&n)), Role::Subject),
            Token::Function(n) => (Expr::Name(normalize_name(&n)), Role::Function),
            Token::X => {
                self.mark_argument_use();
                (Expr::Special(Special::Right), Role::Subject)
            }
            Token::W => {
                self.mark_argument_use();
                (Expr::Special(Special::Left), Role::Subject)
            }
            Token::FnX => {
                self.mark_argument_use();
                (Expr::Special(Special::Right), Role::Function)
            }
            Token::FnW => {
                self.mark_argument_use();
                (Expr::Special(Special::Left), Role::Function)
            }
            Token::FnSelf => {
                self.mark_argument_use();
                (Expr::Special(Special::This), Role::Function)
            }
            Token::SelfSubject => {
                self.mark_argument_use();
                (Expr::Special(Special::This), Role::Subject)
            }
            Token::PrimFn(glyph) => (Expr::Prim(glyph), Role::Function),
            Token::PrimMod1(glyph) | Token::PrimMod2(glyph) => {
                return Err(BqnError::syntax(format!(
                    "Modifier {glyph} is missing its operand"
                )));
            }
            Token::Mod1Name(_) | Token::Mod2Name(_) => {
                return Err(BqnError::Unsupported("User-defined modifiers".into()));
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen, "\")\"")?;
                inner
            }
            Token::LAngle => {
                let items = self.statements(Some(&Token::RAngle))?;
                self.expect(Token::RAngle, "\"⟩\"")?;
                (Expr::List(items), Role::Subject)
            }
            Token::LBrace => {
                self.blocks.push(false);
                let bodies = self.bodies();
                let uses_arguments = self.blocks.pop().unwrap_or(false);
                let bodies = bodies?;
                self.expect(Token::RBrace, "\"}\"")?;
                let (kind, role) = if uses_arguments {
                    (BlockKind::Function, Role::Function)
                } else {
                    (BlockKind::Immediate, Role::Subject)
                };
                (Expr::Block(Rc::new(Block { kind, bodies })), role)
            }
            Token::LBracket => {
                return Err(BqnError::Unsupported("Array notation [ ]".into()));
            }
            other => {
                return Err(BqnError::syntax(format!("Unexpected {}", describe(&other))));
            }
        };
        Ok(parsed)
    }
}

/// Combine a term sequence into one expression.
fn build(mut terms: Vec<(Expr, Role)>) -> Result<(Expr, Role)> {
    let Some((mut result, role)) = terms.pop() else {
        return Err(BqnError::syntax("Empty expression"));
    };
    match role {
        Role::Subject => {
            while let Some((func, func_role)) = terms.pop() {
                if func_role != Role::Function {
                    return Err(BqnError::syntax(
                        "Two subjects side by side; use ‿ or ⟨⟩ to form a list",
                    ));
                }
                let left = match terms.last() {
                    Some((_, Role::Subject)) => terms.pop().map(|(expr, _)| expr),
                    _ => None,
                };
                result = match left {
                    Some(left) => Expr::Dyadic {
                        left: Box::new(left),
                        func: Box::new(func),
                        right: Box::new(result),
                    },
                    None => Expr::Monadic {
                        func: Box::new(func),
                        arg: Box::new(result),
                    },
                };
            }
            Ok((result, Role::Subject))
        }
        Role::Function => {
            while let Some((middle, middle_role)) = terms.pop() {
                if middle_role != Role::Function {
                    return Err(BqnError::syntax(
                        "A subject cannot be the middle of a train",
                    ));
                }
                match terms.pop() {
                    Some((left, _)) => {
                        result = Expr::Fork {
                            left: Box::new(left),
                            middle: Box::new(middle),
                            right: Box::new(result),
                        };
                    }
                    None => {
                        result = Expr::Atop {
                            outer: Box::new(middle),
                            inner: Box::new(result),
                        };
                    }
                }
            }
            Ok((result, Role::Function))
        }
        Role::Mod1 | Role::Mod2 => Err(BqnError::syntax("Modifier used without an operand")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Expr {
        let mut body = parse(source).expect("should parse");
        assert_eq!(body.len(), 1, "expected one statement in {source:?}");
        body.remove(0)
    }

    #[test]
    fn dyadic_application_reads_right_to_left() {
        assert_eq!(
            single("1 + 2 × 3"),
            Expr::Dyadic {
                left: Box::new(Expr::Number(1.0)),
                func: Box::new(Expr::Prim('+')),
                right: Box::new(Expr::Dyadic {
                    left: Box::new(Expr::Number(2.0)),
                    func: Box::new(Expr::Prim('×')),
                    right: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn modifiers_bind_before_application() {
        assert_eq!(
            single("+´ x"),
            Expr::Monadic {
                func: Box::new(Expr::Mod1 {
                    operand: Box::new(Expr::Prim('+')),
                    glyph: '´',
                }),
                arg: Box::new(Expr::Name("x".into())),
            }
        );
    }

    #[test]
    fn trailing_functions_form_a_fork() {
        assert_eq!(
            single("1+↕"),
            Expr::Fork {
                left: Box::new(Expr::Number(1.0)),
                middle: Box::new(Expr::Prim('+')),
                right: Box::new(Expr::Prim('↕')),
            }
        );
    }

    #[test]
    fn even_train_starts_with_atop() {
        let expr = single("-+´÷≠");
        let Expr::Atop { outer, inner } = expr else {
            panic!("expected atop, got {expr:?}");
        };
        assert_eq!(*outer, Expr::Prim('-'));
        assert!(matches!(*inner, Expr::Fork { .. }));
    }

    #[test]
    fn strands_build_lists() {
        assert_eq!(
            single("1‿2‿3"),
            Expr::List(vec![
                Expr::Number(1.0),
                Expr::Number(2.0),
                Expr::Number(3.0)
            ])
        );
    }

    #[test]
    fn blocks_referencing_arguments_are_functions() {
        let Expr::Monadic { func, .. } = single("{𝕩+1} 2") else {
            panic!("expected monadic call");
        };
        let Expr::Block(block) = *func else {
            panic!("expected block");
        };
        assert_eq!(block.kind, BlockKind::Function);
    }

    #[test]
    fn blocks_without_arguments_are_immediate() {
        let Expr::Block(block) = single("{a←3 ⋄ a×a}") else {
            panic!("expected block");
        };
        assert_eq!(block.kind, BlockKind::Immediate);
        assert_eq!(block.bodies[0].statements.len(), 2);
    }

    #[test]
    fn assignment_captures_the_rest_of_the_expression() {
        assert_eq!(
            single("F ← +´"),
            Expr::Assign {
                name: "f".into(),
                change: false,
                value: Box::new(Expr::Mod1 {
                    operand: Box::new(Expr::Prim('+')),
                    glyph: '´',
                }),
            }
        );
    }

    #[test]
    fn juxtaposed_subjects_are_rejected() {
        let err = parse("1 2").unwrap_err();
        assert!(matches!(err, BqnError::Syntax(_)), "got {err:?}");
    }

    #[test]
    fn unclosed_paren_is_reported() {
        let err = parse("(1+2").unwrap_err();
        assert!(err.to_string().contains("\")\""), "got {err}");
    }

    #[test]
    fn role_mismatch_in_assignment_is_rejected() {
        let err = parse("f ← +").unwrap_err();
        assert!(matches!(err, BqnError::Syntax(_)));
    }

    fn block_of(source: &str) -> Rc<Block> {
        match single(source) {
            Expr::Block(block) => block,
            Expr::Monadic { func, .. } => match *func {
                Expr::Block(block) => block,
                other => panic!("expected block, got {other:?}"),
            },
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn guards_and_bodies_split_on_semicolons() {
        let block = block_of("{𝕩<1 ? 0 ; 𝕩 × 𝕊 𝕩-1}");
        assert_eq!(block.kind, BlockKind::Function);
        assert_eq!(block.bodies.len(), 2);
        assert!(matches!(block.bodies[0].statements[0], Expr::Guard(_)));
        assert_eq!(block.bodies[0].statements[1], Expr::Number(0.0));
        assert!(!block.bodies[1].has_guard());
    }

    #[test]
    fn headers_name_the_arguments() {
        let block = block_of("{𝕊 n: n×2 ; a F b‿c: a+b×c}");
        assert_eq!(
            block.bodies[0].header,
            Some(Header {
                name: None,
                left: None,
                right: Some(Pattern::Bind("n".into())),
            })
        );
        assert_eq!(
            block.bodies[1].header,
            Some(Header {
                name: Some("f".into()),
                left: Some(Pattern::Bind("a".into())),
                right: Some(Pattern::List(vec![
                    Pattern::Bind("b".into()),
                    Pattern::Bind("c".into()),
                ])),
            })
        );
    }

    #[test]
    fn colons_inside_nested_blocks_do_not_make_a_header() {
        let block = block_of("{G ← {𝕊 x: x} ⋄ G 𝕩}");
        assert_eq!(block.bodies[0].header, None);
    }

    #[test]
    fn immediate_blocks_may_guard() {
        let Expr::Block(block) = single("{0 ? 1 ; 2}") else {
            panic!("expected block");
        };
        assert_eq!(block.kind, BlockKind::Immediate);
        assert_eq!(block.bodies.len(), 2);
    }

    #[test]
    fn guards_outside_blocks_are_rejected() {
        let err = parse("1 ? 2").unwrap_err();
        assert!(matches!(err, BqnError::Syntax(_)), "got {err:?}");
        assert!(matches!(parse("{;1}"), Err(BqnError::Syntax(_))));
    }
}

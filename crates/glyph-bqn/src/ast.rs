//! Syntax tree produced by the parser.

use std::rc::Rc;

/// Syntactic role of an expression, fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Subject,
    Function,
    Mod1,
    Mod2,
}

/// Special names available inside blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    /// `𝕩` / `𝕏`
    Right,
    /// `𝕨` / `𝕎`
    Left,
    /// `𝕊` / `𝕤`
    This,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Evaluated as soon as it is reached.
    Immediate,
    /// References `𝕩`, `𝕨`, or `𝕊`; evaluated when called.
    Function,
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// `;`-separated cases, tried in order.
    pub bodies: Vec<Body>,
}

impl Block {
    /// Bodies that may run for a call of the given valence, in order.
    ///
    /// Two bodies with no headers or guards split by valence: the first is
    /// monadic, the second dyadic. Otherwise a header restricts its body and
    /// a bare body accepts either.
    pub fn cases(&self, dyadic: bool) -> impl Iterator<Item = &Body> {
        let split = self.bodies.len() == 2
            && self
                .bodies
                .iter()
                .all(|body| body.header.is_none() && !body.has_guard());
        self.bodies
            .iter()
            .enumerate()
            .filter(move |(i, body)| match &body.header {
                _ if split => (*i == 1) == dyadic,
                None => true,
                Some(header) => header.accepts(dyadic),
            })
            .map(|(_, body)| body)
    }
}

#[derive(Debug, PartialEq)]
pub struct Body {
    pub header: Option<Header>,
    /// Statements; an [`Expr::Guard`] ends the body early when it fails.
    pub statements: Vec<Expr>,
}

impl Body {
    pub fn has_guard(&self) -> bool {
        self.statements.iter().any(|s| matches!(s, Expr::Guard(_)))
    }
}

/// `left F right:` at the start of a body.
#[derive(Debug, PartialEq)]
pub struct Header {
    /// Function name bound to the block inside the body, besides `𝕊`.
    pub name: Option<String>,
    pub left: Option<Pattern>,
    pub right: Option<Pattern>,
}

impl Header {
    pub fn accepts(&self, dyadic: bool) -> bool {
        match (&self.left, &self.right) {
            (Some(Pattern::Nothing), _) => !dyadic,
            (Some(_), _) => dyadic,
            (None, Some(_)) => !dyadic,
            (None, None) => true,
        }
    }
}

/// Argument pattern in a header.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `𝕩` or `𝕨`.
    Arg,
    /// `·` on the left: monadic calls only.
    Nothing,
    Bind(String),
    /// Literal the argument must match.
    Constant(Expr),
    /// `a‿b` or `⟨a, b⟩`: a list of exactly this length.
    List(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Char(char),
    Str(String),
    Nothing,
    /// Variable reference by normalized name.
    Name(String),
    Special(Special),
    /// Primitive function glyph.
    Prim(char),
    /// `⟨a, b⟩` or `a‿b`.
    List(Vec<Expr>),
    Block(Rc<Block>),
    Monadic {
        func: Box<Expr>,
        arg: Box<Expr>,
    },
    Dyadic {
        left: Box<Expr>,
        func: Box<Expr>,
        right: Box<Expr>,
    },
    Mod1 {
        operand: Box<Expr>,
        glyph: char,
    },
    Mod2 {
        left: Box<Expr>,
        glyph: char,
        right: Box<Expr>,
    },
    /// Two-train `G H`.
    Atop {
        outer: Box<Expr>,
        inner: Box<Expr>,
    },
    /// Three-train `F G H`; `left` may be a subject.
    Fork {
        left: Box<Expr>,
        middle: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        name: String,
        change: bool,
        value: Box<Expr>,
    },
    /// `cond ?`: continue the body only when `cond` is 1.
    Guard(Box<Expr>),
}

/// Normalize a BQN identifier: case and underscores are not significant.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_of_one_variable_normalize_together() {
        assert_eq!(normalize_name("abc"), "abc");
        assert_eq!(normalize_name("Abc"), "abc");
        assert_eq!(normalize_name("_abc_"), "abc");
    }

    fn body(header: Option<Header>) -> Body {
        Body {
            header,
            statements: vec![Expr::Number(0.0)],
        }
    }

    fn block(bodies: Vec<Body>) -> Block {
        Block {
            kind: BlockKind::Function,
            bodies,
        }
    }

    #[test]
    fn two_bare_bodies_split_by_valence() {
        let b = block(vec![body(None), body(None)]);
        assert_eq!(b.cases(false).count(), 1);
        assert!(std::ptr::eq(b.cases(true).next().unwrap(), &b.bodies[1]));
    }

    #[test]
    fn headers_restrict_valence() {
        let monadic = Header {
            name: None,
            left: None,
            right: Some(Pattern::Arg),
        };
        let dyadic = Header {
            name: None,
            left: Some(Pattern::Arg),
            right: Some(Pattern::Arg),
        };
        let b = block(vec![body(Some(monadic)), body(Some(dyadic)), body(None)]);
        assert_eq!(b.cases(false).count(), 2);
        assert_eq!(b.cases(true).count(), 2);
        assert!(std::ptr::eq(b.cases(true).next().unwrap(), &b.bodies[1]));
    }
}

//! Tree-walking evaluator.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{Block, BlockKind, Body, Expr, Pattern, Special};
use crate::error::{BqnError, Result};
use crate::primitives;
use crate::value::{Array, Env, Func, Scope, Value, check_size};

/// Maximum nesting of block calls.
pub const MAX_DEPTH: usize = 1000;

/// Maximum evaluation steps for one program.
pub const MAX_STEPS: u64 = 20_000_000;

const MOD1: &str = "˙˜˘¨⌜´˝`";
const MOD2: &str = "∘○⊸⟜⌾⊘⎉⍟";

const RIGHT: &str = "𝕩";
const LEFT: &str = "𝕨";
const THIS: &str = "𝕊";

/// Evaluation state for one program run.
///
/// Block functions hold their defining scope, and a scope can hold the
/// block, so every captured scope is recorded and emptied on drop.
pub struct Interpreter {
    depth: usize,
    steps: u64,
    max_steps: u64,
    captured: Vec<Env>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        for env in self.captured.drain(..) {
            if let Ok(mut scope) = env.try_borrow_mut() {
                scope.vars.clear();
            }
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_step_limit(MAX_STEPS)
    }

    pub fn with_step_limit(max_steps: u64) -> Self {
        Self {
            depth: 0,
            steps: 0,
            max_steps,
            captured: Vec::new(),
        }
    }

    /// Evaluate statements in order, returning the last value.
    pub fn run(&mut self, body: &[Expr], env: &Env) -> Result<Value> {
        let mut last = Value::Nothing;
        for statement in body {
            last = self.eval(statement, env)?;
        }
        Ok(last)
    }

    /// Run one body; `None` when a guard sends control to the next body.
    fn run_body(&mut self, body: &Body, env: &Env) -> Result<Option<Value>> {
        let mut last = Value::Nothing;
        for statement in &body.statements {
            match statement {
                Expr::Guard(condition) => {
                    let verdict = self.eval(condition, env)?;
                    match verdict.as_number('?') {
                        Ok(n) if n == 1.0 => {}
                        Ok(n) if n == 0.0 => return Ok(None),
                        _ => return Err(BqnError::domain('?', "Guard must be 0 or 1")),
                    }
                }
                statement => last = self.eval(statement, env)?,
            }
        }
        Ok(Some(last))
    }

    /// Bind `value` against a header pattern; `false` when it does not match.
    fn bind(&mut self, pattern: &Pattern, value: &Value, env: &Env) -> Result<bool> {
        match pattern {
            Pattern::Arg | Pattern::Nothing => Ok(true),
            Pattern::Bind(name) => {
                Scope::define(env, name, value.clone())?;
                Ok(true)
            }
            Pattern::Constant(expr) => Ok(self.eval(expr, env)?.matches(value)),
            Pattern::List(items) => {
                let Some(a) = value.as_array().filter(|a| a.rank() == 1) else {
                    return Ok(false);
                };
                if a.data.len() != items.len() {
                    return Ok(false);
                }
                for (item, element) in items.iter().zip(&a.data) {
                    if !self.bind(item, element, env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(BqnError::StepLimit);
        }
        Ok(())
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        self.tick()?;
        match expr {
            Expr::Number(n) => Ok(Value::Num(*n)),
            Expr::Char(c) => Ok(Value::Char(*c)),
            Expr::Str(s) => Value::checked_list(s.chars().map(Value::Char).collect()),
            Expr::Nothing => Ok(Value::Nothing),
            Expr::Name(name) => {
                Scope::lookup(env, name).ok_or_else(|| BqnError::Undefined(name.clone()))
            }
            Expr::Special(special) => {
                let key = match special {
                    Special::Right => RIGHT,
                    Special::Left => LEFT,
                    Special::This => THIS,
                };
                Scope::lookup(env, key).ok_or_else(|| BqnError::Undefined(key.to_owned()))
            }
            Expr::Prim(glyph) => {
                if !primitives::is_supported(*glyph) {
                    return Err(BqnError::Unsupported(format!("Primitive {glyph}")));
                }
                Ok(func(Func::Prim(*glyph)))
            }
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<Result<Vec<_>>>()?;
                Value::checked_list(values)
            }
            Expr::Block(block) => self.block(block, env),
            Expr::Monadic { func: f, arg } => {
                let x = self.eval(arg, env)?;
                let f = self.eval(f, env)?;
                self.call(&f, None, x)
            }
            Expr::Dyadic {
                left,
                func: f,
                right,
            } => {
                let x = self.eval(right, env)?;
                let f = self.eval(f, env)?;
                let w = self.eval(left, env)?;
                self.call(&f, Some(w), x)
            }
            Expr::Mod1 { operand, glyph } => {
                if !MOD1.contains(*glyph) {
                    return Err(BqnError::Unsupported(format!("Modifier {glyph}")));
                }
                let operand = self.eval(operand, env)?;
                Ok(func(Func::Mod1 {
                    glyph: *glyph,
                    operand,
                }))
            }
            Expr::Mod2 { left, glyph, right } => {
                if !MOD2.contains(*glyph) {
                    return Err(BqnError::Unsupported(format!("Modifier {glyph}")));
                }
                let right = self.eval(right, env)?;
                let left = self.eval(left, env)?;
                Ok(func(Func::Mod2 {
                    glyph: *glyph,
                    left,
                    right,
                }))
            }
            Expr::Atop { outer, inner } => {
                let inner = self.eval(inner, env)?;
                let outer = self.eval(outer, env)?;
                Ok(func(Func::Atop { outer, inner }))
            }
            Expr::Fork {
                left,
                middle,
                right,
            } => {
                let right = self.eval(right, env)?;
                let middle = self.eval(middle, env)?;
                let left = self.eval(left, env)?;
                Ok(func(Func::Fork {
                    left,
                    middle,
                    right,
                }))
            }
            Expr::Assign {
                name,
                change,
                value,
            } => {
                let value = self.eval(value, env)?;
                if *change {
                    Scope::change(env, name, value.clone())?;
                } else {
                    Scope::define(env, name, value.clone())?;
                }
                Ok(value)
            }
            Expr::Guard(_) => Err(BqnError::syntax("? outside a block body")),
        }
    }

    fn block(&mut self, block: &Rc<Block>, env: &Env) -> Result<Value> {
        match block.kind {
            BlockKind::Immediate => {
                for body in &block.bodies {
                    let scope = Scope::child(env);
                    if let Some(value) = self.run_body(body, &scope)? {
                        return Ok(value);
                    }
                }
                Err(BqnError::NoMatchingBody)
            }
            BlockKind::Function => {
                self.captured.push(Rc::clone(env));
                Ok(func(Func::Block {
                    block: Rc::clone(block),
                    env: Rc::clone(env),
                }))
            }
        }
    }

    /// Call `f`; a non-function value returns itself.
    pub fn call(&mut self, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let w = w.filter(|w| !matches!(w, Value::Nothing));
        match f {
            Value::Func(function) => self.call_func(function, w, x),
            data => Ok(data.clone()),
        }
    }

    fn call_func(&mut self, function: &Rc<Func>, w: Option<Value>, x: Value) -> Result<Value> {
        self.tick()?;
        match &**function {
            Func::Prim(glyph) => match w {
                Some(w) => primitives::dyadic(*glyph, &w, &x),
                None => primitives::monadic(*glyph, &x),
            },
            Func::Block { block, env } => {
                if self.depth >= MAX_DEPTH {
                    return Err(BqnError::DepthExceeded(MAX_DEPTH));
                }
                self.depth += 1;
                let result = self.call_block(function, block, env, w, x);
                self.depth -= 1;
                result
            }
            Func::Mod1 { glyph, operand } => self.mod1(*glyph, operand, w, x),
            Func::Mod2 { glyph, left, right } => self.mod2(*glyph, left, right, w, x),
            Func::Atop { outer, inner } => {
                let inner = self.call(inner, w, x)?;
                self.call(outer, None, inner)
            }
            Func::Fork {
                left,
                middle,
                right,
            } => {
                let r = self.call(right, w.clone(), x.clone())?;
                let l = match left {
                    Value::Nothing => None,
                    left => Some(self.call(left, w, x)?),
                };
                self.call(middle, l, r)
            }
        }
    }

    /// Try each body that accepts this valence until one returns a value.
    fn call_block(
        &mut self,
        function: &Rc<Func>,
        block: &Block,
        env: &Env,
        w: Option<Value>,
        x: Value,
    ) -> Result<Value> {
        for body in block.cases(w.is_some()) {
            let scope = Scope::child(env);
            {
                let mut vars = scope.borrow_mut();
                vars.vars.insert(RIGHT.to_owned(), x.clone());
                vars.vars.insert(LEFT.to_owned(), w.clone().unwrap_or(Value::Nothing));
                vars.vars.insert(THIS.to_owned(), Value::Func(Rc::clone(function)));
            }
            if let Some(header) = &body.header {
                if let Some(name) = &header.name {
                    Scope::define(&scope, name, Value::Func(Rc::clone(function)))?;
                }
                if let Some(pattern) = &header.right {
                    if !self.bind(pattern, &x, &scope)? {
                        continue;
                    }
                }
                if let (Some(pattern), Some(w)) = (&header.left, &w) {
                    if !self.bind(pattern, w, &scope)? {
                        continue;
                    }
                }
            }
            if let Some(value) = self.run_body(body, &scope)? {
                return Ok(value);
            }
        }
        Err(BqnError::NoMatchingBody)
    }

    // -----------------------------------------------------------------------
    // 1-modifiers
    // -----------------------------------------------------------------------

    fn mod1(&mut self, glyph: char, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        trace!(%glyph, "1-modifier call");
        match glyph {
            '˙' => Ok(f.clone()),
            '˜' => match w {
                Some(w) => self.call(f, Some(x), w),
                None => self.call(f, Some(x.clone()), x),
            },
            '˘' => {
                if w.as_ref().map_or(true, |w| w.rank() == 0) && x.rank() == 0 {
                    return Err(BqnError::rank(glyph, "An argument must have rank at least 1"));
                }
                self.ranked(f, w.map(|w| (w, -1)), (x, -1))
            }
            '¨' => self.each(f, w, x),
            '⌜' => match w {
                Some(w) => self.table(f, w, x),
                None => self.each(f, None, x),
            },
            '´' => self.fold(f, w, x),
            '˝' => self.insert(f, w, x),
            '`' => self.scan(f, w, x),
            _ => Err(BqnError::Unsupported(format!("Modifier {glyph}"))),
        }
    }

    fn each(&mut self, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let Some(w) = w else {
            return match &x {
                Value::Array(a) => {
                    let data = a
                        .data
                        .iter()
                        .map(|v| self.call(f, None, v.clone()))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Array::value(a.shape.clone(), data))
                }
                atom => Ok(Value::unit(self.call(f, None, atom.clone())?)),
            };
        };
        let (shape, pairs) = pair_up(&w, &x)?;
        let data = pairs
            .into_iter()
            .map(|(p, q)| self.call(f, Some(p), q))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array::value(shape, data))
    }

    fn table(&mut self, f: &Value, w: Value, x: Value) -> Result<Value> {
        let mut shape = w.shape();
        shape.extend(x.shape());
        let (lefts, rights) = (w.ravel(), x.ravel());
        check_size(lefts.len().saturating_mul(rights.len()))?;
        let mut data = Vec::with_capacity(lefts.len() * rights.len());
        for p in &lefts {
            for q in &rights {
                data.push(self.call(f, Some(p.clone()), q.clone())?);
            }
        }
        Ok(Array::value(shape, data))
    }

    fn fold(&mut self, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let items = match x.as_array() {
            Some(a) if a.rank() == 1 => a.data.clone(),
            _ => return Err(BqnError::rank('´', "𝕩 must be a list")),
        };
        self.reduce(f, w, items, '´')
    }

    fn insert(&mut self, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let cells = match x.as_array() {
            Some(a) if a.rank() > 0 => a.cells(),
            _ => return Err(BqnError::rank('˝', "𝕩 must have rank at least 1")),
        };
        self.reduce(f, w, cells, '˝')
    }

    /// Right-to-left reduction shared by `´` and `˝`.
    fn reduce(&mut self, f: &Value, w: Option<Value>, items: Vec<Value>, glyph: char) -> Result<Value> {
        let mut items = items.into_iter().rev();
        let mut acc = match w {
            Some(initial) => initial,
            None => match items.next() {
                Some(last) => last,
                None => return identity(f, glyph),
            },
        };
        for item in items {
            acc = self.call(f, Some(item), acc)?;
        }
        Ok(acc)
    }

    fn scan(&mut self, f: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let cells = match x.as_array() {
            Some(a) if a.rank() > 0 => a.cells(),
            _ => return Err(BqnError::rank('`', "𝕩 must have rank at least 1")),
        };
        if cells.is_empty() {
            return Ok(x);
        }
        let mut out: Vec<Value> = Vec::with_capacity(cells.len());
        for cell in cells {
            let next = match (out.last(), &w) {
                (Some(prev), _) => self.call(f, Some(prev.clone()), cell)?,
                (None, Some(initial)) => self.call(f, Some(initial.clone()), cell)?,
                (None, None) => cell,
            };
            out.push(next);
        }
        Value::from_cells('`', out)
    }

    // -----------------------------------------------------------------------
    // 2-modifiers
    // -----------------------------------------------------------------------

    fn mod2(
        &mut self,
        glyph: char,
        f: &Value,
        g: &Value,
        w: Option<Value>,
        x: Value,
    ) -> Result<Value> {
        trace!(%glyph, "2-modifier call");
        match glyph {
            '∘' => {
                let inner = self.call(g, w, x)?;
                self.call(f, None, inner)
            }
            '○' => {
                let right = self.call(g, None, x)?;
                let left = match w {
                    Some(w) => Some(self.call(g, None, w)?),
                    None => None,
                };
                self.call(f, left, right)
            }
            '⊸' => {
                let left = self.call(f, None, w.unwrap_or_else(|| x.clone()))?;
                self.call(g, Some(left), x)
            }
            '⟜' => {
                let right = self.call(g, None, x.clone())?;
                self.call(f, Some(w.unwrap_or(x)), right)
            }
            '⊘' => match w {
                Some(w) => self.call(g, Some(w), x),
                None => self.call(f, None, x),
            },
            '⎉' => {
                let ranks = self.call(g, w.clone(), x.clone())?.as_int_list(glyph)?;
                let (monadic, left, right) = match ranks.as_slice() {
                    [k] => (*k, *k, *k),
                    [l, r] => (*r, *l, *r),
                    [m, l, r] => (*m, *l, *r),
                    _ => return Err(BqnError::length(glyph, "𝕘 must have 1 to 3 elements")),
                };
                match w {
                    Some(w) => self.ranked(f, Some((w, left)), (x, right)),
                    None => self.ranked(f, None, (x, monadic)),
                }
            }
            '⍟' => self.repeat(f, g, w, x),
            '⌾' => self.under(f, g, w, x),
            _ => Err(BqnError::Unsupported(format!("Modifier {glyph}"))),
        }
    }

    /// Apply `f` to cells of the given ranks, negative ranks counting down
    /// from the argument's rank. Frames must agree on their shared prefix;
    /// the result takes the longer frame.
    fn ranked(&mut self, f: &Value, w: Option<(Value, i64)>, x: (Value, i64)) -> Result<Value> {
        let (x_frame, x_cells) = split_cells(&x.0, x.1);
        let Some((w, w_rank)) = w else {
            let results = x_cells
                .into_iter()
                .map(|cell| self.call(f, None, cell))
                .collect::<Result<Vec<_>>>()?;
            return merge_cells(x_frame, results);
        };
        let (w_frame, w_cells) = split_cells(&w, w_rank);
        let shared = w_frame.len().min(x_frame.len());
        if w_frame[..shared] != x_frame[..shared] {
            return Err(BqnError::length(
                '⎉',
                format!("Frames {w_frame:?} and {x_frame:?} must have matching prefixes"),
            ));
        }
        let frame = if w_frame.len() > x_frame.len() { w_frame } else { x_frame };
        let count: usize = frame.iter().product();
        let mut results = Vec::with_capacity(count);
        if count > 0 {
            let (w_run, x_run) = (count / w_cells.len(), count / x_cells.len());
            for i in 0..count {
                let pair = (w_cells[i / w_run].clone(), x_cells[i / x_run].clone());
                results.push(self.call(f, Some(pair.0), pair.1)?);
            }
        }
        merge_cells(frame, results)
    }

    fn repeat(&mut self, f: &Value, g: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        let counts = self.call(g, w.clone(), x.clone())?;
        let wanted = match &counts {
            Value::Array(a) => a
                .data
                .iter()
                .map(|v| v.as_int('⍟'))
                .collect::<Result<Vec<_>>>()?,
            atom => vec![atom.as_int('⍟')?],
        };
        if wanted.iter().any(|&n| n < 0) {
            return Err(BqnError::Unsupported("⍟ with a negative count".into()));
        }
        let most = wanted.iter().copied().max().unwrap_or(0) as usize;
        let Value::Array(count_array) = &counts else {
            let mut current = x;
            for _ in 0..most {
                current = self.call(f, w.clone(), current)?;
            }
            return Ok(current);
        };
        let mut history = vec![x];
        for n in 0..most {
            let next = self.call(f, w.clone(), history[n].clone())?;
            history.push(next);
        }
        let data = wanted.iter().map(|&n| history[n as usize].clone()).collect();
        Ok(Array::value(count_array.shape.clone(), data))
    }

    /// `𝔽⌾𝔾`: undo `g` after applying `f`. Arithmetic `g` is inverted
    /// directly; otherwise `g` must only move or select parts of `x`.
    fn under(&mut self, f: &Value, g: &Value, w: Option<Value>, x: Value) -> Result<Value> {
        if let Some(inverse) = arithmetic_inverse(g) {
            let gx = self.call(g, None, x)?;
            let gw = match w {
                Some(w) => Some(self.call(g, None, w)?),
                None => None,
            };
            let fx = self.call(f, gw, gx)?;
            return self.call(&inverse, None, fx);
        }

        let mut leaves = Vec::new();
        let positions = number_leaves(&x, &mut leaves);
        let selected = self.call(g, None, positions.clone())?;
        let gx = self.call(g, None, x)?;
        let gw = match w {
            Some(w) => Some(self.call(g, None, w)?),
            None => None,
        };
        let fx = self.call(f, gw, gx)?;
        let mut replacements = Replacements::default();
        replacements.collect(&positions, leaves.len(), &selected, &fx)?;
        let result = replacements.apply(&positions, &leaves);
        if !self.call(g, None, result.clone())?.matches(&fx) {
            return Err(BqnError::domain('⌾', "𝔾 must be structural or simple arithmetic"));
        }
        Ok(result)
    }
}

/// Split `v` into cells of rank `k`, returning the frame shape and the cells.
fn split_cells(v: &Value, k: i64) -> (Vec<usize>, Vec<Value>) {
    let shape = v.shape();
    let rank = shape.len() as i64;
    let cell_rank = (if k >= 0 { k.min(rank) } else { (rank + k).max(0) }) as usize;
    let frame_len = shape.len() - cell_rank;
    if frame_len == 0 {
        return (Vec::new(), vec![v.clone()]);
    }
    let frame = shape[..frame_len].to_vec();
    let cell_shape = shape[frame_len..].to_vec();
    let size: usize = cell_shape.iter().product();
    let count: usize = frame.iter().product();
    let data = v.ravel();
    let cells = (0..count)
        .map(|i| Array::value(cell_shape.clone(), data[i * size..(i + 1) * size].to_vec()))
        .collect();
    (frame, cells)
}

/// Join per-cell results under `frame`; results must share a shape.
fn merge_cells(frame: Vec<usize>, results: Vec<Value>) -> Result<Value> {
    if frame.is_empty() {
        return Ok(results.into_iter().next().unwrap_or(Value::Nothing));
    }
    let Some(first) = results.first() else {
        return Ok(Array::value(frame, Vec::new()));
    };
    let cell_shape = first.shape();
    let mut data = Vec::new();
    for result in &results {
        if result.shape() != cell_shape {
            return Err(BqnError::rank('⎉', "Result cells must have matching shapes"));
        }
        data.extend(result.ravel());
    }
    check_size(data.len())?;
    let mut shape = frame;
    shape.extend(cell_shape);
    Ok(Array::value(shape, data))
}

/// Inverse of `-`, `¬`, `÷`, or a bound `+ - × ÷`, as a callable value.
fn arithmetic_inverse(g: &Value) -> Option<Value> {
    let Value::Func(function) = g else {
        return None;
    };
    let prim = |v: &Value| match v {
        Value::Func(f) => match &**f {
            Func::Prim(glyph) => Some(*glyph),
            _ => None,
        },
        _ => None,
    };
    let bind_right = |glyph: char, k: &Value| {
        func(Func::Mod2 {
            glyph: '⟜',
            left: func(Func::Prim(glyph)),
            right: k.clone(),
        })
    };
    match &**function {
        Func::Prim('-' | '¬' | '÷') => Some(g.clone()),
        Func::Mod2 {
            glyph: '⊸',
            left,
            right,
        } if !matches!(left, Value::Func(_)) => match prim(right)? {
            '+' => Some(bind_right('-', left)),
            '×' => Some(bind_right('÷', left)),
            '-' | '÷' => Some(g.clone()),
            _ => None,
        },
        Func::Mod2 {
            glyph: '⟜',
            left,
            right,
        } if !matches!(right, Value::Func(_)) => match prim(left)? {
            '+' => Some(bind_right('-', right)),
            '-' => Some(bind_right('+', right)),
            '×' => Some(bind_right('÷', right)),
            '÷' => Some(bind_right('×', right)),
            _ => None,
        },
        _ => None,
    }
}

/// Copy of `v` with every non-array leaf replaced by its 1-based position
/// in `leaves`.
fn number_leaves(v: &Value, leaves: &mut Vec<Value>) -> Value {
    match v {
        Value::Array(a) => {
            let data = a.data.iter().map(|e| number_leaves(e, leaves)).collect();
            Array::value(a.shape.clone(), data)
        }
        leaf => {
            leaves.push(leaf.clone());
            Value::Num(leaves.len() as f64)
        }
    }
}

fn contains_subtree(tree: &Value, part: &Value) -> bool {
    tree.matches(part)
        || tree
            .as_array()
            .is_some_and(|a| a.data.iter().any(|e| contains_subtree(e, part)))
}

/// New values for the parts of a numbered tree that `𝔾` selected.
#[derive(Default)]
struct Replacements {
    leaves: HashMap<usize, Value>,
    subtrees: Vec<(Value, Value)>,
}

impl Replacements {
    /// Pair each part `selected` from `positions` with its counterpart in `new`.
    fn collect(&mut self, positions: &Value, leaf_count: usize, selected: &Value, new: &Value) -> Result<()> {
        match selected {
            Value::Num(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= leaf_count as f64 => {
                self.leaves.insert(*n as usize, new.clone());
                Ok(())
            }
            Value::Array(_) if contains_subtree(positions, selected) => {
                self.subtrees.push((selected.clone(), new.clone()));
                Ok(())
            }
            Value::Array(s) => match new.as_array() {
                Some(n) if n.shape == s.shape => {
                    for (p, q) in s.data.iter().zip(&n.data) {
                        self.collect(positions, leaf_count, p, q)?;
                    }
                    Ok(())
                }
                _ => Err(BqnError::length('⌾', "𝔽 must keep the shape of 𝔾 𝕩")),
            },
            _ => Err(BqnError::domain('⌾', "𝔾 must be structural or simple arithmetic")),
        }
    }

    fn apply(&self, positions: &Value, leaves: &[Value]) -> Value {
        if let Some((_, new)) = self.subtrees.iter().rev().find(|(part, _)| part.matches(positions)) {
            return new.clone();
        }
        match positions {
            Value::Array(a) => {
                let data = a.data.iter().map(|e| self.apply(e, leaves)).collect();
                Array::value(a.shape.clone(), data)
            }
            Value::Num(n) => {
                let index = *n as usize;
                match self.leaves.get(&index) {
                    Some(new) => new.clone(),
                    None => leaves[index - 1].clone(),
                }
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval(source: &str) -> Result<Value> {
        let program = parse(source)?;
        let mut interpreter = Interpreter::new();
        interpreter.run(&program, &Scope::root())
    }

    fn nums(ns: &[f64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Num(*n)).collect())
    }

    fn assert_eval(source: &str, expected: Value) {
        let actual = eval(source).unwrap_or_else(|e| panic!("{source}: {e}"));
        assert!(
            actual.matches(&expected),
            "{source}: expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn block_with_right_argument() {
        assert_eval("{1+↕ 𝕩} 3", nums(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn dyadic_block() {
        assert_eval("2 {𝕨 ⌽ 𝕩} 1‿2‿3‿4‿5", nums(&[3.0, 4.0, 5.0, 1.0, 2.0]));
    }

    #[test]
    fn fork_with_subject_left_tine() {
        assert_eval("(1+↕) 3", nums(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn average_train() {
        assert_eval("(+´÷≠) 1‿2‿3‿4", Value::Num(2.5));
    }

    #[test]
    fn fold_and_scan() {
        assert_eval("+´ 1‿2‿3", Value::Num(6.0));
        assert_eval("-´ 1‿2‿3", Value::Num(2.0));
        assert_eval("+` 1‿2‿3", nums(&[1.0, 3.0, 6.0]));
        assert_eval("+´ ⟨⟩", Value::Num(0.0));
        assert_eval("10 +´ 1‿2", Value::Num(13.0));
    }

    #[test]
    fn each_and_table() {
        assert_eval("-¨ 1‿2", nums(&[-1.0, -2.0]));
        let table = eval("1‿2 ×⌜ 1‿2‿3").unwrap();
        assert_eq!(table.shape(), vec![2, 3]);
    }

    #[test]
    fn swap_and_self() {
        assert_eval("2 -˜ 5", Value::Num(3.0));
        assert_eval("×˜ 4", Value::Num(16.0));
    }

    #[test]
    fn composition_modifiers() {
        assert_eval("-∘+ 3", Value::Num(-3.0));
        assert_eval("2 ×⟜- 3", Value::Num(-6.0));
        assert_eval("2 -⊸× 3", Value::Num(-6.0));
        assert_eval("3 ⌊○| ¯5", Value::Num(3.0));
        assert_eval("-⊘× 4", Value::Num(-4.0));
        assert_eval("2 -⊘× 4", Value::Num(8.0));
    }

    #[test]
    fn assignment_and_modification() {
        assert_eval("a ← 3 ⋄ a ↩ a + 1 ⋄ a × 2", Value::Num(8.0));
        assert_eval("F ← {𝕩×2} ⋄ F 4", Value::Num(8.0));
    }

    #[test]
    fn nested_blocks_close_over_their_scope() {
        assert_eval("{F ← {𝕩+1} ⋄ F F 𝕩} 2", Value::Num(4.0));
        assert_eval("k ← 10 ⋄ {𝕩+k}¨ 1‿2", nums(&[11.0, 12.0]));
    }

    #[test]
    fn undefined_name() {
        assert_eq!(eval("q + 1").unwrap_err(), BqnError::Undefined("q".into()));
    }

    #[test]
    fn redefinition_is_an_error() {
        assert_eq!(
            eval("a ← 1 ⋄ a ← 2").unwrap_err(),
            BqnError::Redefinition("a".into())
        );
    }

    fn assert_same(source: &str, expected: &str) {
        let expected = eval(expected).unwrap_or_else(|e| panic!("{expected}: {e}"));
        assert_eval(source, expected);
    }

    #[test]
    fn unsupported_primitive() {
        assert!(matches!(eval("1‿2 ⍋ 3"), Err(BqnError::Unsupported(_))));
        assert!(matches!(eval("-⁼ 1"), Err(BqnError::Unsupported(_))));
    }

    #[test]
    fn guards_fall_through_to_the_next_body() {
        assert_eval("{𝕩<1 ? 0 ; 𝕩 + 𝕊 𝕩-1} 30", Value::Num(465.0));
        assert_eval("{𝕩<2 ? 𝕩 ; (𝕊 𝕩-1)+𝕊 𝕩-2} 10", Value::Num(55.0));
        assert_eval("{0 ? 1 ; 2}", Value::Num(2.0));
    }

    #[test]
    fn guards_must_be_boolean() {
        assert!(matches!(
            eval("{𝕩 ? 1 ; 0} 2"),
            Err(BqnError::Domain { glyph: '?', .. })
        ));
    }

    #[test]
    fn two_bare_bodies_split_monadic_and_dyadic() {
        assert_eval("{-𝕩 ; 𝕨-𝕩} 3", Value::Num(-3.0));
        assert_eval("5 {-𝕩 ; 𝕨-𝕩} 3", Value::Num(2.0));
    }

    #[test]
    fn headers_bind_and_match_arguments() {
        assert_eval("{𝕊 0: 1 ; 𝕊 n: n × 𝕊 n-1} 5", Value::Num(120.0));
        assert_eval("{𝕊 a‿b: a×b} 3‿4", Value::Num(12.0));
        assert_eval("2 {a 𝕊 b: a⋆b} 3", Value::Num(8.0));
        assert_eval("{Fact n: n=0 ? 1 ; Fact n: n × Fact n-1} 4", Value::Num(24.0));
    }

    #[test]
    fn headers_select_by_valence() {
        assert_eval("{𝕊𝕩: 𝕩 ; 𝕨𝕊𝕩: 𝕨} 1", Value::Num(1.0));
        assert_eval("2 {𝕊𝕩: 𝕩 ; 𝕨𝕊𝕩: 𝕨} 1", Value::Num(2.0));
    }

    #[test]
    fn no_matching_body() {
        assert_eq!(eval("{𝕊 0: 1} 2").unwrap_err(), BqnError::NoMatchingBody);
        assert_eq!(eval("{𝕊 a‿b: a} 1‿2‿3").unwrap_err(), BqnError::NoMatchingBody);
    }

    #[test]
    fn cells_apply_to_major_cells() {
        assert_same("⌽˘ 2‿3⥊↕6", "2‿3⥊2‿1‿0‿5‿4‿3");
        assert_eval("+´˘ 2‿3⥊↕6", nums(&[3.0, 12.0]));
        assert_same("1‿2 ⌽˘ 2‿3⥊↕6", "2‿3⥊1‿2‿0‿5‿3‿4");
        assert!(matches!(eval("⌽˘ 1"), Err(BqnError::Rank { glyph: '˘', .. })));
    }

    #[test]
    fn rank_chooses_cell_rank() {
        assert_same("⌽⎉1 2‿3⥊↕6", "⌽˘ 2‿3⥊↕6");
        assert_eval("(+´⎉1) 2‿3⥊↕6", nums(&[3.0, 12.0]));
        assert_same("10‿20 +⎉0‿1 2‿2⥊↕4", "2‿2⥊10‿11‿22‿23");
        assert_eval("⊢⎉0 1‿2", nums(&[1.0, 2.0]));
    }

    #[test]
    fn repeat_applies_a_counted_number_of_times() {
        assert_eval("{𝕩×2}⍟3 1", Value::Num(8.0));
        assert_eval("2 +⍟3 0", Value::Num(6.0));
        assert_eval("{𝕩×2}⍟(↕4) 1", nums(&[1.0, 2.0, 4.0, 8.0]));
        assert_eval("-⍟0 5", Value::Num(5.0));
        assert!(matches!(eval("-⍟¯1 3"), Err(BqnError::Unsupported(_))));
    }

    #[test]
    fn under_structural_functions() {
        assert_eval("-⌾⊑ 1‿2‿3", nums(&[-1.0, 2.0, 3.0]));
        assert_eval("⌽⌾(2⊸↑) 1‿2‿3‿4", nums(&[2.0, 1.0, 3.0, 4.0]));
        assert_eval("1⊸+⌾(1⊸⊑) 5‿6‿7", nums(&[5.0, 7.0, 7.0]));
        assert_same("10⊸+⌾(⊑⊑) ⟨⟨1,2⟩,3⟩", "⟨⟨11,2⟩,3⟩");
        assert_same("1⊸↓⌾⊑ ⟨1‿2‿3, 4⟩", "⟨2‿3, 4⟩");
    }

    #[test]
    fn under_arithmetic_functions() {
        assert_eval("×˜⌾(3⊸+) 1", Value::Num(13.0));
        assert_eval("+⟜1⌾- 4", Value::Num(3.0));
        assert!(matches!(
            eval("-⌾(2⊸⋆) 1‿2"),
            Err(BqnError::Domain { glyph: '⌾', .. })
        ));
    }

    #[test]
    fn transpose_and_group_are_available() {
        assert_eq!(eval("⍉ 2‿3⥊↕6").unwrap().shape(), vec![3, 2]);
        assert_same("⊔ 0‿1‿0‿2", "⟨0‿2, ⟨1⟩, ⟨3⟩⟩");
        assert_eval("⊒ 1‿1‿2‿1", nums(&[0.0, 1.0, 0.0, 2.0]));
    }

    #[test]
    fn oversized_ranges_are_refused() {
        assert_eq!(eval("↕1e9").unwrap_err(), BqnError::TooLarge(1_000_000_000));
    }

    #[test]
    fn fan_out_recursion_hits_the_step_limit() {
        let program = parse("{𝕩=0 ? 0 ; (𝕊 𝕩-1)+𝕊 𝕩-1} 20").unwrap();
        let mut interpreter = Interpreter::with_step_limit(100_000);
        assert_eq!(
            interpreter.run(&program, &Scope::root()).unwrap_err(),
            BqnError::StepLimit
        );
    }
}

//! Runtime values.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Block;
use crate::error::{BqnError, Result};

/// Largest array the engine will allocate.
pub const MAX_ELEMENTS: usize = 4_000_000;

#[derive(Clone)]
pub enum Value {
    Num(f64),
    Char(char),
    Array(Rc<Array>),
    Func(Rc<Func>),
    /// `·`, also the left argument of a monadic block call.
    Nothing,
}

/// A multidimensional array in row-major order.
#[derive(Debug)]
pub struct Array {
    pub shape: Vec<usize>,
    pub data: Vec<Value>,
}

pub type Env = Rc<RefCell<Scope>>;

#[derive(Default)]
pub struct Scope {
    pub vars: HashMap<String, Value>,
    pub parent: Option<Env>,
}

impl Scope {
    pub fn root() -> Env {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn lookup(env: &Env, name: &str) -> Option<Value> {
        let scope = env.borrow();
        match scope.vars.get(name) {
            Some(value) => Some(value.clone()),
            None => scope.parent.as_ref().and_then(|p| Scope::lookup(p, name)),
        }
    }

    pub fn define(env: &Env, name: &str, value: Value) -> Result<()> {
        let mut scope = env.borrow_mut();
        if scope.vars.contains_key(name) {
            return Err(BqnError::Redefinition(name.to_owned()));
        }
        scope.vars.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn change(env: &Env, name: &str, value: Value) -> Result<()> {
        let mut scope = env.borrow_mut();
        if let Some(slot) = scope.vars.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        let parent = scope.parent.clone();
        drop(scope);
        match parent {
            Some(parent) => Scope::change(&parent, name, value),
            None => Err(BqnError::Undefined(name.to_owned())),
        }
    }
}

/// Function values: primitives, blocks, and everything derived from them.
pub enum Func {
    Prim(char),
    Block { block: Rc<Block>, env: Env },
    Mod1 { glyph: char, operand: Value },
    Mod2 { glyph: char, left: Value, right: Value },
    Atop { outer: Value, inner: Value },
    Fork { left: Value, middle: Value, right: Value },
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Func::Prim(glyph) => write!(f, "{glyph}"),
            Func::Block { .. } => write!(f, "{{block}}"),
            Func::Mod1 { glyph, operand } => write!(f, "{operand:?}{glyph}"),
            Func::Mod2 { glyph, left, right } => write!(f, "{left:?}{glyph}{right:?}"),
            Func::Atop { outer, inner } => write!(f, "({outer:?} {inner:?})"),
            Func::Fork {
                left,
                middle,
                right,
            } => write!(f, "({left:?} {middle:?} {right:?})"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Array(a) => write!(f, "{:?}{:?}", a.shape, a.data),
            Value::Func(func) => write!(f, "{func:?}"),
            Value::Nothing => write!(f, "·"),
        }
    }
}

pub(crate) fn check_size(len: usize) -> Result<()> {
    if len > MAX_ELEMENTS {
        return Err(BqnError::TooLarge(len));
    }
    Ok(())
}

impl Array {
    /// Build an array value; `data.len()` must equal the shape's product.
    pub fn value(shape: Vec<usize>, data: Vec<Value>) -> Value {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Value::Array(Rc::new(Array { shape, data }))
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of major cells.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape of one major cell.
    pub fn cell_shape(&self) -> &[usize] {
        if self.shape.is_empty() {
            &[]
        } else {
            &self.shape[1..]
        }
    }

    pub fn cell_size(&self) -> usize {
        self.cell_shape().iter().product()
    }

    /// Ravel slices of the major cells.
    pub fn cell_slices(&self) -> Vec<&[Value]> {
        let size = self.cell_size();
        if size == 0 {
            return (0..self.len()).map(|_| &self.data[..0]).collect();
        }
        self.data.chunks(size).collect()
    }

    /// Major cells as values (rank-0 arrays for a list).
    pub fn cells(&self) -> Vec<Value> {
        let shape = self.cell_shape().to_vec();
        self.cell_slices()
            .into_iter()
            .map(|slice| Array::value(shape.clone(), slice.to_vec()))
            .collect()
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Array::value(vec![items.len()], items)
    }

    pub fn checked_list(items: Vec<Value>) -> Result<Value> {
        check_size(items.len())?;
        Ok(Value::list(items))
    }

    pub fn string(s: &str) -> Value {
        Value::list(s.chars().map(Value::Char).collect())
    }

    /// Enclose into a rank-0 array.
    pub fn unit(inner: Value) -> Value {
        Array::value(Vec::new(), vec![inner])
    }

    pub fn bool(b: bool) -> Value {
        Value::Num(if b { 1.0 } else { 0.0 })
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn shape(&self) -> Vec<usize> {
        self.as_array().map(|a| a.shape.clone()).unwrap_or_default()
    }

    pub fn rank(&self) -> usize {
        self.as_array().map_or(0, Array::rank)
    }

    /// Length of the leading axis; atoms count as one.
    pub fn len(&self) -> usize {
        self.as_array().map_or(1, Array::len)
    }

    pub fn ravel(&self) -> Vec<Value> {
        match self {
            Value::Array(a) => a.data.clone(),
            other => vec![other.clone()],
        }
    }

    /// Major cells; an atom is its own single cell.
    pub fn cells(&self) -> Vec<Value> {
        match self {
            Value::Array(a) if a.rank() > 0 => a.cells(),
            Value::Array(a) => vec![a.data[0].clone()],
            other => vec![other.clone()],
        }
    }

    /// Reassemble major cells into an array; cells must share a shape.
    pub fn from_cells(glyph: char, cells: Vec<Value>) -> Result<Value> {
        let Some(first) = cells.first() else {
            return Ok(Value::list(Vec::new()));
        };
        let cell_shape = first.shape();
        let mut data = Vec::new();
        for cell in &cells {
            if cell.shape() != cell_shape {
                return Err(BqnError::rank(glyph, "Result cells must have matching shapes"));
            }
            data.extend(cell.ravel());
        }
        check_size(data.len())?;
        let mut shape = vec![cells.len()];
        shape.extend(cell_shape);
        Ok(Array::value(shape, data))
    }

    pub fn depth(&self) -> usize {
        match self {
            Value::Array(a) => 1 + a.data.iter().map(Value::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Structural equality (`≡`).
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.shape == b.shape && a.data.iter().zip(&b.data).all(|(x, y)| x.matches(y))
            }
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Nothing, Value::Nothing) => true,
            _ => false,
        }
    }

    /// Fill element: `' '` for character data, `0` otherwise.
    pub fn fill(&self) -> Value {
        match self {
            Value::Char(_) => Value::Char(' '),
            Value::Array(a) => match a.data.first() {
                Some(first) => first.fill(),
                None => Value::Num(0.0),
            },
            _ => Value::Num(0.0),
        }
    }

    pub fn as_number(&self, glyph: char) -> Result<f64> {
        match self {
            Value::Num(n) => Ok(*n),
            Value::Array(a) if a.rank() == 0 => a.data[0].as_number(glyph),
            _ => Err(BqnError::domain(glyph, "Expected a number")),
        }
    }

    pub fn as_int(&self, glyph: char) -> Result<i64> {
        let n = self.as_number(glyph)?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(BqnError::domain(glyph, "Expected an integer"));
        }
        Ok(n as i64)
    }

    pub fn as_nat(&self, glyph: char) -> Result<usize> {
        let n = self.as_int(glyph)?;
        usize::try_from(n).map_err(|_| BqnError::domain(glyph, "Expected a natural number"))
    }

    /// Natural-number list, accepting a lone number as a singleton.
    pub fn as_nat_list(&self, glyph: char) -> Result<Vec<usize>> {
        match self {
            Value::Array(a) if a.rank() <= 1 => a.data.iter().map(|v| v.as_nat(glyph)).collect(),
            Value::Array(_) => Err(BqnError::rank(glyph, "Expected a list")),
            other => Ok(vec![other.as_nat(glyph)?]),
        }
    }

    pub fn as_int_list(&self, glyph: char) -> Result<Vec<i64>> {
        match self {
            Value::Array(a) if a.rank() <= 1 => a.data.iter().map(|v| v.as_int(glyph)).collect(),
            Value::Array(_) => Err(BqnError::rank(glyph, "Expected a list")),
            other => Ok(vec![other.as_int(glyph)?]),
        }
    }
}

/// Total array ordering: numbers before characters, arrays by ravel.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Char(x), Value::Char(y)) => x.cmp(y),
        (Value::Num(_), Value::Char(_)) => Ordering::Less,
        (Value::Char(_), Value::Num(_)) => Ordering::Greater,
        (Value::Array(x), Value::Array(y)) => {
            for (p, q) in x.data.iter().zip(&y.data) {
                let ord = compare(p, q);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.data.len().cmp(&y.data.len())
        }
        (Value::Array(x), other) => match x.data.first() {
            Some(first) => compare(first, other).then(Ordering::Greater),
            None => Ordering::Less,
        },
        (other, Value::Array(y)) => match y.data.first() {
            Some(first) => compare(other, first).then(Ordering::Less),
            None => Ordering::Greater,
        },
        _ => Ordering::Equal,
    }
}

//! Primitive functions.
//!
//! Arithmetic and comparison pervade into nested arrays; structural
//! functions work on major cells, so a list is handled as a sequence of
//! rank-0 cells and a table as a sequence of rows.

use std::cmp::Ordering;

use crate::error::{BqnError, Result};
use crate::value::{Array, Value, check_size, compare};

/// Every primitive function glyph this engine implements.
pub const SUPPORTED: &str = "+-×÷⋆√⌊⌈|¬∧∨<>≠=≤≥≡≢⊣⊢⥊∾≍⋈↑↓↕⌽⍉/⍋⍒⊏⊑∊⊐⊒⍷⊔«»!";

pub fn is_supported(glyph: char) -> bool {
    SUPPORTED.contains(glyph)
}

fn unsupported(what: String) -> BqnError {
    BqnError::Unsupported(what)
}

fn nums(values: impl IntoIterator<Item = usize>) -> Value {
    Value::list(values.into_iter().map(|n| Value::Num(n as f64)).collect())
}

fn require_array(glyph: char, x: &Value) -> Result<&Array> {
    match x.as_array() {
        Some(a) if a.rank() > 0 => Ok(a),
        _ => Err(BqnError::rank(glyph, "𝕩 must have rank at least 1")),
    }
}

/// Resolve a possibly negative index against `len`.
fn wrap_index(glyph: char, index: i64, len: usize) -> Result<usize> {
    let len_i = len as i64;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(BqnError::index(
            glyph,
            format!("Index {index} out of bounds for length {len}"),
        ));
    }
    Ok(resolved as usize)
}

// ---------------------------------------------------------------------------
// Pervasion
// ---------------------------------------------------------------------------

fn pervade1(x: &Value, op: &dyn Fn(&Value) -> Result<Value>) -> Result<Value> {
    match x {
        Value::Array(a) => {
            let data = a
                .data
                .iter()
                .map(|v| pervade1(v, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(Array::value(a.shape.clone(), data))
        }
        atom => op(atom),
    }
}

fn pervade2(
    glyph: char,
    w: &Value,
    x: &Value,
    op: &dyn Fn(&Value, &Value) -> Result<Value>,
) -> Result<Value> {
    match (w.as_array(), x.as_array()) {
        (None, None) => op(w, x),
        (Some(a), None) => {
            let data = a
                .data
                .iter()
                .map(|v| pervade2(glyph, v, x, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(Array::value(a.shape.clone(), data))
        }
        (None, Some(b)) => {
            let data = b
                .data
                .iter()
                .map(|v| pervade2(glyph, w, v, op))
                .collect::<Result<Vec<_>>>()?;
            Ok(Array::value(b.shape.clone(), data))
        }
        (Some(a), Some(b)) => {
            if a.shape == b.shape {
                let data = a
                    .data
                    .iter()
                    .zip(&b.data)
                    .map(|(p, q)| pervade2(glyph, p, q, op))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Array::value(a.shape.clone(), data));
            }
            if b.shape.starts_with(&a.shape) {
                let k = b.data.len() / a.data.len().max(1);
                let data = b
                    .data
                    .iter()
                    .enumerate()
                    .map(|(i, q)| pervade2(glyph, &a.data[i / k.max(1)], q, op))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Array::value(b.shape.clone(), data));
            }
            if a.shape.starts_with(&b.shape) {
                let k = a.data.len() / b.data.len().max(1);
                let data = a
                    .data
                    .iter()
                    .enumerate()
                    .map(|(i, p)| pervade2(glyph, p, &b.data[i / k.max(1)], op))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Array::value(a.shape.clone(), data));
            }
            Err(BqnError::length(
                glyph,
                format!(
                    "Shapes {:?} and {:?} must have matching prefixes",
                    a.shape, b.shape
                ),
            ))
        }
    }
}

fn numeric1(glyph: char, x: &Value, f: fn(f64) -> f64) -> Result<Value> {
    pervade1(x, &|v| match v {
        Value::Num(n) => Ok(Value::Num(f(*n))),
        _ => Err(BqnError::domain(glyph, "𝕩 must be a number")),
    })
}

fn numeric2(glyph: char, w: &Value, x: &Value, f: fn(f64, f64) -> f64) -> Result<Value> {
    pervade2(glyph, w, x, &|p, q| match (p, q) {
        (Value::Num(a), Value::Num(b)) => Ok(Value::Num(f(*a, *b))),
        _ => Err(BqnError::domain(glyph, "Arguments must be numbers")),
    })
}

fn shift_char(glyph: char, c: char, offset: f64) -> Result<Value> {
    if offset.fract() != 0.0 {
        return Err(BqnError::domain(glyph, "Character offset must be an integer"));
    }
    let code = c as i64 + offset as i64;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| BqnError::domain(glyph, "Result is not a valid character"))
}

fn add(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    match (w, x) {
        (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
        (Value::Char(c), Value::Num(n)) | (Value::Num(n), Value::Char(c)) => {
            shift_char(glyph, *c, *n)
        }
        (Value::Char(_), Value::Char(_)) => {
            Err(BqnError::domain(glyph, "Cannot add two characters"))
        }
        _ => Err(BqnError::domain(glyph, "Arguments must be numbers or characters")),
    }
}

fn subtract(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    match (w, x) {
        (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a - b)),
        (Value::Char(c), Value::Num(n)) => shift_char(glyph, *c, -n),
        (Value::Char(a), Value::Char(b)) => Ok(Value::Num(*a as i64 as f64 - *b as i64 as f64)),
        (Value::Num(_), Value::Char(_)) => {
            Err(BqnError::domain(glyph, "Cannot subtract a character from a number"))
        }
        _ => Err(BqnError::domain(glyph, "Arguments must be numbers or characters")),
    }
}

fn atom_order(glyph: char, w: &Value, x: &Value) -> Result<Ordering> {
    match (w, x) {
        (Value::Num(_) | Value::Char(_), Value::Num(_) | Value::Char(_)) => Ok(compare(w, x)),
        _ => Err(BqnError::domain(glyph, "Cannot compare functions")),
    }
}

fn comparison(glyph: char, w: &Value, x: &Value, accept: fn(Ordering) -> bool) -> Result<Value> {
    pervade2(glyph, w, x, &|p, q| Ok(Value::bool(accept(atom_order(glyph, p, q)?))))
}

fn extremum(glyph: char, w: &Value, x: &Value, keep_left: fn(Ordering) -> bool) -> Result<Value> {
    pervade2(glyph, w, x, &|p, q| {
        Ok(if keep_left(atom_order(glyph, p, q)?) {
            p.clone()
        } else {
            q.clone()
        })
    })
}

fn equality(glyph: char, w: &Value, x: &Value, want: bool) -> Result<Value> {
    pervade2(glyph, w, x, &|p, q| Ok(Value::bool(p.matches(q) == want)))
}

// ---------------------------------------------------------------------------
// Structural helpers
// ---------------------------------------------------------------------------

fn rebuild(shape_tail: &[usize], count: usize, data: Vec<Value>) -> Value {
    let mut shape = vec![count];
    shape.extend_from_slice(shape_tail);
    Array::value(shape, data)
}

fn fill_cell(a: &Array) -> Vec<Value> {
    let fill = a
        .data
        .first()
        .map(Value::fill)
        .unwrap_or(Value::Num(0.0));
    vec![fill; a.cell_size()]
}

/// View an atom or rank-0 array as a one-element list.
fn as_list(x: &Value) -> Value {
    match x {
        Value::Array(a) if a.rank() > 0 => x.clone(),
        other => Value::list(other.ravel()),
    }
}

fn sort(glyph: char, x: &Value, descending: bool) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let mut cells = a.cells();
    if descending {
        cells.sort_by(|p, q| compare(q, p));
    } else {
        cells.sort_by(compare);
    }
    Value::from_cells(glyph, cells).map(|v| reshape_like(v, a))
}

/// `from_cells` loses the shape of an empty array; restore it.
fn reshape_like(v: Value, original: &Array) -> Value {
    if original.is_empty() {
        Array::value(original.shape.clone(), Vec::new())
    } else {
        v
    }
}

fn grade(glyph: char, x: &Value, descending: bool) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let cells = a.cells();
    let mut order: Vec<usize> = (0..cells.len()).collect();
    if descending {
        order.sort_by(|&i, &j| compare(&cells[j], &cells[i]));
    } else {
        order.sort_by(|&i, &j| compare(&cells[i], &cells[j]));
    }
    Ok(nums(order))
}

fn merge(glyph: char, x: &Value) -> Result<Value> {
    let Some(a) = x.as_array() else {
        return Ok(x.clone());
    };
    let Some(first) = a.data.first() else {
        return Ok(x.clone());
    };
    let inner = first.shape();
    let mut data = Vec::new();
    for element in &a.data {
        if element.shape() != inner {
            return Err(BqnError::rank(glyph, "Elements of 𝕩 must have matching shapes"));
        }
        data.extend(element.ravel());
    }
    check_size(data.len())?;
    let mut shape = a.shape.clone();
    shape.extend(inner);
    Ok(Array::value(shape, data))
}

fn join(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let mut items = a.data.iter();
    let Some(first) = items.next() else {
        return Ok(Value::list(Vec::new()));
    };
    if !first.is_array() {
        return Err(BqnError::rank(glyph, "Elements of 𝕩 must be arrays"));
    }
    let mut acc = first.clone();
    for item in items {
        if !item.is_array() {
            return Err(BqnError::rank(glyph, "Elements of 𝕩 must be arrays"));
        }
        acc = join_to(glyph, &acc, item)?;
    }
    Ok(acc)
}

pub(crate) fn join_to(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let (wr, xr) = (w.rank(), x.rank());
    if wr == 0 && xr == 0 {
        let mut data = w.ravel();
        data.extend(x.ravel());
        return Ok(Value::list(data));
    }
    let rank = wr.max(xr);
    let split = |v: &Value, r: usize| -> Result<(Vec<usize>, usize)> {
        let shape = v.shape();
        if r == rank {
            Ok((shape[1..].to_vec(), shape[0]))
        } else if r + 1 == rank {
            Ok((shape, 1))
        } else {
            Err(BqnError::rank(glyph, "Ranks of 𝕨 and 𝕩 must differ by at most 1"))
        }
    };
    let (w_cell, w_len) = split(w, wr)?;
    let (x_cell, x_len) = split(x, xr)?;
    if w_cell != x_cell {
        return Err(BqnError::length(glyph, "Cell shapes of 𝕨 and 𝕩 must match"));
    }
    let mut data = w.ravel();
    data.extend(x.ravel());
    check_size(data.len())?;
    Ok(rebuild(&w_cell, w_len + x_len, data))
}

fn couple(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let shape = w.shape();
    if shape != x.shape() {
        return Err(BqnError::length(glyph, "𝕨 and 𝕩 must have the same shape"));
    }
    let mut data = w.ravel();
    data.extend(x.ravel());
    Ok(rebuild(&shape, 2, data))
}

fn prefixes(glyph: char, x: &Value, suffix: bool) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let n = a.len();
    let size = a.cell_size();
    let cell = a.cell_shape();
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let (start, count) = if suffix { (i, n - i) } else { (0, i) };
        let data = a.data[start * size..(start + count) * size].to_vec();
        out.push(rebuild(cell, count, data));
    }
    check_size(out.len())?;
    Ok(Value::list(out))
}

fn single_amount(glyph: char, w: &Value) -> Result<i64> {
    let amounts = w.as_int_list(glyph)?;
    match amounts.as_slice() {
        [n] => Ok(*n),
        _ => Err(unsupported(format!("Multi-axis {glyph}"))),
    }
}

fn take(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let amount = single_amount(glyph, w)?;
    let list = as_list(x);
    let Some(a) = list.as_array() else {
        return Err(BqnError::rank(glyph, "𝕩 must be an array"));
    };
    let n = amount.unsigned_abs() as usize;
    check_size(n.saturating_mul(a.cell_size().max(1)))?;
    let slices = a.cell_slices();
    let filler = fill_cell(a);
    let available = slices.len();
    let mut data = Vec::new();
    if amount >= 0 {
        for i in 0..n {
            data.extend_from_slice(slices.get(i).copied().unwrap_or(filler.as_slice()));
        }
    } else {
        for i in 0..n {
            let from_end = n - i;
            if from_end <= available {
                data.extend_from_slice(slices[available - from_end]);
            } else {
                data.extend_from_slice(&filler);
            }
        }
    }
    Ok(rebuild(a.cell_shape(), n, data))
}

fn drop_cells(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let amount = single_amount(glyph, w)?;
    let list = as_list(x);
    let Some(a) = list.as_array() else {
        return Err(BqnError::rank(glyph, "𝕩 must be an array"));
    };
    let slices = a.cell_slices();
    let n = (amount.unsigned_abs() as usize).min(slices.len());
    let kept = if amount >= 0 {
        &slices[n..]
    } else {
        &slices[..slices.len() - n]
    };
    let data: Vec<Value> = kept.iter().flat_map(|s| s.iter().cloned()).collect();
    Ok(rebuild(a.cell_shape(), kept.len(), data))
}

fn range(glyph: char, x: &Value) -> Result<Value> {
    if x.is_array() {
        let dims = x.as_nat_list(glyph)?;
        let total: usize = dims.iter().product();
        check_size(total.saturating_mul(dims.len().max(1)))?;
        let mut data = Vec::with_capacity(total);
        let mut index = vec![0usize; dims.len()];
        for _ in 0..total {
            data.push(nums(index.iter().copied()));
            for axis in (0..dims.len()).rev() {
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        return Ok(Array::value(dims, data));
    }
    let n = x
        .as_nat(glyph)
        .map_err(|_| BqnError::domain(glyph, "𝕩 must be a natural number"))?;
    check_size(n)?;
    Ok(nums(0..n))
}

fn windows(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let size = w.as_nat(glyph)?;
    let a = require_array(glyph, x)?;
    let n = a.len();
    if size > n {
        return Err(BqnError::length(
            glyph,
            format!("Window length {size} exceeds length {n}"),
        ));
    }
    let slices = a.cell_slices();
    let count = n - size + 1;
    check_size(count.saturating_mul(size).saturating_mul(a.cell_size()))?;
    let mut data = Vec::new();
    for start in 0..count {
        for slice in &slices[start..start + size] {
            data.extend_from_slice(slice);
        }
    }
    let mut shape = vec![count, size];
    shape.extend_from_slice(a.cell_shape());
    Ok(Array::value(shape, data))
}

fn reverse(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let data: Vec<Value> = a
        .cell_slices()
        .into_iter()
        .rev()
        .flat_map(|s| s.iter().cloned())
        .collect();
    Ok(Array::value(a.shape.clone(), data))
}

fn rotate(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let amount = single_amount(glyph, w)?;
    let a = require_array(glyph, x)?;
    let slices = a.cell_slices();
    let n = slices.len();
    if n == 0 {
        return Ok(x.clone());
    }
    let k = amount.rem_euclid(n as i64) as usize;
    let data: Vec<Value> = slices[k..]
        .iter()
        .chain(&slices[..k])
        .flat_map(|s| s.iter().cloned())
        .collect();
    Ok(Array::value(a.shape.clone(), data))
}

fn indices(glyph: char, x: &Value) -> Result<Value> {
    let counts = x.as_nat_list(glyph)?;
    let total: usize = counts.iter().sum();
    check_size(total)?;
    Ok(nums(
        counts
            .iter()
            .enumerate()
            .flat_map(|(i, &c)| std::iter::repeat_n(i, c)),
    ))
}

fn replicate(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let slices = a.cell_slices();
    let counts = if w.is_array() {
        let counts = w.as_nat_list(glyph)?;
        if counts.len() != slices.len() {
            return Err(BqnError::length(
                glyph,
                format!(
                    "Lengths of 𝕨 ({}) and 𝕩 ({}) must match",
                    counts.len(),
                    slices.len()
                ),
            ));
        }
        counts
    } else {
        vec![w.as_nat(glyph)?; slices.len()]
    };
    let total: usize = counts.iter().sum();
    check_size(total.saturating_mul(a.cell_size()))?;
    let mut data = Vec::new();
    for (slice, &count) in slices.iter().zip(&counts) {
        for _ in 0..count {
            data.extend_from_slice(slice);
        }
    }
    Ok(rebuild(a.cell_shape(), total, data))
}

fn first_cell(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    a.cells()
        .into_iter()
        .next()
        .ok_or_else(|| BqnError::length(glyph, "𝕩 cannot be empty"))
}

fn select(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let slices = a.cell_slices();
    let (index_shape, positions) = match w {
        Value::Array(wa) => (
            wa.shape.clone(),
            wa.data
                .iter()
                .map(|v| v.as_int(glyph))
                .collect::<Result<Vec<_>>>()?,
        ),
        atom => {
            let i = wrap_index(glyph, atom.as_int(glyph)?, slices.len())?;
            return Ok(Array::value(a.cell_shape().to_vec(), slices[i].to_vec()));
        }
    };
    let mut data = Vec::new();
    for position in positions {
        let i = wrap_index(glyph, position, slices.len())?;
        data.extend_from_slice(slices[i]);
    }
    let mut shape = index_shape;
    shape.extend_from_slice(a.cell_shape());
    Ok(Array::value(shape, data))
}

fn first(x: &Value) -> Value {
    match x {
        Value::Array(a) => a.data.first().cloned().unwrap_or_else(|| x.fill()),
        other => other.clone(),
    }
}

fn pick(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let Some(a) = x.as_array() else {
        return Err(BqnError::rank(glyph, "𝕩 must be an array"));
    };
    match w {
        Value::Num(_) => {
            if a.rank() != 1 {
                return Err(BqnError::rank(glyph, "A number index requires a list"));
            }
            let i = wrap_index(glyph, w.as_int(glyph)?, a.data.len())?;
            Ok(a.data[i].clone())
        }
        Value::Array(wa) if wa.rank() == 1 && wa.data.iter().all(|v| matches!(v, Value::Num(_))) => {
            if wa.data.len() != a.rank() {
                return Err(BqnError::rank(
                    glyph,
                    format!("Index length {} must equal rank {}", wa.data.len(), a.rank()),
                ));
            }
            let mut flat = 0usize;
            for (axis, v) in wa.data.iter().enumerate() {
                let i = wrap_index(glyph, v.as_int(glyph)?, a.shape[axis])?;
                flat = flat * a.shape[axis] + i;
            }
            Ok(a.data[flat].clone())
        }
        Value::Array(wa) => {
            let data = wa
                .data
                .iter()
                .map(|index| pick(glyph, index, x))
                .collect::<Result<Vec<_>>>()?;
            Ok(Array::value(wa.shape.clone(), data))
        }
        _ => Err(BqnError::domain(glyph, "𝕨 must be an index")),
    }
}

fn mark_firsts(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let cells = a.cells();
    let marks = (0..cells.len())
        .map(|i| Value::bool(!cells[..i].iter().any(|c| c.matches(&cells[i]))))
        .collect();
    Ok(Value::list(marks))
}

fn member(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    if x.rank() > 1 {
        return Err(unsupported(format!("{glyph} with a higher-rank 𝕩")));
    }
    let haystack = x.ravel();
    let test = |e: &Value| Value::bool(haystack.iter().any(|h| h.matches(e)));
    Ok(match w {
        Value::Array(wa) => Array::value(wa.shape.clone(), wa.data.iter().map(test).collect()),
        atom => Value::unit(test(atom)),
    })
}

fn classify(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let mut seen: Vec<Value> = Vec::new();
    let mut out = Vec::new();
    for cell in a.cells() {
        let index = match seen.iter().position(|s| s.matches(&cell)) {
            Some(i) => i,
            None => {
                seen.push(cell);
                seen.len() - 1
            }
        };
        out.push(Value::Num(index as f64));
    }
    Ok(Value::list(out))
}

fn index_of(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let a = require_array(glyph, w)?;
    if a.rank() > 1 {
        return Err(unsupported(format!("{glyph} with a higher-rank 𝕨")));
    }
    let find = |e: &Value| {
        let i = a.data.iter().position(|c| c.matches(e)).unwrap_or(a.data.len());
        Value::Num(i as f64)
    };
    Ok(match x {
        Value::Array(xa) => Array::value(xa.shape.clone(), xa.data.iter().map(find).collect()),
        atom => Value::unit(find(atom)),
    })
}

fn deduplicate(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let mut unique: Vec<Value> = Vec::new();
    for cell in a.cells() {
        if !unique.iter().any(|u| u.matches(&cell)) {
            unique.push(cell);
        }
    }
    if unique.is_empty() {
        return Ok(x.clone());
    }
    Value::from_cells(glyph, unique)
}

fn shift(glyph: char, w: Option<&Value>, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let n = a.len() as i64;
    let filler = match w {
        Some(w) => w.clone(),
        None => {
            let cell = fill_cell(a);
            Array::value(a.cell_shape().to_vec(), cell)
        }
    };
    let front = glyph == '»';
    let joined = if front {
        join_to(glyph, &filler, x)?
    } else {
        join_to(glyph, x, &filler)?
    };
    let amount = if front { n } else { -n };
    take(glyph, &Value::Num(amount as f64), &joined)
}

/// Reorder axes. Axis `i` of `x` becomes result axis `w[i]`; axes sharing a
/// destination take a diagonal. Monadic form moves the first axis last.
fn transpose(glyph: char, w: Option<&Value>, x: &Value) -> Result<Value> {
    let Some(a) = x.as_array() else {
        return match w {
            None => Ok(x.clone()),
            Some(_) => Err(BqnError::rank(glyph, "𝕩 must be an array")),
        };
    };
    let rank = a.rank();
    let mut axes: Vec<usize> = match w {
        None if rank < 2 => return Ok(x.clone()),
        None => std::iter::once(rank - 1).chain(0..rank - 1).collect(),
        Some(w) => w.as_nat_list(glyph)?,
    };
    if axes.len() > rank {
        return Err(BqnError::length(glyph, "𝕨 cannot be longer than the rank of 𝕩"));
    }
    let named = axes.iter().max().map_or(0, |m| m + 1);
    if (0..named).any(|j| !axes.contains(&j)) {
        return Err(BqnError::domain(glyph, "𝕨 cannot skip a result axis"));
    }
    let rest = rank - axes.len();
    axes.extend(named..named + rest);
    let out_rank = named + rest;

    let mut shape = vec![usize::MAX; out_rank];
    let mut strides = vec![0usize; out_rank];
    let mut stride = 1;
    for i in (0..rank).rev() {
        let j = axes[i];
        shape[j] = shape[j].min(a.shape[i]);
        strides[j] += stride;
        stride *= a.shape[i];
    }
    let total: usize = shape.iter().product();
    let mut data = Vec::with_capacity(total);
    let mut index = vec![0usize; out_rank];
    for _ in 0..total {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        data.push(a.data[offset].clone());
        for axis in (0..out_rank).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    Ok(Array::value(shape, data))
}

/// Group keys: `¯1` drops an entry, anything lower is an error.
fn group_keys(glyph: char, keys: &Value) -> Result<Vec<Option<usize>>> {
    if keys.rank() > 1 {
        return Err(unsupported(format!("Multi-axis {glyph}")));
    }
    keys.as_int_list(glyph)?
        .into_iter()
        .map(|k| match k {
            -1 => Ok(None),
            k if k >= 0 => Ok(Some(k as usize)),
            _ => Err(BqnError::domain(glyph, "Indices must be at least ¯1")),
        })
        .collect()
}

fn group_indices(glyph: char, x: &Value) -> Result<Value> {
    let keys = group_keys(glyph, x)?;
    let count = keys.iter().flatten().max().map_or(0, |m| m + 1);
    check_size(count)?;
    let mut groups = vec![Vec::new(); count];
    for (i, key) in keys.iter().enumerate() {
        if let Some(k) = key {
            groups[*k].push(Value::Num(i as f64));
        }
    }
    Ok(Value::list(groups.into_iter().map(Value::list).collect()))
}

fn group(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let mut keys = group_keys(glyph, w)?;
    // One extra key gives the minimum number of groups.
    let mut count = 0;
    if keys.len() == a.len() + 1 {
        count = keys.pop().flatten().unwrap_or(0);
    } else if keys.len() != a.len() {
        return Err(BqnError::length(
            glyph,
            format!("≠𝕨 must be ≠𝕩 or one more, got {} and {}", keys.len(), a.len()),
        ));
    }
    count = count.max(keys.iter().flatten().max().map_or(0, |m| m + 1));
    check_size(count)?;
    let mut groups: Vec<(usize, Vec<Value>)> = vec![(0, Vec::new()); count];
    for (key, slice) in keys.iter().zip(a.cell_slices()) {
        if let Some(k) = key {
            groups[*k].0 += 1;
            groups[*k].1.extend_from_slice(slice);
        }
    }
    let cell_shape = a.cell_shape();
    Ok(Value::list(
        groups
            .into_iter()
            .map(|(n, data)| rebuild(cell_shape, n, data))
            .collect(),
    ))
}

fn occurrence_count(glyph: char, x: &Value) -> Result<Value> {
    let a = require_array(glyph, x)?;
    let cells = a.cells();
    let counts = (0..cells.len())
        .map(|i| {
            let seen = cells[..i].iter().filter(|c| c.matches(&cells[i])).count();
            Value::Num(seen as f64)
        })
        .collect();
    Ok(Value::list(counts))
}

/// Like `⊐`, but each entry of `w` can be matched only once.
fn progressive_index_of(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    let a = require_array(glyph, w)?;
    if a.rank() > 1 {
        return Err(unsupported(format!("{glyph} with a higher-rank 𝕨")));
    }
    let mut used = vec![false; a.data.len()];
    let mut find = |e: &Value| {
        match (0..a.data.len()).find(|&j| !used[j] && a.data[j].matches(e)) {
            Some(j) => {
                used[j] = true;
                Value::Num(j as f64)
            }
            None => Value::Num(a.data.len() as f64),
        }
    };
    Ok(match x {
        Value::Array(xa) => Array::value(xa.shape.clone(), xa.data.iter().map(&mut find).collect()),
        atom => Value::unit(find(atom)),
    })
}

fn text_of(value: &Value) -> Option<String> {
    value
        .as_array()
        .filter(|a| a.rank() == 1)?
        .data
        .iter()
        .map(|v| match v {
            Value::Char(c) => Some(*c),
            _ => None,
        })
        .collect()
}

fn assert(w: Option<&Value>, x: &Value) -> Result<Value> {
    if x.matches(&Value::Num(1.0)) {
        return Ok(x.clone());
    }
    let message = w
        .and_then(text_of)
        .unwrap_or_else(|| "Assertion error".to_owned());
    Err(BqnError::Assertion(message))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply a primitive to one argument.
pub fn monadic(glyph: char, x: &Value) -> Result<Value> {
    match glyph {
        '+' => pervade1(x, &|v| match v {
            Value::Num(n) => Ok(Value::Num(*n)),
            _ => Err(BqnError::domain(glyph, "𝕩 must be a number")),
        }),
        '-' => numeric1(glyph, x, |n| -n),
        '×' => numeric1(glyph, x, |n| {
            if n > 0.0 {
                1.0
            } else if n < 0.0 {
                -1.0
            } else {
                0.0
            }
        }),
        '÷' => numeric1(glyph, x, |n| 1.0 / n),
        '⋆' => numeric1(glyph, x, f64::exp),
        '√' => numeric1(glyph, x, f64::sqrt),
        '⌊' => numeric1(glyph, x, f64::floor),
        '⌈' => numeric1(glyph, x, f64::ceil),
        '|' => numeric1(glyph, x, f64::abs),
        '¬' => numeric1(glyph, x, |n| 1.0 - n),
        '∧' => sort(glyph, x, false),
        '∨' => sort(glyph, x, true),
        '<' => Ok(Value::unit(x.clone())),
        '>' => merge(glyph, x),
        '≠' => Ok(Value::Num(x.len() as f64)),
        '=' => Ok(Value::Num(x.rank() as f64)),
        '≡' => Ok(Value::Num(x.depth() as f64)),
        '≢' => Ok(nums(x.shape())),
        '⊣' | '⊢' => Ok(x.clone()),
        '⥊' => Ok(Value::list(x.ravel())),
        '∾' => join(glyph, x),
        '≍' => Ok(rebuild(&x.shape(), 1, x.ravel())),
        '⋈' => Ok(Value::list(vec![x.clone()])),
        '↑' => prefixes(glyph, x, false),
        '↓' => prefixes(glyph, x, true),
        '↕' => range(glyph, x),
        '⌽' => reverse(glyph, x),
        '⍉' => transpose(glyph, None, x),
        '/' => indices(glyph, x),
        '⍋' => grade(glyph, x, false),
        '⍒' => grade(glyph, x, true),
        '⊏' => first_cell(glyph, x),
        '⊑' => Ok(first(x)),
        '∊' => mark_firsts(glyph, x),
        '⊐' => classify(glyph, x),
        '⊒' => occurrence_count(glyph, x),
        '⍷' => deduplicate(glyph, x),
        '⊔' => group_indices(glyph, x),
        '«' | '»' => shift(glyph, None, x),
        '!' => assert(None, x),
        '≤' | '≥' => Err(BqnError::domain(glyph, "No monadic form")),
        _ => Err(unsupported(format!("Primitive {glyph}"))),
    }
}

/// Apply a primitive to two arguments.
pub fn dyadic(glyph: char, w: &Value, x: &Value) -> Result<Value> {
    match glyph {
        '+' => pervade2(glyph, w, x, &|p, q| add(glyph, p, q)),
        '-' => pervade2(glyph, w, x, &|p, q| subtract(glyph, p, q)),
        '×' => numeric2(glyph, w, x, |a, b| a * b),
        '÷' => numeric2(glyph, w, x, |a, b| a / b),
        '⋆' => numeric2(glyph, w, x, f64::powf),
        '√' => numeric2(glyph, w, x, |a, b| b.powf(1.0 / a)),
        '⌊' => extremum(glyph, w, x, |o| o != Ordering::Greater),
        '⌈' => extremum(glyph, w, x, |o| o != Ordering::Less),
        '|' => numeric2(glyph, w, x, |a, b| if a == 0.0 { b } else { b - a * (b / a).floor() }),
        '¬' => numeric2(glyph, w, x, |a, b| 1.0 + a - b),
        '∧' => numeric2(glyph, w, x, |a, b| a * b),
        '∨' => numeric2(glyph, w, x, |a, b| a + b - a * b),
        '<' => comparison(glyph, w, x, |o| o == Ordering::Less),
        '>' => comparison(glyph, w, x, |o| o == Ordering::Greater),
        '≤' => comparison(glyph, w, x, |o| o != Ordering::Greater),
        '≥' => comparison(glyph, w, x, |o| o != Ordering::Less),
        '=' => equality(glyph, w, x, true),
        '≠' => equality(glyph, w, x, false),
        '≡' => Ok(Value::bool(w.matches(x))),
        '≢' => Ok(Value::bool(!w.matches(x))),
        '⊣' => Ok(w.clone()),
        '⊢' => Ok(x.clone()),
        '⥊' => {
            let shape = w.as_nat_list(glyph)?;
            let total = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
            let total = total.ok_or(BqnError::TooLarge(usize::MAX))?;
            check_size(total)?;
            let source = x.ravel();
            if source.is_empty() && total > 0 {
                return Err(BqnError::length(glyph, "Cannot reshape an empty array"));
            }
            let data = (0..total).map(|i| source[i % source.len()].clone()).collect();
            Ok(Array::value(shape, data))
        }
        '∾' => join_to(glyph, w, x),
        '≍' => couple(glyph, w, x),
        '⋈' => Ok(Value::list(vec![w.clone(), x.clone()])),
        '↑' => take(glyph, w, x),
        '↓' => drop_cells(glyph, w, x),
        '↕' => windows(glyph, w, x),
        '⌽' => rotate(glyph, w, x),
        '⍉' => transpose(glyph, Some(w), x),
        '/' => replicate(glyph, w, x),
        '⊏' => select(glyph, w, x),
        '⊑' => pick(glyph, w, x),
        '∊' => member(glyph, w, x),
        '⊐' => index_of(glyph, w, x),
        '⊒' => progressive_index_of(glyph, w, x),
        '⊔' => group(glyph, w, x),
        '«' | '»' => shift(glyph, Some(w), x),
        '!' => assert(Some(w), x),
        '⍋' | '⍒' | '⍷' => Err(unsupported(format!("Dyadic {glyph}"))),
        _ => Err(unsupported(format!("Primitive {glyph}"))),
    }
}

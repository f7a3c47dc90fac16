//! Text rendering of values, following `•Fmt`.

use crate::value::{Array, Func, Value};

/// Render a value the way the reference REPL prints it.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Num(n) => format_number(*n),
        Value::Char(c) => format!("'{c}'"),
        Value::Func(f) => format_func(f),
        Value::Nothing => "·".to_owned(),
        Value::Array(a) => match a.rank() {
            0 => format_unit(&a.data[0]),
            1 => format_list(a),
            _ => format_table(a),
        },
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "∞" } else { "¯∞" }.to_owned();
    }
    let magnitude = n.abs();
    let text = if n.fract() == 0.0 && magnitude < 1e16 {
        format!("{}", n as i64)
    } else if magnitude >= 1e16 || magnitude < 1e-5 {
        format!("{n:e}").replace('e', "E")
    } else {
        format!("{n}")
    };
    text.replace('-', "¯")
}

fn format_func(f: &Func) -> String {
    match f {
        Func::Prim(glyph) => glyph.to_string(),
        Func::Block { .. } => "(function block)".to_owned(),
        Func::Mod1 { glyph, operand } => format!("{}{glyph}", operand_text(operand)),
        Func::Mod2 { glyph, left, right } => {
            format!("{}{glyph}{}", operand_text(left), operand_text(right))
        }
        Func::Atop { outer, inner } => {
            format!("({} {})", operand_text(outer), operand_text(inner))
        }
        Func::Fork {
            left,
            middle,
            right,
        } => format!(
            "({} {} {})",
            operand_text(left),
            operand_text(middle),
            operand_text(right)
        ),
    }
}

fn operand_text(value: &Value) -> String {
    match value {
        Value::Func(f) => format_func(f),
        other => format_value(other),
    }
}

fn format_unit(inner: &Value) -> String {
    let body = format_value(inner);
    let mut lines = vec!["┌·".to_owned()];
    for (i, line) in body.lines().enumerate() {
        let prefix = if i == 0 { "· " } else { "  " };
        lines.push(format!("{prefix}{line}").trim_end().to_owned());
    }
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    lines.push(format!("{}┘", " ".repeat(widest + 1)));
    lines.join("\n")
}

fn as_string(a: &Array) -> Option<String> {
    if a.data.is_empty() {
        return None;
    }
    a.data
        .iter()
        .map(|v| match v {
            Value::Char(c) => Some(*c),
            _ => None,
        })
        .collect()
}

fn format_list(a: &Array) -> String {
    if a.data.is_empty() {
        return "⟨⟩".to_owned();
    }
    if let Some(text) = as_string(a) {
        return format!("\"{}\"", text.replace('"', "\"\""));
    }
    let items: Vec<String> = a.data.iter().map(format_value).collect();
    format!("⟨ {} ⟩", items.join(" "))
}

fn format_table(a: &Array) -> String {
    let columns = a.shape.last().copied().unwrap_or(0);
    if a.data.is_empty() || columns == 0 {
        let dims: Vec<String> = a.shape.iter().map(ToString::to_string).collect();
        return format!("┌{}\n┘", dims.join("‿"));
    }
    if let Some(text) = as_string(a) {
        return format_char_table(a, &text, columns);
    }
    let cells: Vec<String> = a.data.iter().map(format_value).collect();
    let mut widths = vec![0usize; columns];
    for (i, cell) in cells.iter().enumerate() {
        let w = cell.chars().count();
        widths[i % columns] = widths[i % columns].max(w);
    }
    let numeric: Vec<bool> = a.data.iter().map(|v| matches!(v, Value::Num(_))).collect();

    // Rows of the trailing 2-cells; higher axes separate them with blank lines.
    let rows_per_slice = a.shape[a.rank() - 2].max(1);
    let marker = if a.rank() > 2 { "╎ " } else { "╵ " };
    let mut lines = vec!["┌─".to_owned()];
    let mut widest = 0;
    for (r, chunk) in cells.chunks(columns).enumerate() {
        if r > 0 && r % rows_per_slice == 0 {
            lines.push(String::new());
        }
        let rendered: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                let pad = widths[c] - cell.chars().count();
                if numeric[r * columns + c] {
                    format!("{}{cell}", " ".repeat(pad))
                } else {
                    format!("{cell}{}", " ".repeat(pad))
                }
            })
            .collect();
        let prefix = if r == 0 { marker } else { "  " };
        let line = format!("{prefix}{}", rendered.join(" "));
        widest = widest.max(line.chars().count());
        lines.push(line);
    }
    lines.push(format!("{}┘", " ".repeat(widest + 1)));
    lines.join("\n")
}

/// Character tables print each row as a run of text, with one pair of quotes
/// around the whole ravel.
fn format_char_table(a: &Array, text: &str, columns: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let rows_per_slice = a.shape[a.rank() - 2].max(1);
    let row_count = chars.len() / columns;
    let marker = if a.rank() > 2 { "╎\"" } else { "╵\"" };
    let mut lines = vec!["┌─".to_owned()];
    for (r, chunk) in chars.chunks(columns).enumerate() {
        if r > 0 && r % rows_per_slice == 0 {
            lines.push(String::new());
        }
        let row: String = chunk.iter().collect();
        let prefix = if r == 0 { marker } else { "  " };
        let suffix = if r + 1 == row_count { "\"" } else { "" };
        lines.push(format!("{prefix}{}{suffix}", row.replace('"', "\"\"")));
    }
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    lines.push(format!("{}┘", " ".repeat(widest)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(ns: &[f64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Num(*n)).collect())
    }

    #[test]
    fn numbers_use_high_minus() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "¯2");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NEG_INFINITY), "¯∞");
        assert_eq!(format_number(1e20), "1E20");
        assert_eq!(format_number(-1.5e-7), "¯1.5E¯7");
    }

    #[test]
    fn lists_and_strings() {
        assert_eq!(format_value(&nums(&[1.0, 2.0, 3.0])), "⟨ 1 2 3 ⟩");
        assert_eq!(format_value(&Value::list(Vec::new())), "⟨⟩");
        assert_eq!(format_value(&Value::string("abc")), "\"abc\"");
        assert_eq!(format_value(&Value::Char('a')), "'a'");
    }

    #[test]
    fn nested_lists() {
        let nested = Value::list(vec![nums(&[1.0, 2.0]), Value::Num(3.0)]);
        assert_eq!(format_value(&nested), "⟨ ⟨ 1 2 ⟩ 3 ⟩");
    }

    #[test]
    fn tables_are_framed() {
        let table = Array::value(vec![2, 3], nums(&[0.0, 1.0, 2.0, 3.0, 4.0, 15.0]).ravel());
        assert_eq!(
            format_value(&table),
            "┌─\n╵ 0 1  2\n  3 4 15\n         ┘"
        );
    }

    #[test]
    fn units_are_framed() {
        assert_eq!(format_value(&Value::unit(Value::Num(3.0))), "┌·\n· 3\n    ┘");
    }

    #[test]
    fn nested_units_indent_their_frames() {
        let nested = Value::unit(Value::unit(Value::Num(1.0)));
        assert_eq!(
            format_value(&nested),
            "┌·\n· ┌·\n  · 1\n      ┘\n        ┘"
        );
    }

    #[test]
    fn character_tables_print_quoted_rows() {
        let table = Array::value(vec![2, 2], Value::string("abcd").ravel());
        assert_eq!(format_value(&table), "┌─\n╵\"ab\n  cd\"\n     ┘");
    }

    #[test]
    fn character_tables_double_embedded_quotes() {
        let table = Array::value(vec![2, 1], Value::string("a\"").ravel());
        assert_eq!(format_value(&table), "┌─\n╵\"a\n  \"\"\"\n     ┘");
    }

    #[test]
    fn primitive_functions_print_their_glyph() {
        assert_eq!(format_value(&Value::Func(std::rc::Rc::new(Func::Prim('+')))), "+");
    }
}

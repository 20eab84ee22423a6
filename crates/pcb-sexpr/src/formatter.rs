//! Text output in the layout KiCad itself writes: one child list per line,
//! tab indentation, atoms and short attribute lists kept on the parent line.

use crate::Sexpr;

/// Lists that stay on one line even though they contain lists.
const INLINE_TAGS: &[&str] = &["font", "stroke", "offset", "teardrop", "rotate", "scale"];

/// Column at which `(pts ...)` rows of `(xy ...)` points wrap.
const POINTS_WRAP_COLUMN: usize = 99;

/// Pretty-print a tree. The result ends with a newline.
pub fn format_tree(node: &Sexpr) -> String {
    let mut out = String::new();
    write_pretty(node, 0, &mut out);
    out.push('\n');
    out
}

/// Single-line rendering with single spaces between items.
pub fn to_compact(node: &Sexpr) -> String {
    let mut out = String::new();
    write_compact(node, &mut out);
    out
}

/// Shortest decimal form with at most six fractional digits (nanometre
/// resolution when the value is in millimetres).
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{value:.6}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn write_pretty(node: &Sexpr, depth: usize, out: &mut String) {
    let Sexpr::List(items) = node else {
        write_atom(node, out);
        return;
    };
    if stays_inline(node, items) {
        write_compact(node, out);
        return;
    }

    out.push('(');
    let split = items.iter().position(Sexpr::is_list).unwrap_or(items.len());
    for (i, atom) in items[..split].iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_atom(atom, out);
    }

    let rest = &items[split..];
    if node.is_node("pts") {
        write_points(rest, depth + 1, out);
    } else {
        for child in rest {
            newline(out, depth + 1);
            write_pretty(child, depth + 1, out);
        }
    }
    newline(out, depth);
    out.push(')');
}

fn stays_inline(node: &Sexpr, items: &[Sexpr]) -> bool {
    !items.iter().any(Sexpr::is_list)
        || node.head().is_some_and(|tag| INLINE_TAGS.contains(&tag))
}

fn write_points(points: &[Sexpr], depth: usize, out: &mut String) {
    newline(out, depth);
    let mut column = depth;
    for (i, point) in points.iter().enumerate() {
        let text = to_compact(point);
        if i > 0 {
            if column + 1 + text.len() > POINTS_WRAP_COLUMN {
                newline(out, depth);
                column = depth;
            } else {
                out.push(' ');
                column += 1;
            }
        }
        column += text.len();
        out.push_str(&text);
    }
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    out.extend(std::iter::repeat_n('\t', depth));
}

fn write_compact(node: &Sexpr, out: &mut String) {
    match node {
        Sexpr::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_compact(item, out);
            }
            out.push(')');
        }
        atom => write_atom(atom, out),
    }
}

fn write_atom(node: &Sexpr, out: &mut String) {
    match node {
        Sexpr::Symbol(s) => out.push_str(s),
        Sexpr::String(s) => {
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
        Sexpr::Int(n) => out.push_str(&n.to_string()),
        Sexpr::Float(f) => out.push_str(&format_number(*f)),
        Sexpr::List(_) => write_compact(node, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn nested_lists_indent_with_tabs() {
        let tree = parse("(kicad_pcb (version 20240108) (general (thickness 1.6)))").unwrap();
        assert_eq!(
            format_tree(&tree),
            "(kicad_pcb\n\t(version 20240108)\n\t(general\n\t\t(thickness 1.6)\n\t)\n)\n"
        );
    }

    #[test]
    fn leading_atoms_stay_on_open_line() {
        let tree = parse(r#"(pad "1" smd rect (at 1 2) (size 1 1))"#).unwrap();
        assert_eq!(
            format_tree(&tree),
            "(pad \"1\" smd rect\n\t(at 1 2)\n\t(size 1 1)\n)\n"
        );
    }

    #[test]
    fn font_lists_are_compact() {
        let tree = parse("(effects (font (size 1 1) (thickness 0.15)))").unwrap();
        assert_eq!(
            format_tree(&tree),
            "(effects\n\t(font (size 1 1) (thickness 0.15))\n)\n"
        );
    }

    #[test]
    fn points_wrap_past_column_limit() {
        let pts: Vec<Sexpr> = (0..12)
            .map(|i| Sexpr::node("xy", [Sexpr::float(i as f64 * 10.5), Sexpr::float(100.25)]))
            .collect();
        let tree = Sexpr::node("pts", pts);
        let text = format_tree(&tree);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.len() > 3);
        assert!(lines.iter().all(|l| l.len() <= POINTS_WRAP_COLUMN));
        assert!(lines[1].matches("(xy").count() > 1);
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(0.0000004), "0");
        assert_eq!(format_number(-0.0000001), "0");
        assert_eq!(format_number(0.123456789), "0.123457");
        assert_eq!(format_number(f64::NAN), "0");
    }

    #[test]
    fn strings_are_escaped() {
        let node = Sexpr::node("title", [Sexpr::string("a \"b\"\\c")]);
        assert_eq!(to_compact(&node), r#"(title "a \"b\"\\c")"#);
        assert_eq!(parse(&to_compact(&node)).unwrap(), node);
    }
}

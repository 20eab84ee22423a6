//! S-expression values as used by KiCad's `.kicad_pcb`, `.kicad_mod` and
//! `.kicad_sch` files.
//!
//! Nodes are plain values. KiCad lists are "tagged": the first item is a
//! symbol naming the node (`(at 10 20 90)`), and most of the helpers here
//! work in terms of that tag.

pub mod formatter;
mod parser;

pub use formatter::{format_number, format_tree, to_compact};
pub use parser::{ParseError, ParseErrorKind, parse, parse_all};

#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    /// Unquoted token such as `smd` or `F.Cu` in older files.
    Symbol(String),
    /// Quoted string literal, stored unescaped.
    String(String),
    Int(i64),
    Float(f64),
    List(Vec<Sexpr>),
}

impl Sexpr {
    pub fn symbol(s: impl Into<String>) -> Self {
        Sexpr::Symbol(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Sexpr::String(s.into())
    }

    pub fn int(n: i64) -> Self {
        Sexpr::Int(n)
    }

    pub fn float(f: f64) -> Self {
        Sexpr::Float(f)
    }

    pub fn list(items: Vec<Sexpr>) -> Self {
        Sexpr::List(items)
    }

    /// Build a tagged list `(name items...)`.
    pub fn node(name: &str, items: impl IntoIterator<Item = Sexpr>) -> Self {
        let mut list = vec![Sexpr::symbol(name)];
        list.extend(items);
        Sexpr::List(list)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Sexpr::List(_))
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexpr::String(s) => Some(s),
            _ => None,
        }
    }

    /// Symbol or string content. KiCad switched many tokens from bare
    /// symbols to quoted strings over time, so readers accept both.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) | Sexpr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Sexpr::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, accepting both integer and float atoms.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Sexpr::Int(n) => Some(*n as f64),
            Sexpr::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Tag of a tagged list.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    pub fn is_node(&self, name: &str) -> bool {
        self.head() == Some(name)
    }

    /// Positional item of a list; `arg(0)` is the tag.
    pub fn arg(&self, index: usize) -> Option<&Sexpr> {
        self.as_list()?.get(index)
    }

    /// Items after the tag.
    pub fn args(&self) -> &[Sexpr] {
        match self.as_list() {
            Some([_, rest @ ..]) => rest,
            _ => &[],
        }
    }

    /// First direct child list tagged `name`.
    pub fn find(&self, name: &str) -> Option<&Sexpr> {
        self.args().iter().find(|child| child.is_node(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Sexpr> {
        self.as_list_mut()?
            .iter_mut()
            .skip(1)
            .find(|child| child.is_node(name))
    }

    /// All direct child lists tagged `name`.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Sexpr> + 'a {
        self.args().iter().filter(move |child| child.is_node(name))
    }

    /// First argument of the child `(name value ...)`.
    pub fn value_of(&self, name: &str) -> Option<&Sexpr> {
        self.find(name)?.arg(1)
    }

    pub fn atom_of(&self, name: &str) -> Option<&str> {
        self.value_of(name)?.as_atom()
    }

    pub fn f64_of(&self, name: &str) -> Option<f64> {
        self.value_of(name)?.as_f64()
    }

    /// Replace the first child tagged like `child`, or append it.
    pub fn set_child(&mut self, child: Sexpr) {
        let Some(tag) = child.head().map(str::to_owned) else {
            return;
        };
        let Some(items) = self.as_list_mut() else {
            return;
        };
        match items.iter_mut().skip(1).find(|c| c.is_node(&tag)) {
            Some(slot) => *slot = child,
            None => items.push(child),
        }
    }

    /// Drop every direct child tagged `name`, returning how many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let Some(items) = self.as_list_mut() else {
            return 0;
        };
        let before = items.len();
        let mut index = 0;
        items.retain(|item| {
            let keep = index == 0 || !item.is_node(name);
            index += 1;
            keep
        });
        before - items.len()
    }

    /// Visit every node depth-first, parents before children.
    pub fn visit_mut<F: FnMut(&mut Sexpr)>(&mut self, f: &mut F) {
        f(self);
        if let Sexpr::List(items) = self {
            for item in items {
                item.visit_mut(f);
            }
        }
    }
}

/// `(key value)`
pub fn kv<V: Into<Sexpr>>(key: &str, value: V) -> Sexpr {
    Sexpr::node(key, [value.into()])
}

/// Incremental construction of a tagged list.
#[derive(Debug)]
pub struct ListBuilder {
    items: Vec<Sexpr>,
}

impl ListBuilder {
    pub fn node(name: &str) -> Self {
        Self {
            items: vec![Sexpr::symbol(name)],
        }
    }

    pub fn push<V: Into<Sexpr>>(&mut self, value: V) -> &mut Self {
        self.items.push(value.into());
        self
    }

    pub fn push_if<V: Into<Sexpr>>(&mut self, cond: bool, value: V) -> &mut Self {
        if cond {
            self.items.push(value.into());
        }
        self
    }

    pub fn push_opt<V: Into<Sexpr>>(&mut self, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.items.push(value.into());
        }
        self
    }

    pub fn extend<I, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Sexpr>,
    {
        self.items.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Sexpr {
        Sexpr::List(self.items)
    }
}

impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Sexpr::symbol(s)
    }
}

impl From<String> for Sexpr {
    fn from(s: String) -> Self {
        Sexpr::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::Int(n)
    }
}

impl From<i32> for Sexpr {
    fn from(n: i32) -> Self {
        Sexpr::Int(n.into())
    }
}

impl From<u32> for Sexpr {
    fn from(n: u32) -> Self {
        Sexpr::Int(n.into())
    }
}

impl From<f64> for Sexpr {
    fn from(f: f64) -> Self {
        Sexpr::Float(f)
    }
}

impl From<bool> for Sexpr {
    fn from(b: bool) -> Self {
        Sexpr::symbol(if b { "yes" } else { "no" })
    }
}

impl std::fmt::Display for Sexpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&to_compact(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn footprint() -> Sexpr {
        parse(
            r#"(footprint "Resistor_SMD:R_0603"
                (layer "F.Cu")
                (at 10 20 90)
                (property "Reference" "R1")
                (property "Value" "10k")
                (pad "1" smd roundrect (at -0.8 0))
                (pad "2" smd roundrect (at 0.8 0)))"#,
        )
        .unwrap()
    }

    #[test]
    fn tagged_list_accessors() {
        let fp = footprint();
        assert_eq!(fp.head(), Some("footprint"));
        assert_eq!(fp.arg(1).and_then(Sexpr::as_str), Some("Resistor_SMD:R_0603"));
        assert_eq!(fp.atom_of("layer"), Some("F.Cu"));
        assert_eq!(fp.f64_of("at"), Some(10.0));
        assert_eq!(fp.find_all("pad").count(), 2);
        assert_eq!(fp.find_all("property").count(), 2);
        assert!(fp.find("model").is_none());
    }

    #[test]
    fn set_child_replaces_or_appends() {
        let mut fp = footprint();
        fp.set_child(Sexpr::node("layer", [Sexpr::string("B.Cu")]));
        assert_eq!(fp.atom_of("layer"), Some("B.Cu"));

        fp.set_child(kv("locked", true));
        assert_eq!(fp.atom_of("locked"), Some("yes"));
    }

    #[test]
    fn remove_children_keeps_tag() {
        let mut fp = footprint();
        assert_eq!(fp.remove_children("pad"), 2);
        assert_eq!(fp.head(), Some("footprint"));
        assert_eq!(fp.find_all("pad").count(), 0);
    }

    #[test]
    fn args_of_atom_is_empty() {
        assert!(Sexpr::int(3).args().is_empty());
        assert!(Sexpr::list(vec![]).args().is_empty());
    }

    #[test]
    fn builder_skips_missing_values() {
        let mut b = ListBuilder::node("via");
        b.push(Sexpr::node("at", [1.0.into(), 2.0.into()]))
            .push_opt(None::<Sexpr>)
            .push_if(false, kv("locked", true))
            .push(kv("size", 0.8));
        assert_eq!(to_compact(&b.build()), "(via (at 1 2) (size 0.8))");
    }
}

// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A custom s-expression data type and parsing.
//!
//! This implementation supports comments as part of the grammar, since they are
//! needed to fully parse the output of some solvers, and bit-vector literals
//! such as `#b0101` and `#x1f`, which solvers use to print bit-vector values.

use peg::str::LineCol;
use std::fmt;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    I(usize),
    S(String),
}

impl Atom {
    /// Return the string value of self, if it is a string.
    pub fn s(&self) -> Option<&str> {
        if let Self::S(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

/// An s-expression which also tracks comments.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sexp {
    Atom(Atom),
    Comment(String),
    List(Vec<Sexp>),
}

/// Construct an sexp atom from a string.
pub fn atom_s<S: AsRef<str>>(s: S) -> Sexp {
    Sexp::Atom(Atom::S(s.as_ref().to_string()))
}

/// Construct an sexp atom from an integer.
pub fn atom_i(i: usize) -> Sexp {
    Sexp::Atom(Atom::I(i))
}

/// Construct an sexp list from an iteratable.
pub fn sexp_l<I>(i: I) -> Sexp
where
    I: IntoIterator,
    I::IntoIter: Iterator<Item = Sexp>,
{
    Sexp::List(i.into_iter().collect())
}

/// Construct an sexp list with a string atom as its "head" element, followed by
/// an iterable of remaining arguments.
pub fn app<I>(head: &str, args: I) -> Sexp
where
    I: IntoIterator<Item = Sexp>,
{
    let mut ss = vec![atom_s(head)];
    ss.extend(args);
    Sexp::List(ss)
}

/// Construct an indexed identifier `(_ name i1 .. in)`, such as
/// `(_ extract 3 0)` or `(_ BitVec 8)`.
pub fn indexed<I>(name: &str, indices: I) -> Sexp
where
    I: IntoIterator<Item = usize>,
{
    let mut ss = vec![atom_s("_"), atom_s(name)];
    ss.extend(indices.into_iter().map(atom_i));
    Sexp::List(ss)
}

/// Whether `s` can be printed as an SMT-LIB simple symbol, without quoting.
fn is_simple_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if !c.is_ascii_digit() && is_symbol_char(c) => chars.all(is_symbol_char),
        _ => false,
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/:#'".contains(c)
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::I(i) => write!(f, "{i}"),
            Atom::S(s) if is_simple_symbol(s) => write!(f, "{s}"),
            Atom::S(s) if s.contains('|') => write!(f, "\"{s}\""),
            Atom::S(s) => write!(f, "|{s}|"),
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Atom(s) => write!(f, "{s}"),
            Sexp::Comment(s) => write!(f, ";{s}"),
            Sexp::List(ss) => {
                write!(f, "(")?;
                for (i, s) in ss.iter().enumerate() {
                    let last = i == ss.len() - 1;
                    let this_comment = matches!(s, Sexp::Comment(_));
                    let next_comment = !last && matches!(ss[i + 1], Sexp::Comment(_));
                    let space = if last || this_comment || next_comment {
                        ""
                    } else {
                        " "
                    };
                    if this_comment {
                        write!(f, "\n{s}\n{space}")?;
                    } else {
                        write!(f, "{s}{space}")?;
                    }
                }
                write!(f, ")")?;
                Ok(())
            }
        }
    }
}

impl Sexp {
    /// Return the inner elements if self is a Sexp::List
    pub fn list(&self) -> Option<&[Sexp]> {
        if let Sexp::List(ss) = self {
            Some(ss)
        } else {
            None
        }
    }

    /// Return the inner string if self is a string atom.
    pub fn atom_s(&self) -> Option<&str> {
        if let Sexp::Atom(Atom::S(s)) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Return the inner integer if self is an integer atom.
    pub fn atom_i(&self) -> Option<usize> {
        if let Sexp::Atom(Atom::I(i)) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Return the head and tail if self is of the form `(head rest..)`.
    pub fn app(&self) -> Option<(&str, &[Sexp])> {
        self.list().and_then(|ss| {
            if !ss.is_empty() {
                if let Some(head) = ss[0].atom_s() {
                    return Some((head, &ss[1..]));
                }
            }
            None
        })
    }

    /// Return the name and indices if self is an indexed identifier
    /// `(_ name i1 .. in)`.
    ///
    /// Numerals parse as `(_ bvN width)`, so they come back as the name
    /// `bvN` with the single index `width`.
    pub fn indexed(&self) -> Option<(&str, Vec<usize>)> {
        let (head, args) = self.app()?;
        if head != "_" || args.is_empty() {
            return None;
        }
        let name = args[0].atom_s()?;
        let indices = args[1..]
            .iter()
            .map(|a| a.atom_i())
            .collect::<Option<Vec<_>>>()?;
        Some((name, indices))
    }
}

peg::parser! {
grammar smt() for str {
  rule ws() = quiet! { [' ' | '\t' | '\n' | '\r']* }

  rule symbol_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '~' | '!' | '@' | '$' | '%' | '^'
                        | '&' | '*' | '_' | '-' | '+' | '=' | '<' | '>' | '.' | '?' | '/'
                        | ':' | '#' | '\'']

  // a run of digits not followed by more symbol characters
  rule numeral() -> Atom
  = n:$(['0'..='9']+) !symbol_char() {? n.parse().map(Atom::I).or(Err("numeral")) }

  // simple symbols, keywords, and literals such as #b0101 or bv5
  rule symbol() -> Atom
  = s:$(symbol_char()+) { Atom::S(s.to_string()) }

  rule quoted() -> Atom
  = "|" s:$([^'|']*) "|" { Atom::S(s.to_string()) }
  / "\"" s:$([^'"']*) "\"" { Atom::S(s.to_string()) }

  rule comment() -> Sexp
  = ";" s:$([^'\n']*) "\n" { Sexp::Comment(s.to_string()) }

  rule list() -> Sexp
  = "(" ws() ss:(sexp() ** ws()) ws() ")" { Sexp::List(ss) }

  rule sexp() -> Sexp
  = a:(numeral() / symbol() / quoted()) { Sexp::Atom(a) }
  / comment()
  / list()

  /// One sexp, with optional surrounding whitespace.
  pub(super) rule one() -> Sexp
  = ws() s:sexp() ws() { s }

  /// A whitespace-separated sequence of sexps.
  pub(super) rule many() -> Vec<Sexp>
  = ws() ss:(sexp() ** ws()) ws() { ss }
}
}

/// Parse an sexp.
///
/// Allows whitespace before or after.
pub fn parse(s: &str) -> Result<Sexp, peg::error::ParseError<LineCol>> {
    smt::one(s)
}

/// Parse a sequence of sexps, separated by whitespace.
pub fn parse_many(s: &str) -> Result<Vec<Sexp>, peg::error::ParseError<LineCol>> {
    smt::many(s)
}

#[cfg(test)]
mod tests {
    use super::parse;
    use super::{app, atom_i, atom_s, indexed, sexp_l};

    #[test]
    fn test_parsing() {
        assert_eq!(
            parse("(foo  a (bar () 1))"),
            Ok(app(
                "foo",
                [atom_s("a"), app("bar", [sexp_l([]), atom_i(1)])]
            ))
        );
    }

    #[test]
    fn test_app_from_iterables() {
        let from_array = app("bvadd", [atom_s("x"), atom_i(1)]);
        let from_vec = app("bvadd", vec![atom_s("x"), atom_i(1)]);
        let from_iter = app("bvadd", ["x"].into_iter().map(atom_s).chain([atom_i(1)]));
        assert_eq!(from_array, from_vec);
        assert_eq!(from_array, from_iter);
        assert_eq!(from_array.app(), Some(("bvadd", &[atom_s("x"), atom_i(1)][..])));
        insta::assert_snapshot!(app("check-sat", []), @"(check-sat)");
    }

    #[test]
    fn test_printing() {
        let e = parse(
            r#"(assert (bvule x
            ; upper bound
            (_ bv10 4)))
            "#,
        )
        .unwrap();
        insta::assert_snapshot!(e, @r#"
        (assert (bvule x
        ; upper bound
        (_ bv10 4)))
        "#);
    }

    #[test]
    fn test_parsing_bv_literals() {
        let e = parse("((x #b0101) (y #x1f))").unwrap();
        assert_eq!(
            e,
            sexp_l([
                sexp_l([atom_s("x"), atom_s("#b0101")]),
                sexp_l([atom_s("y"), atom_s("#x1f")]),
            ])
        );
    }

    #[test]
    fn test_indexed() {
        let e = parse("((_ extract 3 3) x)").unwrap();
        let (head, _) = e.list().unwrap().split_first().unwrap();
        assert_eq!(head, &indexed("extract", [3, 3]));
        assert_eq!(head.indexed(), Some(("extract", vec![3, 3])));
        // (_ bv5 8) has a non-integer first index, which is part of the name
        let num = parse("(_ bv5 8)").unwrap();
        assert_eq!(num.indexed(), Some(("bv5", vec![8])));
        assert_eq!(atom_s("x").indexed(), None);
    }

    #[test]
    fn test_parsing_unusual_chars() {
        let s = vec![
            "(__dep@3 __dep@17)",
            "(_ bv18446744073709551616 80)",
            "<<DONE>>\n",
            "\n<<DONE>>\n",
            "(:reason-unknown \"timeout\")",
        ]
        .into_iter()
        .map(|s| parse(s).unwrap());
        let printed: Vec<String> = s.map(|s| s.to_string()).collect();
        insta::assert_snapshot!(printed.join("\n"), @r###"
        (__dep@3 __dep@17)
        (_ bv18446744073709551616 80)
        <<DONE>>
        <<DONE>>
        (:reason-unknown timeout)
        "###);
    }

    #[test]
    fn test_roundtrip_parsing() {
        let mut es = vec![];
        for s in [
            r#"  "hello there" "#,
            r#"|"hello"|"#,
            r#"|also has a space|"#,
            r#"(=> __dep@0 (not (= ((_ extract 2 2) x) (_ bv1 1))))"#,
        ] {
            let e = parse(s).unwrap_or_else(|_| panic!("`{s}` did not parse"));
            es.push(e.clone());
            assert_eq!(
                parse(&e.to_string()).unwrap(),
                e,
                "`{s}` does not roundtrip",
            );
        }
        insta::assert_snapshot!(&es[0], @"|hello there|");
        insta::assert_snapshot!(&es[1], @r#"|"hello"|"#);
        insta::assert_snapshot!(&es[2], @"|also has a space|");
    }
}

//! Criteria expression language.
//!
//! Expressions are method chains rooted at a single bound name, e.g.
//! `widget.size.gt(3).and(widget.name.startsWith('bolt'))` or `widget.size.desc()`.
//! The parser produces a typed AST; nothing is ever executed as code.

use crate::search::SortDirection;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "decimal",
            Literal::Str(_) => "string",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Int(n) => serde_json::Value::from(*n),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Dotted field path below the bound name (`widget.home.city` -> `["home", "city"]`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn parse(dotted: &str) -> Self {
        FieldPath(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Goe,
    Lt,
    Loe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TextOp {
    Like,
    Contains,
    StartsWith,
    EndsWith,
    EqualsIgnoreCase,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Predicate {
    Compare { path: FieldPath, op: CompareOp, value: Literal },
    Text { path: FieldPath, op: TextOp, value: String },
    In { path: FieldPath, values: Vec<Literal>, negated: bool },
    Between { path: FieldPath, low: Literal, high: Literal },
    IsNull { path: FieldPath, negated: bool },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Every field path referenced by this predicate, depth first.
    pub fn paths(&self) -> Vec<&FieldPath> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            Predicate::Compare { path, .. }
            | Predicate::Text { path, .. }
            | Predicate::In { path, .. }
            | Predicate::Between { path, .. }
            | Predicate::IsNull { path, .. } => out.push(path),
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().for_each(|p| p.collect_paths(out))
            }
            Predicate::Not(inner) => inner.collect_paths(out),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderSpecifier {
    pub path: FieldPath,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Path(FieldPath),
    Literal(Literal),
    Predicate(Predicate),
    Order(OrderSpecifier),
}

impl Expr {
    fn describe(&self) -> &'static str {
        match self {
            Expr::Path(_) => "field path",
            Expr::Literal(_) => "literal",
            Expr::Predicate(_) => "predicate",
            Expr::Order(_) => "order specifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '.' => {
                out.push((start, Token::Dot));
                i += 1;
            }
            ',' => {
                out.push((start, Token::Comma));
                i += 1;
            }
            '(' => {
                out.push((start, Token::LParen));
                i += 1;
            }
            ')' => {
                out.push((start, Token::RParen));
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ParseError(format!("unterminated string at {}", start))),
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| ParseError(format!("dangling escape at {}", i)))?;
                            s.push(*escaped);
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                    }
                }
                out.push((start, Token::Str(s)));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                i += 1;
                let mut is_float = false;
                while let Some(ch) = chars.get(i) {
                    if ch.is_ascii_digit() {
                        i += 1;
                    } else if *ch == '.' && !is_float && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                        is_float = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let token = if is_float {
                    Token::Float(text.parse().map_err(|_| ParseError(format!("bad number '{}'", text)))?)
                } else {
                    Token::Int(text.parse().map_err(|_| ParseError(format!("bad number '{}'", text)))?)
                };
                out.push((start, token));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '$')
                {
                    i += 1;
                }
                out.push((start, Token::Ident(chars[start..i].iter().collect())));
            }
            other => return Err(ParseError(format!("unexpected character '{}' at {}", other, start))),
        }
    }
    Ok(out)
}

/// Bound on nested method calls and on predicate tree depth.
pub const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    binding: &'a str,
    /// Chains currently open as method arguments.
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &str, binding: &'a str) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(src)?,
            pos: 0,
            binding,
            nesting: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(usize::MAX)
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        let at = self.offset();
        match self.next() {
            Some(t) if t == want => Ok(()),
            Some(t) => Err(ParseError(format!("expected {:?} at {}, found {:?}", want, at, t))),
            None => Err(ParseError(format!("expected {:?}, found end of input", want))),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Argument expression with its predicate depth (0 for literals, paths and orderings).
    fn arg(&mut self) -> Result<(Expr, usize)> {
        let at = self.offset();
        let literal = match self.peek().cloned() {
            Some(Token::Str(s)) => Literal::Str(s),
            Some(Token::Int(n)) => Literal::Int(n),
            Some(Token::Float(f)) => Literal::Float(f),
            Some(Token::Ident(id)) if id == "true" || id == "false" => Literal::Bool(id == "true"),
            Some(Token::Ident(id)) if id == "null" => Literal::Null,
            Some(Token::Ident(_)) => {
                self.nesting += 1;
                if self.nesting > MAX_NESTING {
                    return Err(ParseError(format!(
                        "expression nests deeper than {} calls at {}",
                        MAX_NESTING, at
                    )));
                }
                let chained = self.chain();
                self.nesting -= 1;
                return chained;
            }
            Some(t) => return Err(ParseError(format!("unexpected {:?} at {}", t, at))),
            None => return Err(ParseError("unexpected end of input".into())),
        };
        self.pos += 1;
        Ok((Expr::Literal(literal), 0))
    }

    fn chain(&mut self) -> Result<(Expr, usize)> {
        let at = self.offset();
        match self.next() {
            Some(Token::Ident(name)) if name == self.binding => {}
            Some(Token::Ident(name)) => {
                return Err(ParseError(format!(
                    "unknown name '{}' at {}; only '{}' is bound",
                    name, at, self.binding
                )))
            }
            other => return Err(ParseError(format!("expected '{}' at {}, found {:?}", self.binding, at, other))),
        }

        let mut value = Expr::Path(FieldPath(Vec::new()));
        let mut depth = 0;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let at = self.offset();
            let name = match self.next() {
                Some(Token::Ident(n)) => n,
                other => return Err(ParseError(format!("expected name at {}, found {:?}", at, other))),
            };
            if self.peek() == Some(&Token::LParen) {
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.arg()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                            continue;
                        }
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                let (applied, applied_depth) = apply_method(value, depth, &name, args)?;
                if applied_depth > MAX_NESTING {
                    return Err(ParseError(format!(
                        "predicate nests deeper than {} levels at {}",
                        MAX_NESTING, at
                    )));
                }
                value = applied;
                depth = applied_depth;
            } else {
                match &mut value {
                    Expr::Path(path) => path.0.push(name),
                    other => {
                        return Err(ParseError(format!(
                            "cannot access '{}' on a {}",
                            name,
                            other.describe()
                        )))
                    }
                }
            }
        }
        Ok((value, depth))
    }
}

fn literal_args(method: &str, args: Vec<Expr>) -> Result<Vec<Literal>> {
    args.into_iter()
        .map(|a| match a {
            Expr::Literal(l) => Ok(l),
            other => Err(ParseError(format!(
                "'{}' expects literal arguments, found {}",
                method,
                other.describe()
            ))),
        })
        .collect()
}

fn single_literal(method: &str, args: Vec<Expr>) -> Result<Literal> {
    let mut lits = literal_args(method, args)?;
    if lits.len() != 1 {
        return Err(ParseError(format!("'{}' expects exactly one argument", method)));
    }
    Ok(lits.remove(0))
}

fn no_args(method: &str, args: &[Expr]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ParseError(format!("'{}' takes no arguments", method)))
    }
}

/// Apply `method` to `target` (of predicate depth `depth`); returns the result and its depth.
fn apply_method(target: Expr, depth: usize, method: &str, args: Vec<(Expr, usize)>) -> Result<(Expr, usize)> {
    match target {
        Expr::Path(path) => {
            if path.0.is_empty() {
                return Err(ParseError(format!("'{}' needs a field, not the bare binding", method)));
            }
            let args = args.into_iter().map(|(a, _)| a).collect();
            let expr = path_method(path, method, args)?;
            let depth = usize::from(matches!(expr, Expr::Predicate(_)));
            Ok((expr, depth))
        }
        Expr::Predicate(pred) => predicate_method(pred, depth, method, args),
        other => Err(ParseError(format!("no method '{}' on a {}", method, other.describe()))),
    }
}

fn path_method(path: FieldPath, method: &str, args: Vec<Expr>) -> Result<Expr> {
    let compare = |op| -> Result<Expr> {
        Ok(Expr::Predicate(Predicate::Compare {
            path: path.clone(),
            op,
            value: single_literal(method, args.clone())?,
        }))
    };
    let text = |op| -> Result<Expr> {
        match single_literal(method, args.clone())? {
            Literal::Str(value) => Ok(Expr::Predicate(Predicate::Text {
                path: path.clone(),
                op,
                value,
            })),
            other => Err(ParseError(format!("'{}' expects a string, found {}", method, other.kind()))),
        }
    };
    match method {
        "eq" => compare(CompareOp::Eq),
        "ne" => compare(CompareOp::Ne),
        "gt" | "after" => compare(CompareOp::Gt),
        "goe" => compare(CompareOp::Goe),
        "lt" | "before" => compare(CompareOp::Lt),
        "loe" => compare(CompareOp::Loe),
        "like" => text(TextOp::Like),
        "contains" => text(TextOp::Contains),
        "startsWith" => text(TextOp::StartsWith),
        "endsWith" => text(TextOp::EndsWith),
        "equalsIgnoreCase" => text(TextOp::EqualsIgnoreCase),
        "in" | "notIn" => {
            let values = literal_args(method, args)?;
            if values.is_empty() {
                return Err(ParseError(format!("'{}' expects at least one value", method)));
            }
            Ok(Expr::Predicate(Predicate::In {
                path,
                values,
                negated: method == "notIn",
            }))
        }
        "between" => {
            let mut values = literal_args(method, args)?;
            if values.len() != 2 {
                return Err(ParseError("'between' expects two values".into()));
            }
            let high = values.remove(1);
            let low = values.remove(0);
            Ok(Expr::Predicate(Predicate::Between { path, low, high }))
        }
        "isNull" | "isNotNull" => {
            no_args(method, &args)?;
            Ok(Expr::Predicate(Predicate::IsNull {
                path,
                negated: method == "isNotNull",
            }))
        }
        "asc" | "desc" => {
            no_args(method, &args)?;
            Ok(Expr::Order(OrderSpecifier {
                path,
                direction: if method == "asc" {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                },
            }))
        }
        other => Err(ParseError(format!("unknown method '{}' on field '{}'", other, path))),
    }
}

fn predicate_method(pred: Predicate, depth: usize, method: &str, args: Vec<(Expr, usize)>) -> Result<(Expr, usize)> {
    match method {
        "and" | "or" => {
            if args.is_empty() {
                return Err(ParseError(format!("'{}' expects at least one predicate", method)));
            }
            let mut items = vec![(pred, depth)];
            for (a, d) in args {
                match a {
                    Expr::Predicate(p) => items.push((p, d)),
                    other => {
                        return Err(ParseError(format!(
                            "'{}' expects predicates, found {}",
                            method,
                            other.describe()
                        )))
                    }
                }
            }
            // Same-operator children are flattened, so their own children move up a level.
            let mut flattened = Vec::with_capacity(items.len());
            let mut child_depth = 0;
            for (p, d) in items {
                match (method, p) {
                    ("and", Predicate::And(inner)) | ("or", Predicate::Or(inner)) => {
                        child_depth = child_depth.max(d.saturating_sub(1));
                        flattened.extend(inner);
                    }
                    (_, p) => {
                        child_depth = child_depth.max(d);
                        flattened.push(p);
                    }
                }
            }
            let combined = if method == "and" {
                Predicate::And(flattened)
            } else {
                Predicate::Or(flattened)
            };
            Ok((Expr::Predicate(combined), child_depth + 1))
        }
        "not" => {
            if !args.is_empty() {
                return Err(ParseError(format!("'{}' takes no arguments", method)));
            }
            Ok((Expr::Predicate(Predicate::Not(Box::new(pred))), depth + 1))
        }
        other => Err(ParseError(format!("unknown method '{}' on a predicate", other))),
    }
}

/// Parse one expression rooted at `binding`.
pub fn parse_expression(src: &str, binding: &str) -> Result<Expr> {
    let mut parser = Parser::new(src, binding)?;
    let (expr, _) = parser.chain()?;
    if !parser.at_end() {
        return Err(ParseError(format!("unexpected trailing input at {}", parser.offset())));
    }
    Ok(expr)
}

pub fn parse_predicate(src: &str, binding: &str) -> Result<Predicate> {
    match parse_expression(src, binding)? {
        Expr::Predicate(p) => Ok(p),
        other => Err(ParseError(format!("expected a predicate, found {}", other.describe()))),
    }
}

/// Parse one or more comma-separated order specifiers.
pub fn parse_order(src: &str, binding: &str) -> Result<Vec<OrderSpecifier>> {
    let mut parser = Parser::new(src, binding)?;
    let mut out = Vec::new();
    loop {
        match parser.chain()?.0 {
            Expr::Order(o) => out.push(o),
            other => {
                return Err(ParseError(format!(
                    "expected an order specifier, found {}",
                    other.describe()
                )))
            }
        }
        if parser.peek() == Some(&Token::Comma) {
            parser.pos += 1;
            continue;
        }
        break;
    }
    if !parser.at_end() {
        return Err(ParseError(format!("unexpected trailing input at {}", parser.offset())));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> FieldPath {
        FieldPath::parse(p)
    }

    #[test]
    fn parses_simple_comparison() {
        let p = parse_predicate("widget.name.eq('bolt')", "widget").unwrap();
        assert_eq!(
            p,
            Predicate::Compare {
                path: path("name"),
                op: CompareOp::Eq,
                value: Literal::Str("bolt".into()),
            }
        );
    }

    #[test]
    fn parses_nested_path_and_chain() {
        let p = parse_predicate(
            "widget.home.city.eq(\"Oslo\").and(widget.size.goe(-2), widget.price.lt(9.5)).or(widget.active.eq(true))",
            "widget",
        )
        .unwrap();
        match p {
            Predicate::Or(items) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    Predicate::And(inner) => {
                        assert_eq!(inner.len(), 3);
                        assert_eq!(inner[0].paths()[0], &path("home.city"));
                    }
                    other => panic!("expected and, got {:?}", other),
                }
            }
            other => panic!("expected or, got {:?}", other),
        }
    }

    #[test]
    fn parses_in_between_null_and_not() {
        let p = parse_predicate("widget.size.in(1, 2, 3).and(widget.name.isNotNull().not())", "widget").unwrap();
        assert_eq!(p.paths().len(), 2);
        let b = parse_predicate("widget.size.between(1, 4)", "widget").unwrap();
        assert!(matches!(b, Predicate::Between { .. }));
    }

    #[test]
    fn parses_order_list() {
        let o = parse_order("widget.size.desc(), widget.name.asc()", "widget").unwrap();
        assert_eq!(o.len(), 2);
        assert_eq!(o[0].direction, SortDirection::Desc);
        assert_eq!(o[1].path, path("name"));
    }

    #[test]
    fn rejects_unbound_names_and_code() {
        assert!(parse_predicate("other.name.eq('x')", "widget").is_err());
        assert!(parse_predicate("widget.name.eq(System.exit(0))", "widget").is_err());
        assert!(parse_predicate("widget.name.eq('x'); drop", "widget").is_err());
        assert!(parse_predicate("widget.name.execute('x')", "widget").is_err());
        assert!(parse_predicate("widget.eq('x')", "widget").is_err());
    }

    #[test]
    fn rejects_wrong_kinds() {
        assert!(parse_predicate("widget.size.desc()", "widget").is_err());
        assert!(parse_order("widget.size.eq(1)", "widget").is_err());
        assert!(parse_predicate("widget.name.contains(3)", "widget").is_err());
        assert!(parse_predicate("widget.name.eq('unterminated)", "widget").is_err());
    }

    fn nested_and(levels: usize) -> String {
        let mut src = String::new();
        for _ in 0..levels {
            src.push_str("widget.size.eq(1).and(");
        }
        src.push_str("widget.size.eq(2)");
        src.push_str(&")".repeat(levels));
        src
    }

    #[test]
    fn bounds_negation_depth() {
        let base = "widget.name.eq('a')";
        let at_limit = format!("{}{}", base, ".not()".repeat(MAX_NESTING - 1));
        assert!(parse_predicate(&at_limit, "widget").is_ok());
        let over = format!("{}{}", base, ".not()".repeat(MAX_NESTING));
        assert!(parse_predicate(&over, "widget").unwrap_err().0.contains("nests deeper"));
        let huge = format!("{}{}", base, ".not()".repeat(20_000));
        assert!(parse_predicate(&huge, "widget").is_err());
    }

    #[test]
    fn bounds_argument_nesting() {
        assert!(parse_predicate(&nested_and(MAX_NESTING), "widget").is_ok());
        assert!(parse_predicate(&nested_and(MAX_NESTING + 1), "widget").unwrap_err().0.contains("nests deeper"));
        assert!(parse_predicate(&nested_and(3_000), "widget").is_err());
    }

    #[test]
    fn long_flat_conjunction_stays_shallow() {
        let src = format!("widget.size.eq(0){}", ".and(widget.size.eq(1))".repeat(500));
        match parse_predicate(&src, "widget").unwrap() {
            Predicate::And(items) => assert_eq!(items.len(), 501),
            other => panic!("expected and, got {:?}", other),
        }
    }
}

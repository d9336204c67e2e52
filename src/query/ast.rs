//! Expression tree produced by the filter parser
//!
//! Every node is immutable once built: fields are private and only exposed
//! through accessors. Children are owned, so a tree can be sent between
//! threads freely.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::query_string::lexer::{Lexer, Spanned, Token};
use crate::error::FilterError;
use crate::Result;

/// Comparison and text-search operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Contains,
    NotContains,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    TextSearch,
    ExcludeTextSearch,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::Contains,
        Operator::NotContains,
        Operator::LessThan,
        Operator::GreaterThan,
        Operator::LessOrEqual,
        Operator::GreaterOrEqual,
        Operator::TextSearch,
        Operator::ExcludeTextSearch,
    ];

    /// Symbol used in filter text and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Contains => "~",
            Operator::NotContains => "!~",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessOrEqual => "<=",
            Operator::GreaterOrEqual => ">=",
            Operator::TextSearch => "text_search",
            Operator::ExcludeTextSearch => "exclude_text_search",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == symbol)
    }

    /// Negated operators hold when no value satisfies the positive form
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Operator::NotEqual | Operator::NotContains | Operator::ExcludeTextSearch
        )
    }

    pub fn is_text_search(&self) -> bool {
        matches!(self, Operator::TextSearch | Operator::ExcludeTextSearch)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        "NOT"
    }
}

/// How the ids of a relevance expression should be looked up
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterIdsType {
    /// Numeric primary keys
    Id,
    /// Human-facing codes such as `PROGRAM-12`
    Slug,
}

impl FilterIdsType {
    /// `Id` when every id is numeric, `Slug` otherwise
    pub fn infer<S: AsRef<str>>(ids: &[S]) -> Self {
        if ids
            .iter()
            .all(|id| !id.as_ref().is_empty() && id.as_ref().bytes().all(|b| b.is_ascii_digit()))
        {
            FilterIdsType::Id
        } else {
            FilterIdsType::Slug
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterIdsType::Id => "id",
            FilterIdsType::Slug => "slug",
        }
    }
}

/// Right-hand side of a comparison
///
/// Numbers and dates keep the text they were written as, so rendering a
/// literal never changes it.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// Quoted string, escapes already resolved
    String(String),
    /// Bare word that is neither a number nor a date
    Word(String),
    Number { value: f64, raw: String },
    Date { value: NaiveDate, raw: String },
}

impl Literal {
    /// Classify a bare (unquoted) token
    pub fn classify(raw: &str) -> Self {
        if let Some(value) = parse_number(raw) {
            return Literal::Number {
                value,
                raw: raw.to_string(),
            };
        }
        if let Some(value) = parse_date(raw) {
            return Literal::Date {
                value,
                raw: raw.to_string(),
            };
        }
        Literal::Word(raw.to_string())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Literal::String(s.into())
    }

    /// The literal's text as the user wrote it (unescaped for strings)
    pub fn as_text(&self) -> &str {
        match self {
            Literal::String(s) | Literal::Word(s) => s,
            Literal::Number { raw, .. } | Literal::Date { raw, .. } => raw,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Word(_) => "word",
            Literal::Number { .. } => "number",
            Literal::Date { .. } => "date",
        }
    }

    /// Rebuild a literal from its text and kind name
    ///
    /// A `word` is classified like any bare token, so `("word", "42")` is a
    /// number.
    pub fn from_kind(kind: &str, text: &str) -> Result<Self> {
        let literal = match kind {
            "string" => Literal::String(text.to_string()),
            "word" => Literal::classify(text),
            "number" => {
                let value = parse_number(text).ok_or_else(|| {
                    FilterError::InvalidExpression(format!("'{}' is not a number", text))
                })?;
                Literal::Number {
                    value,
                    raw: text.to_string(),
                }
            }
            "date" => {
                let value = parse_date(text).ok_or_else(|| {
                    FilterError::InvalidExpression(format!("'{}' is not a date", text))
                })?;
                Literal::Date {
                    value,
                    raw: text.to_string(),
                }
            }
            other => {
                return Err(FilterError::InvalidExpression(format!(
                    "unknown literal kind '{}'",
                    other
                )))
            }
        };
        Ok(literal)
    }
}

/// Parse `-?digits(.digits)?`
///
/// `f64::from_str` also accepts `inf`, `NaN` and exponents, none of which a
/// user means as a number in a filter box.
pub fn parse_number(s: &str) -> Option<f64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return None;
    }
    s.parse().ok()
}

/// Parse ISO (`2024-01-31`) and US (`01/31/2024`) dates
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let shape_ok = |sep: char, lens: [usize; 3]| {
        let parts: Vec<&str> = s.split(sep).collect();
        parts.len() == 3
            && parts
                .iter()
                .zip(lens)
                .all(|(p, len)| p.len() == len && p.bytes().all(|b| b.is_ascii_digit()))
    };
    if shape_ok('-', [4, 2, 2]) {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    } else if shape_ok('/', [2, 2, 4]) {
        NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
    } else {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryExpression {
    op: LogicalOp,
    left: Box<Expression>,
    right: Box<Expression>,
}

impl BinaryExpression {
    pub fn op(&self) -> LogicalOp {
        self.op
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    pub fn right(&self) -> &Expression {
        &self.right
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    op: Operator,
    left: String,
    right: Literal,
}

impl Comparison {
    pub fn op(&self) -> Operator {
        self.op
    }

    /// Attribute path, possibly dotted (`person.email`)
    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &Literal {
        &self.right
    }

    /// Attribute path split on dots
    pub fn attribute_path(&self) -> impl Iterator<Item = &str> {
        self.left.split('.')
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryExpression {
    op: UnaryOp,
    operand: Box<Expression>,
}

impl UnaryExpression {
    pub fn op(&self) -> UnaryOp {
        self.op
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }
}

/// "Objects related to `object_name` with one of `ids`"
#[derive(Clone, Debug, PartialEq)]
pub struct RelevanceExpression {
    object_name: String,
    ids: Vec<String>,
    filter_ids_type: FilterIdsType,
}

impl RelevanceExpression {
    pub fn op(&self) -> &'static str {
        "relevant"
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn filter_ids_type(&self) -> FilterIdsType {
        self.filter_ids_type
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextSearch {
    op: Operator,
    text: String,
}

impl TextSearch {
    /// Either `TextSearch` or `ExcludeTextSearch`
    pub fn op(&self) -> Operator {
        self.op
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_exclusion(&self) -> bool {
        self.op == Operator::ExcludeTextSearch
    }
}

/// Root of a parsed filter
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Binary(BinaryExpression),
    Comparison(Comparison),
    Unary(UnaryExpression),
    Relevance(RelevanceExpression),
    TextSearch(TextSearch),
}

impl Expression {
    pub fn binary(op: LogicalOp, left: Expression, right: Expression) -> Self {
        Expression::Binary(BinaryExpression {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary(LogicalOp::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary(LogicalOp::Or, left, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expression) -> Self {
        Expression::Unary(UnaryExpression {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    /// Comparison between an attribute and a literal
    ///
    /// Text-search operators are accepted to keep the operator set closed,
    /// but [`Expression::text_search`] is the usual way to build those.
    pub fn comparison(left: impl Into<String>, op: Operator, right: Literal) -> Self {
        Expression::Comparison(Comparison {
            op,
            left: left.into(),
            right,
        })
    }

    pub fn text_search(text: impl Into<String>) -> Self {
        Expression::TextSearch(TextSearch {
            op: Operator::TextSearch,
            text: text.into(),
        })
    }

    pub fn exclude_text_search(text: impl Into<String>) -> Self {
        Expression::TextSearch(TextSearch {
            op: Operator::ExcludeTextSearch,
            text: text.into(),
        })
    }

    /// Relevance expression; the ids type is inferred from the ids
    pub fn relevant<I, S>(object_name: impl Into<String>, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let ids_type = FilterIdsType::infer(&ids);
        Self::relevant_with_type(object_name, ids, ids_type)
    }

    pub fn relevant_with_type(
        object_name: impl Into<String>,
        ids: Vec<String>,
        filter_ids_type: FilterIdsType,
    ) -> Result<Self> {
        let object_name = object_name.into();
        if object_name.trim().is_empty() {
            return Err(FilterError::InvalidExpression(
                "relevance expression needs an object name".to_string(),
            ));
        }
        if ids.is_empty() {
            return Err(FilterError::InvalidExpression(format!(
                "relevance to '{}' needs at least one id",
                object_name
            )));
        }
        Ok(Expression::Relevance(RelevanceExpression {
            object_name,
            ids,
            filter_ids_type,
        }))
    }

    /// Node kind name, for logging
    pub fn node_type(&self) -> &'static str {
        match self {
            Expression::Binary(_) => "binary",
            Expression::Comparison(_) => "comparison",
            Expression::Unary(_) => "unary",
            Expression::Relevance(_) => "relevance",
            Expression::TextSearch(_) => "text_search",
        }
    }

    /// Immediate children, left to right
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Binary(b) => vec![b.left(), b.right()],
            Expression::Unary(u) => vec![u.operand()],
            _ => vec![],
        }
    }

    /// Visit every node depth-first, parents before children
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expression)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Every attribute path named by a comparison in the tree
    pub fn attributes<'a>(&'a self) -> Vec<&'a str> {
        let mut attributes = Vec::new();
        self.walk(&mut |node: &'a Expression| {
            if let Expression::Comparison(c) = node {
                if !attributes.contains(&c.left()) {
                    attributes.push(c.left());
                }
            }
        });
        attributes
    }

    /// Every relevance node in the tree
    pub fn relevance_expressions<'a>(&'a self) -> Vec<&'a RelevanceExpression> {
        let mut found = Vec::new();
        self.walk(&mut |node: &'a Expression| {
            if let Expression::Relevance(r) = node {
                found.push(r);
            }
        });
        found
    }
}

/// Whether `s` has to be quoted to lex back as the same single word
pub(crate) fn needs_quoting(s: &str) -> bool {
    let mut lexer = Lexer::new(s);
    let single_word = matches!(
        lexer.next_token(),
        Ok(Spanned { token: Token::Word(ref w), .. }) if w == s
    ) && matches!(lexer.next_token(), Ok(Spanned { token: Token::Eof, .. }));
    !single_word
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

fn write_word(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if needs_quoting(s) {
        write_quoted(f, s)
    } else {
        f.write_str(s)
    }
}

/// Relevance parts split on `,` and end at `#`; bare parts are trimmed
fn write_relevance_part(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let bare = !s.is_empty()
        && s.trim() == s
        && !s.contains(&[',', '#', '"', '\\'][..]);
    if bare {
        f.write_str(s)
    } else {
        write_quoted(f, s)
    }
}

/// Renders the tree back to filter text. Binary and unary nodes are fully
/// parenthesized.
///
/// Trees from the parser, and trees built from the constructors and
/// [`Literal::classify`] / [`Literal::from_kind`], parse back to the same
/// tree. Filter text has no form for a few shapes the enum allows; these
/// render as their closest reading:
/// - a `Literal::Word` whose text reads as a number or date is quoted, and
///   comes back as a `Literal::String`
/// - a `Comparison` with a text-search operator renders as a text search
/// - a relevance `filter_ids_type` that differs from the one inferred from
///   the ids is not kept
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Binary(b) => {
                write!(f, "({} {} {})", b.left(), b.op().as_str(), b.right())
            }
            Expression::Unary(u) => write!(f, "NOT ({})", u.operand()),
            Expression::Comparison(c) if c.op().is_text_search() => {
                // No infix form exists for these; render the text-search prefix
                let prefix = if c.op() == Operator::TextSearch { "~" } else { "!~" };
                write!(f, "{} ", prefix)?;
                write_quoted(f, c.right().as_text())
            }
            Expression::Comparison(c) => {
                write_word(f, c.left())?;
                write!(f, " {} ", c.op())?;
                match c.right() {
                    Literal::String(s) => write_quoted(f, s),
                    Literal::Word(s) if !matches!(Literal::classify(s), Literal::Word(_)) => {
                        write_quoted(f, s)
                    }
                    other => write_word(f, other.as_text()),
                }
            }
            Expression::Relevance(r) => {
                f.write_str("#")?;
                write_relevance_part(f, r.object_name())?;
                for id in r.ids() {
                    f.write_str(",")?;
                    write_relevance_part(f, id)?;
                }
                f.write_str("#")
            }
            Expression::TextSearch(t) => {
                if t.is_exclusion() {
                    f.write_str("!~ ")?;
                }
                write_quoted(f, t.text())
            }
        }
    }
}

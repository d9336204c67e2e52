//! Recursive descent parser for filter expressions
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr? EOF
//! or_expr     := and_expr (OR and_expr)*
//! and_expr    := not_expr (AND not_expr)*
//! not_expr    := NOT not_expr | primary
//! primary     := '(' or_expr ')'
//!              | RELEVANCE
//!              | ('~' | '!~') words
//!              | value OPERATOR value
//!              | words
//! value       := WORD | QUOTED
//! words       := value+
//! ```
//!
//! Binary operators are left-associative. A run of words stops before a
//! word that is followed by an operator, so `foo bar` is one text search
//! while `foo AND bar = 1` is a text search AND-ed with a comparison.
//!
//! Each `(` and `NOT` opens one level of nesting, capped by
//! [`FilterConfig::max_depth`].

use super::lexer::{Lexer, Spanned, Token};
use crate::config::FilterConfig;
use crate::error::ParseError;
use crate::query::ast::{Expression, FilterIdsType, Literal, LogicalOp, Operator};
use tracing::debug;

// Token kind names reported in `ParseError::expected`
const EXPECT_OPEN: &str = "'('";
const EXPECT_CLOSE: &str = "')'";
const EXPECT_AND: &str = "AND";
const EXPECT_OR: &str = "OR";
const EXPECT_NOT: &str = "NOT";
const EXPECT_TEXT: &str = "attribute or text";
const EXPECT_VALUE: &str = "value";
const EXPECT_RELEVANCE: &str = "relevance block";
const EXPECT_CONTAINS: &str = "'~'";
const EXPECT_NOT_CONTAINS: &str = "'!~'";
const EXPECT_EOF: &str = "end of input";
const EXPECT_OBJECT: &str = "object name";
const EXPECT_ID: &str = "id";

/// Parse filter text with the default configuration
///
/// Empty or whitespace-only input yields `Ok(None)`, meaning "no filter".
pub fn parse(input: &str) -> Result<Option<Expression>, ParseError> {
    FilterParser::default().parse(input)
}

/// Parser for filter query strings
///
/// Holds only configuration; each call to [`FilterParser::parse`] works on
/// its own lexer, so one parser can be shared across threads.
#[derive(Clone, Debug, Default)]
pub struct FilterParser {
    config: FilterConfig,
}

impl FilterParser {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Parse the filter text into an expression tree
    pub fn parse(&self, input: &str) -> Result<Option<Expression>, ParseError> {
        let length = input.chars().count();
        if length > self.config.max_query_length {
            let err = ParseError::new(
                self.config.max_query_length + 1,
                &[EXPECT_EOF],
                format!("input longer than {} characters", self.config.max_query_length),
            );
            debug!(length, "filter rejected: {}", err);
            return Err(err);
        }

        let result = ExpressionParser::new(input, self.config.max_depth).and_then(|mut parser| parser.parse_query());
        match &result {
            Ok(Some(expr)) => debug!(root = expr.node_type(), "parsed filter"),
            Ok(None) => debug!("parsed empty filter"),
            Err(err) => debug!(column = err.column, "filter parse failed: {}", err),
        }
        result
    }
}

/// Single-use parser state over one input string
struct ExpressionParser {
    lexer: Lexer,
    current: Spanned,
    depth: usize,
    max_depth: usize,
}

impl ExpressionParser {
    fn new(input: &str, max_depth: usize) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
            max_depth,
        })
    }

    /// Parse: query := or_expr? EOF
    fn parse_query(&mut self) -> Result<Option<Expression>, ParseError> {
        if self.current.token == Token::Eof {
            return Ok(None);
        }

        let expr = self.parse_or_expr()?;

        // Ensure we've consumed all input
        if self.current.token != Token::Eof {
            return Err(self.unexpected(&[EXPECT_AND, EXPECT_OR, EXPECT_EOF]));
        }

        Ok(Some(expr))
    }

    /// Parse: or_expr := and_expr (OR and_expr)*
    fn parse_or_expr(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_and_expr()?;

        while self.current.token == Token::Or {
            self.advance()?;
            let right = self.parse_and_expr()?;
            expr = Expression::binary(LogicalOp::Or, expr, right);
        }

        Ok(expr)
    }

    /// Parse: and_expr := not_expr (AND not_expr)*
    fn parse_and_expr(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_not_expr()?;

        while self.current.token == Token::And {
            self.advance()?;
            let right = self.parse_not_expr()?;
            expr = Expression::binary(LogicalOp::And, expr, right);
        }

        Ok(expr)
    }

    /// Parse: not_expr := NOT not_expr | primary
    fn parse_not_expr(&mut self) -> Result<Expression, ParseError> {
        if self.current.token == Token::Not {
            self.descend()?;
            self.advance()?;
            let operand = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(Expression::not(operand));
        }
        self.parse_primary()
    }

    /// Parse: primary := grouped | relevance | text_op words | comparison | words
    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match &self.current.token {
            Token::LeftParen => {
                self.descend()?;
                self.advance()?; // consume '('
                let expr = self.parse_or_expr()?;
                if self.current.token != Token::RightParen {
                    return Err(self.unexpected(&[EXPECT_CLOSE, EXPECT_AND, EXPECT_OR]));
                }
                self.advance()?;
                self.depth -= 1;
                Ok(expr)
            }
            Token::Relevance(body) => {
                let body = body.clone();
                let column = self.current.column;
                self.advance()?;
                parse_relevance(&body, column)
            }
            Token::Operator(Operator::Contains) => {
                self.advance()?;
                Ok(Expression::text_search(self.parse_words()?))
            }
            Token::Operator(Operator::NotContains) => {
                self.advance()?;
                Ok(Expression::exclude_text_search(self.parse_words()?))
            }
            _ if self.current.token.is_value() => {
                if self.starts_comparison()? {
                    self.parse_comparison()
                } else {
                    Ok(Expression::text_search(self.parse_words()?))
                }
            }
            _ => Err(self.unexpected(&[
                EXPECT_OPEN,
                EXPECT_NOT,
                EXPECT_TEXT,
                EXPECT_RELEVANCE,
                EXPECT_CONTAINS,
                EXPECT_NOT_CONTAINS,
            ])),
        }
    }

    /// Parse: comparison := value OPERATOR value
    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let attribute = match self.take_value()? {
            Some((Token::Word(w), _)) | Some((Token::QuotedString(w), _)) => w,
            _ => return Err(self.unexpected(&[EXPECT_TEXT])),
        };

        let op = match self.current.token {
            Token::Operator(op) => op,
            _ => return Err(self.unexpected(&["operator"])),
        };
        self.advance()?;

        let literal = match self.take_value()? {
            Some((Token::QuotedString(s), _)) => Literal::String(s),
            Some((Token::Word(w), _)) => Literal::classify(&w),
            _ => return Err(self.unexpected(&[EXPECT_VALUE])),
        };

        Ok(Expression::comparison(attribute, op, literal))
    }

    /// Parse: words := value+, joined with single spaces
    fn parse_words(&mut self) -> Result<String, ParseError> {
        let mut words: Vec<String> = vec![];

        while self.current.token.is_value() {
            // The next word belongs to a following comparison
            if !words.is_empty() && self.starts_comparison()? {
                break;
            }
            match self.take_value()? {
                Some((Token::Word(w), _)) | Some((Token::QuotedString(w), _)) => words.push(w),
                _ => break,
            }
        }

        if words.is_empty() {
            return Err(self.unexpected(&[EXPECT_TEXT]));
        }
        Ok(words.join(" "))
    }

    /// Whether the current value token is followed by a comparison operator
    fn starts_comparison(&mut self) -> Result<bool, ParseError> {
        if !self.current.token.is_value() {
            return Ok(false);
        }
        let next = self.lexer.peek_token()?;
        Ok(matches!(next.token, Token::Operator(_)))
    }

    /// Consume the current token if it is a word or quoted string
    fn take_value(&mut self) -> Result<Option<(Token, usize)>, ParseError> {
        if !self.current.token.is_value() {
            return Ok(None);
        }
        let next = self.lexer.next_token()?;
        let taken = std::mem::replace(&mut self.current, next);
        Ok(Some((taken.token, taken.column)))
    }

    /// Enter one level of `(` or `NOT` nesting at the current token
    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::new(
                self.current.column,
                &[EXPECT_TEXT, EXPECT_RELEVANCE],
                format!("nesting deeper than {}", self.max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Advance to the next token
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn unexpected(&self, expected: &[&str]) -> ParseError {
        ParseError::new(self.current.column, expected, self.current.token.describe())
    }
}

/// Parse the body of `#Object,id,id#`
fn parse_relevance(body: &str, column: usize) -> Result<Expression, ParseError> {
    let mut parts = split_relevance(body).into_iter();
    let object_name = parts.next().unwrap_or_default();
    // Column just past the opening '#'
    let body_column = column + 1;

    if object_name.is_empty() {
        return Err(ParseError::new(
            body_column,
            &[EXPECT_OBJECT],
            format!("relevance block '#{}#'", body),
        ));
    }

    let ids: Vec<String> = parts.filter(|id| !id.is_empty()).collect();
    if ids.is_empty() {
        return Err(ParseError::new(
            body_column + body.chars().count(),
            &[EXPECT_ID],
            "'#'",
        ));
    }

    let ids_type = FilterIdsType::infer(&ids);
    Expression::relevant_with_type(object_name, ids, ids_type)
        .map_err(|e| ParseError::new(body_column, &[EXPECT_OBJECT], e.to_string()))
}

/// Split a relevance body on commas outside double quotes
///
/// Quoted text is unescaped and kept exactly; whitespace around it is not.
fn split_relevance(body: &str) -> Vec<String> {
    let mut parts = vec![];
    let mut part = String::new();
    let mut pending_space = String::new();
    let mut started = false;
    let mut in_quotes = false;
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => in_quotes = false,
                '\\' => part.extend(chars.next()),
                _ => part.push(ch),
            }
            continue;
        }
        match ch {
            ',' => {
                parts.push(std::mem::take(&mut part));
                pending_space.clear();
                started = false;
            }
            c if c.is_whitespace() => {
                if started {
                    pending_space.push(c);
                }
            }
            _ => {
                part.push_str(&pending_space);
                pending_space.clear();
                started = true;
                if ch == '"' {
                    in_quotes = true;
                } else {
                    part.push(ch);
                }
            }
        }
    }
    parts.push(part);
    parts
}

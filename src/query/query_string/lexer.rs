//! Lexer for filter query syntax
//!
//! Tokenizes filter text into a stream of tokens, each tagged with the
//! 1-based column it starts at.

use crate::error::ParseError;
use crate::query::ast::Operator;

/// Token types for filter parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An unquoted word (attribute name, bare value or search text)
    Word(String),
    /// A quoted string with escapes resolved
    QuotedString(String),
    /// Body of a `#Object,id,id#` relevance block
    Relevance(String),

    /// AND operator
    And,
    /// OR operator
    Or,
    /// NOT operator
    Not,

    /// Comparison operator
    Operator(Operator),

    /// Left parenthesis (grouping)
    LeftParen,
    /// Right parenthesis (grouping)
    RightParen,

    /// End of input
    Eof,
}

impl Token {
    /// Check if this token can be an attribute name or a value
    pub fn is_value(&self) -> bool {
        matches!(self, Token::Word(_) | Token::QuotedString(_))
    }

    /// Human-readable description, used in parse errors
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("word '{}'", w),
            Token::QuotedString(s) => format!("string \"{}\"", s),
            Token::Relevance(body) => format!("relevance block '#{}#'", body),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::Operator(op) => format!("operator '{}'", op),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// A token and the 1-based column where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub column: usize,
}

/// Lexer for tokenizing filter strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_whitespace();

        let column = self.column();
        if self.is_eof() {
            return Ok(Spanned {
                token: Token::Eof,
                column,
            });
        }

        let ch = self.current_char();
        let token = match ch {
            '(' => {
                self.advance();
                Token::LeftParen
            }
            ')' => {
                self.advance();
                Token::RightParen
            }
            '"' | '\'' => {
                self.advance();
                self.read_quoted_string(ch)?
            }
            '#' => {
                self.advance();
                self.read_relevance(column)?
            }
            '=' => {
                self.advance();
                Token::Operator(Operator::Equal)
            }
            '~' => {
                self.advance();
                Token::Operator(Operator::Contains)
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    Token::Operator(Operator::LessOrEqual)
                } else {
                    Token::Operator(Operator::LessThan)
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    Token::Operator(Operator::GreaterOrEqual)
                } else {
                    Token::Operator(Operator::GreaterThan)
                }
            }
            '!' if self.peek() == Some('=') => {
                self.position += 2;
                Token::Operator(Operator::NotEqual)
            }
            '!' if self.peek() == Some('~') => {
                self.position += 2;
                Token::Operator(Operator::NotContains)
            }
            _ => self.read_word(),
        };

        Ok(Spanned { token, column })
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<Spanned, ParseError> {
        let saved_position = self.position;
        let token = self.next_token();
        self.position = saved_position;
        token
    }

    /// Check if the lexer has reached the end of input
    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    /// 1-based column of the current position
    pub fn column(&self) -> usize {
        self.position + 1
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while !self.is_eof() && !self.at_word_boundary() {
            word.push(self.current_char());
            self.advance();
        }

        // Keywords are case-insensitive
        match word.to_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        }
    }

    fn read_quoted_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let mut s = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            self.advance();
            if ch == quote {
                return Ok(Token::QuotedString(s));
            }
            if ch == '\\' && !self.is_eof() {
                let escaped = self.current_char();
                self.advance();
                match escaped {
                    '"' | '\'' | '\\' => s.push(escaped),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    _ => {
                        s.push('\\');
                        s.push(escaped);
                    }
                }
            } else {
                s.push(ch);
            }
        }

        let closing = if quote == '"' { "'\"'" } else { "'''" };
        Err(ParseError::new(self.column(), &[closing], "end of input"))
    }

    /// Read up to the closing `#`. Double-quoted parts may hold `#` and `,`;
    /// they are kept verbatim, escapes included, for the parser to split.
    fn read_relevance(&mut self, start_column: usize) -> Result<Token, ParseError> {
        let mut body = String::new();
        let mut in_quotes = false;

        while !self.is_eof() {
            let ch = self.current_char();
            self.advance();
            match ch {
                '#' if !in_quotes => return Ok(Token::Relevance(body)),
                '"' => in_quotes = !in_quotes,
                '\\' if in_quotes && !self.is_eof() => {
                    body.push(ch);
                    body.push(self.current_char());
                    self.advance();
                    continue;
                }
                _ => {}
            }
            body.push(ch);
        }

        tracing::trace!(start_column, "unterminated relevance block");
        Err(ParseError::new(self.column(), &["'#'"], "end of input"))
    }

    /// Words end at whitespace, grouping, quotes and operator characters.
    /// A lone `!` not followed by `=` or `~` stays part of the word, and so
    /// does `#`, which only opens a relevance block at the start of a token.
    fn at_word_boundary(&self) -> bool {
        match self.current_char() {
            c if c.is_whitespace() => true,
            '(' | ')' | '"' | '=' | '~' | '<' | '>' => true,
            '!' => matches!(self.peek(), Some('=') | Some('~')),
            _ => false,
        }
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if !self.is_eof() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = vec![];
        loop {
            let spanned = lexer.next_token().unwrap();
            if spanned.token == Token::Eof {
                return out;
            }
            out.push(spanned.token);
        }
    }

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(
            tokens("title = Foo"),
            vec![word("title"), Token::Operator(Operator::Equal), word("Foo")]
        );
    }

    #[test]
    fn test_operators_without_spaces() {
        assert_eq!(
            tokens("a!=1 b!~2 c<=3 d>=4 e<5 f>6 g~7"),
            vec![
                word("a"),
                Token::Operator(Operator::NotEqual),
                word("1"),
                word("b"),
                Token::Operator(Operator::NotContains),
                word("2"),
                word("c"),
                Token::Operator(Operator::LessOrEqual),
                word("3"),
                word("d"),
                Token::Operator(Operator::GreaterOrEqual),
                word("4"),
                word("e"),
                Token::Operator(Operator::LessThan),
                word("5"),
                word("f"),
                Token::Operator(Operator::GreaterThan),
                word("6"),
                word("g"),
                Token::Operator(Operator::Contains),
                word("7"),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_keywords() {
        assert_eq!(
            tokens("a and b Or c NOT d"),
            vec![
                word("a"),
                Token::And,
                word("b"),
                Token::Or,
                word("c"),
                Token::Not,
                word("d")
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_a_word() {
        assert_eq!(tokens("ANDROID orange"), vec![word("ANDROID"), word("orange")]);
    }

    #[test]
    fn test_quoted_string_escaped() {
        assert_eq!(
            tokens(r#""hello \"world\"""#),
            vec![Token::QuotedString("hello \"world\"".to_string())]
        );
    }

    #[test]
    fn test_single_quoted_string() {
        assert_eq!(
            tokens(r"'it\'s'"),
            vec![Token::QuotedString("it's".to_string())]
        );
    }

    #[test]
    fn test_quoted_keyword_is_literal() {
        assert_eq!(tokens("\"and\""), vec![Token::QuotedString("and".to_string())]);
    }

    #[test]
    fn test_dotted_attribute_and_dates() {
        assert_eq!(
            tokens("person.email 2024-01-15 01/15/2024"),
            vec![word("person.email"), word("2024-01-15"), word("01/15/2024")]
        );
    }

    #[test]
    fn test_bang_inside_word() {
        assert_eq!(tokens("wow! x"), vec![word("wow!"), word("x")]);
    }

    #[test]
    fn test_relevance_block() {
        assert_eq!(
            tokens("#Program,1,2#"),
            vec![Token::Relevance("Program,1,2".to_string())]
        );
    }

    #[test]
    fn test_relevance_block_with_quoted_parts() {
        assert_eq!(
            tokens(r##"#Program,"a#b","c\"d"# x"##),
            vec![
                Token::Relevance(r#"Program,"a#b","c\"d""#.to_string()),
                word("x")
            ]
        );
    }

    #[test]
    fn test_hash_inside_word() {
        assert_eq!(
            tokens("C# developer #Program,1#"),
            vec![
                word("C#"),
                word("developer"),
                Token::Relevance("Program,1".to_string())
            ]
        );
    }

    #[test]
    fn test_grouping() {
        assert_eq!(
            tokens("(a OR b)"),
            vec![Token::LeftParen, word("a"), Token::Or, word("b"), Token::RightParen]
        );
    }

    #[test]
    fn test_columns_are_one_based() {
        let mut lexer = Lexer::new("  a = (1");
        let columns: Vec<usize> = (0..5).map(|_| lexer.next_token().unwrap().column).collect();
        assert_eq!(columns, vec![3, 5, 7, 8, 9]);
    }

    #[test]
    fn test_columns_count_characters() {
        let mut lexer = Lexer::new("é = x");
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap().column, 3);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("a = 1");
        assert_eq!(lexer.peek_token().unwrap().token, word("a"));
        assert_eq!(lexer.next_token().unwrap().token, word("a"));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"unterminated");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.column, 14);
        assert!(err.expects("'\"'"));
    }

    #[test]
    fn test_unterminated_relevance() {
        let mut lexer = Lexer::new("#Program,1");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.column, 11);
        assert!(err.expects("'#'"));
    }
}

//! Découpage lexical des critères de recherche ContentDirectory.

use super::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    DoesNotContain,
    DerivedFrom,
    StartsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
            Operator::DerivedFrom => "derivedfrom",
            Operator::StartsWith => "startswith",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Property(String),
    Quoted(String),
    Operator(Operator),
    Exists,
    Boolean(bool),
    And,
    Or,
    LParen,
    RParen,
    Star,
    Eof,
}

pub(super) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.next_char();
        }
    }

    fn is_word_char(ch: char) -> bool {
        ch.is_alphanumeric() || matches!(ch, ':' | '@' | '_' | '.' | '-')
    }

    fn read_word(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek_char().is_some_and(Self::is_word_char) {
            self.next_char();
        }
        &self.input[start..self.pos]
    }

    /// Chaîne entre guillemets doubles ; seuls `\"` et `\\` sont des
    /// échappements.
    fn read_quoted(&mut self, start: usize) -> Result<String, SearchError> {
        self.next_char();
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('"') => return Ok(value),
                Some('\\') => match self.next_char() {
                    Some(c @ ('"' | '\\')) => value.push(c),
                    Some(c) => {
                        return Err(SearchError::new(
                            self.pos - c.len_utf8(),
                            format!("invalid escape sequence '\\{}'", c),
                        ));
                    }
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(SearchError::new(start, "unterminated string"))
    }

    /// Retourne le prochain token et sa position de départ.
    pub fn next_token(&mut self) -> Result<(usize, Token), SearchError> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(ch) = self.peek_char() else {
            return Ok((start, Token::Eof));
        };

        let token = match ch {
            '(' => {
                self.next_char();
                Token::LParen
            }
            ')' => {
                self.next_char();
                Token::RParen
            }
            '*' => {
                self.next_char();
                Token::Star
            }
            '"' => Token::Quoted(self.read_quoted(start)?),
            '=' => {
                self.next_char();
                Token::Operator(Operator::Eq)
            }
            '!' => {
                self.next_char();
                if self.peek_char() != Some('=') {
                    return Err(SearchError::new(start, "expected '=' after '!'"));
                }
                self.next_char();
                Token::Operator(Operator::Ne)
            }
            '<' | '>' => {
                self.next_char();
                let or_equal = self.peek_char() == Some('=');
                if or_equal {
                    self.next_char();
                }
                Token::Operator(match (ch, or_equal) {
                    ('<', false) => Operator::Lt,
                    ('<', true) => Operator::Le,
                    (_, false) => Operator::Gt,
                    (_, true) => Operator::Ge,
                })
            }
            c if Self::is_word_char(c) => {
                let word = self.read_word();
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "exists" => Token::Exists,
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "contains" => Token::Operator(Operator::Contains),
                    "doesnotcontain" => Token::Operator(Operator::DoesNotContain),
                    "derivedfrom" => Token::Operator(Operator::DerivedFrom),
                    "startswith" => Token::Operator(Operator::StartsWith),
                    _ => Token::Property(word.to_string()),
                }
            }
            other => {
                return Err(SearchError::new(
                    start,
                    format!("unexpected character '{}'", other),
                ));
            }
        };

        Ok((start, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let (_, token) = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_tokens() {
        assert_eq!(
            tokens(r#"upnp:class derivedfrom "object.item" and res@size >= "10""#),
            vec![
                Token::Property("upnp:class".into()),
                Token::Operator(Operator::DerivedFrom),
                Token::Quoted("object.item".into()),
                Token::And,
                Token::Property("res@size".into()),
                Token::Operator(Operator::Ge),
                Token::Quoted("10".into()),
            ]
        );
        assert_eq!(
            tokens("(@refID exists FALSE)"),
            vec![
                Token::LParen,
                Token::Property("@refID".into()),
                Token::Exists,
                Token::Boolean(false),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            tokens(r#""say \"hi\" \\ bye""#),
            vec![Token::Quoted(r#"say "hi" \ bye"#.into())]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let mut lexer = Lexer::new(r#"dc:title = "open"#);
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.position, 11);

        let mut lexer = Lexer::new("a ! b");
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap_err().position, 2);

        let mut lexer = Lexer::new("#");
        assert!(lexer.next_token().is_err());
    }
}

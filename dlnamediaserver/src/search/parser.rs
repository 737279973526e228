//! Parser à descente récursive.

use super::lexer::{Lexer, Token};
use super::{SearchError, SearchExpr};

/// Nombre maximal de parenthèses imbriquées.
pub const MAX_DEPTH: usize = 32;

pub(super) struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, SearchError> {
        let mut lexer = Lexer::new(input);
        let (position, current) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            position,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<Token, SearchError> {
        let (position, next) = self.lexer.next_token()?;
        self.position = position;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn error(&self, message: impl Into<String>) -> SearchError {
        SearchError::new(self.position, message)
    }

    pub fn parse(mut self) -> Result<SearchExpr, SearchError> {
        let expr = match self.current {
            Token::Star => {
                self.advance()?;
                SearchExpr::All
            }
            Token::Eof => return Err(self.error("empty search criteria")),
            _ => self.parse_or()?,
        };

        if self.current != Token::Eof {
            return Err(self.error(format!("unexpected token {:?}", self.current)));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<SearchExpr, SearchError> {
        let mut terms = vec![self.parse_and()?];
        while self.current == Token::Or {
            self.advance()?;
            terms.push(self.parse_and()?);
        }
        Ok(fold(terms, SearchExpr::Or))
    }

    fn parse_and(&mut self) -> Result<SearchExpr, SearchError> {
        let mut terms = vec![self.parse_primary()?];
        while self.current == Token::And {
            self.advance()?;
            terms.push(self.parse_primary()?);
        }
        Ok(fold(terms, SearchExpr::And))
    }

    fn parse_primary(&mut self) -> Result<SearchExpr, SearchError> {
        match self.current.clone() {
            Token::LParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(self.error(format!(
                        "parentheses nested deeper than {} levels",
                        MAX_DEPTH
                    )));
                }
                self.depth += 1;
                self.advance()?;
                let expr = self.parse_or()?;
                if self.current != Token::RParen {
                    return Err(self.error("expected ')'"));
                }
                self.advance()?;
                self.depth -= 1;
                Ok(expr)
            }
            Token::Property(property) => {
                self.advance()?;
                self.parse_relation(property)
            }
            Token::Eof => Err(self.error("unexpected end of criteria")),
            other => Err(self.error(format!("expected a property, found {:?}", other))),
        }
    }

    fn parse_relation(&mut self, property: String) -> Result<SearchExpr, SearchError> {
        match self.current {
            Token::Operator(op) => {
                self.advance()?;
                let Token::Quoted(value) = self.current.clone() else {
                    return Err(self.error("expected a quoted value"));
                };
                self.advance()?;
                Ok(SearchExpr::Compare {
                    property,
                    op,
                    value,
                })
            }
            Token::Exists => {
                self.advance()?;
                let Token::Boolean(exists) = self.current else {
                    return Err(self.error("expected 'true' or 'false' after 'exists'"));
                };
                self.advance()?;
                Ok(SearchExpr::Exists { property, exists })
            }
            _ => Err(self.error(format!("expected an operator after '{}'", property))),
        }
    }
}

/// Un seul terme reste tel quel, plusieurs forment une liste plate.
fn fold(mut terms: Vec<SearchExpr>, combine: fn(Vec<SearchExpr>) -> SearchExpr) -> SearchExpr {
    if terms.len() == 1 {
        terms.swap_remove(0)
    } else {
        combine(terms)
    }
}

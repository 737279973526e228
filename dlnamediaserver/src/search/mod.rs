//! # Critères de recherche ContentDirectory
//!
//! Grammaire de `SearchCriteria` (UPnP CDS §2.3.13) :
//!
//! ```text
//! searchCrit ::= searchExp | '*'
//! searchExp  ::= relExp | searchExp 'and' searchExp | searchExp 'or' searchExp
//!              | '(' searchExp ')'
//! relExp     ::= property binOp quotedVal | property 'exists' boolVal
//! ```
//!
//! `and` est prioritaire sur `or`. Le parser est total : il retourne soit un
//! [`SearchExpr`], soit une [`SearchError`] positionnée. Les chaînes
//! `a and b and c` sont aplaties en une seule liste de termes et l'imbrication
//! des parenthèses est limitée à [`MAX_DEPTH`] niveaux : la profondeur de
//! l'arbre reste bornée quelle que soit la taille du critère.
//!
//! ```
//! use dlnamediaserver::search::SearchExpr;
//!
//! let expr = SearchExpr::parse(r#"upnp:class derivedfrom "object.item.audioItem" and dc:title contains "blue""#).unwrap();
//! assert_eq!(expr.properties(), vec!["upnp:class", "dc:title"]);
//! ```

mod eval;
mod lexer;
mod parser;

use std::fmt;

use thiserror::Error;

pub use lexer::Operator;
pub use parser::MAX_DEPTH;
pub(crate) use eval::order as compare_values;

/// Erreur de syntaxe, avec la position (en octets) du token fautif.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Search criteria error at position {position}: {message}")]
pub struct SearchError {
    pub position: usize,
    pub message: String,
}

impl SearchError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Arbre d'un critère de recherche.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchExpr {
    /// `*`
    All,
    Compare {
        property: String,
        op: Operator,
        value: String,
    },
    Exists {
        property: String,
        exists: bool,
    },
    /// Conjonction d'au moins deux termes.
    And(Vec<SearchExpr>),
    /// Disjonction d'au moins deux termes.
    Or(Vec<SearchExpr>),
}

impl SearchExpr {
    pub fn parse(criteria: &str) -> Result<Self, SearchError> {
        parser::Parser::new(criteria)?.parse()
    }

    /// Propriétés référencées, dans l'ordre d'apparition, sans doublon.
    pub fn properties(&self) -> Vec<&str> {
        let mut props = Vec::new();
        self.collect_properties(&mut props);
        props
    }

    fn collect_properties<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SearchExpr::All => {}
            SearchExpr::Compare { property, .. } | SearchExpr::Exists { property, .. } => {
                if !out.contains(&property.as_str()) {
                    out.push(property);
                }
            }
            SearchExpr::And(terms) | SearchExpr::Or(terms) => {
                for term in terms {
                    term.collect_properties(out);
                }
            }
        }
    }
}

impl fmt::Display for SearchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchExpr::All => write!(f, "*"),
            SearchExpr::Compare {
                property,
                op,
                value,
            } => {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "{} {} \"{}\"", property, op.as_str(), escaped)
            }
            SearchExpr::Exists { property, exists } => {
                write!(f, "{} exists {}", property, exists)
            }
            SearchExpr::And(terms) => write_joined(f, terms, "and"),
            SearchExpr::Or(terms) => write_joined(f, terms, "or"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[SearchExpr], keyword: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", keyword)?;
        }
        write!(f, "{}", term)?;
    }
    write!(f, ")")
}

//! The write statements issued against the graph store
//!
//! The migration only ever sends four statement shapes: a constraint
//! declaration, a full-graph delete, a film upsert and a relationship
//! upsert. Each variant renders to parameterized Cypher for the network
//! backends and is applied structurally by the embedded one.

use crate::graph::{EdgeType, Label, PropertyValue};
use crate::normalize::FilmAttributes;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Named statement parameters, in binding order
pub type Params = IndexMap<String, PropertyValue>;

#[derive(Error, Debug, PartialEq)]
pub enum StatementError {
    #[error("Invalid identifier {0:?}: expected letters, digits and underscores")]
    InvalidIdentifier(String),
}

pub const DELETE_ALL: &str = "MATCH (n) DETACH DELETE n";

pub const UPSERT_FILM: &str = "MERGE (f:Film {id: $id}) \
SET f.title = $title, f.year = $year, f.votes = $votes, f.revenue = $revenue, \
f.rating = $rating, f.metascore = $metascore, f.runtime = $runtime";

pub const MERGE_DIRECTOR: &str =
    "MERGE (d:Director {name: $director}) MERGE (f:Film {id: $id}) MERGE (d)-[:DIRECTED]->(f)";

pub const MERGE_ACTOR: &str =
    "MERGE (a:Actor {name: $actor}) MERGE (f:Film {id: $id}) MERGE (a)-[:ACTED_IN]->(f)";

pub const MERGE_GENRE: &str =
    "MERGE (g:Genre {name: $genre}) MERGE (f:Film {id: $id}) MERGE (f)-[:HAS_GENRE]->(g)";

/// Which side of a relationship upsert the person or genre sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `(:Director)-[:DIRECTED]->(:Film)`
    Director,
    /// `(:Actor)-[:ACTED_IN]->(:Film)`
    Actor,
    /// `(:Film)-[:HAS_GENRE]->(:Genre)`
    Genre,
}

impl Link {
    pub fn label(&self) -> &'static str {
        match self {
            Link::Director => Label::DIRECTOR,
            Link::Actor => Label::ACTOR,
            Link::Genre => Label::GENRE,
        }
    }

    pub fn edge_type(&self) -> &'static str {
        match self {
            Link::Director => EdgeType::DIRECTED,
            Link::Actor => EdgeType::ACTED_IN,
            Link::Genre => EdgeType::HAS_GENRE,
        }
    }

    /// Whether the edge points from the film to the linked node
    pub fn outgoing_from_film(&self) -> bool {
        matches!(self, Link::Genre)
    }

    fn param_name(&self) -> &'static str {
        match self {
            Link::Director => "director",
            Link::Actor => "actor",
            Link::Genre => "genre",
        }
    }

    fn cypher(&self) -> &'static str {
        match self {
            Link::Director => MERGE_DIRECTOR,
            Link::Actor => MERGE_ACTOR,
            Link::Genre => MERGE_GENRE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Idempotent uniqueness constraint on `label.property`
    CreateConstraint { label: String, property: String },
    /// Remove every node and relationship
    DeleteAll,
    /// Merge `Film{id}` and overwrite its scalar attributes
    UpsertFilm(Box<FilmAttributes>),
    /// Merge the named node, the film, and the relationship between them
    MergeLink { link: Link, film_id: String, name: String },
}

impl Statement {
    /// Build a constraint declaration, rejecting anything that is not a
    /// plain identifier since labels and property names cannot be bound as
    /// parameters.
    pub fn create_constraint(label: &str, property: &str) -> Result<Self, StatementError> {
        for ident in [label, property] {
            if !identifier_pattern().is_match(ident) {
                return Err(StatementError::InvalidIdentifier(ident.to_string()));
            }
        }
        Ok(Statement::CreateConstraint {
            label: label.to_string(),
            property: property.to_string(),
        })
    }

    pub fn upsert_film(film: &FilmAttributes) -> Self {
        Statement::UpsertFilm(Box::new(film.clone()))
    }

    pub fn merge_link(link: Link, film_id: &str, name: &str) -> Self {
        Statement::MergeLink {
            link,
            film_id: film_id.to_string(),
            name: name.to_string(),
        }
    }

    /// Short name for logs and error context
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateConstraint { .. } => "create-constraint",
            Statement::DeleteAll => "delete-all",
            Statement::UpsertFilm(_) => "upsert-film",
            Statement::MergeLink { link: Link::Director, .. } => "merge-director",
            Statement::MergeLink { link: Link::Actor, .. } => "merge-actor",
            Statement::MergeLink { link: Link::Genre, .. } => "merge-genre",
        }
    }

    pub fn cypher(&self) -> String {
        match self {
            Statement::CreateConstraint { label, property } => format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                label, property
            ),
            Statement::DeleteAll => DELETE_ALL.to_string(),
            Statement::UpsertFilm(_) => UPSERT_FILM.to_string(),
            Statement::MergeLink { link, .. } => link.cypher().to_string(),
        }
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        match self {
            Statement::CreateConstraint { .. } | Statement::DeleteAll => {}
            Statement::UpsertFilm(film) => {
                params.insert("id".to_string(), film.id.as_str().into());
                params.insert("title".to_string(), film.title.as_str().into());
                params.insert("year".to_string(), film.year.into());
                params.insert("votes".to_string(), film.votes.into());
                params.insert("revenue".to_string(), film.revenue.into());
                params.insert("rating".to_string(), film.rating.to_property());
                params.insert("metascore".to_string(), film.metascore.into());
                params.insert("runtime".to_string(), film.runtime.into());
            }
            Statement::MergeLink { link, film_id, name } => {
                params.insert(link.param_name().to_string(), name.as_str().into());
                params.insert("id".to_string(), film_id.as_str().into());
            }
        }
        params
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, Rating};
    use crate::source::SourceRecord;
    use serde_json::json;

    #[test]
    fn test_constraint_rendering() {
        let stmt = Statement::create_constraint("Film", "id").unwrap();
        assert_eq!(
            stmt.cypher(),
            "CREATE CONSTRAINT IF NOT EXISTS FOR (n:Film) REQUIRE n.id IS UNIQUE"
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_constraint_rejects_injection() {
        let err = Statement::create_constraint("Film) DETACH DELETE (n", "id").unwrap_err();
        assert!(matches!(err, StatementError::InvalidIdentifier(_)));
        assert!(Statement::create_constraint("Film", "").is_err());
        assert!(Statement::create_constraint("1Film", "id").is_err());
    }

    #[test]
    fn test_film_params() {
        let record = SourceRecord::from_value(json!({"_id": "1", "title": "X", "year": "1999"})).unwrap();
        let film = normalize(&record);
        let stmt = Statement::upsert_film(&film);
        let params = stmt.params();

        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["id", "title", "year", "votes", "revenue", "rating", "metascore", "runtime"]
        );
        assert_eq!(params["year"], PropertyValue::Integer(1999));
        assert_eq!(params["rating"], Rating::Unrated.to_property());
        for key in keys {
            assert!(stmt.cypher().contains(&format!("${}", key)));
        }
    }

    #[test]
    fn test_link_params() {
        let stmt = Statement::merge_link(Link::Actor, "1", "Meg Ryan");
        assert_eq!(stmt.kind(), "merge-actor");
        assert_eq!(stmt.params()["actor"], PropertyValue::from("Meg Ryan"));
        assert_eq!(stmt.params()["id"], PropertyValue::from("1"));
        assert!(stmt.cypher().contains("[:ACTED_IN]"));

        let stmt = Statement::merge_link(Link::Genre, "1", "Drama");
        assert!(stmt.cypher().contains("(f)-[:HAS_GENRE]->(g)"));
        assert!(Link::Genre.outgoing_from_film());
        assert!(!Link::Director.outgoing_from_film());
    }
}

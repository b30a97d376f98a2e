//! Graph upsert engine
//!
//! Writes one normalized film as a sequence of merge statements: the film
//! itself, then its director, genres and actors. Each statement is its own
//! unit of work, so a failure part way through leaves the earlier merges in
//! place. Re-running the same film converges to the same graph.

use thiserror::Error;
use tracing::trace;

use crate::normalize::FilmAttributes;
use crate::session::{GraphSession, SessionError};
use crate::statement::{Link, Statement};

#[derive(Error, Debug)]
#[error("Failed to upsert film {film_id:?} at {step}: {source}")]
pub struct UpsertError {
    pub film_id: String,
    /// Statement kind that failed (e.g. `merge-actor`)
    pub step: &'static str,
    #[source]
    pub source: SessionError,
}

pub type UpsertResult<T> = Result<T, UpsertError>;

/// What a single film upsert wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub film_id: String,
    pub director: bool,
    pub genres: usize,
    pub actors: usize,
}

impl UpsertOutcome {
    /// Statements issued, the film upsert included
    pub fn statements(&self) -> usize {
        1 + usize::from(self.director) + self.genres + self.actors
    }
}

/// The ordered statements that write `film`
pub fn plan(film: &FilmAttributes) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(2 + film.genres.len() + film.actors.len());
    statements.push(Statement::upsert_film(film));
    if let Some(director) = &film.director {
        statements.push(Statement::merge_link(Link::Director, &film.id, director));
    }
    for genre in &film.genres {
        statements.push(Statement::merge_link(Link::Genre, &film.id, genre));
    }
    for actor in &film.actors {
        statements.push(Statement::merge_link(Link::Actor, &film.id, actor));
    }
    statements
}

/// Write one film, stopping at the first failed statement
pub async fn upsert_film(session: &dyn GraphSession, film: &FilmAttributes) -> UpsertResult<UpsertOutcome> {
    let mut outcome = UpsertOutcome {
        film_id: film.id.clone(),
        ..Default::default()
    };

    for statement in plan(film) {
        session.run(&statement).await.map_err(|source| UpsertError {
            film_id: film.id.clone(),
            step: statement.kind(),
            source,
        })?;
        trace!("{} for film {:?}", statement.kind(), film.id);

        match &statement {
            Statement::MergeLink { link: Link::Director, .. } => outcome.director = true,
            Statement::MergeLink { link: Link::Genre, .. } => outcome.genres += 1,
            Statement::MergeLink { link: Link::Actor, .. } => outcome.actors += 1,
            _ => {}
        }
    }

    Ok(outcome)
}

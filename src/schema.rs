//! Uniqueness constraints for the film graph

use tracing::info;

use crate::graph::Label;
use crate::session::{GraphSession, SessionResult};
use crate::statement::Statement;

/// One uniqueness constraint per node label, keyed on its merge property
pub const CONSTRAINTS: &[(&str, &str)] = &[
    (Label::FILM, "id"),
    (Label::ACTOR, "name"),
    (Label::DIRECTOR, "name"),
    (Label::GENRE, "name"),
];

/// Declare every constraint. Safe to call repeatedly.
///
/// Stops at the first failure; the caller treats that as fatal.
pub async fn initialize_schema(session: &dyn GraphSession) -> SessionResult<usize> {
    for (label, property) in CONSTRAINTS {
        let statement = Statement::create_constraint(label, property)?;
        session.run(&statement).await?;
        info!("Ensured uniqueness of {}.{}", label, property);
    }
    Ok(CONSTRAINTS.len())
}

//! Predefined graph queries

use super::{bind, Bindings, CatalogResult, EntryInfo, ParamSpec, Store};
use crate::session::CypherQuery;

/// A named, read-only Cypher query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub cypher: &'static str,
    /// Columns in `RETURN` order
    pub columns: &'static [&'static str],
    pub params: &'static [ParamSpec],
}

impl GraphQuery {
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            store: Store::Graph,
            name: self.name,
            description: self.description,
            params: self.params,
        }
    }

    /// Bind `key=value` arguments and produce an executable query
    pub fn prepare(&self, args: &[(String, String)]) -> CatalogResult<CypherQuery> {
        let bindings: Bindings = bind(self.name, self.params, args)?;
        Ok(CypherQuery::new(self.cypher, self.columns).with_params(bindings))
    }
}

pub fn find(name: &str) -> Option<&'static GraphQuery> {
    GRAPH_QUERIES.iter().find(|q| q.name == name)
}

const ACTOR_NAME: ParamSpec = ParamSpec {
    name: "actorName",
    description: "Actor name",
};

pub const GRAPH_QUERIES: &[GraphQuery] = &[
    GraphQuery {
        name: "actor_most_films",
        description: "Actor with most films",
        cypher: "MATCH (a:Actor)-[:ACTED_IN]->(f:Film) \
                 RETURN a.name AS actor, COUNT(f) AS film_count \
                 ORDER BY film_count DESC LIMIT 1",
        columns: &["actor", "film_count"],
        params: &[],
    },
    GraphQuery {
        name: "costars_of_actor",
        description: "Actors who starred with a given actor",
        cypher: "MATCH (a:Actor)-[:ACTED_IN]->(f:Film)<-[:ACTED_IN]-(:Actor {name: $actorName}) \
                 WHERE a.name <> $actorName \
                 RETURN a.name AS actor, f.title AS film \
                 ORDER BY actor, film",
        columns: &["actor", "film"],
        params: &[ACTOR_NAME],
    },
    GraphQuery {
        name: "actor_with_most_revenue",
        description: "Actor with most revenue",
        cypher: "MATCH (a:Actor)-[:ACTED_IN]->(f:Film) \
                 WHERE f.revenue IS NOT NULL AND f.revenue > 0 \
                 RETURN a.name AS actor, SUM(f.revenue) AS total_revenue \
                 ORDER BY total_revenue DESC LIMIT 1",
        columns: &["actor", "total_revenue"],
        params: &[],
    },
    GraphQuery {
        name: "average_of_votes",
        description: "Average votes",
        cypher: "MATCH (f:Film) RETURN ROUND(AVG(f.votes), 2) AS average_votes",
        columns: &["average_votes"],
        params: &[],
    },
    GraphQuery {
        name: "most_common_genre",
        description: "Most common genre",
        cypher: "MATCH (f:Film)-[:HAS_GENRE]->(g:Genre) \
                 RETURN g.name AS genre, COUNT(g) AS genre_count \
                 ORDER BY genre_count DESC LIMIT 1",
        columns: &["genre", "genre_count"],
        params: &[],
    },
    GraphQuery {
        name: "director_worked_with_most_actors",
        description: "Director who has worked with the highest number of actors",
        cypher: "MATCH (r:Director)-[:DIRECTED]->(f:Film)<-[:ACTED_IN]-(a:Actor) \
                 RETURN r.name AS director, COUNT(DISTINCT a) AS actor_count \
                 ORDER BY actor_count DESC LIMIT 1",
        columns: &["director", "actor_count"],
        params: &[],
    },
    GraphQuery {
        name: "most_connected_films",
        description: "Film whose cast has appeared in the most other films",
        cypher: "MATCH (f:Film)<-[:ACTED_IN]-(a:Actor)-[:ACTED_IN]->(f2:Film) \
                 WHERE f <> f2 \
                 RETURN f.title AS film, COUNT(DISTINCT f2) AS connected_films \
                 ORDER BY connected_films DESC LIMIT 1",
        columns: &["film", "connected_films"],
        params: &[],
    },
    GraphQuery {
        name: "most_prolific_actors",
        description: "Actors who have worked with the most directors",
        cypher: "MATCH (a:Actor)-[:ACTED_IN]->(f:Film)<-[:DIRECTED]-(r:Director) \
                 RETURN a.name AS actor, COUNT(DISTINCT r) AS directors_count \
                 ORDER BY directors_count DESC LIMIT 5",
        columns: &["actor", "directors_count"],
        params: &[],
    },
    GraphQuery {
        name: "recommended_films_based_on_actor",
        description: "Films sharing a genre with a given actor's films, without that actor",
        cypher: "MATCH (a:Actor {name: $actorName})-[:ACTED_IN]->(:Film)-[:HAS_GENRE]->(g:Genre)<-[:HAS_GENRE]-(rec:Film) \
                 WHERE NOT (a)-[:ACTED_IN]->(rec) \
                 RETURN rec.title AS recommended_film, COLLECT(DISTINCT g.name) AS shared_genres \
                 ORDER BY SIZE(shared_genres) DESC, recommended_film LIMIT 5",
        columns: &["recommended_film", "shared_genres"],
        params: &[ACTOR_NAME],
    },
    GraphQuery {
        name: "directors_sharing_genres",
        description: "Pairs of directors working in the same genre",
        cypher: "MATCH (r1:Director)-[:DIRECTED]->(:Film)-[:HAS_GENRE]->(g:Genre)<-[:HAS_GENRE]-(:Film)<-[:DIRECTED]-(r2:Director) \
                 WHERE r1.name < r2.name \
                 RETURN DISTINCT r1.name AS director1, r2.name AS director2, g.name AS genre \
                 ORDER BY director1, director2, genre LIMIT 100",
        columns: &["director1", "director2", "genre"],
        params: &[],
    },
    GraphQuery {
        name: "shortest_path_between_actors",
        description: "Shortest chain of films linking two actors",
        cypher: "MATCH p = shortestPath((a1:Actor {name: $actorName1})-[:ACTED_IN*]-(a2:Actor {name: $actorName2})) \
                 RETURN [n IN nodes(p) | coalesce(n.name, n.title)] AS path, length(p) AS hops",
        columns: &["path", "hops"],
        params: &[
            ParamSpec {
                name: "actorName1",
                description: "First actor name",
            },
            ParamSpec {
                name: "actorName2",
                description: "Second actor name",
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::graph::PropertyValue;

    #[test]
    fn test_declared_params_appear_in_cypher() {
        for query in GRAPH_QUERIES {
            for param in query.params {
                assert!(
                    query.cypher.contains(&format!("${}", param.name)),
                    "{} does not use ${}",
                    query.name,
                    param.name
                );
            }
        }
    }

    #[test]
    fn test_catalog_is_read_only() {
        for query in GRAPH_QUERIES {
            let upper = query.cypher.to_uppercase();
            for keyword in ["CREATE ", "MERGE ", "DELETE ", " SET ", "REMOVE ", "DROP "] {
                assert!(!upper.contains(keyword), "{} contains {}", query.name, keyword);
            }
        }
    }

    #[test]
    fn test_columns_are_returned() {
        for query in GRAPH_QUERIES {
            for column in query.columns {
                assert!(query.cypher.contains(&format!("AS {}", column)), "{}: {}", query.name, column);
            }
        }
    }

    #[test]
    fn test_prepare_binds_parameters() {
        let query = find("shortest_path_between_actors").unwrap();
        let prepared = query
            .prepare(&[
                ("actorName1".to_string(), "Tom Hanks".to_string()),
                ("actorName2".to_string(), "Scarlett Johansson".to_string()),
            ])
            .unwrap();
        assert_eq!(prepared.params["actorName1"], PropertyValue::from("Tom Hanks"));
        assert_eq!(prepared.columns, vec!["path", "hops"]);

        let err = query.prepare(&[]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingParameter { .. }));
    }
}

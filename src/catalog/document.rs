//! Predefined document store queries
//!
//! Each entry builds its pipeline or filter from bound parameters, so user
//! input only ever lands inside BSON values.

use mongodb::bson::{doc, Bson, Document};

use super::{bind, Bindings, CatalogResult, EntryInfo, ParamSpec, Store};

/// A document store operation ready to send to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    /// Aggregation pipeline
    Aggregate(Vec<Document>),
    /// `count_documents` with a filter
    Count(Document),
    /// `find` with an optional projection and default row limit
    Find {
        filter: Document,
        projection: Option<Document>,
        limit: Option<i64>,
    },
}

impl DocumentOp {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentOp::Aggregate(_) => "aggregate",
            DocumentOp::Count(_) => "count",
            DocumentOp::Find { .. } => "find",
        }
    }
}

/// A named document query
#[derive(Debug, Clone, Copy)]
pub struct DocumentQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    build: fn(&Bindings) -> DocumentOp,
}

impl DocumentQuery {
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            store: Store::Documents,
            name: self.name,
            description: self.description,
            params: self.params,
        }
    }

    pub fn prepare(&self, args: &[(String, String)]) -> CatalogResult<DocumentOp> {
        let bindings = bind(self.name, self.params, args)?;
        Ok((self.build)(&bindings))
    }
}

pub fn find(name: &str) -> Option<&'static DocumentQuery> {
    DOCUMENT_QUERIES.iter().find(|q| q.name == name)
}

fn text(bindings: &Bindings, name: &str) -> String {
    bindings
        .get(name)
        .and_then(|v| v.as_string())
        .unwrap_or_default()
        .to_string()
}

/// `{$split: [field, ","]}` followed by an unwind of the resulting array
fn explode_genres(extra: Document) -> Vec<Document> {
    let mut project = doc! { "genre": { "$split": ["$genre", ","] } };
    for (key, value) in extra {
        project.insert(key, value);
    }
    vec![doc! { "$project": project }, doc! { "$unwind": "$genre" }]
}

fn year_with_most_films(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$group": { "_id": "$year", "count": { "$sum": 1 } } },
        doc! { "$sort": { "count": -1 } },
        doc! { "$limit": 1 },
    ])
}

fn films_after_1999(_: &Bindings) -> DocumentOp {
    DocumentOp::Count(doc! { "year": { "$gt": 1999 } })
}

fn avg_votes_2007(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$match": { "year": 2007 } },
        doc! { "$group": { "_id": Bson::Null, "averageVotes": { "$avg": "$Votes" } } },
    ])
}

fn films_per_year(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$group": { "_id": "$year", "titles": { "$push": "$title" } } },
        doc! { "$sort": { "_id": 1 } },
    ])
}

fn available_genres(_: &Bindings) -> DocumentOp {
    let mut pipeline = explode_genres(Document::new());
    pipeline.push(doc! { "$group": { "_id": { "$trim": { "input": "$genre" } } } });
    pipeline.push(doc! { "$sort": { "_id": 1 } });
    DocumentOp::Aggregate(pipeline)
}

fn highest_revenue_film(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$match": { "Revenue (Millions)": { "$exists": true, "$type": "double" } } },
        doc! { "$sort": { "Revenue (Millions)": -1 } },
        doc! { "$limit": 1 },
    ])
}

fn directors_with_multiple_films(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$group": { "_id": "$Director", "count": { "$sum": 1 } } },
        doc! { "$match": { "count": { "$gt": 5 } } },
        doc! { "$sort": { "count": -1 } },
    ])
}

fn genre_with_highest_revenue(_: &Bindings) -> DocumentOp {
    let mut pipeline = explode_genres(doc! { "revenue": "$Revenue (Millions)" });
    pipeline.extend([
        doc! { "$match": { "revenue": { "$exists": true, "$type": "double" } } },
        doc! { "$group": { "_id": "$genre", "totalRevenue": { "$sum": "$revenue" } } },
        doc! { "$sort": { "totalRevenue": -1 } },
        doc! { "$limit": 1 },
    ]);
    DocumentOp::Aggregate(pipeline)
}

fn top_rated_by_decade(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$match": {
            "rating": { "$exists": true, "$nin": [Bson::Null, "unrated"] },
            "year": { "$type": "int" },
        } },
        doc! { "$addFields": { "decade": { "$subtract": ["$year", { "$mod": ["$year", 10] }] } } },
        doc! { "$sort": { "decade": 1, "rating": -1 } },
        doc! { "$group": { "_id": "$decade", "top_films": { "$push": { "title": "$title" } } } },
        doc! { "$project": { "_id": 0, "decade": "$_id", "top_3_films": { "$slice": ["$top_films", 3] } } },
        doc! { "$sort": { "decade": 1 } },
    ])
}

fn longest_film_by_genre(_: &Bindings) -> DocumentOp {
    let mut pipeline = vec![doc! { "$match": { "Runtime (Minutes)": { "$type": "int" } } }];
    pipeline.extend(explode_genres(doc! { "Runtime (Minutes)": 1, "title": 1 }));
    pipeline.extend([
        doc! { "$sort": { "Runtime (Minutes)": -1 } },
        doc! { "$group": {
            "_id": "$genre",
            "longest_film": { "$first": { "Title": "$title", "Duration (Minutes)": "$Runtime (Minutes)" } },
        } },
        doc! { "$sort": { "_id": 1 } },
    ]);
    DocumentOp::Aggregate(pipeline)
}

fn high_rating_high_revenue(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![doc! { "$match": {
        "Metascore": { "$gt": 80 },
        "Revenue (Millions)": { "$gt": 50 },
    } }])
}

fn runtime_revenue_correlation_data(_: &Bindings) -> DocumentOp {
    DocumentOp::Find {
        filter: doc! {
            "Runtime (Minutes)": { "$ne": Bson::Null },
            "Revenue (Millions)": { "$ne": Bson::Null },
        },
        projection: Some(doc! { "_id": 0, "Runtime (Minutes)": 1, "Revenue (Millions)": 1 }),
        limit: Some(10),
    }
}

fn average_runtime_by_decade(_: &Bindings) -> DocumentOp {
    DocumentOp::Aggregate(vec![
        doc! { "$match": { "year": { "$ne": Bson::Null }, "Runtime (Minutes)": { "$ne": Bson::Null } } },
        doc! { "$project": {
            "decade": { "$multiply": [{ "$floor": { "$divide": ["$year", 10] } }, 10] },
            "Runtime (Minutes)": 1,
        } },
        doc! { "$group": {
            "_id": "$decade",
            "average_runtime": { "$avg": "$Runtime (Minutes)" },
            "count": { "$sum": 1 },
        } },
        doc! { "$sort": { "_id": 1 } },
    ])
}

fn films_by_director(bindings: &Bindings) -> DocumentOp {
    let name = text(bindings, "director_name");
    DocumentOp::Find {
        filter: doc! { "$or": [{ "Director": name.as_str() }, { "director": name.as_str() }] },
        projection: Some(doc! { "_id": 0, "title": 1, "year": 1, "rating": 1 }),
        limit: None,
    }
}

fn films_by_actor(bindings: &Bindings) -> DocumentOp {
    // Actors are stored comma-joined, so match the escaped name anywhere
    let pattern = regex::escape(&text(bindings, "actor_name"));
    let matcher = doc! { "$regex": pattern, "$options": "i" };
    DocumentOp::Find {
        filter: doc! { "$or": [{ "Actors": matcher.clone() }, { "actors": matcher }] },
        projection: Some(doc! { "_id": 0, "title": 1, "year": 1, "Director": 1 }),
        limit: None,
    }
}

pub const DOCUMENT_QUERIES: &[DocumentQuery] = &[
    DocumentQuery {
        name: "year_with_most_films",
        description: "Year with most film releases",
        params: &[],
        build: year_with_most_films,
    },
    DocumentQuery {
        name: "films_after_1999",
        description: "Count films released after 1999",
        params: &[],
        build: films_after_1999,
    },
    DocumentQuery {
        name: "avg_votes_2007",
        description: "Average votes for 2007 films",
        params: &[],
        build: avg_votes_2007,
    },
    DocumentQuery {
        name: "films_per_year",
        description: "Film titles grouped by year",
        params: &[],
        build: films_per_year,
    },
    DocumentQuery {
        name: "available_genres",
        description: "Available genres",
        params: &[],
        build: available_genres,
    },
    DocumentQuery {
        name: "highest_revenue_film",
        description: "Film with highest revenue",
        params: &[],
        build: highest_revenue_film,
    },
    DocumentQuery {
        name: "directors_with_multiple_films",
        description: "Directors of more than 5 films",
        params: &[],
        build: directors_with_multiple_films,
    },
    DocumentQuery {
        name: "genre_with_highest_revenue",
        description: "Genre with highest revenue",
        params: &[],
        build: genre_with_highest_revenue,
    },
    DocumentQuery {
        name: "top_rated_by_decade",
        description: "Top 3 highest rated films by decade",
        params: &[],
        build: top_rated_by_decade,
    },
    DocumentQuery {
        name: "longest_film_by_genre",
        description: "Longest film by genre",
        params: &[],
        build: longest_film_by_genre,
    },
    DocumentQuery {
        name: "high_rating_high_revenue",
        description: "Films with Metascore above 80 and revenue above 50M",
        params: &[],
        build: high_rating_high_revenue,
    },
    DocumentQuery {
        name: "runtime_revenue_correlation_data",
        description: "Runtime and revenue pairs",
        params: &[],
        build: runtime_revenue_correlation_data,
    },
    DocumentQuery {
        name: "average_runtime_by_decade",
        description: "Average runtime by decade",
        params: &[],
        build: average_runtime_by_decade,
    },
    DocumentQuery {
        name: "films_by_director",
        description: "Films by a given director",
        params: &[ParamSpec {
            name: "director_name",
            description: "Director name (exact)",
        }],
        build: films_by_director,
    },
    DocumentQuery {
        name: "films_by_actor",
        description: "Films featuring a given actor",
        params: &[ParamSpec {
            name: "actor_name",
            description: "Actor name (case-insensitive)",
        }],
        build: films_by_actor,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;

    #[test]
    fn test_every_query_builds() {
        for query in DOCUMENT_QUERIES {
            let args: Vec<(String, String)> = query
                .params
                .iter()
                .map(|p| (p.name.to_string(), "x".to_string()))
                .collect();
            let op = query.prepare(&args).unwrap();
            if let DocumentOp::Aggregate(pipeline) = &op {
                assert!(!pipeline.is_empty(), "{} has an empty pipeline", query.name);
            }
        }
    }

    #[test]
    fn test_count_query() {
        let op = find("films_after_1999").unwrap().prepare(&[]).unwrap();
        assert_eq!(op, DocumentOp::Count(doc! { "year": { "$gt": 1999 } }));
        assert_eq!(op.kind(), "count");
    }

    #[test]
    fn test_actor_name_is_escaped() {
        let op = find("films_by_actor")
            .unwrap()
            .prepare(&[("actor_name".to_string(), "J.K. (Jr)".to_string())])
            .unwrap();
        let DocumentOp::Find { filter, .. } = op else {
            panic!("expected find");
        };
        let clauses = filter.get_array("$or").unwrap();
        let first = clauses[0].as_document().unwrap();
        let pattern = first.get_document("Actors").unwrap().get_str("$regex").unwrap();
        assert_eq!(pattern, r"J\.K\. \(Jr\)");
    }

    #[test]
    fn test_director_name_is_a_value() {
        let op = find("films_by_director")
            .unwrap()
            .prepare(&[("director_name".to_string(), "{\"$ne\": null}".to_string())])
            .unwrap();
        let DocumentOp::Find { filter, .. } = op else {
            panic!("expected find");
        };
        let clauses = filter.get_array("$or").unwrap();
        let director = clauses[0].as_document().unwrap().get("Director").unwrap();
        assert_eq!(director, &Bson::String("{\"$ne\": null}".to_string()));
    }

    #[test]
    fn test_missing_parameter() {
        let err = find("films_by_director").unwrap().prepare(&[]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingParameter { .. }));
    }
}

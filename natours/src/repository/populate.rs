//! Reference expansion for outgoing documents
//!
//! A [`Populate`] spec either swaps an id field for the referenced document
//! (`review.user` → `{id, name, photo}`) or attaches the documents that point
//! back at this one (`tour.reviews`). Expanded documents go through the
//! source schema's [`present`](super::present) step, so hidden fields never
//! leak through a populate.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

use super::filter::FilterCondition;
use super::query::{DocumentQuery, Projection, ID_FIELD};
use super::schema::present;
use super::traits::{Repository, RepositoryResult};
use super::Document;

type PopulateFuture<'a> = Pin<Box<dyn Future<Output = RepositoryResult<()>> + Send + 'a>>;

/// How one field of a document is expanded
#[derive(Clone)]
pub enum Populate<R> {
    /// Replace the id stored in `field` with the referenced document
    Reference {
        /// Field holding the referenced id
        field: &'static str,
        /// Collection the id points into
        source: R,
        /// Fields kept on the referenced document; empty keeps all visible fields
        select: &'static [&'static str],
    },
    /// Attach documents whose `foreign_key` equals this document's id
    Children {
        /// Field the children are stored under
        field: &'static str,
        /// Collection holding the children
        source: R,
        /// Field on the child pointing back at the parent
        foreign_key: &'static str,
        /// Expansions applied to every child
        nested: Vec<Populate<R>>,
    },
}

impl<R: Repository> Populate<R> {
    /// Reference expansion
    pub fn reference(field: &'static str, source: R, select: &'static [&'static str]) -> Self {
        Self::Reference {
            field,
            source,
            select,
        }
    }

    /// Child expansion
    pub fn children(field: &'static str, source: R, foreign_key: &'static str) -> Self {
        Self::Children {
            field,
            source,
            foreign_key,
            nested: Vec::new(),
        }
    }

    /// Add an expansion for each child document
    #[must_use]
    pub fn with_nested(mut self, populate: Populate<R>) -> Self {
        if let Self::Children { nested, .. } = &mut self {
            nested.push(populate);
        }
        self
    }

    /// Expand the field on `doc` in place
    ///
    /// A reference to a missing or malformed id becomes `null`; in an array
    /// of ids it is dropped. Absent reference fields stay absent.
    pub fn apply<'a>(&'a self, doc: &'a mut Document) -> PopulateFuture<'a> {
        Box::pin(async move {
            match self {
                Self::Reference {
                    field,
                    source,
                    select,
                } => {
                    let expanded = match doc.get(*field) {
                        Some(Value::String(id)) => {
                            let id = id.clone();
                            fetch_reference(source, select, &id).await.unwrap_or(Value::Null)
                        }
                        Some(Value::Array(ids)) => {
                            let ids: Vec<String> = ids
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect();
                            let mut found = Vec::with_capacity(ids.len());
                            for id in &ids {
                                found.extend(fetch_reference(source, select, id).await);
                            }
                            Value::Array(found)
                        }
                        _ => return Ok(()),
                    };
                    doc.insert((*field).to_string(), expanded);
                }
                Self::Children {
                    field,
                    source,
                    foreign_key,
                    nested,
                } => {
                    let Some(id) = doc.get(ID_FIELD).cloned() else {
                        return Ok(());
                    };
                    let query = DocumentQuery::new().filter(FilterCondition::eq(*foreign_key, id));
                    let mut children = Vec::new();
                    for child in source.find_all(&query).await? {
                        let mut child = present(source.schema(), child);
                        populate_all(nested, &mut child).await?;
                        children.push(Value::Object(child));
                    }
                    doc.insert((*field).to_string(), Value::Array(children));
                }
            }
            Ok(())
        })
    }
}

/// Load one referenced document as a client-safe value
async fn fetch_reference<R: Repository>(
    source: &R,
    select: &[&'static str],
    id: &str,
) -> Option<Value> {
    let found = source.find_by_id(id).await.ok().flatten()?;
    let found = present(source.schema(), found);
    let found = if select.is_empty() {
        found
    } else {
        Projection::include(select.iter().copied()).apply(found)
    };
    Some(Value::Object(found))
}

/// Apply each spec in order
pub async fn populate_all<R: Repository>(
    specs: &[Populate<R>],
    doc: &mut Document,
) -> RepositoryResult<()> {
    for spec in specs {
        spec.apply(doc).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, Model, ModelSchema};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Author {
        name: String,
        secret: String,
    }

    impl Model for Author {
        const ENTITY: &'static str = "Author";
        const ID_PREFIX: &'static str = "author";
        const REQUIRED: &'static [(&'static str, &'static str)] = &[];
        const HIDDEN: &'static [&'static str] = &["secret"];
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Post {
        #[serde(default)]
        author: Option<String>,
        #[serde(default)]
        parent: Option<String>,
    }

    impl Model for Post {
        const ENTITY: &'static str = "Post";
        const ID_PREFIX: &'static str = "post";
        const REQUIRED: &'static [(&'static str, &'static str)] = &[];
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_reference_hides_secret_fields_and_selects() {
        let authors = MemoryRepository::new(ModelSchema::<Author>::new());
        let author = authors
            .create(doc(json!({"name": "Lourdes", "secret": "hash"})))
            .await
            .unwrap();

        let mut post = doc(json!({"author": author["id"].clone()}));
        Populate::reference("author", authors.clone(), &[]).apply(&mut post).await.unwrap();
        assert_eq!(post["author"]["name"], json!("Lourdes"));
        assert!(post["author"].get("secret").is_none());

        let mut post = doc(json!({"author": author["id"].clone()}));
        Populate::reference("author", authors, &["name"]).apply(&mut post).await.unwrap();
        assert_eq!(post["author"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_reference_becomes_null() {
        let authors = MemoryRepository::new(ModelSchema::<Author>::new());
        let mut post = doc(json!({"author": "author_01h455vb4pex5vsknk084sn02q"}));
        Populate::reference("author", authors, &[]).apply(&mut post).await.unwrap();
        assert_eq!(post["author"], Value::Null);
    }

    #[tokio::test]
    async fn test_reference_array_drops_missing_ids() {
        let authors = MemoryRepository::new(ModelSchema::<Author>::new());
        let author = authors
            .create(doc(json!({"name": "Lourdes", "secret": "hash"})))
            .await
            .unwrap();

        let mut post = doc(json!({
            "author": [author["id"].clone(), "author_01h455vb4pex5vsknk084sn02q"]
        }));
        Populate::reference("author", authors, &["name"]).apply(&mut post).await.unwrap();
        let expanded = post["author"].as_array().unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0]["name"], json!("Lourdes"));
    }

    #[tokio::test]
    async fn test_children_attach_with_nested_reference() {
        let authors = MemoryRepository::new(ModelSchema::<Author>::new());
        let posts = MemoryRepository::new(ModelSchema::<Post>::new());
        let author = authors
            .create(doc(json!({"name": "Lourdes", "secret": "hash"})))
            .await
            .unwrap();
        let parent = posts.create(Document::new()).await.unwrap();
        for _ in 0..2 {
            posts
                .create(doc(json!({
                    "author": author["id"].clone(),
                    "parent": parent["id"].clone(),
                })))
                .await
                .unwrap();
        }

        let spec = Populate::children("replies", posts.clone(), "parent")
            .with_nested(Populate::reference("author", authors, &["name"]));
        let mut root = parent.clone();
        spec.apply(&mut root).await.unwrap();

        let replies = root["replies"].as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["author"]["name"], json!("Lourdes"));
    }
}

//! Development data import
//!
//! Loads `tours.json`, `users.json` and `reviews.json` from a directory into
//! [`Collections`], in that order. Users carry plaintext passwords in the
//! files; they are hashed before they reach the store. Once reviews are in,
//! every tour's rating summary is recomputed.

use std::path::Path;

use serde_json::Value;

use crate::api::reviews::refresh_tour_ratings;
use crate::auth::PasswordHasher;
use crate::error::{Error, Result};
use crate::models::PASSWORD_HASH_PREFIX;
use crate::repository::{Document, MemoryRepository, Repository};
use crate::state::Collections;

/// Seed file names, in import order
pub const SEED_FILES: [&str; 3] = ["tours.json", "users.json", "reviews.json"];

/// Documents imported per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub tours: usize,
    pub users: usize,
    pub reviews: usize,
}

async fn read_documents(dir: &Path, file: &str) -> Result<Vec<Document>> {
    let path = dir.join(file);
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| Error::Seed(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| Error::Seed(format!("{}: {e}", path.display())))
}

async fn insert_all(
    repository: &MemoryRepository,
    file: &str,
    documents: Vec<Document>,
) -> Result<usize> {
    let count = documents.len();
    for (index, document) in documents.into_iter().enumerate() {
        repository
            .create(document)
            .await
            .map_err(|e| Error::Seed(format!("{file}[{index}]: {}", e.message)))?;
    }
    Ok(count)
}

/// Swap each plaintext `password` for its hash and drop `passwordConfirm`
async fn hash_passwords(hasher: &PasswordHasher, users: &mut [Document]) -> Result<()> {
    for user in users.iter_mut() {
        user.remove("passwordConfirm");
        let plain = match user.get("password").and_then(Value::as_str) {
            Some(password) if !password.starts_with(PASSWORD_HASH_PREFIX) => password.to_string(),
            _ => continue,
        };
        let hash = hasher.hash_async(plain).await?;
        user.insert("password".to_string(), Value::String(hash));
    }
    Ok(())
}

/// Import the seed files in `dir` into `collections`
pub async fn import_dir(
    dir: impl AsRef<Path>,
    collections: &Collections,
    hasher: &PasswordHasher,
) -> Result<SeedSummary> {
    let dir = dir.as_ref();
    let [tours_file, users_file, reviews_file] = SEED_FILES;

    let tours = read_documents(dir, tours_file).await?;
    let mut users = read_documents(dir, users_file).await?;
    let reviews = read_documents(dir, reviews_file).await?;
    hash_passwords(hasher, &mut users).await?;

    let tour_ids: Vec<String> = tours
        .iter()
        .filter_map(|tour| tour.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();

    let summary = SeedSummary {
        tours: insert_all(&collections.tours, tours_file, tours).await?,
        users: insert_all(&collections.users, users_file, users).await?,
        reviews: insert_all(&collections.reviews, reviews_file, reviews).await?,
    };

    for tour_id in &tour_ids {
        refresh_tour_ratings(&collections.reviews, &collections.tours, tour_id)
            .await
            .map_err(|e| Error::Seed(e.to_string()))?;
    }

    tracing::info!(
        dir = %dir.display(),
        tours = summary.tours,
        users = summary.users,
        reviews = summary.reviews,
        "dev data loaded"
    );
    Ok(summary)
}

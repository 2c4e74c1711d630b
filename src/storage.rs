use std::future::Future;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::entities::{Category, CategoryId, Image, ImageId, Statistic};
use crate::error::CatalogError;

/// One line of the document log. Replaying all operations in order rebuilds
/// the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DbOperation {
    CreateImage { image: Image },
    UpdateImage { image: Image },
    DeleteImage { image_id: ImageId },
    CreateCategory { category: Category },
    UpdateCategory { category: Category },
    DeleteCategory { category_id: CategoryId },
    UpsertStatistics { statistics: Vec<Statistic> },
}

pub trait Storage: Send + Sync {
    fn read_all(&self) -> impl Future<Output = Result<Vec<DbOperation>, CatalogError>> + Send;
    fn write(&mut self, operation: DbOperation) -> impl Future<Output = Result<(), CatalogError>> + Send;
}

#[derive(Debug)]
pub struct FileStorage {
    db_path: PathBuf,
}

impl FileStorage {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl Storage for FileStorage {
    async fn read_all(&self) -> Result<Vec<DbOperation>, CatalogError> {
        let file_str = tokio::fs::read_to_string(&self.db_path).await
            .map_err(CatalogError::DbIOError)?;
        let operations = file_str.split('\n')
            .filter(|x| !x.is_empty())
            .map(|x| serde_json::from_str(x).map_err(CatalogError::DbSerializationError))
            .collect::<Result<Vec<DbOperation>, CatalogError>>()?;
        Ok(operations)
    }

    async fn write(&mut self, operation: DbOperation) -> Result<(), CatalogError> {
        let serialized_operation = serde_json::to_string(&operation)
            .map_err(CatalogError::DbSerializationError)?;
        let line = format!("{}\n", serialized_operation);
        // no `create`: a missing db file is a storage failure, not a fresh start
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&self.db_path).await
            .map_err(CatalogError::DbIOError)?;
        tokio::io::AsyncWriteExt::write_all(&mut file, line.as_bytes()).await
            .map_err(CatalogError::DbIOError)?;
        tokio::io::AsyncWriteExt::flush(&mut file).await
            .map_err(CatalogError::DbIOError)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    operations: Vec<DbOperation>,
}

impl InMemoryStorage {
    pub fn with_operations(operations: Vec<DbOperation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[DbOperation] {
        &self.operations
    }
}

impl Storage for InMemoryStorage {
    async fn read_all(&self) -> Result<Vec<DbOperation>, CatalogError> {
        Ok(self.operations.clone())
    }

    async fn write(&mut self, operation: DbOperation) -> Result<(), CatalogError> {
        self.operations.push(operation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use super::*;

    fn category(id: &str) -> Category {
        let now = Utc::now();
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            icon: "category".to_string(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn file_storage_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.json");
        std::fs::write(&db_path, "").unwrap();

        let mut storage = FileStorage::new(db_path.clone());
        storage.write(DbOperation::CreateCategory { category: category("a") }).await.unwrap();
        storage.write(DbOperation::DeleteCategory { category_id: "a".to_string() }).await.unwrap();

        let operations = storage.read_all().await.unwrap();
        assert_eq!(operations.len(), 2);
        assert!(matches!(&operations[0], DbOperation::CreateCategory { category } if category.id == "a"));
        assert!(matches!(&operations[1], DbOperation::DeleteCategory { category_id } if category_id == "a"));

        let contents = std::fs::read_to_string(&db_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn file_storage_fails_without_db_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("missing.json"));
        let result = storage.write(DbOperation::DeleteImage { image_id: "x".to_string() }).await;
        assert!(matches!(result, Err(CatalogError::DbIOError(_))));
        assert!(matches!(storage.read_all().await, Err(CatalogError::DbIOError(_))));
    }

    #[tokio::test]
    async fn file_storage_rejects_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.json");
        std::fs::write(&db_path, "{not json}\n").unwrap();
        let storage = FileStorage::new(db_path);
        assert!(matches!(storage.read_all().await, Err(CatalogError::DbSerializationError(_))));
    }
}

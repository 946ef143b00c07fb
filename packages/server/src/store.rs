//! PostgreSQL-backed catalog store.
//!
//! Uniqueness lives in the schema (entry slugs, chapter slugs, page number
//! per chapter); SQLSTATE 23505 surfaces as `PersistenceConflict` so the
//! pipeline can tell a lost race from an outage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use ingest::{
    CatalogEntry, CatalogStore, Chapter, IngestError, NamedRef, NewCatalogEntry, NewChapter,
    NewPage, PageRecord, RefKind,
};
use sqlx::PgPool;

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    slug: String,
    title: String,
    alternative_title: Option<String>,
    description: String,
    cover_image_url: String,
    serialization: Option<String>,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EntryRow> for CatalogEntry {
    fn from(row: EntryRow) -> Self {
        CatalogEntry {
            id: row.id,
            slug: row.slug,
            title: row.title,
            alternative_title: row.alternative_title,
            description: row.description,
            cover_image_url: row.cover_image_url,
            serialization: row.serialization,
            view_count: row.view_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChapterRow {
    id: Uuid,
    catalog_entry_id: Uuid,
    number: i32,
    slug: String,
    title: Option<String>,
    source_url: String,
    created_at: DateTime<Utc>,
}

impl From<ChapterRow> for Chapter {
    fn from(row: ChapterRow) -> Self {
        Chapter {
            id: row.id,
            catalog_entry_id: row.catalog_entry_id,
            number: row.number,
            slug: row.slug,
            title: row.title,
            source_url: row.source_url,
            created_at: row.created_at,
        }
    }
}

fn map_db_error(context: &str, error: sqlx::Error) -> IngestError {
    if let sqlx::Error::Database(db) = &error {
        if db.code().as_deref() == Some("23505") {
            return IngestError::PersistenceConflict(format!("{}: {}", context, db.message()));
        }
    }
    IngestError::Storage(format!("{}: {}", context, error))
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn entry_by_slug(&self, slug: &str) -> ingest::Result<Option<CatalogEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, slug, title, alternative_title, description,
                   cover_image_url, serialization, view_count, created_at, updated_at
            FROM catalog_entries
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("entry lookup", e))?;
        Ok(row.map(CatalogEntry::from))
    }

    async fn create_entry(&self, entry: NewCatalogEntry) -> ingest::Result<CatalogEntry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO catalog_entries
                (id, slug, title, alternative_title, description, cover_image_url, serialization)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, slug, title, alternative_title, description,
                      cover_image_url, serialization, view_count, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.slug)
        .bind(&entry.title)
        .bind(&entry.alternative_title)
        .bind(&entry.description)
        .bind(&entry.cover_image_url)
        .bind(&entry.serialization)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("entry insert", e))?;
        Ok(row.into())
    }

    async fn set_cover_image(&self, entry_id: Uuid, url: &str) -> ingest::Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_entries
            SET cover_image_url = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(url)
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("cover update", e))?;
        Ok(())
    }

    async fn upsert_reference(&self, kind: RefKind, reference: &NamedRef) -> ingest::Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO catalog_references (id, kind, name, slug)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, slug) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(kind.as_str())
        .bind(&reference.name)
        .bind(&reference.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("reference upsert", e))?;
        Ok(id)
    }

    async fn link_reference(
        &self,
        entry_id: Uuid,
        _kind: RefKind,
        reference_id: Uuid,
    ) -> ingest::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_entry_references (catalog_entry_id, reference_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(entry_id)
        .bind(reference_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("reference link", e))?;
        Ok(())
    }

    async fn chapter_slugs(&self, entry_id: Uuid) -> ingest::Result<HashSet<String>> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM chapters WHERE catalog_entry_id = $1",
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("chapter slug listing", e))?;
        Ok(slugs.into_iter().collect())
    }

    async fn create_chapter(&self, chapter: NewChapter) -> ingest::Result<Chapter> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("chapter insert", e))?;

        let row = sqlx::query_as::<_, ChapterRow>(
            r#"
            INSERT INTO chapters (id, catalog_entry_id, number, slug, title, source_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, catalog_entry_id, number, slug, title, source_url, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chapter.catalog_entry_id)
        .bind(chapter.number)
        .bind(&chapter.slug)
        .bind(&chapter.title)
        .bind(&chapter.source_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("chapter insert", e))?;

        // A new chapter counts as activity on the entry.
        sqlx::query("UPDATE catalog_entries SET updated_at = NOW() WHERE id = $1")
            .bind(chapter.catalog_entry_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("entry touch", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("chapter insert", e))?;
        Ok(row.into())
    }

    async fn create_page(&self, page: NewPage) -> ingest::Result<PageRecord> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO pages (id, chapter_id, page_number, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(page.chapter_id)
        .bind(page.page_number)
        .bind(&page.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("page insert", e))?;

        Ok(PageRecord {
            id,
            chapter_id: page.chapter_id,
            page_number: page.page_number,
            image_url: page.image_url,
        })
    }
}

use chrono::Utc;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use educate_backend::db;

pub async fn test_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    db::migrate(&pool).await.expect("schema setup");
    pool
}

pub async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
    let result = sqlx::query(
        r#"INSERT INTO users
               (username, email, password_hash, first_name, last_name, college, stream, year, created_at)
           VALUES (?, ?, 'x', 'Test', 'User', 'Test College', 'Computer Science', '2nd Year', ?)"#,
    )
    .bind(username)
    .bind(format!("{}@example.edu", username))
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed user");

    result.last_insert_rowid()
}

pub async fn seed_resource(
    pool: &SqlitePool,
    author_id: i64,
    title: &str,
    category: &str,
    subject: &str,
) -> i64 {
    let result = sqlx::query(
        r#"INSERT INTO resources
               (title, description, resource_type, category, subject, semester, difficulty,
                content, author_id, status, created_at)
           VALUES (?, 'A useful study resource', 'notes', ?, ?, '3rd Semester', 'Intermediate',
                   '', ?, 'approved', ?)"#,
    )
    .bind(title)
    .bind(category)
    .bind(subject)
    .bind(author_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed resource");

    result.last_insert_rowid()
}

pub async fn tag_resource(pool: &SqlitePool, resource_id: i64, tag: &str) {
    sqlx::query("INSERT OR IGNORE INTO resource_tags (resource_id, tag) VALUES (?, ?)")
        .bind(resource_id)
        .bind(tag)
        .execute(pool)
        .await
        .expect("seed tag");
}

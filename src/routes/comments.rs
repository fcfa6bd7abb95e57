use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::{CommentAuthor, CommentResponse, CreateComment};
use crate::routes::auth::extract_current_user;

pub const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Debug, FromRow)]
struct CommentWithAuthorRow {
    comment_id: i64,
    content: String,
    comment_created_at: DateTime<Utc>,
    user_id: i64,
    username: String,
    first_name: String,
    last_name: String,
    profile_picture: Option<String>,
}

impl From<CommentWithAuthorRow> for CommentResponse {
    fn from(row: CommentWithAuthorRow) -> Self {
        Self {
            id: row.comment_id,
            user: CommentAuthor {
                id: row.user_id,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
                profile_picture: row.profile_picture,
            },
            content: row.content,
            created_at: row.comment_created_at,
        }
    }
}

pub fn comments_routes() -> Router<SqlitePool> {
    // Nested beside `resources_routes`; the capture name must match the
    // routes registered there for the shared `/{id}` prefix.
    Router::new().route("/{id}/comments", get(list_comments).post(create_comment))
}

async fn list_comments(
    State(pool): State<SqlitePool>,
    Path(resource_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    ensure_resource_exists(&pool, resource_id).await?;
    let comments = fetch_comments(&pool, resource_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "comments": comments,
    })))
}

async fn create_comment(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(resource_id): Path<i64>,
    Json(input): Json<CreateComment>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;
    ensure_resource_exists(&pool, resource_id).await?;

    let comment = add_comment(&pool, resource_id, current_user.id, &input.content).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Comment added successfully",
            "comment": comment,
        })),
    ))
}

/// Appends a comment and returns it with the author resolved for display.
pub async fn add_comment(
    pool: &SqlitePool,
    resource_id: i64,
    author_id: i64,
    content: &str,
) -> AppResult<CommentResponse> {
    let content = content.trim();
    if content.is_empty() || content.len() > MAX_COMMENT_LENGTH {
        return Err(AppError::Validation(
            "Comment must be between 1 and 500 characters".to_string(),
        ));
    }

    let now = Utc::now();
    let result =
        sqlx::query("INSERT INTO comments (resource_id, author_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(resource_id)
            .bind(author_id)
            .bind(content)
            .bind(now)
            .execute(pool)
            .await?;

    let row = fetch_comment_row(pool, result.last_insert_rowid()).await?;
    Ok(CommentResponse::from(row))
}

/// All comments on a resource, newest first, authors resolved.
pub async fn fetch_comments(
    pool: &SqlitePool,
    resource_id: i64,
) -> AppResult<Vec<CommentResponse>> {
    let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
        r#"
        SELECT
            c.id AS comment_id,
            c.content AS content,
            c.created_at AS comment_created_at,
            u.id AS user_id,
            u.username AS username,
            u.first_name AS first_name,
            u.last_name AS last_name,
            u.profile_picture AS profile_picture
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.resource_id = ?
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CommentResponse::from).collect())
}

async fn fetch_comment_row(pool: &SqlitePool, comment_id: i64) -> AppResult<CommentWithAuthorRow> {
    let row = sqlx::query_as::<_, CommentWithAuthorRow>(
        r#"
        SELECT
            c.id AS comment_id,
            c.content AS content,
            c.created_at AS comment_created_at,
            u.id AS user_id,
            u.username AS username,
            u.first_name AS first_name,
            u.last_name AS last_name,
            u.profile_picture AS profile_picture
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.id = ?
        "#,
    )
    .bind(comment_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

async fn ensure_resource_exists(pool: &SqlitePool, resource_id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM resources WHERE id = ?")
        .bind(resource_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(AppError::resource_not_found)?;

    Ok(())
}

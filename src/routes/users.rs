use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::{
    Pagination, PublicUser, Resource, ResourceSummary, User, UserQuery, page_params,
};
use crate::routes::auth::extract_current_user;
use crate::routes::resources::build_resource_response;

pub fn users_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/", get(list_users))
        .route("/me/bookmarks", get(my_bookmarks))
        .route("/leaderboard/top", get(leaderboard))
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/{id}", get(get_user))
        .route("/{id}/bookmarks", get(user_bookmarks))
        .route("/{id}/uploads", get(user_uploads))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserListItem {
    #[serde(flatten)]
    user: PublicUser,
    recent_uploads: Vec<ResourceSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntry {
    rank: usize,
    #[serde(flatten)]
    user: PublicUser,
}

async fn find_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(AppError::user_not_found)
}

async fn recent_uploads(
    pool: &SqlitePool,
    author_id: i64,
    limit: i64,
) -> AppResult<Vec<ResourceSummary>> {
    let uploads = sqlx::query_as::<_, ResourceSummary>(
        r#"SELECT id, title, resource_type, category, subject, score, views, downloads, created_at
           FROM resources
           WHERE author_id = ?
           ORDER BY created_at DESC, id DESC
           LIMIT ?"#,
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(uploads)
}

// ============================
// Profiles and search
// ============================

async fn get_user(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let user = find_user(&pool, user_id).await?;

    let (total_uploads, total_views, total_downloads): (i64, i64, i64) = sqlx::query_as(
        r#"SELECT COUNT(*), COALESCE(SUM(views), 0), COALESCE(SUM(downloads), 0)
           FROM resources WHERE author_id = ?"#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let uploads = recent_uploads(&pool, user_id, 10).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user": PublicUser::from(user.clone()),
        "stats": {
            "totalUploads": total_uploads,
            "totalReputation": user.reputation,
            "totalViews": total_views,
            "totalDownloads": total_downloads,
        },
        "recentUploads": uploads,
    })))
}

fn push_user_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a UserQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(college) = &query.college {
        builder
            .push(" AND college LIKE ")
            .push_bind(format!("%{}%", college));
    }
    if let Some(stream) = &query.stream {
        builder.push(" AND stream = ").push_bind(stream);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (username LIKE ").push_bind(pattern.clone());
        builder.push(" OR first_name LIKE ").push_bind(pattern.clone());
        builder.push(" OR last_name LIKE ").push_bind(pattern.clone());
        builder.push(" OR college LIKE ").push_bind(pattern);
        builder.push(")");
    }
}

async fn list_users(
    State(pool): State<SqlitePool>,
    Query(query): Query<UserQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, limit, offset) = page_params(query.page, query.limit)?;

    let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
    push_user_filters(&mut count_builder, &query);
    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users");
    push_user_filters(&mut builder, &query);
    builder.push(" ORDER BY reputation DESC, created_at DESC");
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);

    let rows: Vec<User> = builder.build_query_as().fetch_all(&pool).await?;

    let mut users = Vec::with_capacity(rows.len());
    for user in rows {
        let uploads = recent_uploads(&pool, user.id, 3).await?;
        users.push(UserListItem {
            user: PublicUser::from(user),
            recent_uploads: uploads,
        });
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "users": users,
        "pagination": Pagination::new(page, limit, total),
    })))
}

// ============================
// Bookmarks and uploads
// ============================

async fn bookmarked_resources(
    pool: &SqlitePool,
    user_id: i64,
    page: i64,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<crate::models::ResourceResponse>, Pagination)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resource_bookmarks WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Resource>(
        r#"SELECT r.* FROM resources r
           JOIN resource_bookmarks b ON b.resource_id = r.id
           WHERE b.user_id = ?
           ORDER BY b.bookmarked_at DESC, b.id DESC
           LIMIT ? OFFSET ?"#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut bookmarks = Vec::with_capacity(rows.len());
    for resource in rows {
        bookmarks.push(build_resource_response(pool, resource, false).await?);
    }

    Ok((bookmarks, Pagination::new(page, limit, total)))
}

async fn my_bookmarks(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let (page, limit, offset) = page_params(query.page, query.limit)?;

    let (bookmarks, pagination) =
        bookmarked_resources(&pool, current_user.id, page, limit, offset).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "bookmarks": bookmarks,
        "pagination": pagination,
    })))
}

async fn user_bookmarks(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> AppResult<impl IntoResponse> {
    find_user(&pool, user_id).await?;
    let (page, limit, offset) = page_params(query.page, query.limit)?;

    let (bookmarks, pagination) = bookmarked_resources(&pool, user_id, page, limit, offset).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "bookmarks": bookmarks,
        "pagination": pagination,
    })))
}

async fn user_uploads(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> AppResult<impl IntoResponse> {
    find_user(&pool, user_id).await?;
    let (page, limit, offset) = page_params(query.page, query.limit)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE author_id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Resource>(
        "SELECT * FROM resources WHERE author_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let mut uploads = Vec::with_capacity(rows.len());
    for resource in rows {
        uploads.push(build_resource_response(&pool, resource, false).await?);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "uploads": uploads,
        "pagination": Pagination::new(page, limit, total),
    })))
}

// ============================
// Leaderboard and dashboard
// ============================

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

async fn leaderboard(
    State(pool): State<SqlitePool>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation(
            "Limit must be between 1 and 100".to_string(),
        ));
    }

    let rows = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY reputation DESC, created_at ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    let entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(index, user)| LeaderboardEntry {
            rank: index + 1,
            user: PublicUser::from(user),
        })
        .collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "leaderboard": entries,
    })))
}

async fn dashboard_stats(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;

    let (total_uploads, total_views, total_downloads, total_upvotes): (i64, i64, i64, i64) =
        sqlx::query_as(
            r#"SELECT COUNT(*), COALESCE(SUM(views), 0), COALESCE(SUM(downloads), 0),
                      COALESCE(SUM(upvotes), 0)
               FROM resources WHERE author_id = ?"#,
        )
        .bind(current_user.id)
        .fetch_one(&pool)
        .await?;

    let total_bookmarks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM resource_bookmarks WHERE user_id = ?")
            .bind(current_user.id)
            .fetch_one(&pool)
            .await?;

    let uploads = recent_uploads(&pool, current_user.id, 5).await?;

    let recent_bookmarks = sqlx::query_as::<_, ResourceSummary>(
        r#"SELECT r.id, r.title, r.resource_type, r.category, r.subject, r.score, r.views,
                  r.downloads, r.created_at
           FROM resources r
           JOIN resource_bookmarks b ON b.resource_id = r.id
           WHERE b.user_id = ?
           ORDER BY b.bookmarked_at DESC, b.id DESC
           LIMIT 5"#,
    )
    .bind(current_user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "stats": {
            "totalUploads": total_uploads,
            "totalBookmarks": total_bookmarks,
            "totalViews": total_views,
            "totalDownloads": total_downloads,
            "totalUpvotes": total_upvotes,
            "reputation": current_user.reputation,
        },
        "recentActivity": {
            "uploads": uploads,
            "bookmarks": recent_bookmarks,
        },
    })))
}

use axum::{
    Router,
    extract::{Json, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::{
    AuthorInfo, CATEGORIES, DIFFICULTIES, ExternalLink, ListResourcesQuery, Pagination,
    RESOURCE_TYPES, Resource, ResourceFile, ResourcePage, ResourceResponse, SEMESTERS, User,
    VoteRequest, VoteTally, VoteType, page_params,
};
use crate::routes::auth::extract_current_user;
use crate::routes::comments::fetch_comments;
use crate::storage;

pub const MAX_FILES_PER_RESOURCE: usize = 5;
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/zip",
    "application/x-rar-compressed",
];

pub fn resources_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/", get(list_resources).post(create_resource))
        .route("/user/my-resources", get(my_resources))
        .route("/{id}", get(get_resource).delete(delete_resource))
        .route("/{id}/vote", post(vote_resource))
        .route("/{id}/bookmark", post(bookmark_resource))
        .route("/{id}/download/{file_index}", get(download_file))
}

// ============================
// Listing / filtering
// ============================

/// Maps the public sort parameters onto (column, direction), rejecting
/// anything outside the allow-list.
pub fn validate_sort(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> Result<(&'static str, &'static str), AppError> {
    let column = match sort_by.unwrap_or("createdAt") {
        "createdAt" => "created_at",
        "votes.score" => "score",
        "views" => "views",
        "downloads" => "downloads",
        _ => {
            return Err(AppError::Validation("Invalid sort field".to_string()));
        }
    };

    let direction = match sort_order.unwrap_or("desc") {
        "asc" => "ASC",
        "desc" => "DESC",
        _ => {
            return Err(AppError::Validation("Invalid sort order".to_string()));
        }
    };

    Ok((column, direction))
}

fn parse_author_filter(author: Option<&str>) -> Result<Option<i64>, AppError> {
    match author {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Validation("Author must be a valid user ID".to_string())),
    }
}

fn push_filters<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    query: &'a ListResourcesQuery,
    author_id: Option<i64>,
) {
    builder.push(" WHERE r.status = 'approved'");

    if let Some(category) = &query.category {
        builder.push(" AND r.category = ").push_bind(category);
    }
    if let Some(resource_type) = &query.resource_type {
        builder
            .push(" AND r.resource_type = ")
            .push_bind(resource_type);
    }
    if let Some(semester) = &query.semester {
        builder.push(" AND r.semester = ").push_bind(semester);
    }
    if let Some(difficulty) = &query.difficulty {
        builder.push(" AND r.difficulty = ").push_bind(difficulty);
    }
    if let Some(author_id) = author_id {
        builder.push(" AND r.author_id = ").push_bind(author_id);
    }

    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (r.title LIKE ").push_bind(pattern.clone());
        builder
            .push(" OR r.description LIKE ")
            .push_bind(pattern.clone());
        builder.push(" OR r.subject LIKE ").push_bind(pattern.clone());
        builder.push(
            " OR EXISTS (SELECT 1 FROM resource_tags t
                 WHERE t.resource_id = r.id AND t.tag LIKE ",
        );
        builder.push_bind(pattern);
        builder.push("))");
    }
}

/// Public listing: approved resources only, filtered, sorted, paginated.
pub async fn query_resources(
    pool: &SqlitePool,
    query: &ListResourcesQuery,
) -> AppResult<ResourcePage> {
    let (page, limit, offset) = page_params(query.page, query.limit)?;
    let (column, direction) = validate_sort(query.sort_by.as_deref(), query.sort_order.as_deref())?;
    let author_id = parse_author_filter(query.author.as_deref())?;

    let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM resources r");
    push_filters(&mut count_builder, query, author_id);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT r.* FROM resources r");
    push_filters(&mut builder, query, author_id);
    builder.push(format!(" ORDER BY r.{} {}, r.id {}", column, direction, direction));
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);

    let rows: Vec<Resource> = builder.build_query_as().fetch_all(pool).await?;

    let mut resources = Vec::with_capacity(rows.len());
    for resource in rows {
        resources.push(build_resource_response(pool, resource, false).await?);
    }

    Ok(ResourcePage {
        resources,
        pagination: Pagination::new(page, limit, total),
    })
}

async fn list_resources(
    State(pool): State<SqlitePool>,
    Query(query): Query<ListResourcesQuery>,
) -> AppResult<impl IntoResponse> {
    let page = query_resources(&pool, &query).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "resources": page.resources,
        "pagination": page.pagination,
    })))
}

async fn my_resources(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Query(query): Query<ListResourcesQuery>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let (page, limit, offset) = page_params(query.page, query.limit)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE author_id = ?")
        .bind(current_user.id)
        .fetch_one(&pool)
        .await?;

    let rows = sqlx::query_as::<_, Resource>(
        "SELECT * FROM resources WHERE author_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(current_user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let mut resources = Vec::with_capacity(rows.len());
    for resource in rows {
        resources.push(build_resource_response(&pool, resource, false).await?);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "resources": resources,
        "pagination": Pagination::new(page, limit, total),
    })))
}

// ============================
// Detail / counters
// ============================

pub async fn find_resource(pool: &SqlitePool, resource_id: i64) -> AppResult<Resource> {
    sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?")
        .bind(resource_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(AppError::resource_not_found)
}

async fn get_resource(
    State(pool): State<SqlitePool>,
    Path(resource_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let mut resource = find_resource(&pool, resource_id).await?;

    // Every fetch counts as a view; repeated fetches by the same viewer
    // are counted again on purpose.
    sqlx::query("UPDATE resources SET views = views + 1 WHERE id = ?")
        .bind(resource_id)
        .execute(&pool)
        .await?;
    resource.views += 1;

    let response = build_resource_response(&pool, resource, true).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "resource": response,
    })))
}

async fn download_file(
    State(pool): State<SqlitePool>,
    Path((resource_id, file_index)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    find_resource(&pool, resource_id).await?;

    let files = fetch_files(&pool, resource_id).await?;
    if file_index < 0 || file_index as usize >= files.len() {
        return Err(AppError::Validation("Invalid file index".to_string()));
    }
    let file = &files[file_index as usize];

    sqlx::query("UPDATE resources SET downloads = downloads + 1 WHERE id = ?")
        .bind(resource_id)
        .execute(&pool)
        .await?;

    // The file lives on the hosting service; hand back a redirect target
    // instead of streaming bytes.
    Ok(Json(serde_json::json!({
        "success": true,
        "downloadUrl": file.url,
        "filename": file.original_name,
        "mimeType": file.mime_type,
    })))
}

// ============================
// Voting
// ============================

/// One vote transition per call: add, toggle off, or switch sides. The
/// counter updates and the voter-row change commit in a single
/// transaction, and `score` is recomputed before it ends.
pub async fn apply_vote(
    pool: &SqlitePool,
    resource_id: i64,
    user_id: i64,
    vote: VoteType,
) -> AppResult<(String, VoteTally)> {
    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM resources WHERE id = ?")
        .bind(resource_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(AppError::resource_not_found)?;

    let existing = sqlx::query_scalar::<_, String>(
        "SELECT vote_type FROM resource_votes WHERE resource_id = ? AND user_id = ?",
    )
    .bind(resource_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let message = match existing.as_deref() {
        // Same vote again: toggle off.
        Some(previous) if previous == vote.as_str() => {
            sqlx::query("DELETE FROM resource_votes WHERE resource_id = ? AND user_id = ?")
                .bind(resource_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            decrement_vote_counter(&mut tx, resource_id, vote).await?;
            "Vote removed".to_string()
        }
        // Opposite vote: switch sides in place.
        Some(_) => {
            let previous = match vote {
                VoteType::Upvote => VoteType::Downvote,
                VoteType::Downvote => VoteType::Upvote,
            };
            sqlx::query(
                "UPDATE resource_votes SET vote_type = ?, voted_at = ? WHERE resource_id = ? AND user_id = ?",
            )
            .bind(vote.as_str())
            .bind(Utc::now())
            .bind(resource_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            decrement_vote_counter(&mut tx, resource_id, previous).await?;
            increment_vote_counter(&mut tx, resource_id, vote).await?;
            format!("{} added", vote.as_str())
        }
        None => {
            sqlx::query(
                "INSERT INTO resource_votes (resource_id, user_id, vote_type, voted_at) VALUES (?, ?, ?, ?)",
            )
            .bind(resource_id)
            .bind(user_id)
            .bind(vote.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
            increment_vote_counter(&mut tx, resource_id, vote).await?;
            format!("{} added", vote.as_str())
        }
    };

    sqlx::query("UPDATE resources SET score = upvotes - downvotes WHERE id = ?")
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;

    let tally = sqlx::query_as::<_, VoteTally>(
        "SELECT upvotes, downvotes, score FROM resources WHERE id = ?",
    )
    .bind(resource_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((message, tally))
}

async fn increment_vote_counter(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    resource_id: i64,
    vote: VoteType,
) -> Result<(), sqlx::Error> {
    let sql = match vote {
        VoteType::Upvote => "UPDATE resources SET upvotes = upvotes + 1 WHERE id = ?",
        VoteType::Downvote => "UPDATE resources SET downvotes = downvotes + 1 WHERE id = ?",
    };
    sqlx::query(sql).bind(resource_id).execute(&mut **tx).await?;
    Ok(())
}

async fn decrement_vote_counter(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    resource_id: i64,
    vote: VoteType,
) -> Result<(), sqlx::Error> {
    // Tallies never go below zero.
    let sql = match vote {
        VoteType::Upvote => "UPDATE resources SET upvotes = MAX(0, upvotes - 1) WHERE id = ?",
        VoteType::Downvote => "UPDATE resources SET downvotes = MAX(0, downvotes - 1) WHERE id = ?",
    };
    sqlx::query(sql).bind(resource_id).execute(&mut **tx).await?;
    Ok(())
}

async fn vote_resource(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(resource_id): Path<i64>,
    Json(input): Json<VoteRequest>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let vote = VoteType::parse(&input.vote_type)?;

    let (message, votes) = apply_vote(&pool, resource_id, current_user.id, vote).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": message,
        "votes": votes,
    })))
}

// ============================
// Bookmarks
// ============================

/// Flips the bookmark for (user, resource) and keeps the denormalized
/// counter in step inside the same transaction. Returns the new state.
pub async fn toggle_bookmark(
    pool: &SqlitePool,
    resource_id: i64,
    user_id: i64,
) -> AppResult<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM resources WHERE id = ?")
        .bind(resource_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(AppError::resource_not_found)?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM resource_bookmarks WHERE resource_id = ? AND user_id = ?",
    )
    .bind(resource_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let is_bookmarked = if let Some(bookmark_id) = existing {
        sqlx::query("DELETE FROM resource_bookmarks WHERE id = ?")
            .bind(bookmark_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE resources SET bookmarks = MAX(0, bookmarks - 1) WHERE id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;
        false
    } else {
        sqlx::query(
            "INSERT INTO resource_bookmarks (resource_id, user_id, bookmarked_at) VALUES (?, ?, ?)",
        )
        .bind(resource_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE resources SET bookmarks = bookmarks + 1 WHERE id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;
        true
    };

    tx.commit().await?;

    Ok(is_bookmarked)
}

async fn bookmark_resource(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(resource_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;

    let is_bookmarked = toggle_bookmark(&pool, resource_id, current_user.id).await?;
    let message = if is_bookmarked {
        "Resource bookmarked"
    } else {
        "Bookmark removed"
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "message": message,
        "isBookmarked": is_bookmarked,
    })))
}

// ============================
// Create / delete
// ============================

#[derive(Debug, Default)]
struct ResourceForm {
    title: String,
    description: String,
    resource_type: String,
    category: String,
    subject: String,
    semester: String,
    difficulty: Option<String>,
    content: String,
    tags_json: Option<String>,
    links_json: Option<String>,
}

impl ResourceForm {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() || title.len() > 200 {
            errors.push("Title must be between 1 and 200 characters".to_string());
        }

        let description = self.description.trim();
        if description.is_empty() || description.len() > 1000 {
            errors.push("Description must be between 1 and 1000 characters".to_string());
        }

        if !RESOURCE_TYPES.contains(&self.resource_type.as_str()) {
            errors.push("Invalid resource type".to_string());
        }
        if !CATEGORIES.contains(&self.category.as_str()) {
            errors.push("Invalid category".to_string());
        }
        if self.subject.trim().is_empty() {
            errors.push("Subject is required".to_string());
        }
        if !SEMESTERS.contains(&self.semester.as_str()) {
            errors.push("Invalid semester".to_string());
        }
        if let Some(difficulty) = &self.difficulty {
            if !DIFFICULTIES.contains(&difficulty.as_str()) {
                errors.push("Invalid difficulty level".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationErrors(errors))
        }
    }

    // FormData carries tags and externalLinks as JSON strings; a parse
    // failure falls back to empty rather than rejecting the upload.
    fn tags(&self) -> Vec<String> {
        let parsed: Vec<String> = self
            .tags_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        parsed
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn external_links(&self) -> Vec<ExternalLink> {
        self.links_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

struct UploadedPart {
    original_name: String,
    mime_type: String,
    data: Vec<u8>,
}

async fn create_resource(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;

    let mut form = ResourceForm::default();
    let mut parts: Vec<UploadedPart> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = read_text(field).await?,
            "description" => form.description = read_text(field).await?,
            "type" => form.resource_type = read_text(field).await?,
            "category" => form.category = read_text(field).await?,
            "subject" => form.subject = read_text(field).await?,
            "semester" => form.semester = read_text(field).await?,
            "difficulty" => form.difficulty = Some(read_text(field).await?),
            "content" => form.content = read_text(field).await?,
            "tags" => form.tags_json = Some(read_text(field).await?),
            "externalLinks" => form.links_json = Some(read_text(field).await?),
            "files" => {
                if parts.len() >= MAX_FILES_PER_RESOURCE {
                    return Err(AppError::Validation(
                        "Too many files. Maximum 5 files allowed.".to_string(),
                    ));
                }

                let original_name = field.file_name().unwrap_or("file").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
                    return Err(AppError::Validation(
                        "Invalid file type. Only PDF, DOC, DOCX, PPT, PPTX, TXT, ZIP, RAR and image files are allowed.".to_string(),
                    ));
                }

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;

                if data.len() > MAX_FILE_SIZE {
                    return Err(AppError::Validation(
                        "File too large. Maximum size is 10MB.".to_string(),
                    ));
                }

                parts.push(UploadedPart {
                    original_name,
                    mime_type,
                    data: data.to_vec(),
                });
            }
            _ => {}
        }
    }

    form.validate()?;

    // Push each file to the hosting service before touching the database;
    // descriptors carry the returned URL and deletable handle.
    let mut hosted_files = Vec::with_capacity(parts.len());
    for part in &parts {
        let hosted = storage::upload(&part.original_name, &part.mime_type, &part.data).await?;
        hosted_files.push(hosted);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"INSERT INTO resources
               (title, description, resource_type, category, subject, semester, difficulty,
                content, author_id, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'approved', ?)"#,
    )
    .bind(form.title.trim())
    .bind(form.description.trim())
    .bind(&form.resource_type)
    .bind(&form.category)
    .bind(form.subject.trim())
    .bind(&form.semester)
    .bind(form.difficulty.as_deref().unwrap_or("Intermediate"))
    .bind(&form.content)
    .bind(current_user.id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let resource_id = result.last_insert_rowid();

    for (part, hosted) in parts.iter().zip(&hosted_files) {
        sqlx::query(
            r#"INSERT INTO resource_files
                   (resource_id, file_name, original_name, url, public_id, size, mime_type, uploaded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(resource_id)
        .bind(&hosted.file_name)
        .bind(&part.original_name)
        .bind(&hosted.url)
        .bind(&hosted.public_id)
        .bind(part.data.len() as i64)
        .bind(&part.mime_type)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    for link in form.external_links() {
        sqlx::query(
            "INSERT INTO resource_links (resource_id, title, url, description) VALUES (?, ?, ?, ?)",
        )
        .bind(resource_id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(&link.description)
        .execute(&mut *tx)
        .await?;
    }

    for tag in form.tags() {
        sqlx::query("INSERT OR IGNORE INTO resource_tags (resource_id, tag) VALUES (?, ?)")
            .bind(resource_id)
            .bind(&tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let resource = find_resource(&pool, resource_id).await?;
    let response = build_resource_response(&pool, resource, false).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Resource created successfully",
            "resource": response,
        })),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Removes a resource and every row that hangs off it.
pub async fn delete_resource_record(pool: &SqlitePool, resource_id: i64) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    for table in [
        "resource_files",
        "resource_links",
        "resource_tags",
        "resource_votes",
        "resource_bookmarks",
        "comments",
    ] {
        let sql = format!("DELETE FROM {} WHERE resource_id = ?", table);
        sqlx::query(&sql).bind(resource_id).execute(&mut *tx).await?;
    }

    sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(resource_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

async fn delete_resource(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Path(resource_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;
    let resource = find_resource(&pool, resource_id).await?;

    if resource.author_id != current_user.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this resource".to_string(),
        ));
    }

    // Best-effort hosted-file cleanup: the record goes away regardless.
    let files = fetch_files(&pool, resource_id).await?;
    for file in &files {
        if let Err(e) = storage::delete_hosted_file(&file.public_id).await {
            tracing::warn!(public_id = %file.public_id, error = %e, "failed to delete hosted file");
        }
    }

    delete_resource_record(&pool, resource_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Resource deleted successfully",
    })))
}

// ============================
// Response assembly
// ============================

pub async fn fetch_files(pool: &SqlitePool, resource_id: i64) -> AppResult<Vec<ResourceFile>> {
    let files = sqlx::query_as::<_, ResourceFile>(
        "SELECT * FROM resource_files WHERE resource_id = ? ORDER BY id",
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await?;

    Ok(files)
}

pub async fn build_resource_response(
    pool: &SqlitePool,
    resource: Resource,
    include_comments: bool,
) -> AppResult<ResourceResponse> {
    let author = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(resource.author_id)
        .fetch_one(pool)
        .await?;

    let files = fetch_files(pool, resource.id).await?;

    let external_links = sqlx::query_as::<_, ExternalLink>(
        "SELECT * FROM resource_links WHERE resource_id = ? ORDER BY id",
    )
    .bind(resource.id)
    .fetch_all(pool)
    .await?;

    let tags = sqlx::query_scalar::<_, String>(
        "SELECT tag FROM resource_tags WHERE resource_id = ? ORDER BY tag",
    )
    .bind(resource.id)
    .fetch_all(pool)
    .await?;

    let comments = if include_comments {
        Some(fetch_comments(pool, resource.id).await?)
    } else {
        None
    };

    Ok(ResourceResponse {
        id: resource.id,
        title: resource.title,
        description: resource.description,
        resource_type: resource.resource_type,
        category: resource.category,
        subject: resource.subject,
        semester: resource.semester,
        difficulty: resource.difficulty,
        tags,
        content: resource.content,
        author: AuthorInfo::from(&author),
        files,
        external_links,
        votes: VoteTally {
            upvotes: resource.upvotes,
            downvotes: resource.downvotes,
            score: resource.score,
        },
        views: resource.views,
        downloads: resource.downloads,
        bookmarks: resource.bookmarks,
        is_verified: resource.is_verified,
        featured: resource.featured,
        status: resource.status,
        created_at: resource.created_at,
        updated_at: resource.updated_at,
        comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_allow_list() {
        assert_eq!(validate_sort(None, None).unwrap(), ("created_at", "DESC"));
        assert_eq!(
            validate_sort(Some("votes.score"), Some("asc")).unwrap(),
            ("score", "ASC")
        );
        assert_eq!(
            validate_sort(Some("views"), None).unwrap(),
            ("views", "DESC")
        );
        assert_eq!(
            validate_sort(Some("downloads"), Some("desc")).unwrap(),
            ("downloads", "DESC")
        );

        assert!(validate_sort(Some("title"), None).is_err());
        assert!(validate_sort(None, Some("sideways")).is_err());
    }

    #[test]
    fn author_filter_must_be_an_id() {
        assert_eq!(parse_author_filter(None).unwrap(), None);
        assert_eq!(parse_author_filter(Some("42")).unwrap(), Some(42));
        assert!(parse_author_filter(Some("not-an-id")).is_err());
    }

    #[test]
    fn form_validation_collects_all_errors() {
        let form = ResourceForm {
            title: String::new(),
            description: "d".repeat(1001),
            resource_type: "mixtape".to_string(),
            category: "Computer Science".to_string(),
            subject: "Algorithms".to_string(),
            semester: "9th Semester".to_string(),
            difficulty: Some("Impossible".to_string()),
            ..ResourceForm::default()
        };

        let Err(AppError::ValidationErrors(errors)) = form.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn tags_are_normalized() {
        let form = ResourceForm {
            tags_json: Some(r#"["  DSA ", "Graphs", "", "dsa"]"#.to_string()),
            ..ResourceForm::default()
        };
        assert_eq!(form.tags(), vec!["dsa", "graphs", "dsa"]);

        let broken = ResourceForm {
            tags_json: Some("not json".to_string()),
            ..ResourceForm::default()
        };
        assert!(broken.tags().is_empty());
    }
}

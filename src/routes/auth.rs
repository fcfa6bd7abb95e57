use axum::{
    Router,
    extract::{Json, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post, put},
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{LoginUser, RegisterUser, STREAMS, UpdateProfile, User, UserResponse, YEARS};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn auth_routes() -> Router<SqlitePool> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(get_me))
        .route("/profile", put(update_profile))
}

fn jwt_secret() -> String {
    std::env::var("SECRET_KEY").unwrap_or_else(|_| "your-secret-key".to_string())
}

pub fn generate_jwt(user_id: i64) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::days(7))
        .ok_or_else(|| AppError::Internal("invalid expiry timestamp".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

fn validate_registration(input: &RegisterUser) -> Result<(), AppError> {
    let mut errors = Vec::new();

    let username = input.username.trim();
    if username.len() < 3 || username.len() > 30 {
        errors.push("Username must be between 3 and 30 characters".to_string());
    }

    let email = input.email.trim();
    if email.is_empty() || !email.contains('@') {
        errors.push("A valid email is required".to_string());
    }

    if input.password.len() < 6 {
        errors.push("Password must be at least 6 characters".to_string());
    }

    if input.first_name.trim().is_empty() {
        errors.push("First name is required".to_string());
    }
    if input.last_name.trim().is_empty() {
        errors.push("Last name is required".to_string());
    }
    if input.college.trim().is_empty() {
        errors.push("College is required".to_string());
    }

    if !STREAMS.contains(&input.stream.as_str()) {
        errors.push("Invalid stream".to_string());
    }
    if !YEARS.contains(&input.year.as_str()) {
        errors.push("Invalid year".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationErrors(errors))
    }
}

async fn register(
    State(pool): State<SqlitePool>,
    Json(input): Json<RegisterUser>,
) -> AppResult<impl IntoResponse> {
    validate_registration(&input)?;

    let username = input.username.trim();
    let email = input.email.trim().to_lowercase();

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? OR email = ?")
        .bind(username)
        .bind(&email)
        .fetch_optional(&pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Username or email already registered".to_string(),
        ));
    }

    let password_hash = hash(&input.password, DEFAULT_COST)?;
    let now = Utc::now();

    let result = sqlx::query(
        r#"INSERT INTO users (username, email, password_hash, first_name, last_name, college, stream, year, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(&email)
    .bind(&password_hash)
    .bind(input.first_name.trim())
    .bind(input.last_name.trim())
    .bind(input.college.trim())
    .bind(&input.stream)
    .bind(&input.year)
    .bind(now)
    .execute(&pool)
    .await?;

    let user_id = result.last_insert_rowid();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let token = generate_jwt(user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Registration successful",
            "token": token,
            "user": UserResponse::from(user),
        })),
    ))
}

async fn login(
    State(pool): State<SqlitePool>,
    Json(input): Json<LoginUser>,
) -> AppResult<impl IntoResponse> {
    let email = input.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let valid = verify(&input.password, &user.password_hash)?;
    if !valid {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = generate_jwt(user.id)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": UserResponse::from(user),
    })))
}

async fn get_me(State(pool): State<SqlitePool>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let user = extract_current_user(&pool, &headers).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}

async fn update_profile(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(input): Json<UpdateProfile>,
) -> AppResult<impl IntoResponse> {
    let current_user = extract_current_user(&pool, &headers).await?;

    if let Some(stream) = &input.stream {
        if !STREAMS.contains(&stream.as_str()) {
            return Err(AppError::Validation("Invalid stream".to_string()));
        }
    }
    if let Some(year) = &input.year {
        if !YEARS.contains(&year.as_str()) {
            return Err(AppError::Validation("Invalid year".to_string()));
        }
    }
    if let Some(bio) = &input.bio {
        if bio.len() > 500 {
            return Err(AppError::Validation(
                "Bio must be at most 500 characters".to_string(),
            ));
        }
    }

    let first_name = input
        .first_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(current_user.first_name);
    let last_name = input
        .last_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(current_user.last_name);
    let college = input
        .college
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(current_user.college);
    let stream = input.stream.unwrap_or(current_user.stream);
    let year = input.year.unwrap_or(current_user.year);
    let bio = input.bio.unwrap_or(current_user.bio);
    let profile_picture = input.profile_picture.or(current_user.profile_picture);

    let now = Utc::now();
    sqlx::query(
        r#"UPDATE users
           SET first_name = ?, last_name = ?, college = ?, stream = ?, year = ?, bio = ?, profile_picture = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(&college)
    .bind(&stream)
    .bind(&year)
    .bind(&bio)
    .bind(&profile_picture)
    .bind(now)
    .bind(current_user.id)
    .execute(&pool)
    .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(current_user.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": UserResponse::from(user),
    })))
}

/// Resolves the bearer token in `Authorization` to an existing user.
pub async fn extract_current_user(pool: &SqlitePool, headers: &HeaderMap) -> AppResult<User> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("No authorization header provided".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization format. Use: Bearer <token>".to_string())
        })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token has expired".to_string())
        }
        _ => AppError::unauthorized(),
    })?;

    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::unauthorized())?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Token is not valid - user not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registration() -> RegisterUser {
        RegisterUser {
            username: "rkumar".to_string(),
            email: "r.kumar@example.edu".to_string(),
            password: "hunter22".to_string(),
            first_name: "Ravi".to_string(),
            last_name: "Kumar".to_string(),
            college: "NIT Trichy".to_string(),
            stream: "Computer Science".to_string(),
            year: "3rd Year".to_string(),
        }
    }

    #[test]
    fn registration_accepts_valid_input() {
        assert!(validate_registration(&sample_registration()).is_ok());
    }

    #[test]
    fn registration_rejects_bad_fields() {
        let mut input = sample_registration();
        input.username = "ab".to_string();
        input.password = "short".to_string();
        input.stream = "Astrology".to_string();

        let Err(AppError::ValidationErrors(errors)) = validate_registration(&input) else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 3);
    }
}

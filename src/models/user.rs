use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STREAMS: &[&str] = &[
    "Computer Science",
    "Information Technology",
    "Electronics & Communication",
    "Electrical Engineering",
    "Mechanical Engineering",
    "Civil Engineering",
    "Chemical Engineering",
    "Aerospace Engineering",
    "Biomedical Engineering",
    "Industrial Engineering",
    "Other",
];

pub const YEARS: &[&str] = &["1st Year", "2nd Year", "3rd Year", "4th Year", "Graduate"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub stream: String,
    pub year: String,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub reputation: i64,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The acting user's own view, returned by auth routes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub stream: String,
    pub year: String,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub reputation: i64,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            college: user.college,
            stream: user.stream,
            year: user.year,
            profile_picture: user.profile_picture,
            bio: user.bio,
            reputation: user.reputation,
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Public profile view: email stays private.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub stream: String,
    pub year: String,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub reputation: i64,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            college: user.college,
            stream: user.stream,
            year: user.year,
            profile_picture: user.profile_picture,
            bio: user.bio,
            reputation: user.reputation,
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Author fields embedded in resource and comment responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub stream: String,
    pub profile_picture: Option<String>,
}

impl From<&User> for AuthorInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            college: user.college.clone(),
            stream: user.stream.clone(),
            profile_picture: user.profile_picture.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub college: String,
    pub stream: String,
    pub year: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub college: Option<String>,
    pub stream: Option<String>,
    pub year: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub college: Option<String>,
    pub stream: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::pagination::Pagination;
use super::user::AuthorInfo;
use crate::error::AppError;

pub const RESOURCE_TYPES: &[&str] = &[
    "notes",
    "book",
    "blog",
    "recommendation",
    "project",
    "assignment",
    "research_paper",
];

pub const CATEGORIES: &[&str] = &[
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
    "Mathematics",
    "Physics",
    "Chemistry",
    "General Engineering",
    "Other",
];

pub const SEMESTERS: &[&str] = &[
    "1st Semester",
    "2nd Semester",
    "3rd Semester",
    "4th Semester",
    "5th Semester",
    "6th Semester",
    "7th Semester",
    "8th Semester",
    "All Semesters",
];

pub const DIFFICULTIES: &[&str] = &["Beginner", "Intermediate", "Advanced"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "upvote" => Ok(Self::Upvote),
            "downvote" => Ok(Self::Downvote),
            _ => Err(AppError::Validation(
                "Vote type must be either upvote or downvote".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub resource_type: String,
    pub category: String,
    pub subject: String,
    pub semester: String,
    pub difficulty: String,
    pub content: String,
    pub author_id: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub views: i64,
    pub downloads: i64,
    pub bookmarks: i64,
    pub is_verified: bool,
    pub featured: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFile {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub resource_id: i64,
    pub file_name: String,
    pub original_name: String,
    pub url: String,
    pub public_id: String,
    pub size: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExternalLink {
    #[serde(skip_serializing, default)]
    pub id: i64,
    #[serde(skip_serializing, default)]
    pub resource_id: i64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, FromRow)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub category: String,
    pub subject: String,
    pub semester: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub content: String,
    pub author: AuthorInfo,
    pub files: Vec<ResourceFile>,
    pub external_links: Vec<ExternalLink>,
    pub votes: VoteTally,
    pub views: i64,
    pub downloads: i64,
    pub bookmarks: i64,
    pub is_verified: bool,
    pub featured: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<super::comment::CommentResponse>>,
}

/// Compact shape for profile pages and dashboard activity lists.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub category: String,
    pub subject: String,
    pub score: i64,
    pub views: i64,
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub semester: Option<String>,
    pub difficulty: Option<String>,
    pub author: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePage {
    pub resources: Vec<ResourceResponse>,
    pub pagination: Pagination,
}

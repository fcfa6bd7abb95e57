mod common;

use common::{seed_resource, seed_user, test_pool};
use educate_backend::error::AppError;
use educate_backend::models::{VoteTally, VoteType};
use educate_backend::routes::comments::{add_comment, fetch_comments};
use educate_backend::routes::resources::{
    apply_vote, delete_resource_record, find_resource, toggle_bookmark,
};
use sqlx::SqlitePool;

async fn tally(pool: &SqlitePool, resource_id: i64) -> VoteTally {
    sqlx::query_as("SELECT upvotes, downvotes, score FROM resources WHERE id = ?")
        .bind(resource_id)
        .fetch_one(pool)
        .await
        .expect("tally")
}

async fn voter_count(pool: &SqlitePool, resource_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM resource_votes WHERE resource_id = ?")
        .bind(resource_id)
        .fetch_one(pool)
        .await
        .expect("voter count")
}

#[tokio::test]
async fn upvote_then_undo_restores_counters() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let voter = seed_user(&pool, "voter").await;
    let resource = seed_resource(&pool, author, "Graph Theory Notes", "Mathematics", "Graphs").await;

    let (message, votes) = apply_vote(&pool, resource, voter, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!(message, "upvote added");
    assert_eq!(votes.upvotes, 1);
    assert_eq!(votes.downvotes, 0);
    assert_eq!(votes.score, 1);
    assert_eq!(voter_count(&pool, resource).await, 1);

    // The same vote again toggles it off.
    let (message, votes) = apply_vote(&pool, resource, voter, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!(message, "Vote removed");
    assert_eq!(votes.upvotes, 0);
    assert_eq!(votes.downvotes, 0);
    assert_eq!(votes.score, 0);
    assert_eq!(voter_count(&pool, resource).await, 0);
}

#[tokio::test]
async fn switching_sides_moves_one_count_each_way() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let voter = seed_user(&pool, "voter").await;
    let resource = seed_resource(&pool, author, "DBMS Question Bank", "Computer Science", "DBMS").await;

    apply_vote(&pool, resource, voter, VoteType::Upvote)
        .await
        .unwrap();
    let (message, votes) = apply_vote(&pool, resource, voter, VoteType::Downvote)
        .await
        .unwrap();

    assert_eq!(message, "downvote added");
    assert_eq!(votes.upvotes, 0);
    assert_eq!(votes.downvotes, 1);
    assert_eq!(votes.score, -1);
    // Still a single voter entry for this user.
    assert_eq!(voter_count(&pool, resource).await, 1);
}

#[tokio::test]
async fn score_always_equals_upvotes_minus_downvotes() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let a = seed_user(&pool, "alice").await;
    let b = seed_user(&pool, "bob").await;
    let c = seed_user(&pool, "carol").await;
    let resource = seed_resource(&pool, author, "OS Lab Manual", "Computer Science", "OS").await;

    let sequence = [
        (a, VoteType::Upvote),
        (b, VoteType::Downvote),
        (c, VoteType::Upvote),
        (a, VoteType::Downvote),
        (b, VoteType::Downvote),
        (c, VoteType::Upvote),
    ];

    for (user, vote) in sequence {
        let (_, votes) = apply_vote(&pool, resource, user, vote).await.unwrap();
        assert_eq!(votes.score, votes.upvotes - votes.downvotes);
        assert!(votes.upvotes >= 0);
        assert!(votes.downvotes >= 0);

        let stored = tally(&pool, resource).await;
        assert_eq!(stored.score, votes.score);
    }
}

#[tokio::test]
async fn vote_on_missing_resource_is_not_found() {
    let pool = test_pool().await;
    let voter = seed_user(&pool, "voter").await;

    let err = apply_vote(&pool, 9999, voter, VoteType::Upvote)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn bookmark_toggle_is_its_own_inverse() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let reader = seed_user(&pool, "reader").await;
    let resource = seed_resource(&pool, author, "Thermo Cheat Sheet", "Mechanical Engineering", "Thermodynamics").await;

    let on = toggle_bookmark(&pool, resource, reader).await.unwrap();
    assert!(on);
    let resource_row = find_resource(&pool, resource).await.unwrap();
    assert_eq!(resource_row.bookmarks, 1);

    let off = toggle_bookmark(&pool, resource, reader).await.unwrap();
    assert!(!off);
    let resource_row = find_resource(&pool, resource).await.unwrap();
    assert_eq!(resource_row.bookmarks, 0);

    let membership: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM resource_bookmarks WHERE resource_id = ?")
            .bind(resource)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(membership, 0);
}

#[tokio::test]
async fn bookmark_count_tracks_membership_across_users() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let a = seed_user(&pool, "alice").await;
    let b = seed_user(&pool, "bob").await;
    let resource = seed_resource(&pool, author, "Signals Primer", "Electronics & Communication", "Signals").await;

    toggle_bookmark(&pool, resource, a).await.unwrap();
    toggle_bookmark(&pool, resource, b).await.unwrap();
    toggle_bookmark(&pool, resource, a).await.unwrap();

    let row = find_resource(&pool, resource).await.unwrap();
    assert_eq!(row.bookmarks, 1);

    let remaining: Vec<i64> = sqlx::query_scalar(
        "SELECT user_id FROM resource_bookmarks WHERE resource_id = ? ORDER BY user_id",
    )
    .bind(resource)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(remaining, vec![b]);
}

#[tokio::test]
async fn comment_append_resolves_author_and_validates_bounds() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let commenter = seed_user(&pool, "commenter").await;
    let resource = seed_resource(&pool, author, "Compiler Notes", "Computer Science", "Compilers").await;

    let err = add_comment(&pool, resource, commenter, "   ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = add_comment(&pool, resource, commenter, &"x".repeat(501))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let comment = add_comment(&pool, resource, commenter, "  Very helpful, thanks!  ")
        .await
        .unwrap();
    assert_eq!(comment.content, "Very helpful, thanks!");
    assert_eq!(comment.user.username, "commenter");

    let second = add_comment(&pool, resource, author, "Glad it helped")
        .await
        .unwrap();

    // Newest first.
    let listed = fetch_comments(&pool, resource).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, comment.id);
}

#[tokio::test]
async fn deleting_a_resource_removes_it_and_its_children() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let voter = seed_user(&pool, "voter").await;
    let resource = seed_resource(&pool, author, "Circuits Workbook", "Electrical Engineering", "Circuits").await;

    apply_vote(&pool, resource, voter, VoteType::Upvote)
        .await
        .unwrap();
    toggle_bookmark(&pool, resource, voter).await.unwrap();
    add_comment(&pool, resource, voter, "bookmarking this").await.unwrap();

    delete_resource_record(&pool, resource).await.unwrap();

    let err = find_resource(&pool, resource).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    for table in ["resource_votes", "resource_bookmarks", "comments"] {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE resource_id = ?", table);
        let orphans: i64 = sqlx::query_scalar(&sql)
            .bind(resource)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0, "orphan rows left in {}", table);
    }
}

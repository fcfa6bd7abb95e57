mod common;

use common::{seed_resource, seed_user, tag_resource, test_pool};
use educate_backend::models::{ListResourcesQuery, VoteType};
use educate_backend::routes::resources::{apply_vote, delete_resource_record, query_resources};
use sqlx::SqlitePool;

fn query() -> ListResourcesQuery {
    ListResourcesQuery::default()
}

async fn titles(pool: &SqlitePool, query: &ListResourcesQuery) -> Vec<String> {
    query_resources(pool, query)
        .await
        .unwrap()
        .resources
        .into_iter()
        .map(|r| r.title)
        .collect()
}

#[tokio::test]
async fn listing_restricts_to_approved_resources() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    seed_resource(&pool, author, "Visible", "Computer Science", "Networks").await;
    let hidden = seed_resource(&pool, author, "Hidden", "Computer Science", "Networks").await;

    sqlx::query("UPDATE resources SET status = 'pending' WHERE id = ?")
        .bind(hidden)
        .execute(&pool)
        .await
        .unwrap();

    let listed = titles(&pool, &query()).await;
    assert_eq!(listed, vec!["Visible"]);
}

#[tokio::test]
async fn category_and_author_filters_narrow_results() {
    let pool = test_pool().await;
    let a = seed_user(&pool, "alice").await;
    let b = seed_user(&pool, "bob").await;
    seed_resource(&pool, a, "CS Notes", "Computer Science", "Algorithms").await;
    seed_resource(&pool, a, "Math Notes", "Mathematics", "Calculus").await;
    seed_resource(&pool, b, "More CS Notes", "Computer Science", "Algorithms").await;

    let by_category = ListResourcesQuery {
        category: Some("Computer Science".to_string()),
        ..query()
    };
    let mut listed = titles(&pool, &by_category).await;
    listed.sort();
    assert_eq!(listed, vec!["CS Notes", "More CS Notes"]);

    let by_author = ListResourcesQuery {
        author: Some(a.to_string()),
        ..query()
    };
    let mut listed = titles(&pool, &by_author).await;
    listed.sort();
    assert_eq!(listed, vec!["CS Notes", "Math Notes"]);

    let bad_author = ListResourcesQuery {
        author: Some("not-an-id".to_string()),
        ..query()
    };
    assert!(query_resources(&pool, &bad_author).await.is_err());
}

#[tokio::test]
async fn search_is_case_insensitive_across_fields() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    seed_resource(&pool, author, "Advanced DSA Handbook", "Computer Science", "Data Structures").await;
    let by_subject = seed_resource(&pool, author, "Second Year Pack", "Computer Science", "Microprocessors").await;
    let by_tag = seed_resource(&pool, author, "Exam Kit", "Computer Science", "Networks").await;
    tag_resource(&pool, by_tag, "dsa").await;
    seed_resource(&pool, author, "Unrelated", "Physics", "Optics").await;

    let search = |term: &str| ListResourcesQuery {
        search: Some(term.to_string()),
        ..query()
    };

    let mut listed = titles(&pool, &search("dsa")).await;
    listed.sort();
    assert_eq!(listed, vec!["Advanced DSA Handbook", "Exam Kit"]);

    // Same matches regardless of case.
    let mut upper = titles(&pool, &search("DSA")).await;
    upper.sort();
    assert_eq!(upper, listed);

    let by_subject_hits = titles(&pool, &search("microPROC")).await;
    assert_eq!(by_subject_hits.len(), 1);
    assert_eq!(
        query_resources(&pool, &search("microPROC")).await.unwrap().resources[0].id,
        by_subject
    );

    assert!(titles(&pool, &search("quantum")).await.is_empty());
}

#[tokio::test]
async fn sorting_follows_the_allow_list() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let voter_a = seed_user(&pool, "alice").await;
    let voter_b = seed_user(&pool, "bob").await;
    let low = seed_resource(&pool, author, "Low", "Computer Science", "Misc").await;
    let high = seed_resource(&pool, author, "High", "Computer Science", "Misc").await;
    let mid = seed_resource(&pool, author, "Mid", "Computer Science", "Misc").await;

    apply_vote(&pool, high, voter_a, VoteType::Upvote).await.unwrap();
    apply_vote(&pool, high, voter_b, VoteType::Upvote).await.unwrap();
    apply_vote(&pool, mid, voter_a, VoteType::Upvote).await.unwrap();
    apply_vote(&pool, low, voter_a, VoteType::Downvote).await.unwrap();

    let by_score = ListResourcesQuery {
        sort_by: Some("votes.score".to_string()),
        sort_order: Some("desc".to_string()),
        ..query()
    };
    assert_eq!(titles(&pool, &by_score).await, vec!["High", "Mid", "Low"]);

    let ascending = ListResourcesQuery {
        sort_by: Some("votes.score".to_string()),
        sort_order: Some("asc".to_string()),
        ..query()
    };
    assert_eq!(titles(&pool, &ascending).await, vec!["Low", "Mid", "High"]);

    let invalid = ListResourcesQuery {
        sort_by: Some("title".to_string()),
        ..query()
    };
    assert!(query_resources(&pool, &invalid).await.is_err());
}

#[tokio::test]
async fn pagination_math_and_out_of_range_pages() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    for i in 0..7 {
        seed_resource(&pool, author, &format!("Resource {}", i), "Computer Science", "Misc").await;
    }

    let page = |p: i64| ListResourcesQuery {
        page: Some(p),
        limit: Some(3),
        ..query()
    };

    let first = query_resources(&pool, &page(1)).await.unwrap();
    assert_eq!(first.resources.len(), 3);
    assert_eq!(first.pagination.total, 7);
    assert_eq!(first.pagination.total_pages, 3);
    assert!(first.pagination.has_next);
    assert!(!first.pagination.has_prev);

    let last = query_resources(&pool, &page(3)).await.unwrap();
    assert_eq!(last.resources.len(), 1);
    assert!(!last.pagination.has_next);
    assert!(last.pagination.has_prev);

    // Past the end: empty result, not an error.
    let beyond = query_resources(&pool, &page(5)).await.unwrap();
    assert!(beyond.resources.is_empty());
    assert_eq!(beyond.pagination.total_pages, 3);

    let zero_page = query_resources(&pool, &page(0)).await;
    assert!(zero_page.is_err());

    let oversized = ListResourcesQuery {
        limit: Some(51),
        ..query()
    };
    assert!(query_resources(&pool, &oversized).await.is_err());
}

#[tokio::test]
async fn deleted_resources_disappear_from_listings() {
    let pool = test_pool().await;
    let author = seed_user(&pool, "author").await;
    let keep = seed_resource(&pool, author, "Keep", "Computer Science", "Misc").await;
    let removed = seed_resource(&pool, author, "Drop", "Computer Science", "Misc").await;

    delete_resource_record(&pool, removed).await.unwrap();

    let page = query_resources(&pool, &query()).await.unwrap();
    let ids: Vec<i64> = page.resources.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![keep]);
    assert_eq!(page.pagination.total, 1);
}

mod common;

use std::time::Duration;

use bookforum_api::error::StoreError;
use bookforum_api::store::{
    BatchOp, Counter, DocumentStore, LiveQuery, Mutation, PageQuery, PAGE_SIZE,
};
use bookforum_shared::VoteDirection;
use common::*;

#[test]
fn first_page_is_newest_first() {
    let (_dir, store) = temp_store();
    let posts = seed_posts(&store, 7);

    let page = store.query_posts(&PageQuery::first(PAGE_SIZE)).unwrap();
    assert_eq!(ids(&page.posts), ids(&posts[..5]));
    assert_eq!(page.cursor, Some(posts[4].cursor()));
}

#[test]
fn pages_resume_after_cursor() {
    let (_dir, store) = temp_store();
    let posts = seed_posts(&store, 7);

    let first = store.query_posts(&PageQuery::first(PAGE_SIZE)).unwrap();
    let second = store
        .query_posts(&PageQuery::after(PAGE_SIZE, first.cursor.unwrap()))
        .unwrap();
    assert_eq!(ids(&second.posts), ids(&posts[5..]));

    let third = store
        .query_posts(&PageQuery::after(PAGE_SIZE, second.cursor.unwrap()))
        .unwrap();
    assert!(third.posts.is_empty());
    assert!(third.cursor.is_none());
}

#[test]
fn identical_timestamps_page_without_gaps_or_duplicates() {
    let (_dir, store) = temp_store();
    for n in 0..11 {
        store.create_post_at(new_post(n), 5_000).unwrap();
    }

    let mut seen = Vec::new();
    let mut query = PageQuery::first(PAGE_SIZE);
    loop {
        let page = store.query_posts(&query).unwrap();
        seen.extend(ids(&page.posts));
        match page.cursor {
            Some(cursor) if page.posts.len() == PAGE_SIZE => {
                query = PageQuery::after(PAGE_SIZE, cursor)
            }
            _ => break,
        }
    }

    let mut expected = seen.clone();
    expected.sort();
    expected.reverse();
    expected.dedup();
    assert_eq!(seen.len(), 11);
    assert_eq!(seen, expected);
}

#[test]
fn comments_are_counted_but_cache_untouched() {
    let (_dir, store) = temp_store();
    let post = seed_posts(&store, 1).remove(0);
    add_comments(&store, &post.id, 3);

    assert_eq!(store.count_comments(&post.id).unwrap(), 3);
    assert_eq!(store.get_post(&post.id).unwrap().unwrap().comment_count, 0);
}

#[test]
fn comment_on_missing_post_is_rejected() {
    let (_dir, store) = temp_store();
    let err = store
        .add_comment(
            "nope",
            bookforum_shared::NewComment {
                user_name: "x".into(),
                body: "y".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn batch_applies_every_mutation() {
    let (_dir, store) = temp_store();
    let post = seed_posts(&store, 1).remove(0);

    store
        .commit(&[
            BatchOp::new(&post.id, Mutation::Set(Counter::UpVotes, 3)),
            BatchOp::new(&post.id, Mutation::Increment(Counter::UpVotes, 1)),
            BatchOp::new(&post.id, Mutation::Increment(Counter::Interactions, 1)),
            BatchOp::new(&post.id, Mutation::SetVoter("ann".into(), VoteDirection::Up)),
        ])
        .unwrap();

    let stored = store.get_post(&post.id).unwrap().unwrap();
    assert_eq!(stored.up_votes, 4);
    assert_eq!(stored.interactions, 1);
    assert_eq!(stored.vote_of("ann"), Some(VoteDirection::Up));

    store
        .commit(&[BatchOp::new(&post.id, Mutation::DeleteVoter("ann".into()))])
        .unwrap();
    assert!(store.get_post(&post.id).unwrap().unwrap().voters.is_empty());
}

#[test]
fn batch_is_all_or_nothing() {
    let (_dir, store) = temp_store();
    let post = seed_posts(&store, 1).remove(0);

    let err = store
        .commit(&[
            BatchOp::new(&post.id, Mutation::Increment(Counter::DownVotes, 1)),
            BatchOp::new(&post.id, Mutation::SetVoter("ann".into(), VoteDirection::Down)),
            BatchOp::new("missing", Mutation::Increment(Counter::Interactions, 1)),
        ])
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let stored = store.get_post(&post.id).unwrap().unwrap();
    assert_eq!(stored.down_votes, 0);
    assert!(stored.voters.is_empty());
}

#[tokio::test]
async fn live_query_redelivers_full_snapshot_on_change() {
    let (_dir, store) = temp_store();
    seed_posts(&store, 6);

    let mut live = LiveQuery::open(store.clone(), PAGE_SIZE);
    let first = live.next_snapshot().await.unwrap().unwrap();
    assert_eq!(first.len(), PAGE_SIZE);

    let newest = store.create_post_at(new_post(99), 9_999).unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), live.next_snapshot())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.len(), PAGE_SIZE);
    assert_eq!(second[0].id, newest.id);
    assert_eq!(&second[1..], &first[..4]);
}

#[tokio::test]
async fn live_query_coalesces_bursts() {
    let (_dir, store) = temp_store();
    let mut live = LiveQuery::open(store.clone(), PAGE_SIZE);
    assert!(live.next_snapshot().await.unwrap().unwrap().is_empty());

    seed_posts(&store, 3);
    let snapshot = live.next_snapshot().await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 3);
}

#[tokio::test]
async fn live_query_ignores_writes_outside_its_window() {
    let (_dir, store) = temp_store();
    let posts = seed_posts(&store, 7);
    let mut live = LiveQuery::open(store.clone(), PAGE_SIZE);
    live.next_snapshot().await.unwrap().unwrap();

    store
        .commit(&[BatchOp::new(
            &posts[6].id,
            Mutation::Increment(Counter::Interactions, 3),
        )])
        .unwrap();
    let quiet = tokio::time::timeout(Duration::from_millis(200), live.next_snapshot()).await;
    assert!(quiet.is_err(), "write below the window was delivered");

    store
        .commit(&[BatchOp::new(
            &posts[2].id,
            Mutation::Increment(Counter::Interactions, 3),
        )])
        .unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), live.next_snapshot())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(snapshot[2].interactions, 3);
}

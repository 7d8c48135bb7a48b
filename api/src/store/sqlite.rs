use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bookforum_shared::{Comment, NewComment, NewPost, Post, VoteDirection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::{BatchOp, DocumentStore, Mutation, Page, PageQuery, COMMENTS_COLLECTION, POSTS_COLLECTION};
use crate::db;
use crate::error::StoreError;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

const POST_COLUMNS: &str = "id, title, content, book_title, book_author, user_name, user_photo,
     created_at, up_votes, down_votes, interactions, comment_count";

/// SQLite-backed posts collection. Votes live in `post_voters`, comments in
/// `comments`; each batch is one IMMEDIATE transaction.
pub struct SqliteStore {
    pool: DbPool,
    version: watch::Sender<u64>,
}

impl SqliteStore {
    /// Open or create the database file and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = r2d2::Pool::new(manager)?;

        db::run_migrations(&pool)?;

        let (version, _) = watch::channel(0);
        Ok(Self { pool, version })
    }

    /// External "create post" flow.
    pub fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        self.create_post_at(new, now_millis())
    }

    pub fn create_post_at(&self, new: NewPost, created_at: i64) -> Result<Post, StoreError> {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            content: new.content,
            book_title: new.book_title,
            book_author: new.book_author,
            user_name: new.user_name,
            user_photo: new.user_photo,
            created_at,
            up_votes: 0,
            down_votes: 0,
            interactions: 0,
            comment_count: 0,
            voters: Default::default(),
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, title, content, book_title, book_author, user_name, user_photo, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                post.id,
                post.title,
                post.content,
                post.book_title,
                post.book_author,
                post.user_name,
                post.user_photo,
                post.created_at,
            ],
        )?;
        self.bump();

        debug!(post_id = %post.id, "post created");
        Ok(post)
    }

    /// Adds a comment under `posts/{post_id}/comments`. The post's cached
    /// `comment_count` is left alone.
    pub fn add_comment(&self, post_id: &str, new: NewComment) -> Result<Comment, StoreError> {
        let conn = self.pool.get()?;
        if !post_exists(&conn, post_id)? {
            return Err(StoreError::NotFound(format!("{POSTS_COLLECTION}/{post_id}")));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_name: new.user_name,
            body: new.body,
            created_at: now_millis(),
        };
        conn.execute(
            "INSERT INTO comments (id, post_id, user_name, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                comment.id,
                comment.post_id,
                comment.user_name,
                comment.body,
                comment.created_at,
            ],
        )?;

        debug!(post_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl DocumentStore for SqliteStore {
    fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let post = tx
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                [id],
                post_from_row,
            )
            .optional()?;

        match post {
            Some(mut post) => {
                load_voters(&tx, &mut post)?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    fn query_posts(&self, query: &PageQuery) -> Result<Page, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let limit = query.limit as i64;

        let mut posts = match &query.after {
            None => {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1"
                ))?;
                let rows = stmt.query_map([limit], post_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            Some(cursor) => {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     WHERE created_at < ?1 OR (created_at = ?1 AND id < ?2)
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?3"
                ))?;
                let rows = stmt.query_map(
                    rusqlite::params![cursor.created_at, cursor.id, limit],
                    post_from_row,
                )?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        for post in &mut posts {
            load_voters(&tx, post)?;
        }

        Ok(Page::new(posts))
    }

    fn count_comments(&self, post_id: &str) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id FROM comments WHERE post_id = ?1")?;
        let ids = stmt
            .query_map([post_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(post_id, collection = COMMENTS_COLLECTION, count = ids.len(), "counted comments");
        Ok(ids.len() as i64)
    }

    fn commit(&self, ops: &[BatchOp]) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for op in ops {
            apply_op(&tx, op)?;
        }
        tx.commit()?;
        self.bump();

        debug!(ops = ops.len(), "batch committed");
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

fn apply_op(conn: &Connection, op: &BatchOp) -> Result<(), StoreError> {
    if !post_exists(conn, &op.post_id)? {
        return Err(StoreError::NotFound(format!("{POSTS_COLLECTION}/{}", op.post_id)));
    }

    match &op.mutation {
        Mutation::Set(counter, value) => conn.execute(
            &format!("UPDATE posts SET {} = ?1 WHERE id = ?2", counter.column()),
            rusqlite::params![value, op.post_id],
        )?,
        Mutation::Increment(counter, delta) => conn.execute(
            &format!(
                "UPDATE posts SET {col} = {col} + ?1 WHERE id = ?2",
                col = counter.column()
            ),
            rusqlite::params![delta, op.post_id],
        )?,
        Mutation::SetVoter(user_id, direction) => conn.execute(
            "INSERT INTO post_voters (post_id, user_id, direction) VALUES (?1, ?2, ?3)
             ON CONFLICT(post_id, user_id) DO UPDATE SET direction = excluded.direction",
            rusqlite::params![op.post_id, user_id, direction.as_str()],
        )?,
        Mutation::DeleteVoter(user_id) => conn.execute(
            "DELETE FROM post_voters WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![op.post_id, user_id],
        )?,
    };

    Ok(())
}

fn post_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        book_title: row.get(3)?,
        book_author: row.get(4)?,
        user_name: row.get(5)?,
        user_photo: row.get(6)?,
        created_at: row.get(7)?,
        up_votes: row.get(8)?,
        down_votes: row.get(9)?,
        interactions: row.get(10)?,
        comment_count: row.get(11)?,
        voters: Default::default(),
    })
}

fn load_voters(conn: &Connection, post: &mut Post) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT user_id, direction FROM post_voters WHERE post_id = ?1")?;
    let rows = stmt
        .query_map([&post.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    post.voters = rows
        .into_iter()
        .filter_map(|(user, dir)| VoteDirection::parse(&dir).map(|d| (user, d)))
        .collect();
    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

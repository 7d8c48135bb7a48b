use crate::error::StoreError;
use crate::store::sqlite::DbPool;

pub fn run_migrations(pool: &DbPool) -> Result<(), StoreError> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            content       TEXT NOT NULL,
            book_title    TEXT NOT NULL,
            book_author   TEXT NOT NULL,
            user_name     TEXT NOT NULL,
            user_photo    TEXT,
            created_at    INTEGER NOT NULL,
            up_votes      INTEGER NOT NULL DEFAULT 0,
            down_votes    INTEGER NOT NULL DEFAULT 0,
            interactions  INTEGER NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_posts_feed ON posts(created_at DESC, id DESC);

        -- One row per active vote: the vote ledger.
        CREATE TABLE IF NOT EXISTS post_voters (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL,
            direction   TEXT NOT NULL CHECK (direction IN ('up', 'down')),
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_name   TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
        ",
    )?;

    Ok(())
}

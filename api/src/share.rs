use bookforum_shared::{Post, ShareLink, SharePlatform};

/// Builds the link a reader opens (or copies) to share a post.
pub fn share_link(base_url: &str, post: &Post, platform: SharePlatform) -> ShareLink {
    let post_url = format!("{}/post/{}", base_url.trim_end_matches('/'), post.id);
    let text = format!(
        "Check out this discussion about \"{}\" on BookForum",
        post.book_title
    );

    let url = match platform {
        SharePlatform::Twitter => format!(
            "https://twitter.com/intent/tweet?text={}&url={}",
            urlencoding::encode(&text),
            urlencoding::encode(&post_url),
        ),
        SharePlatform::Facebook => format!(
            "https://www.facebook.com/sharer/sharer.php?u={}",
            urlencoding::encode(&post_url),
        ),
        SharePlatform::Copy => post_url,
    };

    ShareLink { platform, url }
}

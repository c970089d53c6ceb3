/// Owned content: videos, comments, tweets and playlists
///
/// Each manager loads the target, runs the ownership gate, then mutates.
/// Read paths are open; every write path goes through `authorize_mutation`.

pub mod comment;
pub mod playlist;
pub mod tweet;
pub mod video;

pub use comment::CommentManager;
pub use playlist::PlaylistManager;
pub use tweet::TweetManager;
pub use video::VideoManager;

use crate::error::{AppError, AppResult};

/// Trimmed value of a required text field
pub(crate) fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trimmed value of an optional field; present but blank is an error
pub(crate) fn optional(value: Option<&str>, field: &str) -> AppResult<Option<String>> {
    value.map(|v| required(v, field)).transpose()
}

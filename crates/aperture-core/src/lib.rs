pub mod auth;
pub mod error;
pub mod gateway;
pub mod models;

pub use auth::{AuthGateway, Session, SessionChange};
pub use error::Error;
pub use gateway::DataGateway;
pub use models::{
    Comment, CommentView, FeedPost, NewComment, NewPost, NewProfile, PENDING_IMAGE_PATH,
    POSTS_BUCKET, Post, Profile,
};

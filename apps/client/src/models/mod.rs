pub mod comment;
pub mod conversation;
pub mod notification;
pub mod post;
pub mod user;

pub use comment::Comment;
pub use conversation::{Conversation, Message, MessagePage};
pub use notification::{NotificationEvent, NotificationKind, NotificationList, Route};
pub use post::{ImageUpload, NewPost, Post};
pub use user::{ProfileUpdate, Registration, User, UserRef, UserStats};

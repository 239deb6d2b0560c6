//! Records stored in, and assembled from, the graph store

mod friends;
mod post;
mod profile;

pub use friends::{
    FriendRequest, FriendResponse, FriendResponseKind, Notification, NotificationKind,
    UsernameInput, UsernamesInput,
};
pub use post::{Comment, CreatePostInput, Like, Media, Post, PostMeta};
pub use profile::{CreateProfileInput, Profile, ProfileDetails, UpdateProfileInput};

pub mod auth;
pub mod categories;
mod error;
pub mod posts;
pub mod search;
pub mod sitemap;
pub mod slug;
pub mod tags;

pub use error::ContentError;

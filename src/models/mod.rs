mod category;
mod post;
mod user;

pub use category::*;
pub use post::*;
pub use user::*;

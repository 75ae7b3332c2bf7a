pub mod application;
pub mod invitation;
pub mod listing;
pub mod order;
pub mod schedule;
pub mod user;

pub use application::*;
pub use invitation::*;
pub use listing::*;
pub use order::*;
pub use schedule::*;
pub use user::*;

pub mod conversation;
pub mod results;
pub mod route;

pub mod auth;
pub mod ott;
pub mod users;

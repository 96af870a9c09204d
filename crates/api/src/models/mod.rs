//! Domain models for the API.
//!
//! These types represent validated domain objects separate from database row
//! types. Models that are returned to clients derive `Serialize` and define
//! the JSON shape of the response.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod phone_token;
pub mod user;

pub use auth::TokenPair;
pub use cart::{Cart, Entry};
pub use catalog::{Category, NewProduct, Product};
pub use phone_token::PhoneToken;
pub use user::User;

pub mod admin;
pub mod customer;
pub mod driver;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod response;

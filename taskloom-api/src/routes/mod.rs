pub mod auth;
pub mod health;
pub mod tags;
pub mod tasks;

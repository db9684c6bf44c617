pub mod auth;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod setup;
pub mod tasks;
pub mod teams;
pub mod users;

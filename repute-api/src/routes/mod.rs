/// API route handlers, one module per resource

pub mod admin;
pub mod auth;
pub mod health;
pub mod invites;
pub mod notifications;
pub mod profile;
pub mod records;
pub mod reputation;
pub mod skills;
pub mod tenants;
pub mod verify;

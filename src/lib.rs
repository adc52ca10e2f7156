pub mod admin;
pub mod cache;
pub mod config;
pub mod guard;
pub mod i18n;
pub mod identifiers;
pub mod notice;
pub mod observability;
pub mod platform;
pub mod store;
pub mod subscription;

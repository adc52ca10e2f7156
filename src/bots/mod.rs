pub mod admin_menu;
pub mod guard_bot;

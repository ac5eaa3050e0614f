pub mod messages;
pub mod neighborhoods;
pub mod presence;

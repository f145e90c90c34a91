pub mod extract;
pub mod grade;
pub mod init;
pub mod list_models;
pub mod score;

pub mod connections;
pub mod not_found;

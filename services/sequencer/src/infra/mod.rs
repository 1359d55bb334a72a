pub mod cache;
pub mod db;
pub mod gmail;
pub mod queue;

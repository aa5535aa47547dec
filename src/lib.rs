pub mod commands;
pub mod db;
pub mod portal;
pub mod util;
pub mod world;

pub mod changelog;
pub mod hosting;

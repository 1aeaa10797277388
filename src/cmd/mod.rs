pub mod notes;
pub mod serve;

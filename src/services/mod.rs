pub mod hosting;

pub use hosting::{HostingService, MergeRequestQuery, OrderBy, SortDirection};

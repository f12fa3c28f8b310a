pub mod config;
pub mod error;
pub mod db;
pub mod registry;
pub mod server;

pub use config::Config;
pub use error::{RelregError, Result};
pub use registry::{
    aggregate, build_predicate, lookup_relationships, FilterSpec, GroupedOutput, LookupRequest,
    Predicate, SubjectId,
};

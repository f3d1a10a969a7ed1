// sprig-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{fetch_artifact, FetchedArtifact};
pub use sprig_common::{
    cache::Cache,
    error::{Result, SprigError},
    Config,
};
pub use validation::{validate_url, SourceScheme};

//! # Declaration
//!
//! Types for the cluster and application declarations a user writes, with
//! loading from TOML or JSON and validation that reports every problem at
//! once.

pub mod error;
pub mod load;
pub mod types;
mod validate;

pub use error::{Error, Result};
pub use load::{Format, STDIN, from_reader, load_application, load_cluster, parse};
pub use types::{
    ApplicationDeclaration, ApplicationMetadata, ClusterDeclaration, ClusterMetadata,
    ClusterReference, Databases, GithubRepository, Image, Integrations, PostgresDatabase, User,
    Vpc,
};

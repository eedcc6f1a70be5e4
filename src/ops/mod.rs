//! Concrete provisioning operations built on the engine contract.

pub mod categories;
pub mod subnets;

pub use categories::{CategorySpec, CreateCategories};
pub use subnets::{CreateSubnets, SubnetSpec};

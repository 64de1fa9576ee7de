pub mod deployer;
pub mod error;
pub mod report;

pub use deployer::Deployer;
pub use error::*;
pub use report::{DeployReport, DeployState};

//! CLI commands

mod estimate;
mod init;
mod plan;
mod run;

pub use estimate::EstimateCommand;
pub use init::InitCommand;
pub use plan::PlanCommand;
pub use run::RunCommand;

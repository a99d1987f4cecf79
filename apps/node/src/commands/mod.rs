//! 命令定义和实现

pub mod config;
pub mod node_args;
pub mod run;
pub mod schema;

pub use config::ConfigCommand;
pub use node_args::NodeArgs;
pub use run::RunCommand;
pub use schema::SchemaCommand;

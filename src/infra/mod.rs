pub mod command;
pub mod compose_file;
pub mod config;
pub mod docker_adapter;
pub mod ecr_registry;

pub use command::CommandRunner;
pub use docker_adapter::DockerAdapter;
pub use ecr_registry::EcrRegistry;

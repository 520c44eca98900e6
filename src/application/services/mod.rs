pub mod command_service;

pub use command_service::CommandService;

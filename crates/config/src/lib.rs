pub mod config;
pub mod default;
pub mod loader;
pub mod settings;
pub mod validator;

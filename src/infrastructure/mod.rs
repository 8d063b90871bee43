// Infrastructure layer
pub mod bundler;
pub mod crawler;
pub mod file_system;
pub mod pages;
pub mod processors;
pub mod resolver;

pub use bundler::*;
pub use crawler::*;
pub use file_system::*;
pub use pages::*;
pub use processors::*;
pub use resolver::*;

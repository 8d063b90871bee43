// Duplex - server/client boundary compiler for React Server Components
// Layered architecture: core (domain), infrastructure (io, resolution,
// passes), cli, utils

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod utils;

//! Category reference resolution

mod resolver;


pub use resolver::CategoryResolver;

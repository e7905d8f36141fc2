//! Infrastructure layer

pub mod system;

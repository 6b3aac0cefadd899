pub mod benchmark;
pub mod pilots;
pub mod runner;
pub mod util;

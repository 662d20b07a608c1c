pub mod client;
pub mod runner;
pub mod scrape;

pub use client::{Operation, TaskClient, classify, parse_export};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use scrape::{CreatedIdParser, FirstDigitRun};

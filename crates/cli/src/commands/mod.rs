//! Command handlers for the Diligence CLI.

pub mod ask;
pub mod search;
pub mod stats;

pub use ask::AskCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

pub mod cli;
pub mod config;
pub mod filter;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod ui;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::PipelineConfig;
pub use pipeline::{run_pipeline, RunSummary};
pub use ui::{ConsoleUi, Phase, SilentUi, Ui, UiApp};

pub(crate) mod app;
pub(crate) mod output;

pub use app::SearchArgs;
pub use output::is_broken_pipe;

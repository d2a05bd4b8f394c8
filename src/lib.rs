pub mod api;
mod app;
pub mod console;
pub mod directory;
mod formatters;
mod logging;
mod redact;
pub mod refresh;
pub mod settings;
pub mod state;
#[cfg(test)]
mod test_support;
pub mod types;

pub use console::AdminConsole;

pub fn run() -> std::process::ExitCode {
    app::run()
}

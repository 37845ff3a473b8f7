mod app;
mod args;
mod constants;
mod episode;
mod logger;
mod progress;
mod prompt;
mod utils;

use std::process::ExitCode;

use app::App;

#[tokio::main]
async fn main() -> ExitCode {
    App::new().run().await
}

//! Quillpad — console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Init logger at default level
//!   3. Load config (env overrides applied)
//!   4. Build the notebook engine (restores the saved session)
//!   5. Run the console loop until Ctrl-C or `:quit`

use tokio_util::sync::CancellationToken;
use tracing::info;

use quillpad::{config, logger, notebook, AppError};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        work_dir = %config.work_dir.display(),
        provider = %config.llm.provider,
        model = %config.llm.default_model,
        tts = config.tts.enabled,
        "config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let engine = notebook::Notebook::new(&config)?;

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_token.cancel();
            }
        });

        notebook::console::run(engine, shutdown).await
    })
}

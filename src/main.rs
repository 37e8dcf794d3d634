#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use anyhow::Context;
use std::sync::Arc;

mod app;
mod config;
mod history;
mod languages;
mod logger;
mod particles;
mod scheduler;
mod speech;
mod tasks;
mod translate;
mod ui;

fn main() -> anyhow::Result<()> {
    logger::init();
    log::info!("App starting");

    // Config: config.json next to the exe, env vars override.
    let mut cfg = config::Config::load();
    cfg.apply_env(|name| std::env::var(name).ok());
    log::info!("Config loaded from {}", config::Config::path().display());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("neontrans-http")
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let translator = translate::build_translator(&cfg, Arc::new(rt));
    let speech = speech::SpeechService::new(Arc::new(speech::SystemVoice::default()))
        .context("failed to start speech service")?;

    // Run UI on main thread (blocks)
    let result = ui::run(cfg, translator, Arc::new(speech));
    match &result {
        Ok(()) => log::info!("App exiting"),
        Err(e) => log::error!("{e:#}"),
    }
    result
}

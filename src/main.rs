#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod evaluator;
mod model_download;
mod pipeline;
mod pose_reference;
mod quiz;
mod types;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use gpui::Application;

use config::QuizConfig;
use evaluator::HttpEvaluator;
use pose_reference::HttpPoseReference;

fn main() -> Result<()> {
    env_logger::init();

    let config = QuizConfig::load_from_env().context("failed to load quiz configuration")?;
    log::info!(
        "scoring endpoint {}, {} questions",
        config.evaluator_url,
        config.questions.len()
    );

    let evaluator = HttpEvaluator::new(config.evaluator_url.clone(), config.request_timeout())
        .context("failed to build evaluator client")?;
    let pose_reference =
        HttpPoseReference::new(config.pose_reference_url.clone(), config.request_timeout())
            .context("failed to build pose reference client")?;

    let context = ui::UiContext {
        config,
        evaluator: Arc::new(evaluator),
        pose_reference: Arc::new(pose_reference),
    };

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, context.clone()) {
                log::error!("failed to launch ui: {err:?}");
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

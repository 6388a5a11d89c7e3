//! The training program for Inf-Net models.

pub mod common;
pub mod config;
pub mod logging;
pub mod train;
pub mod utils;

use crate::{common::*, config::Config};

/// The entry of training program.
pub async fn start(config: Arc<Config>) -> Result<()> {
    let start_time = Local::now();
    let logging_dir = Arc::new(
        config
            .logging
            .dir
            .join(format!("{}", start_time.format(utils::FILE_STRFTIME))),
    );
    let checkpoint_dir = Arc::new(logging_dir.join("checkpoints"));

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&*logging_dir).await?;
        tokio::fs::create_dir_all(&*checkpoint_dir).await?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }

    // start logger
    let (logging_tx, logging_rx) = broadcast::channel(64);
    let logging_future = logging::logging_worker(logging_dir.clone(), logging_rx).await?;

    // training worker
    let training_worker_future = {
        let config = config.clone();
        let search_dir = Arc::new(config.logging.dir.clone());

        let is_single_class = matches!(config.model, ModelConfig::InfNet { .. });

        tokio::task::spawn_blocking(move || {
            if is_single_class {
                train::single_class_training_worker(
                    config,
                    search_dir,
                    checkpoint_dir,
                    logging_tx,
                )
            } else {
                train::multi_class_training_worker(config, search_dir, checkpoint_dir, logging_tx)
            }
        })
        .map(|result| Fallible::Ok(result??))
    };

    futures::try_join!(training_worker_future, logging_future)?;

    Ok(())
}

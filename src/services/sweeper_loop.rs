use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use tracing::error;

use crate::application::usecases::expiration_sweeper::ExpirationSweeperUseCase;

pub async fn run_sweeper_loop(
    usecase: Arc<ExpirationSweeperUseCase>,
    interval: Duration,
) -> Result<()> {
    loop {
        if let Err(e) = usecase.sweep(Utc::now()).await {
            error!("Error while running expiration sweep: {}", e);
        }

        tokio::time::sleep(interval).await;
    }
}

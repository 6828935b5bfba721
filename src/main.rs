use anyhow::Result;
use std::sync::Arc;

use plank::config::ApiConfig;
use plank::repository::{database, KvRepository, KvStore};
use plank::services::{ApiClient, BoardSync, PlankError, Session, TtlCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ApiConfig::from_env();
    let pool = database::init_database("plank.db").await?;
    let store: Arc<dyn KvStore> = Arc::new(KvRepository::new(pool));

    let session = match Session::load(&store).await {
        Ok(session) => session,
        Err(PlankError::AuthRequired) => {
            eprintln!("No stored session. Log in through the web app first.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let api = ApiClient::new(&config, session.token.clone())?;
    let cache = TtlCache::new(store.clone());
    let mut sync = BoardSync::new(api, cache, store, session.user_email);

    let boards = sync.load_boards().await?;
    if boards.is_empty() {
        println!("No boards.");
    } else {
        for board in boards {
            println!("{:>6}  {}", board.id, board.name);
        }
    }

    Ok(())
}

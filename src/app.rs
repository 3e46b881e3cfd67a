//! The interactive entry point: connect, make sure a config exists, check
//! the destination folder, then run the chosen action.

use std::io::{BufRead, Write};

use time::UtcOffset;
use tracing::{error, info, warn};

use crate::auth::Authenticator;
use crate::client::{DriveClient, DriveStore};
use crate::config::{ConfigStore, Settings, StoredConfig};
use crate::error::{Result, SyncError};
use crate::fetch::ModelFetcher;
use crate::ledger::UploadLedger;
use crate::prompt::{Action, Prompter};
use crate::sync::SyncLoop;

/// Authenticate with the service account named in `settings`.
///
/// Returns `None` when the credentials file does not exist, which the
/// caller treats as "nothing to do". The token is fetched right away so a
/// bad key is reported before any prompt is shown.
pub async fn connect(settings: &Settings) -> Result<Option<DriveClient>> {
    if !settings.credentials_path.is_file() {
        info!(
            path = %settings.credentials_path.display(),
            "Service account credentials file not found. Exiting."
        );
        return Ok(None);
    }

    let auth = Authenticator::from_file(&settings.credentials_path, settings.scope)?;
    auth.get_access_token().await?;
    info!(account = auth.client_email(), "Google Drive authenticated successfully");

    Ok(Some(DriveClient::new(auth)))
}

/// Load the saved config, asking for it and saving it on first run.
pub fn load_or_ask_config<R: BufRead, W: Write>(
    settings: &Settings,
    prompter: &mut Prompter<R, W>,
) -> Result<StoredConfig> {
    let store = ConfigStore::new(settings.config_path());
    if let Some(config) = store.load() {
        return Ok(config);
    }

    let config = prompter.ask_config()?;
    store.save(&config)?;
    info!(path = %store.path().display(), "configuration saved");
    Ok(config)
}

/// Fail unless `folder_id` can be read through `store`.
pub async fn check_folder<S: DriveStore>(store: &S, folder_id: &str) -> Result<()> {
    match store.get_folder(folder_id).await {
        Ok(folder) => {
            info!(folder = %folder, "Successfully accessed folder");
            if !folder.is_folder() {
                warn!(id = %folder.id, "Destination is not a folder");
            }
            Ok(())
        }
        Err(e) => {
            error!(folder_id, error = %e, "Failed to access folder");
            Err(SyncError::folder_check(folder_id, e))
        }
    }
}

/// Run the program against an already connected `store`.
///
/// Choosing the sync action never returns unless the ledger stops being
/// writable.
pub async fn run<S: DriveStore, R: BufRead, W: Write>(
    settings: &Settings,
    store: S,
    prompter: &mut Prompter<R, W>,
    utc_offset: UtcOffset,
) -> Result<()> {
    let config = load_or_ask_config(settings, prompter)?;
    check_folder(&store, &config.folder_id).await?;

    match prompter.choose_action()? {
        Action::FetchModel => {
            let url = prompter.ask_model_url()?;
            let destination = ModelFetcher::from_settings(settings)
                .fetch(&url, &config.api_key)
                .await?;
            info!(path = %destination.display(), "Model successfully moved");
            Ok(())
        }

        Action::SyncOutputs => {
            let ledger = UploadLedger::load(settings.ledger_path())?;
            let sync = SyncLoop::new(
                store,
                settings.source.clone(),
                config.folder_id,
                ledger,
                settings.poll_interval,
            )
            .with_utc_offset(utc_offset);

            match sync.run().await? {}
        }
    }
}

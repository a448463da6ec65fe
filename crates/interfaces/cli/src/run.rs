use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use reportbridge_config::{AppConfig, FormSettings, PollerSettings};
use reportbridge_discord::{DiscordClient, InteractionState, SignatureVerifier, serve};
use reportbridge_notion::{NotionClient, WorkspaceApi};
use reportbridge_runtime::{Bridge, ChatApi};

const EVENT_BUFFER: usize = 64;

/// What the interactions endpoint needs.  The report form is only reachable
/// through it.
struct Interactions {
    application_id: String,
    verifier: SignatureVerifier,
}

struct Subsystems {
    interactions: Option<Interactions>,
    form: Option<FormSettings>,
    poller: Option<PollerSettings>,
}

fn interactions(config: &AppConfig) -> Result<Interactions> {
    let application_id = config.application_id()?.to_string();
    let verifier = SignatureVerifier::from_hex(config.public_key()?)?;
    Ok(Interactions {
        application_id,
        verifier,
    })
}

/// Decide which subsystems the configuration enables.  A missing key turns
/// off only the subsystem that needs it.
fn resolve(config: &AppConfig) -> Subsystems {
    let interactions = match interactions(config) {
        Ok(interactions) => Some(interactions),
        Err(err) => {
            warn!(%err, "interactions endpoint disabled");
            None
        }
    };
    let form = match (&interactions, config.form_settings()) {
        (Some(_), Ok(settings)) => Some(settings),
        (None, _) => {
            warn!("report form disabled; it needs the interactions endpoint");
            None
        }
        (Some(_), Err(err)) => {
            warn!(%err, "report form disabled");
            None
        }
    };
    let poller = match config.poller_settings() {
        Ok(settings) => {
            if settings.notification_channel_id.is_none() {
                warn!("discord.notification_channel_id is not configured; changes will not be announced");
            }
            Some(settings)
        }
        Err(err) => {
            warn!(%err, "change poller disabled");
            None
        }
    };
    Subsystems {
        interactions,
        form,
        poller,
    }
}

async fn server_exit(
    server: &mut Option<JoinHandle<Result<()>>>,
) -> Result<Result<()>, JoinError> {
    match server {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn log_server_exit(result: Result<Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => info!("interactions endpoint exited"),
        Ok(Err(err)) => error!(?err, "interactions endpoint failed"),
        Err(err) => error!(?err, "interactions endpoint panicked"),
    }
}

pub async fn run_bridge(config: AppConfig, config_path: &Path) -> Result<()> {
    let subsystems = resolve(&config);
    if subsystems.form.is_none() && subsystems.poller.is_none() {
        bail!("nothing to run: configure the report form or monitored databases");
    }

    let notion = NotionClient::new(
        config.notion_token()?,
        config.notion.api_version.clone(),
        config.request_timeout(),
    )?;
    let mut discord = DiscordClient::new(config.discord_token()?, config.request_timeout())?;
    if let Some(interactions) = &subsystems.interactions {
        discord = discord.with_application_id(&interactions.application_id);
    }
    let pending = discord.pending();

    let chat: Arc<dyn ChatApi> = Arc::new(discord);
    let workspace: Arc<dyn WorkspaceApi> = Arc::new(notion);
    let mut bridge = Bridge::new(chat, workspace).with_shutdown_grace(config.shutdown_grace());
    if let Some(settings) = subsystems.form {
        bridge = bridge.with_form(settings);
    }
    if let Some(settings) = subsystems.poller {
        bridge = bridge.with_poller(settings);
    }

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let report = bridge.start(events_rx).await?;
    if let Some(message) = report.form_message.as_ref().filter(|_| report.form_message_created) {
        match AppConfig::persist_reporting_message_id(config_path, &message.message_id) {
            Ok(()) => info!(message = %message.message_id, "saved new form message id"),
            Err(err) => error!(?err, "could not save the new form message id"),
        }
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = subsystems.interactions.map(|interactions| {
        let bind = config.discord.interactions_bind.clone();
        let state = InteractionState::new(interactions.verifier, events_tx, pending);
        tokio::spawn(async move {
            serve(&bind, state, async {
                let _ = stop_rx.await;
            })
            .await
        })
    });

    println!("reportbridge running; press Ctrl-C to stop");
    let mut server_done = false;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(?err, "could not listen for Ctrl-C");
            }
            info!("shutdown requested");
        }
        result = server_exit(&mut server) => {
            server_done = true;
            log_server_exit(result);
        }
    }

    let _ = stop_tx.send(());
    bridge.shutdown().await;
    if let Some(handle) = server.filter(|_| !server_done) {
        log_server_exit(handle.await);
    }
    Ok(())
}

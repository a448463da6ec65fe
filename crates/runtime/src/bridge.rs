//! Wires the form and the change poller to the transports and runs the
//! dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use reportbridge_config::{FormSettings, PollerSettings};
use reportbridge_notion::WorkspaceApi;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::chat::{ChatApi, ChatError};
use crate::events::ChatEvent;
use crate::form::{FormController, FormLayout, FormMessage};
use crate::notifier::Notifier;
use crate::poller::ChangePoller;
use crate::schema::SchemaLoader;
use crate::submitter::RecordSubmitter;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// What came up during [`Bridge::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub form_message: Option<FormMessage>,
    /// The configured form message was missing and a new one was posted; its
    /// id should be persisted.
    pub form_message_created: bool,
    pub polled_collections: usize,
}

pub struct Bridge {
    chat: Arc<dyn ChatApi>,
    workspace: Arc<dyn WorkspaceApi>,
    form: Option<FormSettings>,
    poller: Option<PollerSettings>,
    shutdown_grace: Duration,
    shutdown_tx: Option<watch::Sender<bool>>,
    dispatch: Option<JoinHandle<()>>,
}

impl Bridge {
    pub fn new(chat: Arc<dyn ChatApi>, workspace: Arc<dyn WorkspaceApi>) -> Self {
        Self {
            chat,
            workspace,
            form: None,
            poller: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            shutdown_tx: None,
            dispatch: None,
        }
    }

    pub fn with_form(mut self, settings: FormSettings) -> Self {
        self.form = Some(settings);
        self
    }

    pub fn with_poller(mut self, settings: PollerSettings) -> Self {
        self.poller = Some(settings);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Bring up the configured subsystems and start consuming `events`.  A
    /// subsystem that fails to come up is logged and left disabled.
    pub async fn start(&mut self, events: mpsc::Receiver<ChatEvent>) -> Result<StartReport> {
        if self.dispatch.is_some() {
            bail!("bridge is already running");
        }

        let mut report = StartReport {
            form_message: None,
            form_message_created: false,
            polled_collections: 0,
        };

        let form = match self.form.clone() {
            Some(settings) => match self.start_form(settings).await {
                Ok((controller, created)) => {
                    report.form_message = Some(controller.message().clone());
                    report.form_message_created = created;
                    Some(controller)
                }
                Err(err) => {
                    error!(?err, "report form disabled");
                    None
                }
            },
            None => {
                info!("report form not configured");
                None
            }
        };

        let poller = self.poller.clone().map(|settings| {
            let notifier = Notifier::new(
                self.chat.clone(),
                self.workspace.clone(),
                settings.notification_channel_id.clone(),
            );
            let poller = ChangePoller::new(
                self.workspace.clone(),
                notifier,
                settings.monitored_databases.clone(),
                settings.page_size,
            );
            report.polled_collections = poller.collections().len();
            info!(
                collections = poller.collections().len(),
                interval_secs = settings.interval.as_secs_f64(),
                "change poller enabled"
            );
            (poller, settings.interval)
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);
        self.dispatch = Some(tokio::spawn(dispatch(
            events,
            form,
            poller,
            shutdown_rx,
            self.shutdown_grace,
        )));
        Ok(report)
    }

    async fn start_form(&self, settings: FormSettings) -> Result<(FormController, bool)> {
        let schema = SchemaLoader::new(self.workspace.clone())
            .load(&settings.database_id)
            .await?;
        let layout = FormLayout::build(&schema);
        let (message, created) = self.ensure_form_message(&settings, &layout).await?;
        let controller = FormController::new(
            self.chat.clone(),
            RecordSubmitter::new(self.workspace.clone(), settings.database_id.clone()),
            layout,
            settings.messages,
            message,
        );
        Ok((controller, created))
    }

    /// Reuse the configured form message when it still exists, otherwise post
    /// a new one.
    async fn ensure_form_message(
        &self,
        settings: &FormSettings,
        layout: &FormLayout,
    ) -> Result<(FormMessage, bool), ChatError> {
        let channel_id = &settings.reporting_channel_id;
        if let Some(message_id) = &settings.reporting_message_id {
            match self.chat.fetch_message(channel_id, message_id).await {
                Ok(Some(_)) => {
                    self.chat
                        .edit_components(channel_id, message_id, &layout.rows)
                        .await?;
                    info!(message = %message_id, "reusing existing form message");
                    return Ok((
                        FormMessage {
                            channel_id: channel_id.clone(),
                            message_id: message_id.clone(),
                        },
                        false,
                    ));
                }
                Ok(None) => {
                    warn!(message = %message_id, "configured form message no longer exists; posting a new one");
                }
                Err(err) => {
                    warn!(?err, message = %message_id, "could not fetch form message; posting a new one");
                }
            }
        }

        let message_id = self
            .chat
            .send_components(channel_id, &settings.messages.reporting_text, &layout.rows)
            .await?;
        info!(channel = %channel_id, message = %message_id, "posted form message");
        Ok((
            FormMessage {
                channel_id: channel_id.clone(),
                message_id,
            },
            true,
        ))
    }

    pub fn is_running(&self) -> bool {
        self.dispatch
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer, let an in-flight poll cycle finish within the grace
    /// period and wait for the dispatch loop to exit.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.dispatch.take() {
            if let Err(err) = handle.await {
                error!(?err, "dispatch loop panicked");
            }
        }
        info!("bridge stopped");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn dispatch(
    mut events: mpsc::Receiver<ChatEvent>,
    form: Option<FormController>,
    poller: Option<(ChangePoller, Duration)>,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) {
    let mut ticker = poller.as_ref().map(|(_, period)| {
        let mut ticker = tokio::time::interval(*period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut cycle: Option<JoinHandle<()>> = None;
    let mut events_open = true;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            event = events.recv(), if events_open => {
                let Some(event) = event else {
                    info!("chat event stream closed");
                    events_open = false;
                    continue;
                };
                let Some(form) = form.clone() else {
                    debug!(kind = event.kind(), "form disabled; dropping event");
                    continue;
                };
                tokio::spawn(async move {
                    let owner = event.interaction().user.id.clone();
                    let kind = event.kind();
                    match form.handle(event).await {
                        Ok(state) => debug!(owner = %owner, kind, ?state, "event handled"),
                        Err(err) => warn!(?err, owner = %owner, kind, "failed to answer interaction"),
                    }
                });
            }
            _ = next_tick(&mut ticker) => {
                let Some((poller, _)) = poller.as_ref() else { continue };
                if cycle.as_ref().is_some_and(|handle| !handle.is_finished()) {
                    debug!("previous poll cycle still running; skipping tick");
                    continue;
                }
                let poller = poller.clone();
                cycle = Some(tokio::spawn(async move {
                    poller.poll_all().await;
                }));
            }
        }
    }

    if let Some(mut handle) = cycle.filter(|handle| !handle.is_finished()) {
        info!(grace_secs = grace.as_secs_f64(), "waiting for poll cycle to finish");
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("poll cycle did not finish in time; aborting it");
            handle.abort();
        }
    }
}

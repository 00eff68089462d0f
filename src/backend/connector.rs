//! Connector - production backend handle
//!
//! Built once per process and shared as `Arc<Connector>`. Without credentials
//! it still builds: every call then fails with a `NotConfigured` error, so the
//! registry and the RSVP form show an error banner instead of the process
//! dying at startup.

use crate::backend::{Backend, ChangeCallback, RestClient, SubscriptionHandle};
use crate::core::{BackendError, Config, Credentials, SyncError};
use crate::dtos::SelectQuery;
use crate::entities::Table;
use crate::realtime::{ChangeFeed, RealtimeChannel, RealtimeSettings, SubscriptionRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument, warn};

pub struct Connector {
    rest: Result<RestClient, BackendError>,
    realtime_settings: Result<RealtimeSettings, BackendError>,
    realtime: OnceCell<RealtimeChannel>,
    feed: Arc<ChangeFeed>,
    subscriptions: SubscriptionRegistry,
}

impl Connector {
    /// Handle for `url`/`key` with default timings
    pub fn initialize(url: Option<&str>, key: Option<&str>) -> Self {
        let config = Config {
            backend_url: url.map(str::to_string).filter(|u| !u.trim().is_empty()),
            backend_key: key.map(str::to_string).filter(|k| !k.trim().is_empty()),
            ..Config::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Self {
        let credentials = config.credentials();
        if let Err(SyncError::Configuration(msg)) = &credentials {
            warn!("{msg}; running without a backend");
        }

        let rest = match &credentials {
            Ok(creds) => RestClient::new(creds, Duration::from_secs(config.request_timeout_secs)),
            Err(e) => Err(BackendError::not_configured(e.user_message())),
        };
        if let Err(e) = &rest {
            if credentials.is_ok() {
                error!(error = %e, "Cannot create REST client");
            }
        }

        let realtime_settings = realtime_settings(config, &credentials);

        Self {
            rest,
            realtime_settings,
            realtime: OnceCell::new(),
            feed: Arc::new(ChangeFeed::new()),
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// False when the handle was built without usable credentials
    pub fn is_configured(&self) -> bool {
        self.rest.is_ok()
    }

    fn rest(&self) -> Result<&RestClient, BackendError> {
        self.rest.as_ref().map_err(Clone::clone)
    }

    /// Connection check: counts the gifts and logs the outcome
    #[instrument(skip(self))]
    pub async fn probe(&self) -> Result<u64, BackendError> {
        match self.rest()?.count(Table::Gifts).await {
            Ok(count) => {
                info!(gifts = count, "Backend connected successfully");
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "Backend connection failed");
                Err(e)
            }
        }
    }

    async fn channel(&self) -> Result<&RealtimeChannel, BackendError> {
        let settings = self.realtime_settings.as_ref().map_err(Clone::clone)?;
        Ok(self
            .realtime
            .get_or_init(|| async {
                info!("Starting realtime channel");
                RealtimeChannel::spawn(settings.clone(), self.feed.clone())
            })
            .await)
    }
}

fn realtime_settings(
    config: &Config,
    credentials: &Result<Credentials, SyncError>,
) -> Result<RealtimeSettings, BackendError> {
    let creds = credentials
        .as_ref()
        .map_err(|e| BackendError::not_configured(e.user_message()))?;
    if !config.realtime_enabled {
        return Err(BackendError::not_configured("realtime is disabled (REALTIME_ENABLED=false)"));
    }
    Ok(RealtimeSettings {
        url: RealtimeChannel::endpoint(&creds.url, &creds.key)?,
        heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
        reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
    })
}

impl Backend for Connector {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, BackendError> {
        self.rest()?.select(table, query).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        self.rest()?.insert(table, &row).await
    }

    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<(), BackendError> {
        self.rest()?.update(table, id, &patch).await
    }

    #[instrument(skip(self, on_change), fields(table = %table))]
    async fn subscribe(
        &self,
        table: Table,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, BackendError> {
        let channel = self.channel().await?;
        // attach before joining so that no event of the join is missed
        let handle = self
            .subscriptions
            .attach(table, self.feed.subscribe(table), on_change);
        channel.join(table);
        Ok(handle)
    }

    #[instrument(skip(self), fields(subscription_id = handle.id, table = %handle.table))]
    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        if !self.subscriptions.detach(&handle) {
            return;
        }
        if self.subscriptions.count(handle.table) == 0 {
            if let Some(channel) = self.realtime.get() {
                channel.leave(handle.table);
            }
        }
    }
}

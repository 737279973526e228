//! Gestionnaire d'abonnements côté device.
//!
//! Chaque abonnement possède sa propre tâche de livraison alimentée par un
//! canal : les NOTIFY d'un abonné partent dans l'ordre de mise en file, et un
//! abonné lent ou injoignable ne retarde que lui-même. Le SEQ est attribué au
//! moment de la mise en file, sous le verrou de la table, ce qui garantit
//! que l'évènement initial (SEQ 0) précède tout changement.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dlnaconfig::UpnpConfig;
use parking_lot::Mutex;
use reqwest::Method;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::headers::{NT_EVENT, NTS_PROPCHANGE, Timeout};
use super::propertyset::build_propertyset;
use super::subscription::{QueuedEvent, Subscription, SubscriptionState};
use super::GenaError;
use crate::model::{ChangeSink, DeviceTree, ServiceKey};

type SubscriptionTable = Arc<Mutex<Subscriptions>>;

/// Nombre d'abonnements terminés dont l'état final reste consultable.
const ENDED_HISTORY: usize = 256;

/// Abonnements vivants, et derniers abonnements terminés avec leur état final.
#[derive(Default)]
struct Subscriptions {
    live: HashMap<String, Subscription>,
    ended: VecDeque<(String, SubscriptionState)>,
}

impl Subscriptions {
    /// Retire un abonnement, arrête son worker et garde son état final.
    fn end(&mut self, sid: &str, state: SubscriptionState) -> Option<Subscription> {
        let mut sub = self.live.remove(sid)?;
        sub.state = state;
        sub.worker.cancel();
        if self.ended.len() >= ENDED_HISTORY {
            self.ended.pop_front();
        }
        self.ended.push_back((sid.to_string(), state));
        Some(sub)
    }

    fn state(&self, sid: &str) -> Option<SubscriptionState> {
        self.live.get(sid).map(|s| s.state).or_else(|| {
            self.ended
                .iter()
                .rev()
                .find(|(ended, _)| ended == sid)
                .map(|(_, state)| *state)
        })
    }
}

/// Abonnement accordé : SID et durée en secondes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granted {
    pub sid: String,
    pub timeout: u32,
}

pub struct EventManager {
    config: Arc<UpnpConfig>,
    tree: Arc<DeviceTree>,
    http: reqwest::Client,
    subscriptions: SubscriptionTable,
    cancel: CancellationToken,
}

impl EventManager {
    /// Crée le gestionnaire et le branche comme récepteur de changements
    /// de l'arbre.
    pub fn new(config: Arc<UpnpConfig>, tree: Arc<DeviceTree>) -> Arc<Self> {
        let timeout = Duration::from_secs(config.http.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("⚠️ Failed to build NOTIFY client ({}), using defaults", e);
                reqwest::Client::new()
            });

        let manager = Arc::new(Self {
            config,
            tree: tree.clone(),
            http,
            subscriptions: Arc::new(Mutex::new(Subscriptions::default())),
            cancel: CancellationToken::new(),
        });
        let sink: Weak<EventManager> = Arc::downgrade(&manager);
        tree.set_change_sink(sink);
        manager
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn grant(&self, requested: Option<Timeout>) -> u32 {
        let gena = &self.config.gena;
        match requested {
            Some(Timeout::Infinite) => gena.max_timeout,
            Some(Timeout::Seconds(s)) => s.clamp(gena.min_timeout, gena.max_timeout),
            None => gena.default_timeout.clamp(gena.min_timeout, gena.max_timeout),
        }
    }

    /// Crée un abonnement et met en file l'évènement initial (SEQ 0) portant
    /// la valeur courante de chaque variable évènementielle.
    pub fn subscribe(
        &self,
        key: &ServiceKey,
        callbacks: Vec<Url>,
        timeout: Option<Timeout>,
    ) -> Result<Granted, GenaError> {
        let service = self
            .tree
            .service(key)
            .ok_or_else(|| GenaError::UnknownService(key.to_string()))?;
        let first = callbacks
            .first()
            .cloned()
            .ok_or_else(|| GenaError::InvalidCallback(String::new()))?;
        if callbacks.iter().any(|u| u.scheme() != "http") {
            return Err(GenaError::InvalidCallback(first.to_string()));
        }

        let granted = self.grant(timeout);
        let sid = format!("uuid:{}", uuid::Uuid::new_v4());

        // Aucune mise à jour du service ne s'intercale entre la lecture des
        // valeurs initiales et l'insertion dans la table.
        service.with_evented_values(|initial| {
            let mut table = self.subscriptions.lock();

            let per_callback = table
                .live
                .values()
                .filter(|s| s.callbacks.first() == Some(&first))
                .count();
            if per_callback >= self.config.gena.max_subscriptions_per_callback {
                warn!("⚠️ Too many subscriptions from {}", first);
                return Err(GenaError::TooManySubscriptions(first.to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let worker = self.cancel.child_token();
            tokio::spawn(deliver(
                self.subscriptions.clone(),
                self.http.clone(),
                sid.clone(),
                callbacks.clone(),
                rx,
                self.config.gena.notify_retries,
                self.config.gena.retry_backoff_ms,
                Duration::from_millis(self.config.gena.initial_event_delay_ms),
                worker.clone(),
            ));

            let mut subscription = Subscription::new(key.clone(), callbacks, granted, tx, worker);

            if initial.is_empty() {
                subscription.skip_initial();
            } else {
                match build_propertyset(&initial) {
                    Ok(body) => {
                        subscription.enqueue(body);
                    }
                    Err(e) => {
                        warn!("❌ Failed to build initial event for {}: {}", sid, e);
                        subscription.skip_initial();
                    }
                }
            }

            info!(
                "📡 New subscription {} on {} -> {} ({}s)",
                sid, key, first, granted
            );
            table.live.insert(sid.clone(), subscription);
            Ok(())
        })?;

        Ok(Granted {
            sid,
            timeout: granted,
        })
    }

    /// Prolonge un abonnement du service `key`. Un SID inconnu, expiré ou
    /// appartenant à un autre service donne `NotFound` : le control point
    /// doit se réabonner.
    pub fn renew(
        &self,
        key: &ServiceKey,
        sid: &str,
        timeout: Option<Timeout>,
    ) -> Result<Granted, GenaError> {
        let granted = self.grant(timeout);
        let mut table = self.subscriptions.lock();

        let expired = match table.live.get_mut(sid) {
            Some(sub) if sub.key != *key => return Err(GenaError::NotFound(sid.to_string())),
            None => return Err(GenaError::NotFound(sid.to_string())),
            Some(sub) if sub.is_expired(Instant::now()) => true,
            Some(sub) => {
                sub.renew(granted);
                false
            }
        };

        if expired {
            table.end(sid, SubscriptionState::Expired);
            debug!("Renewal of expired subscription {}", sid);
            return Err(GenaError::NotFound(sid.to_string()));
        }

        info!("♻️ Renewed subscription {} ({}s)", sid, granted);
        Ok(Granted {
            sid: sid.to_string(),
            timeout: granted,
        })
    }

    /// Résilie un abonnement du service `key`.
    pub fn unsubscribe(&self, key: &ServiceKey, sid: &str) -> Result<(), GenaError> {
        let mut table = self.subscriptions.lock();
        if table.live.get(sid).is_some_and(|sub| sub.key != *key) {
            return Err(GenaError::NotFound(sid.to_string()));
        }
        let removed = table.end(sid, SubscriptionState::Cancelled);
        drop(table);
        match removed {
            Some(_) => {
                info!("👋 Unsubscribed {}", sid);
                Ok(())
            }
            None => Err(GenaError::NotFound(sid.to_string())),
        }
    }

    /// Met en file un évènement pour chaque abonné actif du service.
    pub fn notify_changes(&self, key: &ServiceKey, changes: &[(String, String)]) {
        if changes.is_empty() {
            return;
        }
        let body = match build_propertyset(changes) {
            Ok(body) => body,
            Err(e) => {
                warn!("❌ Failed to build event for {}: {}", key, e);
                return;
            }
        };

        let mut table = self.subscriptions.lock();
        let mut dead = Vec::new();
        for (sid, sub) in table.live.iter_mut() {
            if sub.key != *key || !sub.state.is_live() {
                continue;
            }
            if !sub.enqueue(body.clone()) {
                dead.push(sid.clone());
            }
        }
        for sid in dead {
            table.end(&sid, SubscriptionState::Cancelled);
        }
    }

    pub fn notify_change(&self, key: &ServiceKey, name: &str, value: &str) {
        self.notify_changes(key, &[(name.to_string(), value.to_string())]);
    }

    /// Supprime les abonnements expirés. Retourne le nombre supprimé.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut table = self.subscriptions.lock();
        let expired: Vec<String> = table
            .live
            .iter()
            .filter(|(_, sub)| sub.state != SubscriptionState::Requested && sub.is_expired(now))
            .map(|(sid, _)| sid.clone())
            .collect();

        for sid in &expired {
            table.end(sid, SubscriptionState::Expired);
            info!("👋 Subscription {} expired", sid);
        }
        expired.len()
    }

    /// Annule les abonnements d'un service retiré.
    pub fn remove_service(&self, key: &ServiceKey) {
        let mut table = self.subscriptions.lock();
        let removed: Vec<String> = table
            .live
            .iter()
            .filter(|(_, sub)| sub.key == *key)
            .map(|(sid, _)| sid.clone())
            .collect();
        for sid in removed {
            table.end(&sid, SubscriptionState::Cancelled);
        }
    }

    pub fn state(&self, sid: &str) -> Option<SubscriptionState> {
        self.subscriptions.lock().state(sid)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().live.len()
    }

    /// Lance le balayage périodique des abonnements expirés.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        let period = Duration::from_secs(self.config.gena.sweep_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            info!("✅ GENA sweep every {:?}", period);
            loop {
                tokio::select! {
                    _ = manager.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.sweep();
                    }
                }
            }
        })
    }

    /// Arrête toutes les livraisons en cours.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let mut table = self.subscriptions.lock();
        table.live.clear();
        table.ended.clear();
    }
}

impl ChangeSink for EventManager {
    fn variables_changed(&self, key: &ServiceKey, changes: &[(String, String)]) {
        self.notify_changes(key, changes);
    }
}

async fn send_notify(
    http: &reqwest::Client,
    url: &Url,
    sid: &str,
    event: &QueuedEvent,
) -> Result<(), String> {
    let method = Method::from_bytes(b"NOTIFY").map_err(|e| e.to_string())?;
    let response = http
        .request(method, url.clone())
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("NT", NT_EVENT)
        .header("NTS", NTS_PROPCHANGE)
        .header("SID", sid)
        .header("SEQ", event.seq.to_string())
        .body(event.body.clone())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("status {}", response.status()))
    }
}

#[allow(clippy::too_many_arguments)]
async fn deliver(
    subscriptions: SubscriptionTable,
    http: reqwest::Client,
    sid: String,
    callbacks: Vec<Url>,
    mut rx: UnboundedReceiver<QueuedEvent>,
    retries: u32,
    backoff_ms: u64,
    initial_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        // Le SID doit être connu de l'abonné avant le premier NOTIFY
        if event.seq == 0 && !initial_delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
        }

        let mut delivered = false;
        'attempts: for attempt in 0..=retries {
            if attempt > 0 {
                let delay = backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
            }
            for url in &callbacks {
                match send_notify(&http, url, &sid, &event).await {
                    Ok(()) => {
                        delivered = true;
                        break 'attempts;
                    }
                    Err(e) => debug!("NOTIFY {} SEQ {} to {} failed: {}", sid, event.seq, url, e),
                }
            }
        }

        if !delivered {
            warn!(
                "❌ NOTIFY {} SEQ {} undeliverable after {} retries, cancelling subscription",
                sid, event.seq, retries
            );
            subscriptions.lock().end(&sid, SubscriptionState::Cancelled);
            break;
        }
        trace!("📤 NOTIFY {} SEQ {} delivered", sid, event.seq);
    }
}

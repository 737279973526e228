use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::model::ServiceKey;

/// Cycle de vie d'un abonnement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Accepté, évènement initial pas encore mis en file
    Requested,
    Active,
    Renewed,
    /// Échu sans renouvellement
    Expired,
    /// Désabonné, service retiré ou abonné injoignable
    Cancelled,
}

impl SubscriptionState {
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionState::Active | SubscriptionState::Renewed)
    }
}

/// Évènement prêt à être livré.
#[derive(Debug, Clone)]
pub(crate) struct QueuedEvent {
    pub seq: u32,
    pub body: String,
}

pub(crate) struct Subscription {
    pub key: ServiceKey,
    pub callbacks: Vec<Url>,
    pub timeout: u32,
    pub expires_at: Instant,
    pub state: SubscriptionState,
    /// Arrête le worker de livraison
    pub worker: CancellationToken,
    next_seq: u32,
    sender: UnboundedSender<QueuedEvent>,
}

impl Subscription {
    pub fn new(
        key: ServiceKey,
        callbacks: Vec<Url>,
        timeout: u32,
        sender: UnboundedSender<QueuedEvent>,
        worker: CancellationToken,
    ) -> Self {
        Self {
            key,
            callbacks,
            timeout,
            expires_at: Instant::now() + std::time::Duration::from_secs(timeout as u64),
            state: SubscriptionState::Requested,
            worker,
            next_seq: 0,
            sender,
        }
    }

    pub fn renew(&mut self, timeout: u32) {
        self.timeout = timeout;
        self.expires_at = Instant::now() + std::time::Duration::from_secs(timeout as u64);
        self.state = SubscriptionState::Renewed;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// SEQ 0 est réservé à l'évènement initial ; après `u32::MAX` on repart à 1.
    fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = if seq == u32::MAX { 1 } else { seq + 1 };
        seq
    }

    /// Met un évènement en file avec le prochain SEQ. Retourne `false` si le
    /// worker de livraison est terminé.
    pub fn enqueue(&mut self, body: String) -> bool {
        let seq = self.take_seq();
        if self.state == SubscriptionState::Requested {
            self.state = SubscriptionState::Active;
        }
        self.sender.send(QueuedEvent { seq, body }).is_ok()
    }

    /// Marque l'évènement initial comme émis sans rien envoyer (service
    /// sans variable évènementielle).
    pub fn skip_initial(&mut self) {
        if self.next_seq == 0 {
            self.next_seq = 1;
        }
        self.state = SubscriptionState::Active;
    }

    #[cfg(test)]
    pub fn set_next_seq(&mut self, seq: u32) {
        self.next_seq = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_sequence_starts_at_zero_and_wraps_to_one() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let url = Url::parse("http://127.0.0.1/cb").unwrap();
        let mut sub = Subscription::new(ServiceKey::new("d", "s"), vec![url], 60, tx, CancellationToken::new());

        assert_eq!(sub.state, SubscriptionState::Requested);
        assert!(sub.enqueue("init".into()));
        assert_eq!(sub.state, SubscriptionState::Active);
        assert!(sub.enqueue("a".into()));
        sub.set_next_seq(u32::MAX);
        assert!(sub.enqueue("b".into()));
        assert!(sub.enqueue("c".into()));

        let seqs: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, u32::MAX, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_and_renewal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let url = Url::parse("http://127.0.0.1/cb").unwrap();
        let mut sub = Subscription::new(ServiceKey::new("d", "s"), vec![url], 10, tx, CancellationToken::new());

        tokio::time::advance(std::time::Duration::from_secs(9)).await;
        assert!(!sub.is_expired(Instant::now()));
        sub.renew(10);
        assert_eq!(sub.state, SubscriptionState::Renewed);
        tokio::time::advance(std::time::Duration::from_secs(9)).await;
        assert!(!sub.is_expired(Instant::now()));
        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        assert!(sub.is_expired(Instant::now()));
    }
}

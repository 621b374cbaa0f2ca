//! Request generations for the dashboard panels
//!
//! Every selection issues a new ticket for its panel. A feed that finishes
//! after a newer selection on the same panel is dropped instead of
//! overwriting the newer state.

use crate::ingestion::pipeline::FeedService;
use crate::ingestion::rank::{DisplayMode, SubscriptionView, TransactionSort};
use crate::ingestion::types::{
    DataKind, Feed, PopulationRecord, SubscriptionRecord, TransactionListing,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Monotonic counter; the highest issued id is the current one
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn begin(&self) -> Ticket<'_> {
        let id = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            id,
            generation: self,
        }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ticket<'g> {
    id: u64,
    generation: &'g Generation,
}

impl Ticket<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once a newer ticket has been issued
    pub fn is_current(&self) -> bool {
        self.generation.current() == self.id
    }
}

/// What a panel should show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum PanelSelection {
    Transactions {
        group: String,
        #[serde(default)]
        mode: DisplayMode,
        #[serde(default)]
        sort: Option<TransactionSort>,
    },
    Subscriptions {
        group: String,
        #[serde(default)]
        view: SubscriptionView,
        #[serde(default)]
        mode: DisplayMode,
    },
    Population {
        group: String,
        #[serde(default)]
        mode: DisplayMode,
    },
}

impl PanelSelection {
    pub fn kind(&self) -> DataKind {
        match self {
            PanelSelection::Transactions { .. } => DataKind::Transactions,
            PanelSelection::Subscriptions { .. } => DataKind::Subscriptions,
            PanelSelection::Population { .. } => DataKind::Population,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            PanelSelection::Transactions { group, .. }
            | PanelSelection::Subscriptions { group, .. }
            | PanelSelection::Population { group, .. } => group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PanelFeed {
    Transactions(Feed<TransactionListing>),
    Subscriptions(Feed<SubscriptionRecord>),
    Population(Feed<PopulationRecord>),
}

/// Last committed state of one panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub generation: u64,
    pub selection: PanelSelection,
    pub feed: PanelFeed,
}

pub struct Dashboard {
    service: Arc<FeedService>,
    transactions: Generation,
    subscriptions: Generation,
    population: Generation,
    snapshots: Mutex<HashMap<DataKind, PanelSnapshot>>,
}

impl Dashboard {
    pub fn new(service: Arc<FeedService>) -> Self {
        Dashboard {
            service,
            transactions: Generation::default(),
            subscriptions: Generation::default(),
            population: Generation::default(),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    fn generation(&self, kind: DataKind) -> &Generation {
        match kind {
            DataKind::Transactions => &self.transactions,
            DataKind::Subscriptions => &self.subscriptions,
            DataKind::Population => &self.population,
        }
    }

    async fn run(&self, selection: &PanelSelection) -> PanelFeed {
        match selection {
            PanelSelection::Transactions { group, mode, sort } => {
                PanelFeed::Transactions(self.service.transactions(group, *mode, *sort).await)
            }
            PanelSelection::Subscriptions { group, view, mode } => {
                PanelFeed::Subscriptions(self.service.subscriptions(group, *view, *mode).await)
            }
            PanelSelection::Population { group, mode } => {
                PanelFeed::Population(self.service.population(group, *mode).await)
            }
        }
    }

    /// Run the selection and commit it. `None` means a newer selection on
    /// the same panel started meanwhile and this result was discarded.
    pub async fn select(&self, selection: PanelSelection) -> Option<PanelSnapshot> {
        let kind = selection.kind();
        let ticket = self.generation(kind).begin();
        debug!("{} panel: generation {} for {}", kind, ticket.id(), selection.group());

        let feed = self.run(&selection).await;

        // Checked under the lock so a newer commit cannot be overwritten
        let mut snapshots = self.snapshots.lock().await;
        if !ticket.is_current() {
            info!(
                "{} panel: discarding stale generation {} (current {})",
                kind,
                ticket.id(),
                self.generation(kind).current()
            );
            return None;
        }

        let snapshot = PanelSnapshot {
            generation: ticket.id(),
            selection,
            feed,
        };
        snapshots.insert(kind, snapshot.clone());
        Some(snapshot)
    }

    pub async fn snapshot(&self) -> HashMap<DataKind, PanelSnapshot> {
        self.snapshots.lock().await.clone()
    }
}

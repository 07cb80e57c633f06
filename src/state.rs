//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds two maps behind separate locks: the room store (room id → `Room`,
//! the single source of truth for session state) and the connection registry
//! (client id → `ClientConn`, the broadcast layer's side-table over live
//! sockets). Store operations take the rooms lock, broadcast takes the
//! clients lock; the two are never held together.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::GameEvent;

// =============================================================================
// ROOM
// =============================================================================

/// Where a room is in its voting lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Setup,
    ItemsSubmitted,
    Voting,
    Revealing,
    Completed,
}

/// A non-admin room member, identified by display name and joining address.
#[derive(Debug, Clone)]
pub struct Participant {
    pub name: String,
    pub addr: IpAddr,
}

/// One completed voting round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub item: String,
    /// Raw per-participant votes, exactly as cast.
    pub votes: HashMap<String, String>,
    /// Vote value → how many members cast it.
    pub counts: HashMap<String, u32>,
    /// Mean of the numeric votes, rounded to two decimals. 0 if none parsed.
    pub average: f64,
}

/// The unit of session state. `items[0]`, when present, is always the item
/// currently being voted on or just revealed.
#[derive(Debug)]
pub struct Room {
    pub id: u32,
    pub admin_name: String,
    pub admin_addr: IpAddr,
    pub participants: Vec<Participant>,
    pub banned_addrs: HashSet<IpAddr>,
    pub items: VecDeque<String>,
    pub history: Vec<RoundRecord>,
    /// Current round's name → vote-value map. Cleared at every round start.
    pub votes: HashMap<String, String>,
    pub status: RoomStatus,
}

impl Room {
    #[must_use]
    pub fn new(id: u32, admin_name: String, admin_addr: IpAddr) -> Self {
        Self {
            id,
            admin_name,
            admin_addr,
            participants: Vec::new(),
            banned_addrs: HashSet::new(),
            items: VecDeque::new(),
            history: Vec::new(),
            votes: HashMap::new(),
            status: RoomStatus::Setup,
        }
    }

    /// The item currently being voted on or just revealed.
    #[must_use]
    pub fn current_item(&self) -> Option<&str> {
        self.items.front().map(String::as_str)
    }

    /// Admin plus all participants.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.participants.len() + 1
    }

    /// Whether `name` is the admin or a current participant. Case-sensitive.
    #[must_use]
    pub fn is_member(&self, name: &str) -> bool {
        name == self.admin_name || self.participants.iter().any(|p| p.name == name)
    }
}

// =============================================================================
// CONNECTION REGISTRY
// =============================================================================

/// What the ws loop should do with a delivered message.
#[derive(Debug)]
pub enum Outbound {
    /// Forward the event to the client.
    Event(GameEvent),
    /// Forward the event, then close the socket. Used by the ban flow.
    Kick(GameEvent),
}

/// Metadata tagged onto a live connection by its handshake, plus the sender
/// half of its outbound channel. A connection without an entry here is not
/// addressable for broadcast.
#[derive(Debug, Clone)]
pub struct ClientConn {
    pub room_id: u32,
    pub role: String,
    pub player_name: String,
    pub tx: mpsc::Sender<Outbound>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<u32, Room>>>,
    pub clients: Arc<RwLock<HashMap<Uuid, ClientConn>>>,
    /// Grace delay between the summary broadcast and room deletion.
    pub delete_delay: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(delete_delay: Duration) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            clients: Arc::new(RwLock::new(HashMap::new())),
            delete_delay,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

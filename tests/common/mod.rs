//! Shared test fixtures: in-memory repository fakes and a wired-up
//! service harness. The fakes honor the same contracts as the PostgreSQL
//! implementations (idempotent upserts, DM-pair uniqueness, removal
//! reporting) so the services under test see equivalent behavior.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use room_chat::application::dto::ServerEvent;
use room_chat::application::services::{
    BroadcastRouter, Connection, DmService, ModerationService, PresenceService, RoomSyncService,
    SessionRegistry,
};
use room_chat::domain::{
    dm_pair, Ban, BanRepository, Membership, MembershipRepository, PresenceStatus, Room,
    RoomRepository, RoomRole, RoomType,
};
use room_chat::shared::AppError;

// ---------------------------------------------------------------------------
// Room repository fake

#[derive(Default)]
pub struct InMemoryRoomRepository {
    inner: Mutex<RoomStore>,
}

#[derive(Default)]
struct RoomStore {
    next_id: i64,
    rooms: HashMap<i64, Room>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_by_id(&self, room_id: i64) -> Result<Option<Room>, AppError> {
        Ok(self.inner.lock().rooms.get(&room_id).cloned())
    }

    async fn create(
        &self,
        title: &str,
        room_type: RoomType,
        password_hash: Option<&str>,
        owner_id: i64,
    ) -> Result<Room, AppError> {
        let mut store = self.inner.lock();
        store.next_id += 1;
        let room = Room {
            id: store.next_id,
            title: title.to_string(),
            room_type,
            password_hash: password_hash.map(String::from),
            owner_id,
            dm_participants: None,
            created_at: Utc::now(),
        };
        store.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn create_dm(&self, a: i64, b: i64, owner_id: i64) -> Result<Room, AppError> {
        let pair = dm_pair(a, b);
        let mut store = self.inner.lock();
        // Same semantics as the partial unique index on the pair.
        if store
            .rooms
            .values()
            .any(|r| r.room_type == RoomType::Dm && r.dm_participants == Some(pair))
        {
            return Err(AppError::Conflict(format!(
                "DM room for {} and {} already exists",
                a, b
            )));
        }
        store.next_id += 1;
        let room = Room {
            id: store.next_id,
            title: Room::dm_title(a, b),
            room_type: RoomType::Dm,
            password_hash: None,
            owner_id,
            dm_participants: Some(pair),
            created_at: Utc::now(),
        };
        store.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn find_dm_by_pair(&self, a: i64, b: i64) -> Result<Option<Room>, AppError> {
        let pair = dm_pair(a, b);
        Ok(self
            .inner
            .lock()
            .rooms
            .values()
            .find(|r| r.room_type == RoomType::Dm && r.dm_participants == Some(pair))
            .cloned())
    }

    async fn set_password(
        &self,
        room_id: i64,
        password_hash: Option<&str>,
        room_type: RoomType,
    ) -> Result<(), AppError> {
        let mut store = self.inner.lock();
        let room = store
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;
        room.password_hash = password_hash.map(String::from);
        room.room_type = room_type;
        Ok(())
    }

    async fn delete(&self, room_id: i64) -> Result<(), AppError> {
        self.inner.lock().rooms.remove(&room_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Membership repository fake

#[derive(Default)]
pub struct InMemoryMembershipRepository {
    rows: Mutex<HashMap<(i64, i64), Membership>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        Ok(self.rows.lock().get(&(room_id, user_id)).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Membership>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_room(&self, room_id: i64) -> Result<Vec<Membership>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, membership: &Membership) -> Result<(), AppError> {
        self.rows
            .lock()
            .entry((membership.room_id, membership.user_id))
            .or_insert_with(|| membership.clone());
        Ok(())
    }

    async fn set_role(&self, room_id: i64, user_id: i64, role: RoomRole) -> Result<(), AppError> {
        let mut rows = self.rows.lock();
        let row = rows.get_mut(&(room_id, user_id)).ok_or_else(|| {
            AppError::NotFound(format!("User {} is not in room {}", user_id, room_id))
        })?;
        row.role = role;
        Ok(())
    }

    async fn set_mute_until(
        &self,
        room_id: i64,
        user_id: i64,
        mute_until: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut rows = self.rows.lock();
        let row = rows.get_mut(&(room_id, user_id)).ok_or_else(|| {
            AppError::NotFound(format!("User {} is not in room {}", user_id, room_id))
        })?;
        row.mute_until = mute_until;
        Ok(())
    }

    async fn delete(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self.rows.lock().remove(&(room_id, user_id)).is_some())
    }

    async fn delete_by_room(&self, room_id: i64) -> Result<(), AppError> {
        self.rows.lock().retain(|(r, _), _| *r != room_id);
        Ok(())
    }

    async fn count_by_room(&self, room_id: i64) -> Result<i64, AppError> {
        Ok(self
            .rows
            .lock()
            .keys()
            .filter(|(r, _)| *r == room_id)
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Ban repository fake

#[derive(Default)]
pub struct InMemoryBanRepository {
    bans: Mutex<HashSet<(i64, i64)>>,
}

impl InMemoryBanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Ban> {
        self.bans
            .lock()
            .iter()
            .map(|&(room_id, user_id)| Ban {
                room_id,
                user_id,
                created_at: Utc::now(),
            })
            .collect()
    }
}

#[async_trait]
impl BanRepository for InMemoryBanRepository {
    async fn insert(&self, room_id: i64, user_id: i64) -> Result<(), AppError> {
        self.bans.lock().insert((room_id, user_id));
        Ok(())
    }

    async fn remove(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self.bans.lock().remove(&(room_id, user_id)))
    }

    async fn exists(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self.bans.lock().contains(&(room_id, user_id)))
    }

    async fn delete_by_room(&self, room_id: i64) -> Result<(), AppError> {
        self.bans.lock().retain(|(r, _)| *r != room_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// User repository fake

#[derive(Default)]
pub struct InMemoryUserRepository {
    nicknames: Mutex<HashMap<String, i64>>,
    /// blocked user -> users who blocked them
    blockers: Mutex<HashMap<i64, Vec<i64>>>,
    statuses: Mutex<HashMap<i64, PresenceStatus>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, nickname: &str, uid: i64) {
        self.nicknames.lock().insert(nickname.to_string(), uid);
    }

    pub fn block(&self, blocker: i64, blocked: i64) {
        self.blockers.lock().entry(blocked).or_default().push(blocker);
    }

    pub fn status_of(&self, uid: i64) -> Option<PresenceStatus> {
        self.statuses.lock().get(&uid).copied()
    }
}

#[async_trait]
impl room_chat::domain::UserRepository for InMemoryUserRepository {
    async fn find_uid_by_nickname(&self, nickname: &str) -> Result<Option<i64>, AppError> {
        Ok(self.nicknames.lock().get(nickname).copied())
    }

    async fn find_blockers(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .blockers
            .lock()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_status(&self, user_id: i64, status: PresenceStatus) -> Result<(), AppError> {
        self.statuses.lock().insert(user_id, status);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wired harness

pub type TestSync =
    RoomSyncService<InMemoryRoomRepository, InMemoryMembershipRepository, InMemoryBanRepository>;
pub type TestModeration =
    ModerationService<InMemoryRoomRepository, InMemoryMembershipRepository, InMemoryBanRepository>;
pub type TestDm =
    DmService<InMemoryRoomRepository, InMemoryMembershipRepository, InMemoryBanRepository>;
pub type TestRouter = BroadcastRouter<InMemoryUserRepository, InMemoryMembershipRepository>;
pub type TestPresence = PresenceService<InMemoryUserRepository, InMemoryMembershipRepository>;

/// Everything the chat core needs, wired against the in-memory fakes.
pub struct TestHarness {
    pub registry: Arc<SessionRegistry>,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub bans: Arc<InMemoryBanRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub router: Arc<TestRouter>,
    pub sync: Arc<TestSync>,
    pub moderation: Arc<TestModeration>,
    pub dm: Arc<TestDm>,
    pub presence: Arc<TestPresence>,
    session_seq: AtomicU64,
    uid_seq: AtomicI64,
}

impl TestHarness {
    pub fn new() -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let bans = Arc::new(InMemoryBanRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());

        let router = Arc::new(BroadcastRouter::new(
            Arc::clone(&registry),
            Arc::clone(&users),
            Arc::clone(&memberships),
        ));
        let sync = Arc::new(RoomSyncService::new(
            Arc::clone(&registry),
            Arc::clone(&rooms),
            Arc::clone(&memberships),
            Arc::clone(&bans),
        ));
        let moderation = Arc::new(ModerationService::new(
            Arc::clone(&registry),
            Arc::clone(&rooms),
            Arc::clone(&memberships),
            Arc::clone(&bans),
        ));
        let dm = Arc::new(DmService::new(
            Arc::clone(&rooms),
            Arc::clone(&memberships),
            Arc::clone(&sync),
        ));
        let presence = Arc::new(PresenceService::new(
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&users),
        ));

        Self {
            registry,
            rooms,
            memberships,
            bans,
            users,
            router,
            sync,
            moderation,
            dm,
            presence,
            session_seq: AtomicU64::new(0),
            uid_seq: AtomicI64::new(100),
        }
    }

    /// Register a live connection for the identity. Returns the connection,
    /// its outbox receiver and whether it was the identity's first.
    pub fn connect(
        &self,
        uid: i64,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>, bool) {
        let n = self.session_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Connection::new(format!("s{}-{}", uid, n), uid, tx));
        let first = self.registry.register(Arc::clone(&connection));
        (connection, rx, first)
    }

    pub fn fresh_uid(&self) -> i64 {
        self.uid_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a room, seed the owner's membership and subscribe the
    /// owner's live connections, mirroring the create path.
    pub async fn create_room(
        &self,
        owner: i64,
        title: &str,
        room_type: RoomType,
        password_hash: Option<&str>,
    ) -> Room {
        let room = self
            .rooms
            .create(title, room_type, password_hash, owner)
            .await
            .unwrap();
        self.memberships
            .upsert(&Membership::new(room.id, owner, RoomRole::Owner))
            .await
            .unwrap();
        self.sync.subscribe_connections(owner, room.id);
        room
    }

    pub async fn create_public_room(&self, owner: i64, title: &str) -> Room {
        self.create_room(owner, title, RoomType::Public, None).await
    }
}

/// Drain everything currently queued on a connection outbox.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Status broadcasts for a user currently queued on an outbox.
pub fn status_events(
    rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    uid: i64,
) -> Vec<PresenceStatus> {
    drain(rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Status(s) if s.uid == uid => Some(s.status),
            _ => None,
        })
        .collect()
}

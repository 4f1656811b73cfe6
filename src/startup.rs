//! Application Startup
//!
//! Wires the connection pool, repositories and chat services together and
//! runs the server. `AppState` is the dependency bundle handed to the
//! gateway; everything in it is cheaply cloneable.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{
    BroadcastRouter, DmService, ModerationService, PresenceService, RoomSyncService,
    SessionRegistry,
};
use crate::config::Settings;
use crate::infrastructure::database::{create_pool, run_migrations};
use crate::infrastructure::repositories::{
    PgBanRepository, PgMembershipRepository, PgRoomRepository, PgUserRepository,
};
use crate::presentation::http::create_router;

type Sync = RoomSyncService<PgRoomRepository, PgMembershipRepository, PgBanRepository>;
type Moderation = ModerationService<PgRoomRepository, PgMembershipRepository, PgBanRepository>;
type Dm = DmService<PgRoomRepository, PgMembershipRepository, PgBanRepository>;
type Router = BroadcastRouter<PgUserRepository, PgMembershipRepository>;
type Presence = PresenceService<PgUserRepository, PgMembershipRepository>;

/// Shared application state handed to every gateway connection.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: PgPool,

    pub registry: Arc<SessionRegistry>,

    pub rooms: Arc<PgRoomRepository>,
    pub memberships: Arc<PgMembershipRepository>,
    pub bans: Arc<PgBanRepository>,
    pub users: Arc<PgUserRepository>,

    pub router: Arc<Router>,
    pub sync: Arc<Sync>,
    pub moderation: Arc<Moderation>,
    pub dm: Arc<Dm>,
    pub presence: Arc<Presence>,
}

impl AppState {
    fn build(settings: Settings, db: PgPool) -> Self {
        let registry = Arc::new(SessionRegistry::new());

        let rooms = Arc::new(PgRoomRepository::new(db.clone()));
        let memberships = Arc::new(PgMembershipRepository::new(db.clone()));
        let bans = Arc::new(PgBanRepository::new(db.clone()));
        let users = Arc::new(PgUserRepository::new(db.clone()));

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
            settings: Arc::new(settings),
            db,
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
        }
    }
}

/// The built application, bound and ready to serve.
pub struct Application {
    listener: TcpListener,
    app: axum::Router,
    port: u16,
}

impl Application {
    /// Connect to the database, run migrations, wire the services and
    /// bind the listener.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let db = create_pool(&settings.database)
            .await
            .context("Failed to create database connection pool")?;
        run_migrations(&db)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database connected and migrated");

        let addr = settings.server_addr();
        let state = AppState::build(settings, db);
        let app = create_router(state);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        let port = listener.local_addr()?.port();
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            app,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the process is stopped.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.app)
            .await
            .context("Server error")
    }
}

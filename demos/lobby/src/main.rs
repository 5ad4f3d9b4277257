//! A lobby rush: six players log in at once and race for a four-seat table.
//!
//! Run with `RUST_LOG=debug cargo run -p lobby` to watch session rotation
//! and seat assignment.

use std::time::Duration;

use mindtable::prelude::*;
use tracing_subscriber::EnvFilter;

const PLAYERS: u64 = 6;
const SEATS: u32 = 4;
const PASSWORD: &str = "open sesame";

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

fn seed_users() -> Result<MemoryIdentityStore, MindtableError> {
    let hash = hash_password(PASSWORD)?;
    let mut store = MemoryIdentityStore::new();
    for n in 1..=PLAYERS {
        store = store.with_user(UserRecord {
            id: UserId(n),
            login: format!("player{n}"),
            credential_hash: hash.clone(),
            role: if n == 1 { Role::Admin } else { Role::Player },
            email: None,
            avatar: None,
        });
    }
    Ok(store)
}

// ---------------------------------------------------------------------------
// One player's visit
// ---------------------------------------------------------------------------

/// Renders the login page, logs in, and submits the join form.
/// Returns where the player ended up.
async fn visit(
    app: Mindtable<PasswordAuthenticator<MemoryIdentityStore>, MemoryRoomRepository>,
    n: u64,
    room: RoomId,
) -> Result<String, MindtableError> {
    let entry = app.enter(&Request::new(None)).await?;

    let login = app
        .login(
            &Request::new(Some(entry.session))
                .field("username", format!("player{n}"))
                .field("password", PASSWORD)
                .field("csrf_token", entry.csrf_token.clone()),
        )
        .await;

    let join = app
        .join(
            &Request::new(login.session)
                .field("game_id", room.0.to_string())
                .field("csrf_token", entry.csrf_token),
        )
        .await;

    Ok(join.location.unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rooms = MemoryRoomRepository::new();
    let room = rooms.create_room(SEATS).await;
    let app = MindtableBuilder::new().build(PasswordAuthenticator::new(seed_users()?), rooms);
    let reaper = app.spawn_session_reaper(Duration::from_secs(60));

    let handles: Vec<_> = (1..=PLAYERS)
        .map(|n| {
            let app = app.clone();
            tokio::spawn(async move { (n, visit(app, n, room).await) })
        })
        .collect();

    for handle in handles {
        let (n, landed) = handle.await?;
        println!("player{n} -> {}", landed?);
    }

    let table = app.admission().room(room).await?;
    let roster = app.admission().roster(room).await?;
    println!(
        "\n{} ({}/{} seats, {})",
        table.id,
        roster.len(),
        table.capacity,
        table.status
    );
    for member in roster {
        println!("  {} {}", member.seat, member.user_id);
    }
    reaper.abort();
    Ok(())
}

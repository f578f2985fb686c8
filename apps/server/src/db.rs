use sqlx::SqlitePool;

/// Apply pending migrations. Each step runs once, tracked in `_migrations`;
/// startup is safe to repeat.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // WAL mode for better concurrent read access
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, "001_init").await? {
        for statement in [
            "CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                price INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT
            )",
            "CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id),
                service_id INTEGER NOT NULL REFERENCES services(id),
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                cancelled_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS blocked_slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                reason TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_bookings_date ON bookings(date)",
            "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
            "CREATE INDEX IF NOT EXISTS idx_blocked_slots_date ON blocked_slots(date)",
        ] {
            sqlx::query(statement).execute(pool).await?;
        }
        mark_applied(pool, "001_init").await?;
        tracing::info!("Applied migration: 001_init");
    }

    if !is_applied(pool, "002_seed_catalog").await? {
        seed_catalog(pool).await?;
        mark_applied(pool, "002_seed_catalog").await?;
        tracing::info!("Applied migration: 002_seed_catalog");
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

async fn is_applied(pool: &SqlitePool, name: &str) -> anyhow::Result<bool> {
    let applied: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await?;
    Ok(applied)
}

async fn mark_applied(pool: &SqlitePool, name: &str) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Initial service catalog. Prices in DH, durations approximate.
async fn seed_catalog(pool: &SqlitePool) -> anyhow::Result<()> {
    let catalog: &[(&str, &str, i64, i64)] = &[
        // (name, category, duration_min, price)
        ("Hair - Balayage / Highlights (Short)", "HAIR", 90, 500),
        ("Hair - Balayage / Highlights (Medium)", "HAIR", 120, 700),
        ("Hair - Balayage / Highlights (Long)", "HAIR", 150, 800),
        ("Hair - Toner / Rinse", "HAIR", 45, 200),
        ("Hair - Blow-dry", "HAIR", 45, 80),
        ("Hair - Haircut", "HAIR", 45, 150),
        ("Hair - Haircut + Blow-dry", "HAIR", 60, 200),
        ("Hair - Kids Haircut", "HAIR", 30, 80),
        ("Hair Color - Roots", "HAIR", 90, 250),
        ("Hair Color - Long Hair", "HAIR", 150, 400),
        ("Hammam - Traditional Hammam (Natus) 60 min", "HAMMAM_MASSAGE", 60, 200),
        ("Hammam - Rituals Hammam 60 min", "HAMMAM_MASSAGE", 60, 400),
        ("Hammam - Royal Hammam 90 min", "HAMMAM_MASSAGE", 90, 600),
        ("Massage - Relaxing Anti-stress 30 min", "HAMMAM_MASSAGE", 30, 300),
        ("Massage - Relaxing Anti-stress 60 min", "HAMMAM_MASSAGE", 60, 600),
        ("Massage - Aromatic Hot Oil", "HAMMAM_MASSAGE", 60, 500),
        ("Massage - Hot Stone", "HAMMAM_MASSAGE", 60, 650),
        ("Massage - Foot Reflexology 30 min", "HAMMAM_MASSAGE", 30, 270),
        ("Nails - Manicure", "NAILS", 45, 100),
        ("Nails - Pedicure + Normal Polish", "NAILS", 60, 170),
        ("Nails - Semi-permanent Polish", "NAILS", 45, 150),
        ("Nails - Gel Nails", "NAILS", 90, 600),
        ("Nails - Refill", "NAILS", 60, 350),
        ("Lashes - Classic Full Set (one by one)", "LASHES", 90, 150),
        ("Lashes - Classic Extensions", "LASHES", 120, 500),
        ("Lashes - Russian Volume", "LASHES", 120, 600),
        ("Facial - Deep Cleansing", "FACIAL", 60, 300),
        ("Facial - Hydrating Treatment", "FACIAL", 60, 350),
    ];

    for (name, category, duration_min, price) in catalog {
        sqlx::query(
            "INSERT INTO services (name, category, duration_min, price) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(category)
        .bind(duration_min)
        .bind(price)
        .execute(pool)
        .await?;
    }

    Ok(())
}

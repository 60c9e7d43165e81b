use crate::entities::{chat_messages, chats, claims, comments, item_votes, items, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let db_url = env::var("DATABASE_URL")?;

    if db_url.starts_with("postgres://") {
        info!("🔄 Running SQLx migrations for PostgreSQL...");
        let pool = sqlx::PgPool::connect(&db_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
    } else {
        info!("🔄 Running SeaORM auto-migrations for SQLite/Other...");
        let builder = db.get_database_backend();
        let schema = Schema::new(builder);

        let stmts = vec![
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(items::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(item_votes::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(claims::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(chats::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(chat_messages::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(comments::Entity)
                .if_not_exists()
                .to_owned(),
        ];

        for stmt in stmts {
            let stmt = builder.build(&stmt);
            let _ = db.execute(stmt).await;
        }

        // Uniqueness invariants live in the database: duplicate claims and
        // duplicate chats must lose at insert time, not at lookup time.
        let _ = db
            .execute(sea_orm::Statement::from_string(
                builder,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_claims_item_claimant ON claims(item_id, claimant_id);"
                    .to_string(),
            ))
            .await;
        let _ = db
            .execute(sea_orm::Statement::from_string(
                builder,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_item_pair ON chats(item_id, user_a, user_b);"
                    .to_string(),
            ))
            .await;

        // Query-path indexes.
        let _ = db
            .execute(sea_orm::Statement::from_string(
                builder,
                "CREATE INDEX IF NOT EXISTS idx_items_lookup ON items(item_type, category, status);"
                    .to_string(),
            ))
            .await;
        let _ = db
            .execute(sea_orm::Statement::from_string(
                builder,
                "CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id, created_at);"
                    .to_string(),
            ))
            .await;
    }

    Ok(())
}

//! SQLite persistence sink.
//!
//! Stores auctions, orders and offers in a single SQLite file, upserting on
//! each record's natural key. Amounts are kept as decimal text since they
//! exceed the 64-bit integer range.
//!
//! # Usage
//! ```rust,no_run
//! use marketindex_storage::sqlite::SqliteSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let sink = SqliteSink::open("./market.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let sink = SqliteSink::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use marketindex_core::error::ReindexError;
use marketindex_core::records::{AuctionRecord, OfferRecord, OrderRecord};
use marketindex_core::services::PersistenceSink;

fn storage_err(e: impl std::fmt::Display) -> ReindexError {
    ReindexError::Persistence(e.to_string())
}

/// Serialized name of a unit enum variant (`AuctionStatus::Running` → `"Running"`).
fn label<T: Serialize>(value: &T) -> Result<String, ReindexError> {
    match serde_json::to_value(value).map_err(storage_err)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(storage_err(format!("expected a unit variant, got {other}"))),
    }
}

/// SQLite-backed [`PersistenceSink`].
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./market.db"`) or a full
    /// SQLite URL (`"sqlite:./market.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ReindexError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let sink = Self { pool };
        sink.init_schema(true).await?;
        Ok(sink)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the sink is dropped.
    pub async fn in_memory() -> Result<Self, ReindexError> {
        // One connection: every pooled connection would get its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let sink = Self { pool };
        sink.init_schema(false).await?;
        Ok(sink)
    }

    async fn init_schema(&self, wal: bool) -> Result<(), ReindexError> {
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS auctions (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                marketplace_auction_id INTEGER NOT NULL,
                marketplace_key        TEXT    NOT NULL,
                collection             TEXT    NOT NULL,
                nonce                  INTEGER NOT NULL,
                identifier             TEXT    NOT NULL,
                nr_auctioned_tokens    INTEGER NOT NULL,
                status                 TEXT    NOT NULL,
                auction_type           TEXT    NOT NULL,
                payment_token          TEXT    NOT NULL,
                payment_nonce          INTEGER NOT NULL,
                owner_address          TEXT    NOT NULL,
                min_bid                TEXT    NOT NULL,
                min_bid_denominated    REAL    NOT NULL,
                max_bid                TEXT    NOT NULL,
                max_bid_denominated    REAL    NOT NULL,
                min_bid_diff           TEXT    NOT NULL,
                start_date             INTEGER NOT NULL,
                end_date               INTEGER NOT NULL,
                tags                   TEXT    NOT NULL,
                block_hash             TEXT    NOT NULL,
                UNIQUE (marketplace_auction_id, marketplace_key)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                auction_id               INTEGER NOT NULL REFERENCES auctions (id),
                marketplace_key          TEXT    NOT NULL,
                owner_address            TEXT    NOT NULL,
                price_token              TEXT    NOT NULL,
                price_nonce              INTEGER NOT NULL,
                price_amount             TEXT    NOT NULL,
                price_amount_denominated REAL    NOT NULL,
                bought_tokens            INTEGER NOT NULL,
                status                   TEXT    NOT NULL,
                block_hash               TEXT    NOT NULL,
                timestamp                INTEGER NOT NULL,
                UNIQUE (auction_id, block_hash)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS offers (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                marketplace_offer_id     INTEGER NOT NULL,
                marketplace_key          TEXT    NOT NULL,
                collection               TEXT    NOT NULL,
                nonce                    INTEGER NOT NULL,
                identifier               TEXT    NOT NULL,
                price_token              TEXT    NOT NULL,
                price_nonce              INTEGER NOT NULL,
                price_amount             TEXT    NOT NULL,
                price_amount_denominated REAL    NOT NULL,
                quantity                 INTEGER NOT NULL,
                owner_address            TEXT    NOT NULL,
                status                   TEXT    NOT NULL,
                end_date                 INTEGER NOT NULL,
                block_hash               TEXT    NOT NULL,
                accepted_tx_hash         TEXT,
                timestamp                INTEGER NOT NULL,
                UNIQUE (marketplace_offer_id, marketplace_key)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_auctions_identifier ON auctions (identifier);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    // ─── Inspection ──────────────────────────────────────────────────────────

    /// Row count of `auctions`, `orders` and `offers`.
    pub async fn counts(&self) -> Result<(u64, u64, u64), ReindexError> {
        let mut counts = [0u64; 3];
        for (slot, table) in counts.iter_mut().zip(["auctions", "orders", "offers"]) {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
            *slot = row.get::<i64, _>("cnt") as u64;
        }
        Ok((counts[0], counts[1], counts[2]))
    }

    /// Stored status of an auction, by its natural key.
    pub async fn auction_status(
        &self,
        marketplace_auction_id: u64,
        marketplace_key: &str,
    ) -> Result<Option<String>, ReindexError> {
        let row = sqlx::query(
            "SELECT status FROM auctions
             WHERE marketplace_auction_id = ? AND marketplace_key = ?",
        )
        .bind(marketplace_auction_id as i64)
        .bind(marketplace_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| r.get::<String, _>("status")))
    }
}

// ─── PersistenceSink impl ────────────────────────────────────────────────────

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn save_auctions(&self, auctions: &[AuctionRecord]) -> Result<Vec<i64>, ReindexError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let mut ids = Vec::with_capacity(auctions.len());

        for a in auctions {
            let tags = serde_json::to_string(&a.tags).map_err(storage_err)?;
            let row = sqlx::query(
                "INSERT INTO auctions (
                    marketplace_auction_id, marketplace_key, collection, nonce, identifier,
                    nr_auctioned_tokens, status, auction_type, payment_token, payment_nonce,
                    owner_address, min_bid, min_bid_denominated, max_bid, max_bid_denominated,
                    min_bid_diff, start_date, end_date, tags, block_hash
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (marketplace_auction_id, marketplace_key) DO UPDATE SET
                    collection = excluded.collection,
                    nonce = excluded.nonce,
                    identifier = excluded.identifier,
                    nr_auctioned_tokens = excluded.nr_auctioned_tokens,
                    status = excluded.status,
                    auction_type = excluded.auction_type,
                    payment_token = excluded.payment_token,
                    payment_nonce = excluded.payment_nonce,
                    owner_address = excluded.owner_address,
                    min_bid = excluded.min_bid,
                    min_bid_denominated = excluded.min_bid_denominated,
                    max_bid = excluded.max_bid,
                    max_bid_denominated = excluded.max_bid_denominated,
                    min_bid_diff = excluded.min_bid_diff,
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    tags = excluded.tags,
                    block_hash = excluded.block_hash
                 RETURNING id",
            )
            .bind(a.marketplace_auction_id as i64)
            .bind(&a.marketplace_key)
            .bind(&a.collection)
            .bind(a.nonce as i64)
            .bind(&a.identifier)
            .bind(a.nr_auctioned_tokens as i64)
            .bind(label(&a.status)?)
            .bind(label(&a.auction_type)?)
            .bind(&a.payment_token)
            .bind(a.payment_nonce as i64)
            .bind(&a.owner_address)
            .bind(a.min_bid.to_string())
            .bind(a.min_bid_denominated)
            .bind(a.max_bid.to_string())
            .bind(a.max_bid_denominated)
            .bind(a.min_bid_diff.to_string())
            .bind(a.start_date)
            .bind(a.end_date)
            .bind(tags)
            .bind(&a.block_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;

            ids.push(row.get::<i64, _>("id"));
        }

        tx.commit().await.map_err(storage_err)?;
        debug!(count = auctions.len(), "auctions saved");
        Ok(ids)
    }

    async fn save_orders(&self, orders: &[OrderRecord]) -> Result<(), ReindexError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for o in orders {
            let auction_id = o.auction_id.ok_or_else(|| {
                storage_err(format!("order {} has no auction id", o.block_hash))
            })?;
            sqlx::query(
                "INSERT INTO orders (
                    auction_id, marketplace_key, owner_address, price_token, price_nonce,
                    price_amount, price_amount_denominated, bought_tokens, status,
                    block_hash, timestamp
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (auction_id, block_hash) DO UPDATE SET
                    owner_address = excluded.owner_address,
                    price_token = excluded.price_token,
                    price_nonce = excluded.price_nonce,
                    price_amount = excluded.price_amount,
                    price_amount_denominated = excluded.price_amount_denominated,
                    bought_tokens = excluded.bought_tokens,
                    status = excluded.status,
                    timestamp = excluded.timestamp",
            )
            .bind(auction_id)
            .bind(&o.marketplace_key)
            .bind(&o.owner_address)
            .bind(&o.price_token)
            .bind(o.price_nonce as i64)
            .bind(o.price_amount.to_string())
            .bind(o.price_amount_denominated)
            .bind(o.bought_tokens as i64)
            .bind(label(&o.status)?)
            .bind(&o.block_hash)
            .bind(o.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        debug!(count = orders.len(), "orders saved");
        Ok(())
    }

    async fn save_offers(&self, offers: &[OfferRecord]) -> Result<(), ReindexError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for o in offers {
            sqlx::query(
                "INSERT INTO offers (
                    marketplace_offer_id, marketplace_key, collection, nonce, identifier,
                    price_token, price_nonce, price_amount, price_amount_denominated,
                    quantity, owner_address, status, end_date, block_hash,
                    accepted_tx_hash, timestamp
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (marketplace_offer_id, marketplace_key) DO UPDATE SET
                    price_token = excluded.price_token,
                    price_nonce = excluded.price_nonce,
                    price_amount = excluded.price_amount,
                    price_amount_denominated = excluded.price_amount_denominated,
                    quantity = excluded.quantity,
                    status = excluded.status,
                    end_date = excluded.end_date,
                    accepted_tx_hash = excluded.accepted_tx_hash,
                    timestamp = excluded.timestamp",
            )
            .bind(o.marketplace_offer_id as i64)
            .bind(&o.marketplace_key)
            .bind(&o.collection)
            .bind(o.nonce as i64)
            .bind(&o.identifier)
            .bind(&o.price_token)
            .bind(o.price_nonce as i64)
            .bind(o.price_amount.to_string())
            .bind(o.price_amount_denominated)
            .bind(o.quantity as i64)
            .bind(&o.owner_address)
            .bind(label(&o.status)?)
            .bind(o.end_date)
            .bind(&o.block_hash)
            .bind(&o.accepted_tx_hash)
            .bind(o.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        debug!(count = offers.len(), "offers saved");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

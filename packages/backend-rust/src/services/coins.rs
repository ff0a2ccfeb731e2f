//! Coin ledger. Every balance change goes through [`apply`], which updates
//! `users.total_coins` and appends a transaction row on the same connection so
//! callers can fold it into a wider SQL transaction.

use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::services::{iso_from, now_iso, PageInfo, PageQuery, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earned,
    Spent,
    Bonus,
    Penalty,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earned => "earned",
            TransactionType::Spent => "spent",
            TransactionType::Bonus => "bonus",
            TransactionType::Penalty => "penalty",
            TransactionType::Refund => "refund",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "earned" => Some(TransactionType::Earned),
            "spent" => Some(TransactionType::Spent),
            "bonus" => Some(TransactionType::Bonus),
            "penalty" => Some(TransactionType::Penalty),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }

    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::Earned | TransactionType::Bonus | TransactionType::Refund
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinSource {
    Registration,
    Assessment,
    Puzzle,
    Streak,
    Referral,
    Redemption,
    Admin,
}

impl CoinSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinSource::Registration => "registration",
            CoinSource::Assessment => "assessment",
            CoinSource::Puzzle => "puzzle",
            CoinSource::Streak => "streak",
            CoinSource::Referral => "referral",
            CoinSource::Redemption => "redemption",
            CoinSource::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registration" => Some(CoinSource::Registration),
            "assessment" => Some(CoinSource::Assessment),
            "puzzle" => Some(CoinSource::Puzzle),
            "streak" => Some(CoinSource::Streak),
            "referral" => Some(CoinSource::Referral),
            "redemption" => Some(CoinSource::Redemption),
            "admin" => Some(CoinSource::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinTransaction {
    pub id: String,
    pub user_id: String,
    pub transaction_type: String,
    pub amount: i64,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<String>,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: String,
    pub created_at: String,
}

/// One ledger movement. `amount` is a magnitude; the direction comes from `kind`.
#[derive(Debug, Clone, Copy)]
pub struct CoinEntry<'a> {
    pub user_id: &'a str,
    pub kind: TransactionType,
    pub source: CoinSource,
    pub amount: i64,
    pub reason: &'a str,
    pub reference_id: Option<&'a str>,
}

pub async fn apply(
    conn: &mut SqliteConnection,
    entry: CoinEntry<'_>,
) -> Result<CoinTransaction, ServiceError> {
    if entry.amount <= 0 {
        return Err(ServiceError::validation("Amount must be positive"));
    }

    let before: Option<i64> = sqlx::query_scalar(r#"SELECT "total_coins" FROM "users" WHERE "id" = ?"#)
        .bind(entry.user_id)
        .fetch_optional(&mut *conn)
        .await?;
    let before = before.ok_or_else(|| ServiceError::not_found("User not found"))?;

    let after = if entry.kind.is_credit() {
        before
            .checked_add(entry.amount)
            .ok_or_else(|| ServiceError::bad_request("Coin balance limit exceeded"))?
    } else {
        before
            .checked_sub(entry.amount)
            .filter(|after| *after >= 0)
            .ok_or_else(|| ServiceError::bad_request("Insufficient coins"))?
    };

    let now = now_iso();
    sqlx::query(r#"UPDATE "users" SET "total_coins" = ?, "updated_at" = ? WHERE "id" = ?"#)
        .bind(after)
        .bind(&now)
        .bind(entry.user_id)
        .execute(&mut *conn)
        .await?;

    let tx = CoinTransaction {
        id: Uuid::new_v4().to_string(),
        user_id: entry.user_id.to_string(),
        transaction_type: entry.kind.as_str().to_string(),
        amount: entry.amount,
        reason: entry.reason.to_string(),
        source: entry.source.as_str().to_string(),
        reference_id: entry.reference_id.map(str::to_string),
        balance_before: before,
        balance_after: after,
        status: "completed".to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO "coin_transactions"
          ("id", "user_id", "transaction_type", "amount", "reason", "source", "reference_id",
           "balance_before", "balance_after", "status", "created_at")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.user_id)
    .bind(&tx.transaction_type)
    .bind(tx.amount)
    .bind(&tx.reason)
    .bind(&tx.source)
    .bind(&tx.reference_id)
    .bind(tx.balance_before)
    .bind(tx.balance_after)
    .bind(&tx.status)
    .bind(&tx.created_at)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        user_id = entry.user_id,
        kind = entry.kind.as_str(),
        source = entry.source.as_str(),
        amount = entry.amount,
        balance = after,
        "coin ledger updated"
    );

    Ok(tx)
}

/// [`apply`] in its own SQL transaction.
pub async fn apply_standalone(
    pool: &SqlitePool,
    entry: CoinEntry<'_>,
) -> Result<CoinTransaction, ServiceError> {
    let mut tx = pool.begin().await?;
    let record = apply(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(record)
}

pub(crate) fn map_transaction_row(row: &SqliteRow) -> Result<CoinTransaction, sqlx::Error> {
    Ok(CoinTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        transaction_type: row.try_get("transaction_type")?,
        amount: row.try_get("amount")?,
        reason: row.try_get("reason")?,
        source: row.try_get("source")?,
        reference_id: row.try_get("reference_id")?,
        balance_before: row.try_get("balance_before")?,
        balance_after: row.try_get("balance_after")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn recent_transactions(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<CoinTransaction>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM "coin_transactions"
        WHERE "user_id" = ?
        ORDER BY "created_at" DESC, "rowid" DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(map_transaction_row)
        .collect::<Result<Vec<_>, _>>()?)
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinBalance {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub recent_transactions: Vec<CoinTransaction>,
}

pub async fn balance(pool: &SqlitePool, user_id: &str) -> Result<CoinBalance, ServiceError> {
    let balance: Option<i64> = sqlx::query_scalar(r#"SELECT "total_coins" FROM "users" WHERE "id" = ?"#)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let balance = balance.ok_or_else(|| ServiceError::not_found("User not found"))?;

    let row = sqlx::query(
        r#"
        SELECT
          COALESCE(SUM(CASE WHEN "transaction_type" IN ('earned', 'bonus', 'refund') THEN "amount" ELSE 0 END), 0) AS "earned",
          COALESCE(SUM(CASE WHEN "transaction_type" IN ('spent', 'penalty') THEN "amount" ELSE 0 END), 0) AS "spent"
        FROM "coin_transactions"
        WHERE "user_id" = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(CoinBalance {
        balance,
        total_earned: row.try_get("earned")?,
        total_spent: row.try_get("spent")?,
        recent_transactions: recent_transactions(pool, user_id, 10).await?,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
}

pub async fn list_transactions(
    pool: &SqlitePool,
    user_id: &str,
    filter: &TransactionFilter,
) -> Result<(Vec<CoinTransaction>, PageInfo), ServiceError> {
    let kind = match filter.kind.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            TransactionType::parse(raw)
                .ok_or_else(|| ServiceError::validation("Invalid transaction type"))?,
        ),
        None => None,
    };
    let source = match filter.source.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            CoinSource::parse(raw).ok_or_else(|| ServiceError::validation("Invalid source"))?,
        ),
        None => None,
    };
    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    };

    let push_filters = |qb: &mut QueryBuilder<'_, Sqlite>| {
        qb.push(r#" WHERE "user_id" = "#).push_bind(user_id.to_string());
        if let Some(kind) = kind {
            qb.push(r#" AND "transaction_type" = "#).push_bind(kind.as_str());
        }
        if let Some(source) = source {
            qb.push(r#" AND "source" = "#).push_bind(source.as_str());
        }
    };

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT COUNT(*) FROM "coin_transactions""#);
    push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT * FROM "coin_transactions""#);
    push_filters(&mut qb);
    qb.push(r#" ORDER BY "created_at" DESC, "rowid" DESC LIMIT "#)
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let items = rows
        .iter()
        .map(map_transaction_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((items, page.info(total)))
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Reward {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub coin_cost: i64,
    pub availability: &'static str,
    pub benefits: &'static [&'static str],
    pub validity_days: i64,
}

const CAREER_BENEFITS: &[&str] = &["Career guidance", "Industry insights", "Network building"];
const EBOOK_BENEFITS: &[&str] = &[
    "Access to premium content",
    "Skill development",
    "Career preparation",
];
const LIBRARY_BENEFITS: &[&str] = &["Extended access", "More time to study", "Flexible learning"];

pub const REWARDS: &[Reward] = &[
    Reward {
        id: "alumni_mentorship",
        kind: "mentorship",
        name: "Alumni Mentorship Session",
        description: "1-hour one-on-one mentorship session with industry professionals",
        coin_cost: 100,
        availability: "Available",
        benefits: CAREER_BENEFITS,
        validity_days: 30,
    },
    Reward {
        id: "ebook_discount_25",
        kind: "ebook_discount",
        name: "25% Discount on Educational eBooks",
        description: "Get 25% discount on our curated collection of educational eBooks",
        coin_cost: 25,
        availability: "Available",
        benefits: EBOOK_BENEFITS,
        validity_days: 15,
    },
    Reward {
        id: "ebook_discount_50",
        kind: "ebook_discount",
        name: "50% Discount on Educational eBooks",
        description: "Get 50% discount on our curated collection of educational eBooks",
        coin_cost: 50,
        availability: "Available",
        benefits: EBOOK_BENEFITS,
        validity_days: 15,
    },
    Reward {
        id: "library_extension_10",
        kind: "library_extension",
        name: "10-Day Library Extension",
        description: "Extend your digital library access by 10 additional days",
        coin_cost: 10,
        availability: "Available",
        benefits: LIBRARY_BENEFITS,
        validity_days: 7,
    },
    Reward {
        id: "library_extension_30",
        kind: "library_extension",
        name: "30-Day Library Extension",
        description: "Extend your digital library access by 30 additional days",
        coin_cost: 25,
        availability: "Available",
        benefits: LIBRARY_BENEFITS,
        validity_days: 7,
    },
    Reward {
        id: "course_access_premium",
        kind: "course_access",
        name: "Premium Course Access",
        description: "Get access to premium courses and advanced learning materials",
        coin_cost: 150,
        availability: "Limited",
        benefits: &["Premium content", "Advanced topics", "Certificate of completion"],
        validity_days: 90,
    },
    Reward {
        id: "priority_support",
        kind: "premium_features",
        name: "Priority Customer Support",
        description: "Get priority support for all your queries and issues",
        coin_cost: 75,
        availability: "Available",
        benefits: &["Faster response time", "Dedicated support", "Priority handling"],
        validity_days: 30,
    },
];

pub fn find_reward(id: &str) -> Option<&'static Reward> {
    REWARDS.iter().find(|reward| reward.id == id)
}

pub fn validity_days(redemption_type: &str) -> i64 {
    match redemption_type {
        "mentorship" => 30,
        "ebook_discount" => 15,
        "library_extension" => 7,
        "course_access" => 90,
        "premium_features" => 30,
        _ => 30,
    }
}

pub fn redemption_instructions(redemption_type: &str) -> &'static str {
    match redemption_type {
        "mentorship" => {
            "Contact our mentorship team with your redemption code to schedule your session."
        }
        "ebook_discount" => "Use this code at checkout when purchasing eBooks from our library.",
        "library_extension" => "Your library access has been automatically extended.",
        "course_access" => "Access to premium courses has been activated on your account.",
        "premium_features" => "Premium features have been activated on your account.",
        _ => "Contact support for assistance with your redemption.",
    }
}

/// `CN` followed by 12 uppercase hex characters.
pub fn generate_redemption_code() -> String {
    let bytes: [u8; 6] = rand::rng().random();
    format!("CN{}", hex::encode_upper(bytes))
}

#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub id: String,
    pub reward_id: String,
    pub redemption_type: String,
    pub item_name: String,
    pub coins_spent: i64,
    pub redemption_code: String,
    pub instructions: String,
    pub status: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemOutcome {
    pub redemption: Redemption,
    pub new_balance: i64,
}

pub async fn redeem(
    pool: &SqlitePool,
    user_id: &str,
    reward_id: &str,
) -> Result<RedeemOutcome, ServiceError> {
    let reward = find_reward(reward_id).ok_or_else(|| ServiceError::not_found("Reward not found"))?;

    let mut tx = pool.begin().await?;

    let current: Option<i64> = sqlx::query_scalar(r#"SELECT "total_coins" FROM "users" WHERE "id" = ?"#)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let current = current.ok_or_else(|| ServiceError::not_found("User not found"))?;
    if current < reward.coin_cost {
        return Err(ServiceError::bad_request(
            "Insufficient coins for this redemption",
        ));
    }

    let redemption_id = Uuid::new_v4().to_string();
    let ledger = apply(
        &mut tx,
        CoinEntry {
            user_id,
            kind: TransactionType::Spent,
            source: CoinSource::Redemption,
            amount: reward.coin_cost,
            reason: &format!("Redeemed: {}", reward.name),
            reference_id: Some(&redemption_id),
        },
    )
    .await?;

    let now = Utc::now();
    let redemption = Redemption {
        id: redemption_id,
        reward_id: reward.id.to_string(),
        redemption_type: reward.kind.to_string(),
        item_name: reward.name.to_string(),
        coins_spent: reward.coin_cost,
        redemption_code: generate_redemption_code(),
        instructions: redemption_instructions(reward.kind).to_string(),
        status: "active".to_string(),
        expires_at: iso_from(now + Duration::days(validity_days(reward.kind))),
        created_at: iso_from(now),
    };

    sqlx::query(
        r#"
        INSERT INTO "coin_redemptions"
          ("id", "user_id", "reward_id", "redemption_type", "item_name", "coins_spent",
           "redemption_code", "instructions", "status", "expires_at", "created_at")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&redemption.id)
    .bind(user_id)
    .bind(&redemption.reward_id)
    .bind(&redemption.redemption_type)
    .bind(&redemption.item_name)
    .bind(redemption.coins_spent)
    .bind(&redemption.redemption_code)
    .bind(&redemption.instructions)
    .bind(&redemption.status)
    .bind(&redemption.expires_at)
    .bind(&redemption.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id, reward_id, code = %redemption.redemption_code, "coins redeemed");

    Ok(RedeemOutcome {
        redemption,
        new_balance: ledger.balance_after,
    })
}

pub async fn redemptions(pool: &SqlitePool, user_id: &str) -> Result<Vec<Redemption>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM "coin_redemptions"
        WHERE "user_id" = ?
        ORDER BY "created_at" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(Redemption {
            id: row.try_get("id")?,
            reward_id: row.try_get("reward_id")?,
            redemption_type: row.try_get("redemption_type")?,
            item_name: row.try_get("item_name")?,
            coins_spent: row.try_get("coins_spent")?,
            redemption_code: row.try_get("redemption_code")?,
            instructions: row.try_get("instructions")?,
            status: row.try_get("status")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(items)
}

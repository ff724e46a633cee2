//! The migrated table.

use migrator_core::Entity;
use migrator_store::TableEntity;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// Per-resource interaction counters, one row per `(biz, biz_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interactive {
    pub id: i64,
    pub biz_id: i64,
    pub biz: String,
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
    /// Epoch milliseconds.
    pub utime: i64,
    /// Epoch milliseconds.
    pub ctime: i64,
}

impl Entity for Interactive {
    fn id(&self) -> i64 {
        self.id
    }

    fn utime(&self) -> i64 {
        self.utime
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl TableEntity for Interactive {
    const TABLE: &'static str = "interactives";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "biz_id",
        "biz",
        "read_cnt",
        "like_cnt",
        "collect_cnt",
        "utime",
        "ctime",
    ];

    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.id)
            .bind(self.biz_id)
            .bind(&self.biz)
            .bind(self.read_cnt)
            .bind(self.like_cnt)
            .bind(self.collect_cnt)
            .bind(self.utime)
            .bind(self.ctime)
    }
}

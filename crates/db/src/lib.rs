pub mod deployment;
pub mod domain_record;
pub mod project;

use std::error::Error;

use async_trait::async_trait;
pub use sea_orm::{
    sea_query, ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, Database,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, StatementBuilder,
    TransactionError, TransactionTrait, TryGetableMany,
};
pub use time::{OffsetDateTime, PrimitiveDateTime};

/// Current UTC time without an offset, as stored inside of the database.
pub fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub trait TransactionErrorExt<T, E> {
    /// Convert transaction [`Result`] into a [`Result`] with
    /// a custom error.
    fn into_raw_result(self) -> Result<T, E>;
}

impl<T, E> TransactionErrorExt<T, E> for Result<T, TransactionError<E>>
where
    E: Error + From<DbErr>,
{
    fn into_raw_result(self) -> Result<T, E> {
        match self {
            Ok(val) => Ok(val),
            Err(TransactionError::Connection(err)) => Err(err.into()),
            Err(TransactionError::Transaction(err)) => Err(err),
        }
    }
}

#[async_trait]
pub trait SelectExt {
    /// Check if at least one record that satisfies a query.
    async fn exists<C: ConnectionTrait + Send>(self, db: &C) -> Result<bool, DbErr>;
}

#[async_trait]
impl<T> SelectExt for T
where
    T: QueryTrait<QueryStatement = sea_query::SelectStatement> + Send,
{
    async fn exists<C: ConnectionTrait + Send>(self, db: &C) -> Result<bool, DbErr> {
        use sea_query::{Expr, Query};

        let mut query = self.into_query();

        // SQLite rejects EXISTS over a select without any expressions
        query.expr(1);

        let stmt = StatementBuilder::build(
            Query::select().expr(Expr::exists(query)),
            &db.get_database_backend(),
        );

        db.query_one(stmt)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(String::from("exists query returned no rows")))?
            .try_get_by_index(0)
    }
}

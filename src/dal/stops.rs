use anyhow::Error;
use sqlx::{Pool, Sqlite, query, query_as, query_scalar};
use tracing::{Instrument, info_span};

use crate::model::db_model::{StopDb, Upserted};

#[tracing::instrument(err, skip(pool))]
pub async fn get_stop(stop_id: i64, pool: &Pool<Sqlite>) -> Result<Option<StopDb>, Error> {
    let stop = query_as::<_, StopDb>(
        "SELECT stop_id, last_updated, name, latitude, longitude FROM stops WHERE stop_id = ?",
    )
    .bind(stop_id)
    .fetch_optional(pool)
    .await?;

    Ok(stop)
}

/// Returns whether a row was inserted. An already stored id is left untouched.
#[tracing::instrument(err, skip(pool))]
pub async fn insert_stop(stop: &StopDb, pool: &Pool<Sqlite>) -> Result<bool, Error> {
    let res = query(
        "INSERT OR IGNORE INTO stops (
            stop_id,
            last_updated,
            name,
            latitude,
            longitude
        ) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(stop.stop_id)
    .bind(&stop.last_updated)
    .bind(&stop.name)
    .bind(stop.latitude)
    .bind(stop.longitude)
    .execute(pool)
    .await?;

    Ok(res.rows_affected() == 1)
}

#[tracing::instrument(err, skip(pool))]
pub async fn update_stop(stop: &StopDb, pool: &Pool<Sqlite>) -> Result<(), Error> {
    query(
        "
UPDATE stops
SET last_updated = ?, name = ?, latitude = ?, longitude = ?
WHERE stop_id = ?
",
    )
    .bind(&stop.last_updated)
    .bind(&stop.name)
    .bind(stop.latitude)
    .bind(stop.longitude)
    .bind(stop.stop_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts the stop when its id is new, otherwise overwrites the stored row.
///
/// Each step is a single autocommit statement, never a read-then-write
/// transaction.
#[tracing::instrument(err, skip(pool))]
pub async fn upsert_stop(stop: &StopDb, pool: &Pool<Sqlite>) -> Result<Upserted, Error> {
    if insert_stop(stop, pool)
        .instrument(info_span!("Inserting stop"))
        .await?
    {
        return Ok(Upserted::Created);
    }

    update_stop(stop, pool)
        .instrument(info_span!("Refreshing stop"))
        .await?;

    Ok(Upserted::Refreshed)
}

/// Returns whether a row was deleted
#[tracing::instrument(err, skip(pool))]
pub async fn delete_stop(stop_id: i64, pool: &Pool<Sqlite>) -> Result<bool, Error> {
    let res = query("DELETE FROM stops WHERE stop_id = ?")
        .bind(stop_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[tracing::instrument(err, skip(pool))]
pub async fn count_distinct_stops(pool: &Pool<Sqlite>) -> Result<i64, Error> {
    let count: i64 = query_scalar("SELECT COUNT(DISTINCT stop_id) FROM stops")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Returns the closest stored ids below and above `stop_id`
#[tracing::instrument(err, skip(pool))]
pub async fn get_neighbours(
    stop_id: i64,
    pool: &Pool<Sqlite>,
) -> Result<(Option<i64>, Option<i64>), Error> {
    let prev: Option<i64> = query_scalar(
        "SELECT stop_id FROM stops WHERE stop_id < ? ORDER BY stop_id DESC LIMIT 1",
    )
    .bind(stop_id)
    .fetch_optional(pool)
    .await?;

    let next: Option<i64> = query_scalar(
        "SELECT stop_id FROM stops WHERE stop_id > ? ORDER BY stop_id ASC LIMIT 1",
    )
    .bind(stop_id)
    .fetch_optional(pool)
    .await?;

    Ok((prev, next))
}

/// Picks two different stored stops at random. `None` when fewer than two stops are stored.
#[tracing::instrument(err, skip(pool))]
pub async fn sample_two_distinct_stops(
    pool: &Pool<Sqlite>,
) -> Result<Option<(StopDb, StopDb)>, Error> {
    let mut stops = query_as::<_, StopDb>(
        "SELECT stop_id, last_updated, name, latitude, longitude FROM stops ORDER BY RANDOM() LIMIT 2",
    )
    .fetch_all(pool)
    .await?;

    let (Some(second), Some(first)) = (stops.pop(), stops.pop()) else {
        return Ok(None);
    };

    Ok(Some((first, second)))
}

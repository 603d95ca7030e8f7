use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::db::helpers::{format_timestamp, parse_timestamp, to_i32, to_i64};
use crate::models::{Proximity, SignalSample};

fn row_to_sample(row: &Row) -> Result<SignalSample> {
    let timestamp: String = row.get("timestamp")?;
    let proximity: i64 = row.get("proximity")?;
    let rssi: i64 = row.get("rssi")?;

    Ok(SignalSample {
        timestamp: parse_timestamp(&timestamp, "timestamp")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        coordinate_accuracy: row.get("coordinate_accuracy")?,
        proximity: Proximity::from_raw(proximity)?,
        beacon_accuracy: row.get("beacon_accuracy")?,
        rssi: to_i32(rssi, "rssi")?,
        speed: row.get("speed")?,
        course: row.get("course")?,
    })
}

pub fn insert_sample(conn: &Connection, sample: &SignalSample) -> Result<()> {
    conn.execute(
        "INSERT INTO signal_samples (
            timestamp,
            latitude,
            longitude,
            coordinate_accuracy,
            proximity,
            beacon_accuracy,
            rssi,
            speed,
            course
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            format_timestamp(&sample.timestamp),
            sample.latitude,
            sample.longitude,
            sample.coordinate_accuracy,
            sample.proximity.as_raw(),
            sample.beacon_accuracy,
            i64::from(sample.rssi),
            sample.speed,
            sample.course,
        ],
    )
    .context("failed to insert signal sample")?;
    Ok(())
}

/// Most recent first. Ties on timestamp fall back to insertion order.
pub fn select_recent_samples(conn: &Connection, limit: Option<usize>) -> Result<Vec<SignalSample>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = match limit {
        Some(limit) => to_i64(limit)?,
        None => -1,
    };

    let mut stmt = conn.prepare_cached(
        "SELECT
            timestamp,
            latitude,
            longitude,
            coordinate_accuracy,
            proximity,
            beacon_accuracy,
            rssi,
            speed,
            course
        FROM signal_samples
        ORDER BY timestamp DESC, id DESC
        LIMIT ?1",
    )?;

    let mut rows = stmt.query(params![limit])?;
    let mut samples = Vec::new();
    while let Some(row) = rows.next()? {
        samples.push(row_to_sample(row)?);
    }

    Ok(samples)
}

pub fn count_samples(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM signal_samples", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

pub fn delete_all_samples(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM signal_samples", [])
        .context("failed to delete signal samples")?;
    Ok(())
}

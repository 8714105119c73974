//! Entry reads and writes within a named store.
//!
//! Matching follows platform cache semantics: only `GET` requests match,
//! and a response stored with `Vary` only matches requests whose varying
//! header values equal the ones recorded at write time.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::request::{AssetRequest, CapturedResponse, Headers, ResponseType};
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Listing row for a stored entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub size: usize,
    pub stored_at: String,
}

/// Header values recorded for `Vary` matching; `None` means the header was absent.
type VaryRecord = BTreeMap<String, Option<String>>;

/// A request/response pair ready to be written.
struct NewEntry {
    key_hash: String,
    method: String,
    url: String,
    final_url: String,
    status: u16,
    response_type: String,
    headers_json: String,
    vary_json: Option<String>,
    body: Vec<u8>,
}

impl NewEntry {
    fn build(request: &AssetRequest, response: &CapturedResponse) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!(
                "only GET requests can be stored, got {}",
                request.method
            )));
        }

        let vary_names = response.vary_names();
        if vary_names.iter().any(|name| name == "*") {
            return Err(Error::InvalidInput(format!("{} varies on *; it can never be matched", request.url)));
        }
        let vary_json = if vary_names.is_empty() {
            None
        } else {
            let record: VaryRecord = vary_names
                .into_iter()
                .map(|name| {
                    let value = request.header(&name).map(str::to_string);
                    (name, value)
                })
                .collect();
            Some(serde_json::to_string(&record)?)
        };

        Ok(Self {
            key_hash: compute_request_key(&request.method, request.url.as_str()),
            method: request.method.clone(),
            url: request.url.to_string(),
            final_url: response.url.to_string(),
            status: response.status,
            response_type: response.response_type.to_string(),
            headers_json: serde_json::to_string(&response.headers)?,
            vary_json,
            body: response.body.to_vec(),
        })
    }

    fn write(&self, conn: &rusqlite::Connection, store: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO entries (
                store, key_hash, method, url, final_url, status,
                response_type, headers_json, vary_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(store, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                final_url = excluded.final_url,
                status = excluded.status,
                response_type = excluded.response_type,
                headers_json = excluded.headers_json,
                vary_json = excluded.vary_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                store,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.final_url,
                self.status as i64,
                &self.response_type,
                &self.headers_json,
                &self.vary_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

/// Raw row as read back from `entries`.
struct StoredRow {
    final_url: String,
    status: i64,
    response_type: String,
    headers_json: String,
    vary_json: Option<String>,
    body: Vec<u8>,
}

impl StoredRow {
    fn vary_matches(&self, request: &AssetRequest) -> Result<bool, Error> {
        let Some(json) = &self.vary_json else {
            return Ok(true);
        };
        let record: VaryRecord = serde_json::from_str(json)?;
        Ok(record
            .iter()
            .all(|(name, value)| request.header(name) == value.as_deref()))
    }

    fn into_response(self) -> Result<CapturedResponse, Error> {
        let url = Url::parse(&self.final_url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let status = u16::try_from(self.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers: Headers = serde_json::from_str(&self.headers_json)?;
        Ok(CapturedResponse {
            url,
            status,
            response_type: self.response_type.parse()?,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

fn ensure_store(conn: &rusqlite::Connection, store: &str) -> Result<(), Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
        params![store],
        |row| row.get(0),
    )?;
    if exists { Ok(()) } else { Err(Error::StoreNotFound(store.to_string())) }
}

impl CacheDb {
    /// Find the stored response for `request` in the named store.
    ///
    /// Returns None for non-GET requests, unknown stores, missing keys and
    /// `Vary` mismatches.
    pub async fn match_entry(&self, store: &str, request: &AssetRequest) -> Result<Option<CapturedResponse>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let store = store.to_string();
        let key_hash = compute_request_key(&request.method, request.url.as_str());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT final_url, status, response_type, headers_json, vary_json, body
                    FROM entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, key_hash], |row| {
                    Ok(StoredRow {
                        final_url: row.get(0)?,
                        status: row.get(1)?,
                        response_type: row.get(2)?,
                        headers_json: row.get(3)?,
                        vary_json: row.get(4)?,
                        body: row.get(5)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        match row {
            Some(row) if row.vary_matches(request)? => row.into_response().map(Some),
            _ => Ok(None),
        }
    }

    /// Insert or replace the entry for `request` in an existing store.
    pub async fn put_entry(&self, store: &str, request: &AssetRequest, response: &CapturedResponse) -> Result<(), Error> {
        let entry = NewEntry::build(request, response)?;
        let store = store.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_store(conn, &store)?;
                entry.write(conn, &store, &stored_at)
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in one transaction: all of them or none.
    pub async fn put_entries(&self, store: &str, batch: &[(AssetRequest, CapturedResponse)]) -> Result<usize, Error> {
        let entries = batch
            .iter()
            .map(|(request, response)| NewEntry::build(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let store = store.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                for entry in &entries {
                    entry.write(&tx, &store, &stored_at)?;
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of the named store, ordered by URL.
    pub async fn list_entries(&self, store: &str) -> Result<Vec<EntrySummary>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                ensure_store(conn, &store)?;
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, response_type, length(body), stored_at
                    FROM entries WHERE store = ?1 ORDER BY url",
                )?;
                let rows = stmt
                    .query_map(params![store], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(method, url, status, response_type, size, stored_at)| -> Result<EntrySummary, Error> {
                        Ok(EntrySummary {
                            method,
                            url,
                            status: u16::try_from(status).map_err(|e| Error::CorruptEntry(e.to_string()))?,
                            response_type: response_type.parse()?,
                            size: size.max(0) as usize,
                            stored_at,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }
}

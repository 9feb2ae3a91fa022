//! Fakes shared by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use civicfeed_core::GeoPoint;

use crate::address::normalize_query;
use crate::error::{FetchError, GeocodeError};
use crate::fetch::{HttpGet, HttpResponse};
use crate::geocode::GeocodeProvider;
use crate::types::{GeocodeQuery, GeocodeResult};

/// Provider answering from a fixed table and recording every lookup.
///
/// Lookups complete immediately unless a delay is configured, in which case
/// they sleep and the number of lookups in flight is tracked.
pub(crate) struct FakeProvider {
    answers: HashMap<GeocodeQuery, GeoPoint>,
    delays: HashMap<GeocodeQuery, Duration>,
    default_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    credentials: bool,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self {
            answers: HashMap::new(),
            delays: HashMap::new(),
            default_delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            credentials: true,
        }
    }

    pub(crate) fn answer(mut self, address: &str, lat: f64, lon: f64) -> Self {
        self.answers
            .insert(normalize_query(address), GeoPoint { lat, lon });
        self
    }

    /// Make lookups of `address` take `delay`.
    pub(crate) fn delay(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_query(address), delay);
        self
    }

    /// Make every lookup without its own delay take `delay`.
    pub(crate) fn delay_all(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Highest number of lookups that were running at the same time.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl GeocodeProvider for FakeProvider {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<GeocodeResult, GeocodeError> {
        self.calls.lock().unwrap().push(query.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(query).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !self.credentials {
            return Err(GeocodeError::MissingApiKey);
        }
        self.answers
            .get(query)
            .map(|p| GeocodeResult {
                lat: p.lat,
                lon: p.lon,
                formatted: format!("{query} (fake)"),
            })
            .ok_or_else(|| GeocodeError::NoResult {
                query: query.to_string(),
            })
    }
}

/// Fetcher serving one canned response and recording requested URLs.
pub(crate) struct FakeFetcher {
    status: u16,
    body: Vec<u8>,
    requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl FakeFetcher {
    pub(crate) fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpGet for FakeFetcher {
    async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

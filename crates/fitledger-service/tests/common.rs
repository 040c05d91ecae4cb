//! Common test utilities for fitledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;

use fitledger_engine::{Engine, EngineConfig};
use fitledger_service::{create_router, AppState, ServiceConfig};
use fitledger_store::MemoryStore;

/// A settable clock standing in for wall time.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock_clock() = now;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().expect("clock mutex")
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Clock driving the engine's notion of "today".
    pub clock: Arc<MutableClock>,
    /// A test user ID.
    pub test_user_id: i64,
    /// The service API key for `/v1` requests.
    pub service_api_key: String,
    /// The admin API key for `/v1/admin` requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a harness with a fresh store, frozen at noon on 2024-03-01
    /// (a Friday).
    pub fn new() -> Self {
        Self::at(noon(2024, 3, 1))
    }

    /// Create a harness with a fresh store, frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            engine: EngineConfig::default(),
        };

        let clock = Arc::new(MutableClock::new(now));
        let engine = Engine::with_clock(
            Arc::new(MemoryStore::new()),
            config.engine.clone(),
            clock.clone(),
        );
        let state = AppState::with_engine(engine, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            clock,
            test_user_id: 42,
            service_api_key,
            admin_api_key,
        }
    }

    /// A `GET` carrying the service API key.
    pub fn get(&self, path: &str) -> TestRequest {
        self.with_service_key(self.server.get(path))
    }

    /// A `POST` carrying the service API key.
    pub fn post(&self, path: &str) -> TestRequest {
        self.with_service_key(self.server.post(path))
    }

    /// A `PUT` carrying the service API key.
    pub fn put(&self, path: &str) -> TestRequest {
        self.with_service_key(self.server.put(path))
    }

    /// A `DELETE` carrying the service API key.
    pub fn delete(&self, path: &str) -> TestRequest {
        self.with_service_key(self.server.delete(path))
    }

    /// A `PUT` carrying the admin API key.
    pub fn admin_put(&self, path: &str) -> TestRequest {
        self.server
            .put(path)
            .add_header(header("x-admin-key"), value(&self.admin_api_key))
    }

    /// A `GET` carrying the admin API key.
    pub fn admin_get(&self, path: &str) -> TestRequest {
        self.server
            .get(path)
            .add_header(header("x-admin-key"), value(&self.admin_api_key))
    }

    fn with_service_key(&self, request: TestRequest) -> TestRequest {
        request
            .add_header(header("x-api-key"), value(&self.service_api_key))
            .add_header(header("x-service-name"), value("app-backend"))
    }

    /// Move the engine clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.clock.set(now);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A header name.
pub fn header(name: &'static str) -> HeaderName {
    HeaderName::from_static(name)
}

/// A header value.
pub fn value(raw: &str) -> HeaderValue {
    HeaderValue::from_str(raw).expect("valid header value")
}

/// Noon UTC on a calendar day.
pub fn noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, day).expect("valid date");
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).expect("valid time"))
}

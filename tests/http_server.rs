// Integration test root for http_server tests.
// Submodules live under `tests/http_server/` directory.

#[path = "http_server/helpers.rs"]
mod helpers;

#[path = "http_server/health.rs"]
mod health;

#[path = "http_server/status.rs"]
mod status;

#[path = "http_server/signals.rs"]
mod signals;

#[path = "http_server/feed.rs"]
mod feed;

#[path = "http_server/deliveries.rs"]
mod deliveries;

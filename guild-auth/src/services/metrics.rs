//! Domain counters, exported through the Prometheus recorder installed at startup.

use metrics::counter;

pub fn record_login(outcome: &'static str) {
    counter!("guild_auth_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_token_exchange(outcome: &'static str) {
    counter!("guild_auth_token_exchanges_total", "outcome" => outcome).increment(1);
}

pub fn record_reaped(kind: &'static str, rows: u64) {
    counter!("guild_auth_reaped_rows_total", "kind" => kind).increment(rows);
}

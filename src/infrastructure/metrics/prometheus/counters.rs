use metrics::counter;

/// Count a finished passkey ceremony by kind and outcome.
pub fn increment_ceremony(ceremony: &'static str, outcome: &'static str) {
    counter!("passkey_ceremonies_total", "ceremony" => ceremony, "outcome" => outcome).increment(1);
}

/// Count a rejected, non-increasing sign counter.
pub fn increment_counter_regression() {
    counter!("passkey_counter_regressions_total").increment(1);
}

/// Count a session lifecycle event.
pub fn increment_session_event(event: &'static str) {
    counter!("session_events_total", "event" => event).increment(1);
}

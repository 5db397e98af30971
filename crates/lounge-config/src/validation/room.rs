//! Validation for room, retry, and token sections.

use crate::schema::LoungeConfig;

use super::helpers::validate_range;

pub(crate) fn validate_room(errors: &mut Vec<String>, config: &LoungeConfig) {
    let room = &config.room;
    if room.default_title.trim().is_empty() {
        errors.push("room.default_title must not be empty".into());
    }
    validate_range(errors, "room.remote_reaction_ms", room.remote_reaction_ms, 250, 60_000);
    validate_range(errors, "room.local_reaction_ms", room.local_reaction_ms, 250, 60_000);
    validate_range(errors, "room.speaking_tick_ms", room.speaking_tick_ms, 50, 5_000);
    validate_range(errors, "room.join_timeout_secs", room.join_timeout_secs, 1, 120);
}

pub(crate) fn validate_retry(errors: &mut Vec<String>, config: &LoungeConfig) {
    let retry = &config.retry;
    validate_range(errors, "retry.max_attempts", u64::from(retry.max_attempts), 1, 10);
    validate_range(errors, "retry.base_backoff_ms", retry.base_backoff_ms, 0, 60_000);
    if retry.max_backoff_ms < retry.base_backoff_ms {
        errors.push(format!(
            "retry.max_backoff_ms = {} is below retry.base_backoff_ms = {}",
            retry.max_backoff_ms, retry.base_backoff_ms
        ));
    }
}

pub(crate) fn validate_token(errors: &mut Vec<String>, config: &LoungeConfig) {
    validate_range(errors, "token.ttl_secs", config.token.ttl_secs, 60, 86_400);
}

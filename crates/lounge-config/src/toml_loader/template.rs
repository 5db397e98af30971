//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Lounge Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[backend]
# url = "https://api.shemeansbusiness.app"
# timeout_secs = 10        # 1-120

[room]
# default_title = "Queen's Lounge"
# remote_reaction_ms = 3000  # 250-60000
# local_reaction_ms = 2000   # 250-60000
# speaking_tick_ms = 300     # 50-5000
# join_timeout_secs = 15     # 1-120

[retry]
# max_attempts = 3           # 1-10
# base_backoff_ms = 500      # 0-60000
# max_backoff_ms = 8000      # >= base_backoff_ms

[token]
# source = "static"          # static, backend
# static_token = "your-real-token"
# ttl_secs = 3600            # 60-86400

[realtime]
# url = "wss://<project>.supabase.co/realtime/v1/websocket"
# api_key = ""
# heartbeat_interval = 25    # 5-120
# reconnect_delay = 1
# max_reconnect_delay = 30

[server]
# port = 4242
# provider_url = "https://api.huddle01.com/api/v1"
# provider_api_key = ""      # or LOUNGE_PROVIDER_API_KEY
# token_secret = ""          # or LOUNGE_TOKEN_SECRET
# room_type = "audio"        # audio, video

[logging]
# level = "info"             # trace, debug, info, warn, error
"##
    .to_string()
}

use webrtc::ice::mdns::MulticastDnsMode;

/// Environment variable selecting how ICE uses multicast DNS
pub const MDNS_MODE_ENV: &str = "RC_TELEOP_WEBRTC_MDNS_MODE";

pub fn parse_mdns_mode(raw: &str) -> Option<MulticastDnsMode> {
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "disabled" | "off" | "false" | "0" => Some(MulticastDnsMode::Disabled),
        "query" | "query_only" | "query-only" => Some(MulticastDnsMode::QueryOnly),
        "gather" | "query_and_gather" | "query-and-gather" | "on" | "true" | "1" => {
            Some(MulticastDnsMode::QueryAndGather)
        }
        _ => None,
    }
}

pub fn mdns_mode_from_env() -> Option<MulticastDnsMode> {
    let raw = std::env::var(MDNS_MODE_ENV).ok()?;
    parse_mdns_mode(&raw)
}

pub fn mdns_mode() -> MulticastDnsMode {
    // Resolve remote .local candidates without publishing our own
    mdns_mode_from_env().unwrap_or(MulticastDnsMode::QueryOnly)
}

pub fn mdns_mode_label(mode: MulticastDnsMode) -> &'static str {
    match mode {
        MulticastDnsMode::Disabled => "disabled",
        MulticastDnsMode::QueryOnly => "query_only",
        MulticastDnsMode::QueryAndGather => "query_and_gather",
    }
}

pub fn mdns_host_name(session_id: &str) -> String {
    format!("teleop-{session_id}.local")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mdns_mode() {
        assert_eq!(parse_mdns_mode("off"), Some(MulticastDnsMode::Disabled));
        assert_eq!(parse_mdns_mode(" Query "), Some(MulticastDnsMode::QueryOnly));
        assert_eq!(
            parse_mdns_mode("gather"),
            Some(MulticastDnsMode::QueryAndGather)
        );
        assert_eq!(parse_mdns_mode(""), None);
        assert_eq!(parse_mdns_mode("loud"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(mdns_mode_label(MulticastDnsMode::QueryOnly), "query_only");
        assert_eq!(mdns_host_name("abc"), "teleop-abc.local");
    }
}

use log::Level;

/// Log target for route decisions and surface binding.
pub const ROUTING_LOG_TARGET: &str = "player_routing";

/// Diagnostics are on when built in, or when routing logs are requested at debug level.
pub fn should_enable(build_flag_enabled: bool, routing_loggable: bool) -> bool {
    build_flag_enabled || routing_loggable
}

pub fn diagnostics_enabled() -> bool {
    should_enable(
        cfg!(feature = "playback-diagnostics"),
        log::log_enabled!(target: ROUTING_LOG_TARGET, Level::Debug),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_enable() {
        assert!(!should_enable(false, false));
        assert!(should_enable(true, false));
        assert!(should_enable(false, true));
        assert!(should_enable(true, true));
    }
}

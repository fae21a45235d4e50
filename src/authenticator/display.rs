//! Human-readable names for the platform authenticator, for UI copy only.

const FALLBACK: &str = "Biometric Authentication";

/// Guess the authenticator's name from a browser user-agent string.
pub fn display_name_for_user_agent(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();

    if ua.contains("iphone") || ua.contains("ipad") {
        return "Face ID or Touch ID";
    }
    if ua.contains("mac") {
        return "Touch ID";
    }
    if ua.contains("android") {
        return "Fingerprint or Face Unlock";
    }
    if ua.contains("windows") {
        return "Windows Hello";
    }
    FALLBACK
}

/// Name for the platform this binary was compiled for.
pub fn native_display_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "Windows Hello";

    #[cfg(target_os = "macos")]
    return "Touch ID";

    #[cfg(target_os = "ios")]
    return "Face ID or Touch ID";

    #[cfg(target_os = "android")]
    return "Fingerprint or Face Unlock";

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "ios",
        target_os = "android"
    )))]
    return FALLBACK;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ios_devices_map_to_face_or_touch_id() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(display_name_for_user_agent(ua), "Face ID or Touch ID");
        let ua = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)";
        assert_eq!(display_name_for_user_agent(ua), "Face ID or Touch ID");
    }

    #[test]
    fn desktop_platforms() {
        assert_eq!(
            display_name_for_user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"),
            "Touch ID"
        );
        assert_eq!(
            display_name_for_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            "Windows Hello"
        );
    }

    #[test]
    fn android_and_unknown() {
        assert_eq!(
            display_name_for_user_agent("Mozilla/5.0 (Linux; Android 14)"),
            "Fingerprint or Face Unlock"
        );
        assert_eq!(
            display_name_for_user_agent("curl/8.0"),
            "Biometric Authentication"
        );
    }
}

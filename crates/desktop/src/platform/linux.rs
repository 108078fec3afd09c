/// GNOME-style desktops expose the preference through gsettings. Anything
/// else (no gsettings, no schema) is treated as dark.
pub fn is_dark_mode() -> bool {
    std::process::Command::new("gsettings")
        .args(["get", "org.gnome.desktop.interface", "color-scheme"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| parse_color_scheme(&String::from_utf8_lossy(&o.stdout)))
        .unwrap_or(true)
}

fn parse_color_scheme(value: &str) -> bool {
    let value = value.trim().trim_matches('\'');
    value != "prefer-light" && value != "default"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_scheme() {
        assert!(parse_color_scheme("'prefer-dark'\n"));
        assert!(!parse_color_scheme("'prefer-light'\n"));
        assert!(!parse_color_scheme("'default'"));
    }
}

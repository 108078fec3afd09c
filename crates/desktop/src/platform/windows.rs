pub fn is_dark_mode() -> bool {
    // HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize
    // AppsUseLightTheme: DWORD 0 = dark, 1 = light
    std::process::Command::new("reg")
        .args([
            "query",
            r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize",
            "/v",
            "AppsUseLightTheme",
        ])
        .output()
        .map(|o| apps_use_dark_theme(&String::from_utf8_lossy(&o.stdout)))
        .unwrap_or(true)
}

fn apps_use_dark_theme(reg_output: &str) -> bool {
    reg_output
        .lines()
        .find(|line| line.contains("AppsUseLightTheme"))
        .and_then(|line| line.split_whitespace().last())
        .map(|value| value == "0x0")
        .unwrap_or(true)
}

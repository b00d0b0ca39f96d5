#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// `--json` wins over `--format`, which wins over the config default.
    pub fn resolve(json_flag: bool, format: Option<&str>, config_default: &str) -> Self {
        if json_flag {
            return Self::Json;
        }
        match format.unwrap_or(config_default) {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
}

/// Decide whether to emit ANSI colors from the `--no-color` flag and the
/// config `color` setting (auto|always|never).
pub fn detect_color(color_flag: bool, setting: &str) -> bool {
    if !color_flag {
        return false;
    }
    match setting {
        "always" => true,
        "never" => false,
        _ => std::env::var("NO_COLOR").is_err() && atty_stdout(),
    }
}

fn atty_stdout() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_overrides_format() {
        assert_eq!(OutputFormat::resolve(true, Some("text"), "text"), OutputFormat::Json);
    }

    #[test]
    fn format_flag_overrides_config() {
        assert_eq!(OutputFormat::resolve(false, Some("json"), "text"), OutputFormat::Json);
        assert_eq!(OutputFormat::resolve(false, Some("text"), "json"), OutputFormat::Text);
    }

    #[test]
    fn config_default_applies_without_flags() {
        assert_eq!(OutputFormat::resolve(false, None, "json"), OutputFormat::Json);
        assert_eq!(OutputFormat::resolve(false, None, "text"), OutputFormat::Text);
    }

    #[test]
    fn no_color_flag_disables_color() {
        assert!(!detect_color(false, "always"));
    }

    #[test]
    fn color_setting_always_and_never() {
        assert!(detect_color(true, "always"));
        assert!(!detect_color(true, "never"));
    }
}

/// Escape a value (usually a file path) for use as a filter option inside a
/// filtergraph string.
///
/// FFmpeg parses option values and the surrounding graph separately, so the
/// value is escaped twice: once for `\ ' :` and once for `\ ' [ ] , ;`.
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_unchanged() {
        assert_eq!(escape_filter_value("/tmp/vmaf_log.json"), "/tmp/vmaf_log.json");
    }

    #[test]
    fn test_colon_and_comma_escaped() {
        assert_eq!(escape_filter_value("/m/a:b,c.mp4"), r"/m/a\\:b\,c.mp4");
    }

    #[test]
    fn test_quote_escaped_twice() {
        assert_eq!(escape_filter_value("it's.mkv"), r"it\\\'s.mkv");
    }
}

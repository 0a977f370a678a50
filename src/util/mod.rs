use serenity::model::prelude::{ChannelId, UserId};

/// Text progress bar of `length` cells for a 0..=100 percentage.
pub(crate) fn progress_bar(percent: f64, length: usize) -> String {
    let filled = ((percent / 100.0) * length as f64) as usize;
    let filled = filled.min(length);
    format!("{}{}", "█".repeat(filled), "□".repeat(length - filled))
}

/// `H:MM:SS` rendering of a second count, for the AFK welcome-back notice.
pub(crate) fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Accepts a raw ID or a `<@123>` / `<@!123>` mention.
pub(crate) fn parse_user_arg(arg: &str) -> Option<UserId> {
    let inner = arg
        .strip_prefix("<@!")
        .or_else(|| arg.strip_prefix("<@"))
        .map_or(arg, |rest| rest.trim_end_matches('>'));
    inner.parse::<u64>().ok().map(UserId)
}

/// Accepts a raw ID or a `<#123>` channel mention.
pub(crate) fn parse_channel_arg(arg: &str) -> Option<ChannelId> {
    let inner = arg
        .strip_prefix("<#")
        .map_or(arg, |rest| rest.trim_end_matches('>'));
    inner.parse::<u64>().ok().map(ChannelId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 10), "□□□□□□□□□□");
        assert_eq!(progress_bar(50.0, 10), "█████□□□□□");
        assert_eq!(progress_bar(100.0, 10), "██████████");
        assert_eq!(progress_bar(250.0, 10), "██████████");
    }

    #[test]
    fn durations_render_as_clock() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(75), "0:01:15");
        assert_eq!(format_duration(3 * 3600 + 12 * 60 + 5), "3:12:05");
        assert_eq!(format_duration(-4), "0:00:00");
    }

    #[test]
    fn user_args_parse_mentions_and_ids() {
        assert_eq!(parse_user_arg("123"), Some(UserId(123)));
        assert_eq!(parse_user_arg("<@123>"), Some(UserId(123)));
        assert_eq!(parse_user_arg("<@!123>"), Some(UserId(123)));
        assert_eq!(parse_user_arg("bogus"), None);
    }

    #[test]
    fn channel_args_parse_mentions_and_ids() {
        assert_eq!(parse_channel_arg("<#42>"), Some(ChannelId(42)));
        assert_eq!(parse_channel_arg("42"), Some(ChannelId(42)));
        assert_eq!(parse_channel_arg("<#x>"), None);
    }
}

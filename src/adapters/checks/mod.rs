//! Preflight check adapters

mod active_proposal;
mod timeout;

pub use active_proposal::ActiveProposalCheck;
pub use timeout::TimeoutCheck;

/// Format seconds into a short human-readable duration for check messages.
pub(crate) fn format_time_remaining(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::format_time_remaining;

    #[test]
    fn test_format_time_remaining() {
        assert_eq!(format_time_remaining(30), "30s");
        assert_eq!(format_time_remaining(135), "2m 15s");
        assert_eq!(format_time_remaining(8100), "2h 15m");
    }
}

// Human readable expiry of tokens and credentials
use chrono::{DateTime, Utc};

pub fn format_time_remaining(expires_at: &DateTime<Utc>) -> String {
    format_remaining_at(expires_at, &Utc::now())
}

fn format_remaining_at(expires_at: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    if expires_at <= now {
        return "EXPIRED".to_string();
    }

    let duration = (*expires_at - *now).num_seconds();
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn is_expiring_soon(expires_at: &DateTime<Utc>, threshold_minutes: i64) -> bool {
    let duration = (*expires_at - Utc::now()).num_minutes();
    duration > 0 && duration < threshold_minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_time_remaining() {
        let now = Utc::now();
        assert_eq!(
            format_remaining_at(&(now + Duration::seconds(7_530)), &now),
            "2h 5m"
        );
        assert_eq!(
            format_remaining_at(&(now + Duration::seconds(125)), &now),
            "2m 5s"
        );
        assert_eq!(format_remaining_at(&(now + Duration::seconds(9)), &now), "9s");
        assert_eq!(format_remaining_at(&now, &now), "EXPIRED");
    }

    #[test]
    fn test_is_expiring_soon() {
        assert!(is_expiring_soon(&(Utc::now() + Duration::minutes(10)), 15));
        assert!(!is_expiring_soon(&(Utc::now() + Duration::hours(2)), 15));
        assert!(!is_expiring_soon(&(Utc::now() - Duration::minutes(1)), 15));
    }
}

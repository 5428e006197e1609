// IAM role ARN helpers
use crate::error::{Result, SsoError};

const MAX_ACCOUNT_ID: u64 = 999_999_999_999;

/// Normalize an AWS account id to its 12 digit form
pub fn normalize_account_id(account_id: &str) -> Result<String> {
    let trimmed = account_id.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(SsoError::InvalidAccountId(account_id.to_string()));
    }

    let id: u64 = trimmed
        .parse()
        .map_err(|_| SsoError::InvalidAccountId(account_id.to_string()))?;

    if id > MAX_ACCOUNT_ID {
        return Err(SsoError::InvalidAccountId(account_id.to_string()));
    }

    Ok(format!("{:012}", id))
}

/// Build `arn:aws:iam::<account>:role/<name>`
pub fn make_role_arn(account_id: &str, role_name: &str) -> Result<String> {
    let account_id = normalize_account_id(account_id)?;
    Ok(format!("arn:aws:iam::{}:role/{}", account_id, role_name))
}

/// Split a role ARN (or the short `<account>:<role>` form) into account id and role name
pub fn parse_role_arn(arn: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = arn.split(':').collect();

    let (account_id, role_name) = match parts.as_slice() {
        [account_id, role_name] => (*account_id, *role_name),
        ["arn", _partition, "iam", "", account_id, resource] => {
            let role_name = resource
                .strip_prefix("role/")
                .filter(|name| !name.is_empty() && !name.contains('/'))
                .ok_or_else(|| SsoError::InvalidArn(arn.to_string()))?;
            (*account_id, role_name)
        }
        _ => return Err(SsoError::InvalidArn(arn.to_string())),
    };

    if role_name.is_empty() {
        return Err(SsoError::InvalidArn(arn.to_string()));
    }

    let account_id =
        normalize_account_id(account_id).map_err(|_| SsoError::InvalidArn(arn.to_string()))?;

    Ok((account_id, role_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_account_id_pads() {
        assert_eq!(normalize_account_id("1").unwrap(), "000000000001");
        assert_eq!(
            normalize_account_id("123456789012").unwrap(),
            "123456789012"
        );
    }

    #[test]
    fn test_normalize_account_id_rejects_garbage() {
        assert!(normalize_account_id("").is_err());
        assert!(normalize_account_id("-1").is_err());
        assert!(normalize_account_id("12ab").is_err());
        assert!(normalize_account_id("1234567890123").is_err());
    }

    #[test]
    fn test_make_role_arn() {
        assert_eq!(
            make_role_arn("1", "Admin").unwrap(),
            "arn:aws:iam::000000000001:role/Admin"
        );
    }

    #[test]
    fn test_parse_role_arn_full_and_short() {
        let (account, role) = parse_role_arn("arn:aws:iam::000000000001:role/A").unwrap();
        assert_eq!(account, "000000000001");
        assert_eq!(role, "A");

        let (account, role) = parse_role_arn("123456789012:Developer").unwrap();
        assert_eq!(account, "123456789012");
        assert_eq!(role, "Developer");
    }

    #[test]
    fn test_parse_role_arn_invalid() {
        assert!(parse_role_arn("arn:aws:iam::000000000001:user/bob").is_err());
        assert!(parse_role_arn("arn:aws:iam::000000000001:role/").is_err());
        assert!(parse_role_arn("not-an-arn").is_err());
        assert!(parse_role_arn("abc:Role").is_err());
    }
}

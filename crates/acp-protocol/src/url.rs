//! `parse_group_url` (spec §4.12): split a group URL into its target AID
//! (the host) and group id (the first non-empty path segment).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUrl {
    pub target_aid: String,
    pub group_id: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GroupUrlError {
    #[error("missing host component")]
    MissingHost,
    #[error("missing group id path segment")]
    MissingGroupId,
}

pub fn parse_group_url(url: &str) -> Result<GroupUrl, GroupUrlError> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (host, path) = without_scheme.split_once('/').unwrap_or((without_scheme, ""));

    if host.is_empty() {
        return Err(GroupUrlError::MissingHost);
    }
    let group_id = path
        .split('/')
        .find(|segment| !segment.is_empty())
        .ok_or(GroupUrlError::MissingGroupId)?;

    Ok(GroupUrl { target_aid: host.to_string(), group_id: group_id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_group_url() {
        let parsed = parse_group_url("acp://group.aid.pub/g-123/extra").unwrap();
        assert_eq!(parsed.target_aid, "group.aid.pub");
        assert_eq!(parsed.group_id, "g-123");
    }

    #[test]
    fn parses_without_a_scheme() {
        let parsed = parse_group_url("group.aid.pub/g-123").unwrap();
        assert_eq!(parsed.target_aid, "group.aid.pub");
        assert_eq!(parsed.group_id, "g-123");
    }

    #[test]
    fn rejects_missing_group_id() {
        assert_eq!(parse_group_url("acp://group.aid.pub/"), Err(GroupUrlError::MissingGroupId));
        assert_eq!(parse_group_url("acp://group.aid.pub"), Err(GroupUrlError::MissingGroupId));
    }
}

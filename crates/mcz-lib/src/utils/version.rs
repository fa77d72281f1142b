/// Leading `major.minor` of a release id such as "1.16.5" or "1.12.2-pre1".
/// Snapshot ids ("21w03a") have no such prefix.
pub fn release_major_minor(id: &str) -> Option<(u32, u32)> {
    let mut parts = id.split(|c: char| c == '.' || c == '-');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_ids() {
        assert_eq!(release_major_minor("1.16.5"), Some((1, 16)));
        assert_eq!(release_major_minor("1.12"), Some((1, 12)));
        assert_eq!(release_major_minor("1.7.10-pre4"), Some((1, 7)));
        assert_eq!(release_major_minor("21w03a"), None);
        assert_eq!(release_major_minor("1"), None);
    }
}

use dispatch_types::StateStoreError;

/// Keys are relative, `/`-separated, and may not climb out of the store root.
pub(crate) fn check_key(key: &str) -> Result<(), StateStoreError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StateStoreError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StateStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_keys() {
        assert!(check_key("scratch_sid_A_jid_B/job_monitor.json").is_ok());
        assert!(check_key("download_1/x.fits.gz").is_ok());
    }

    #[test]
    fn rejects_escaping_or_malformed_keys() {
        for bad in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a/", "a\\b"] {
            assert!(check_key(bad).is_err(), "{bad} should be rejected");
        }
    }
}

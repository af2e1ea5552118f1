use crate::pki::san::SanSet;

/// Returns true iff every DNS name and IP address in `required` is present
/// in `actual`. DNS names compare as exact strings; addresses compare by
/// value, so equivalent textual forms of one address are equal.
#[must_use]
pub fn covers(actual: &SanSet, required: &SanSet) -> bool {
    required.dns_names.is_subset(&actual.dns_names)
        && required.ip_addrs.is_subset(&actual.ip_addrs)
}

/// The entries of `required` that `actual` does not cover.
#[must_use]
pub fn missing(actual: &SanSet, required: &SanSet) -> SanSet {
    SanSet {
        dns_names: required
            .dns_names
            .difference(&actual.dns_names)
            .cloned()
            .collect(),
        ip_addrs: required
            .ip_addrs
            .difference(&actual.ip_addrs)
            .copied()
            .collect(),
    }
}

//! Secure Virtual Resource classification
//!
//! Maps a request URI onto the closed set of well-known security resources.
//! Matching is exact: the `?query` suffix is dropped, then the remaining path
//! must equal a table entry byte for byte. No case folding and no trailing
//! slash normalisation happen here; a near-miss is an ordinary resource.

use std::fmt;

/// Access control list resource
pub const ACL_URI: &str = "/oic/sec/acl";
/// Access-manager ACL resource
pub const AMACL_URI: &str = "/oic/sec/amacl";
/// Signed ACL resource
pub const SACL_URI: &str = "/oic/sec/sacl";
/// Credential store
pub const CRED_URI: &str = "/oic/sec/cred";
/// Certificate revocation list
pub const CRL_URI: &str = "/oic/sec/crl";
/// Device ownership transfer method
pub const DOXM_URI: &str = "/oic/sec/doxm";
/// Direct pairing
pub const DPAIRING_URI: &str = "/oic/sec/dpairing";
/// Pairing configuration
pub const PCONF_URI: &str = "/oic/sec/pconf";
/// Provisioning status
pub const PSTAT_URI: &str = "/oic/sec/pstat";
/// Service resource
pub const SVC_URI: &str = "/oic/sec/svc";
/// Security version
pub const VER_URI: &str = "/oic/sec/ver";
/// Provisioning CRL alias; a security URI but not a classified SVR.
pub const PROV_CRL_URI: &str = "/oic/credprov/crl";

const QUERY_SEPARATOR: char = '?';

/// Kind of Secure Virtual Resource a URI designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SvrType {
    /// Access control list
    Acl,
    /// Access-manager ACL
    Amacl,
    /// Signed ACL
    Sacl,
    /// Credential store
    Cred,
    /// Certificate revocation list
    Crl,
    /// Ownership transfer method
    Doxm,
    /// Direct pairing
    Dpairing,
    /// Pairing configuration
    Pconf,
    /// Provisioning status
    Pstat,
    /// Service
    Svc,
    /// Version
    Ver,
    /// Ordinary application resource
    #[default]
    NotAnSvr,
}

/// Classification table, searched in order.
const SVR_TABLE: [(&str, SvrType); 11] = [
    (ACL_URI, SvrType::Acl),
    (AMACL_URI, SvrType::Amacl),
    (CRED_URI, SvrType::Cred),
    (CRL_URI, SvrType::Crl),
    (DOXM_URI, SvrType::Doxm),
    (DPAIRING_URI, SvrType::Dpairing),
    (PCONF_URI, SvrType::Pconf),
    (PSTAT_URI, SvrType::Pstat),
    (SVC_URI, SvrType::Svc),
    (SACL_URI, SvrType::Sacl),
    (VER_URI, SvrType::Ver),
];

impl SvrType {
    /// Canonical URI of this resource kind, `None` for `NotAnSvr`.
    pub fn uri(self) -> Option<&'static str> {
        SVR_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(uri, _)| *uri)
    }

    /// Returns `true` for every kind except `NotAnSvr`.
    pub fn is_svr(self) -> bool {
        self != SvrType::NotAnSvr
    }

    /// Every classified kind, in table order.
    pub fn all() -> impl Iterator<Item = SvrType> {
        SVR_TABLE.iter().map(|(_, kind)| *kind)
    }
}

impl fmt::Display for SvrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uri() {
            Some(uri) => write!(f, "{uri}"),
            None => write!(f, "not-an-svr"),
        }
    }
}

/// Drop the query component (from the first `?` onward).
pub fn strip_query(uri: &str) -> &str {
    match uri.find(QUERY_SEPARATOR) {
        Some(position) => &uri[..position],
        None => uri,
    }
}

/// Classify a URI. The first exact table match wins; anything else,
/// including the empty string, is `NotAnSvr`.
pub fn classify(uri: &str) -> SvrType {
    let path = strip_query(uri);
    if path.is_empty() {
        return SvrType::NotAnSvr;
    }
    SVR_TABLE
        .iter()
        .find(|(svr_uri, _)| *svr_uri == path)
        .map_or(SvrType::NotAnSvr, |(_, kind)| *kind)
}

/// Returns `true` if the URI names any security resource, including the
/// provisioning CRL alias that `classify` does not recognise.
///
/// Every classifier URI counts, the signed-ACL resource `/oic/sec/sacl`
/// included.
pub fn is_security_resource_uri(uri: &str) -> bool {
    let path = strip_query(uri);
    classify(path).is_svr() || path == PROV_CRL_URI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_classifies_to_itself() {
        for kind in SvrType::all() {
            let uri = kind.uri().unwrap();
            assert_eq!(classify(uri), kind, "{uri}");
        }
        assert_eq!(SvrType::all().count(), 11);
    }

    #[test]
    fn query_is_ignored() {
        assert_eq!(classify("/oic/sec/acl?if=oic.if.baseline"), SvrType::Acl);
        assert_eq!(classify("/oic/sec/doxm?owned=FALSE"), SvrType::Doxm);
        assert_eq!(classify("/oic/sec/pstat?"), SvrType::Pstat);
    }

    #[test]
    fn no_normalisation_is_applied() {
        assert_eq!(classify("/oic/sec/acl/"), SvrType::NotAnSvr);
        assert_eq!(classify("/OIC/SEC/ACL"), SvrType::NotAnSvr);
        assert_eq!(classify("/oic/sec/ac"), SvrType::NotAnSvr);
        assert_eq!(classify("/oic/sec/acl2"), SvrType::NotAnSvr);
        assert_eq!(classify(" /oic/sec/acl"), SvrType::NotAnSvr);
    }

    #[test]
    fn empty_and_ordinary_uris_are_not_svrs() {
        assert_eq!(classify(""), SvrType::NotAnSvr);
        assert_eq!(classify("?/oic/sec/acl"), SvrType::NotAnSvr);
        assert_eq!(classify("/a/light/0"), SvrType::NotAnSvr);
        assert_eq!(SvrType::NotAnSvr.uri(), None);
    }

    #[test]
    fn provisioning_crl_is_security_uri_but_not_svr() {
        assert_eq!(classify(PROV_CRL_URI), SvrType::NotAnSvr);
        assert!(is_security_resource_uri(PROV_CRL_URI));
        assert!(is_security_resource_uri("/oic/credprov/crl?x=1"));
    }

    #[test]
    fn security_uri_superset_of_classifier() {
        for kind in SvrType::all() {
            assert!(is_security_resource_uri(kind.uri().unwrap()));
        }
        assert!(is_security_resource_uri("/oic/sec/sacl?if=oic.if.baseline"));
        assert!(!is_security_resource_uri("/a/light/0"));
        assert!(!is_security_resource_uri(""));
    }

    #[test]
    fn strip_query_cuts_at_first_separator() {
        assert_eq!(strip_query("/a?b?c"), "/a");
        assert_eq!(strip_query("/a"), "/a");
        assert_eq!(strip_query("?"), "");
    }
}

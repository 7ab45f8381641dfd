//! Module origin flags.
//!
//! An origin says where a module may legitimately be sourced from. A module
//! can carry several origins at once.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bit-flag set of module origins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Origin: u32 {
        /// Shipped on local disk only.
        const DISK = 1;
        /// Marketplace "must have" selection.
        const ADDONS_MUST_HAVE = 2;
        /// Marketplace service subscription.
        const ADDONS_SERVICE = 4;
        /// Native module distributed through the marketplace.
        const ADDONS_NATIVE = 8;
        /// Full native catalog.
        const ADDONS_NATIVE_ALL = 16;
        /// Purchased by the current customer.
        const ADDONS_CUSTOMER = 32;
        /// Every marketplace origin.
        const ADDONS_ALL = Self::ADDONS_MUST_HAVE.bits()
            | Self::ADDONS_SERVICE.bits()
            | Self::ADDONS_NATIVE.bits()
            | Self::ADDONS_NATIVE_ALL.bits()
            | Self::ADDONS_CUSTOMER.bits();
    }
}

impl Origin {
    /// Parses a single manifest label such as `"service"` or `"native_all"`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "disk" => Some(Self::DISK),
            "must_have" => Some(Self::ADDONS_MUST_HAVE),
            "service" => Some(Self::ADDONS_SERVICE),
            "native" => Some(Self::ADDONS_NATIVE),
            "native_all" => Some(Self::ADDONS_NATIVE_ALL),
            "customer" => Some(Self::ADDONS_CUSTOMER),
            "addons" | "all_addons" => Some(Self::ADDONS_ALL),
            _ => None,
        }
    }

    /// Combines manifest labels, ignoring unknown ones.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .filter_map(|label| Self::from_label(label.as_ref()))
            .fold(Self::empty(), |acc, origin| acc | origin)
    }

    /// Whether the module may be refreshed from the marketplace.
    #[must_use]
    pub fn allows_marketplace_upgrade(self) -> bool {
        self.intersects(Self::ADDONS_ALL)
    }

    /// Whether an uninstalled module from this origin can be installed
    /// without going through a purchase first.
    #[must_use]
    pub fn is_freely_installable(self) -> bool {
        self.is_empty()
            || self.intersects(Self::ADDONS_NATIVE | Self::ADDONS_NATIVE_ALL | Self::ADDONS_CUSTOMER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addons_all_value() {
        assert_eq!(Origin::ADDONS_ALL.bits(), 62);
        assert!(!Origin::ADDONS_ALL.contains(Origin::DISK));
    }

    #[test]
    fn test_from_labels_combines() {
        let origin = Origin::from_labels(["disk", "service", "bogus"]);
        assert_eq!(origin, Origin::DISK | Origin::ADDONS_SERVICE);
    }

    #[test]
    fn test_marketplace_upgrade_eligibility() {
        assert!(!Origin::DISK.allows_marketplace_upgrade());
        assert!(Origin::ADDONS_SERVICE.allows_marketplace_upgrade());
        assert!((Origin::DISK | Origin::ADDONS_CUSTOMER).allows_marketplace_upgrade());
    }

    #[test]
    fn test_freely_installable() {
        assert!(Origin::empty().is_freely_installable());
        assert!(Origin::ADDONS_NATIVE.is_freely_installable());
        assert!(!Origin::ADDONS_MUST_HAVE.is_freely_installable());
        assert!(!Origin::DISK.is_freely_installable());
    }
}

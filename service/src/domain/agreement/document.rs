//! [`Document`] of an [`Agreement`].

use std::fmt::Write as _;

use sha2::{Digest as _, Sha256};

#[cfg(doc)]
use super::Agreement;
use super::{DocumentHash, Version};
use crate::domain::{Lease, User};

/// Rendered text of an [`Agreement`], which the parties sign.
#[derive(Clone, Debug)]
pub struct Document {
    /// Rendered text.
    text: String,

    /// [`Version`] this [`Document`] was rendered as.
    version: Version,
}

impl Document {
    /// Renders a new [`Document`] of the provided [`Lease`] between the
    /// provided parties.
    #[must_use]
    pub fn render(
        lease: &Lease,
        landlord: &User,
        tenant: &User,
        version: Version,
    ) -> Self {
        // WARNING: Any change of this template changes `DocumentHash`es of
        //          newly rendered documents, so existing signatures stop
        //          matching re-rendered ones.
        let mut text = String::with_capacity(1024);
        _ = writeln!(text, "RESIDENTIAL TENANCY AGREEMENT");
        _ = writeln!(text, "Version: {version}");
        _ = writeln!(text, "Lease: {}", lease.id);
        _ = writeln!(text);
        _ = writeln!(text, "Property: {}", lease.property_id);
        _ = writeln!(text, "Address: {}", lease.property_address);
        _ = writeln!(text);
        _ = writeln!(text, "Landlord: {} ({})", landlord.name, landlord.id);
        _ = writeln!(text, "Tenant: {} ({})", tenant.name, tenant.id);
        _ = writeln!(text);
        _ = writeln!(
            text,
            "Term: from {} to {}",
            lease.start_date, lease.end_date,
        );
        _ = writeln!(text, "Monthly rent: {}", lease.monthly_rent);
        _ = writeln!(text);
        _ = writeln!(
            text,
            "The Landlord agrees to let and the Tenant agrees to take the \
             Property for the Term at the Monthly rent, payable in advance \
             on the first day of each month.",
        );
        _ = writeln!(
            text,
            "This agreement becomes binding once signed by the Landlord and \
             then by the Tenant.",
        );

        Self { text, version }
    }

    /// Returns the rendered text of this [`Document`].
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the [`Version`] of this [`Document`].
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Calculates the [`DocumentHash`] of this [`Document`].
    #[must_use]
    pub fn hash(&self) -> DocumentHash {
        DocumentHash(hex::encode(Sha256::digest(self.text.as_bytes())))
    }
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use time::macros::date;

    use crate::domain::{lease, user, Lease, User};

    use super::{Document, Version};

    fn user(name: &str) -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new(name).unwrap(),
            email: None,
            created_at: user::CreationDateTime::now(),
            deleted_at: None,
        }
    }

    fn lease(landlord: &User, tenant: &User) -> Lease {
        Lease {
            id: lease::Id::new(),
            property_id: lease::PropertyId::new(),
            property_address: lease::PropertyAddress::new("7 Jalan Bukit")
                .unwrap(),
            landlord_id: landlord.id,
            tenant_id: tenant.id,
            start_date: date!(2025 - 04 - 01),
            end_date: date!(2026 - 03 - 31),
            monthly_rent: Money {
                amount: 1_800.into(),
                currency: Currency::Myr,
            },
            created_at: lease::CreationDateTime::now(),
        }
    }

    #[test]
    fn renders_lease_terms() {
        let (landlord, tenant) = (user("Aminah Yusof"), user("Daniel Lee"));
        let lease = lease(&landlord, &tenant);

        let doc = Document::render(&lease, &landlord, &tenant, Version::FIRST);

        assert!(doc.text().contains("Landlord: Aminah Yusof"));
        assert!(doc.text().contains("Tenant: Daniel Lee"));
        assert!(doc.text().contains("from 2025-04-01 to 2026-03-31"));
        assert!(doc.text().contains("Monthly rent: 1800MYR"));
        assert_eq!(doc.version(), Version::FIRST);
    }

    #[test]
    fn hash_is_deterministic_per_version() {
        let (landlord, tenant) = (user("Aminah Yusof"), user("Daniel Lee"));
        let lease = lease(&landlord, &tenant);

        let first = Document::render(&lease, &landlord, &tenant, Version::FIRST);
        let again = Document::render(&lease, &landlord, &tenant, Version::FIRST);
        let second = Document::render(
            &lease,
            &landlord,
            &tenant,
            Version::FIRST.next(),
        );

        assert_eq!(first.hash(), again.hash());
        assert_ne!(first.hash(), second.hash());
        assert_eq!(first.hash().as_ref().len(), 64);
    }
}

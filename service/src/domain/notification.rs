//! [`Notification`] definitions.

use std::fmt::Write as _;

#[cfg(doc)]
use crate::domain::Lease;
use crate::domain::{
    agreement::{self, CancelReason, Role},
    user, Agreement, User,
};

/// Notification about an [`Agreement`] addressed to one of its parties.
#[derive(Clone, Debug)]
pub struct Notification {
    /// [`Recipient`] of this [`Notification`].
    pub recipient: Recipient,

    /// Summary of the [`Agreement`] this [`Notification`] is about.
    pub agreement: Summary,

    /// [`Topic`] of this [`Notification`].
    pub topic: Topic,
}

impl Notification {
    /// Creates a new [`Notification`] about the provided [`Agreement`] for the
    /// provided [`User`].
    ///
    /// [`None`] is returned if the [`User`] has no [`user::Email`] to deliver
    /// the [`Notification`] to.
    #[must_use]
    pub fn new(
        recipient: &User,
        agreement: &Agreement,
        property_address: &str,
        topic: Topic,
    ) -> Option<Self> {
        Some(Self {
            recipient: Recipient {
                name: recipient.name.clone(),
                email: recipient.email.clone()?,
            },
            agreement: Summary {
                id: agreement.id,
                property_address: property_address.to_owned(),
                document_hash: agreement.document_hash.truncated(),
                expires_at: agreement.expires_at,
            },
            topic,
        })
    }

    /// Renders this [`Notification`] as an [`Email`].
    #[must_use]
    pub fn email(&self) -> Email {
        let Self {
            recipient,
            agreement,
            topic,
        } = self;

        let subject = match topic {
            Topic::BookingConfirmation => "Your booking is confirmed",
            Topic::AgreementInitiated => "Rental agreement is ready",
            Topic::SigningReminder { .. } => {
                "Rental agreement awaits your signature"
            }
            Topic::AgreementCompleted => "Rental agreement is signed",
            Topic::AgreementCancelled { .. } => "Rental agreement is cancelled",
        };

        let mut body = format!("Dear {},\n\n", recipient.name);
        match topic {
            Topic::BookingConfirmation => {
                _ = writeln!(
                    body,
                    "your booking of {} is confirmed and the rental \
                     agreement has been prepared.",
                    agreement.property_address,
                );
            }
            Topic::AgreementInitiated => {
                _ = writeln!(
                    body,
                    "the landlord has started the signing of the rental \
                     agreement for {}. You will be asked to sign it once \
                     the landlord does.",
                    agreement.property_address,
                );
            }
            Topic::SigningReminder { role } => {
                _ = writeln!(
                    body,
                    "the rental agreement for {} awaits your signature as \
                     the {}.",
                    agreement.property_address,
                    match role {
                        Role::Landlord => "landlord",
                        Role::Tenant => "tenant",
                    },
                );
            }
            Topic::AgreementCompleted => {
                _ = writeln!(
                    body,
                    "the rental agreement for {} has been signed by both \
                     parties.",
                    agreement.property_address,
                );
            }
            Topic::AgreementCancelled { reason } => {
                _ = writeln!(
                    body,
                    "the rental agreement for {} has been cancelled by the \
                     landlord.\nReason: {reason}",
                    agreement.property_address,
                );
            }
        }
        if let Some(at) = agreement.expires_at {
            if matches!(
                topic,
                Topic::AgreementInitiated | Topic::SigningReminder { .. },
            ) {
                _ = writeln!(body, "Please sign before {}.", at.to_rfc3339());
            }
        }
        _ = writeln!(body, "\nAgreement: {}", agreement.id);
        _ = writeln!(body, "Document: {}", agreement.document_hash);

        Email {
            to: recipient.email.clone(),
            to_name: recipient.name.clone(),
            subject: subject.to_owned(),
            body,
        }
    }
}

/// Recipient of a [`Notification`].
#[derive(Clone, Debug)]
pub struct Recipient {
    /// [`user::Name`] of the recipient.
    pub name: user::Name,

    /// [`user::Email`] to deliver the [`Notification`] to.
    pub email: user::Email,
}

/// Summary of an [`Agreement`] included into a [`Notification`].
#[derive(Clone, Debug)]
pub struct Summary {
    /// ID of the [`Agreement`].
    pub id: agreement::Id,

    /// Address of the leased property.
    pub property_address: String,

    /// Truncated [`agreement::DocumentHash`].
    pub document_hash: String,

    /// [`agreement::ExpirationDateTime`] of the [`Agreement`], if initiated.
    pub expires_at: Option<agreement::ExpirationDateTime>,
}

/// Topic of a [`Notification`].
#[derive(Clone, Debug)]
pub enum Topic {
    /// Booking of the [`Lease`] is confirmed and its [`Agreement`] is created.
    BookingConfirmation,

    /// Signing of the [`Agreement`] is started.
    AgreementInitiated,

    /// [`Agreement`] awaits a signature in the provided [`Role`].
    SigningReminder {
        /// [`Role`] the signature is awaited in.
        role: Role,
    },

    /// Both parties signed the [`Agreement`].
    AgreementCompleted,

    /// [`Agreement`] is cancelled.
    AgreementCancelled {
        /// Reason of the cancellation.
        reason: CancelReason,
    },
}

/// Email rendered from a [`Notification`].
#[derive(Clone, Debug)]
pub struct Email {
    /// Address to deliver this [`Email`] to.
    pub to: user::Email,

    /// Name of the addressee.
    pub to_name: user::Name,

    /// Subject line.
    pub subject: String,

    /// Plain text body.
    pub body: String,
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::domain::{
        agreement::{self, CancelReason, Document, Role},
        lease, user, Agreement, User,
    };

    use super::{Notification, Topic};

    fn user(email: Option<&str>) -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new("Aminah Yusof").unwrap(),
            email: email.map(|e| user::Email::new(e).unwrap()),
            created_at: user::CreationDateTime::now(),
            deleted_at: None,
        }
    }

    fn agreement() -> Agreement {
        let now = DateTime::from_rfc3339("2025-03-01T09:00:00Z").unwrap();
        let mut agreement = Agreement::new(lease::Id::new(), &doc(), now);
        agreement.initiate(7, now).unwrap();
        agreement
    }

    fn doc() -> Document {
        use common::{money::Currency, Money};
        use time::macros::date;

        let (landlord, tenant) = (user(None), user(None));
        let lease = crate::domain::Lease {
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
        };
        Document::render(&lease, &landlord, &tenant, agreement::Version::FIRST)
    }

    #[test]
    fn skips_recipients_without_email() {
        let agreement = agreement();

        assert!(Notification::new(
            &user(None),
            &agreement,
            "7 Jalan Bukit",
            Topic::AgreementCompleted,
        )
        .is_none());
    }

    #[test]
    fn renders_signing_reminder() {
        let agreement = agreement();
        let notification = Notification::new(
            &user(Some("aminah@example.com")),
            &agreement,
            "7 Jalan Bukit",
            Topic::SigningReminder {
                role: Role::Landlord,
            },
        )
        .unwrap();

        let email = notification.email();

        assert_eq!(AsRef::<str>::as_ref(&email.to), "aminah@example.com");
        assert_eq!(email.subject, "Rental agreement awaits your signature");
        assert!(email.body.starts_with("Dear Aminah Yusof,"));
        assert!(email.body.contains("signature as the landlord"));
        assert!(email.body.contains("Please sign before 2025-03-08T09:00:00Z"));
        assert!(email.body.contains(&agreement.document_hash.truncated()));
    }

    #[test]
    fn renders_cancellation_reason() {
        let notification = Notification::new(
            &user(Some("aminah@example.com")),
            &agreement(),
            "7 Jalan Bukit",
            Topic::AgreementCancelled {
                reason: CancelReason::new("Property sold").unwrap(),
            },
        )
        .unwrap();

        let email = notification.email();

        assert!(email.body.contains("Reason: Property sold"));
        assert!(!email.body.contains("Please sign before"));
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use courier_core::domain::customer::{Customer, CustomerId};
use courier_core::phone::{lookup_tail, mask, PhoneMatch};
use courier_db::repositories::CustomerRepository;

/// Why a lookup did or did not produce a customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityOutcome {
    Verified(PhoneMatch),
    NotFound,
    /// A caller-supplied id whose stored numbers do not match the phone.
    Mismatched,
    Ambiguous,
    LookupFailed,
}

impl IdentityOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified(PhoneMatch::Exact) => "verified_exact",
            Self::Verified(PhoneMatch::Suffix) => "verified_suffix",
            Self::NotFound => "not_found",
            Self::Mismatched => "mismatched",
            Self::Ambiguous => "ambiguous",
            Self::LookupFailed => "lookup_failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub customer: Option<Customer>,
    pub outcome: IdentityOutcome,
}

impl ResolvedIdentity {
    fn verified(customer: Customer, strength: PhoneMatch) -> Self {
        Self { customer: Some(customer), outcome: IdentityOutcome::Verified(strength) }
    }

    fn unresolved(outcome: IdentityOutcome) -> Self {
        Self { customer: None, outcome }
    }

    pub fn found(&self) -> bool {
        self.customer.is_some()
    }

    pub fn customer_id(&self) -> Option<&CustomerId> {
        self.customer.as_ref().map(|customer| &customer.id)
    }
}

/// Maps a phone number (and optionally a caller-supplied id) to the one
/// customer that owns it. Never trusts an id on its own and never guesses
/// between several candidates.
pub struct IdentityResolver {
    customers: Arc<dyn CustomerRepository>,
}

impl IdentityResolver {
    pub fn new(customers: Arc<dyn CustomerRepository>) -> Self {
        Self { customers }
    }

    pub async fn resolve(
        &self,
        phone: &str,
        known_customer_id: Option<&CustomerId>,
        correlation_id: &str,
    ) -> ResolvedIdentity {
        let resolved = match known_customer_id {
            Some(customer_id) => self.resolve_known(phone, customer_id, correlation_id).await,
            None => self.resolve_by_phone(phone, correlation_id).await,
        };

        info!(
            event_name = "assistant.identity.resolved",
            correlation_id,
            phone = %mask(phone),
            outcome = resolved.outcome.as_str(),
            customer_id = resolved.customer_id().map(|id| id.0.as_str()).unwrap_or("none"),
            "identity resolution finished"
        );
        resolved
    }

    async fn resolve_known(
        &self,
        phone: &str,
        customer_id: &CustomerId,
        correlation_id: &str,
    ) -> ResolvedIdentity {
        let customer = match self.customers.find_by_id(customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return ResolvedIdentity::unresolved(IdentityOutcome::NotFound),
            Err(error) => {
                warn!(
                    event_name = "assistant.identity.lookup_failed",
                    correlation_id,
                    error = %error,
                    "customer lookup by id failed"
                );
                return ResolvedIdentity::unresolved(IdentityOutcome::LookupFailed);
            }
        };

        match customer.phone_match(phone) {
            Some(strength) => ResolvedIdentity::verified(customer, strength),
            None => {
                warn!(
                    event_name = "assistant.identity.mismatch",
                    correlation_id,
                    phone = %mask(phone),
                    claimed_customer_id = %customer_id,
                    "supplied customer id does not own the requesting phone"
                );
                ResolvedIdentity::unresolved(IdentityOutcome::Mismatched)
            }
        }
    }

    async fn resolve_by_phone(&self, phone: &str, correlation_id: &str) -> ResolvedIdentity {
        let Some(tail) = lookup_tail(phone) else {
            return ResolvedIdentity::unresolved(IdentityOutcome::NotFound);
        };

        let candidates = match self.customers.find_by_phone_tail(&tail).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    event_name = "assistant.identity.lookup_failed",
                    correlation_id,
                    error = %error,
                    "customer lookup by phone failed"
                );
                return ResolvedIdentity::unresolved(IdentityOutcome::LookupFailed);
            }
        };

        let scored = candidates
            .into_iter()
            .filter_map(|customer| customer.phone_match(phone).map(|strength| (customer, strength)))
            .collect::<Vec<_>>();

        let exact = scored.iter().filter(|(_, strength)| *strength == PhoneMatch::Exact).count();
        let preferred = if exact > 0 { PhoneMatch::Exact } else { PhoneMatch::Suffix };
        let mut best = scored
            .into_iter()
            .filter(|(_, strength)| *strength == preferred)
            .collect::<Vec<_>>();

        match best.len() {
            0 => ResolvedIdentity::unresolved(IdentityOutcome::NotFound),
            1 => match best.pop() {
                Some((customer, strength)) => ResolvedIdentity::verified(customer, strength),
                None => ResolvedIdentity::unresolved(IdentityOutcome::NotFound),
            },
            count => {
                warn!(
                    event_name = "assistant.identity.ambiguous",
                    correlation_id,
                    phone = %mask(phone),
                    candidates = count,
                    "several customers match the requesting phone"
                );
                ResolvedIdentity::unresolved(IdentityOutcome::Ambiguous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use courier_core::domain::customer::{Customer, CustomerId};
    use courier_core::phone::PhoneMatch;
    use courier_db::repositories::{
        CustomerRepository, InMemoryCustomerRepository, RepositoryError,
    };

    use super::{IdentityOutcome, IdentityResolver};

    fn customer(id: &str, phone: Option<&str>, whatsapp: Option<&str>) -> Customer {
        Customer {
            id: CustomerId(id.to_string()),
            first_name: "Cliente".to_string(),
            last_name: None,
            phone: phone.map(str::to_string),
            whatsapp: whatsapp.map(str::to_string),
        }
    }

    async fn resolver_with(customers: Vec<Customer>) -> IdentityResolver {
        let repo = InMemoryCustomerRepository::default();
        for customer in customers {
            repo.save(customer).await.expect("save customer");
        }
        IdentityResolver::new(Arc::new(repo))
    }

    struct FailingCustomers;

    #[async_trait]
    impl CustomerRepository for FailingCustomers {
        async fn find_by_id(&self, _id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
            Err(RepositoryError::Decode("boom".to_string()))
        }

        async fn find_by_phone_tail(&self, _tail: &str) -> Result<Vec<Customer>, RepositoryError> {
            Err(RepositoryError::Decode("boom".to_string()))
        }

        async fn save(&self, _customer: Customer) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn exact_match_wins_over_suffix_match() {
        let resolver = resolver_with(vec![
            customer("C-1", None, Some("+57 300 000 0001")),
            customer("C-2", Some("300 000 0001"), None),
        ])
        .await;

        let resolved = resolver.resolve("+573000000001", None, "test").await;

        assert_eq!(resolved.outcome, IdentityOutcome::Verified(PhoneMatch::Exact));
        assert_eq!(resolved.customer_id(), Some(&CustomerId("C-1".to_string())));
    }

    #[tokio::test]
    async fn known_id_with_foreign_phone_is_rejected() {
        let resolver = resolver_with(vec![
            customer("C-1", None, Some("573000000001")),
            customer("C-2", None, Some("573009999999")),
        ])
        .await;

        let resolved = resolver
            .resolve("573009999999", Some(&CustomerId("C-1".to_string())), "test")
            .await;

        assert!(!resolved.found());
        assert_eq!(resolved.outcome, IdentityOutcome::Mismatched);
    }

    #[tokio::test]
    async fn known_id_with_matching_phone_is_verified() {
        let resolver = resolver_with(vec![customer("C-1", Some("3000000001"), None)]).await;

        let resolved =
            resolver.resolve("+57 300 000 0001", Some(&CustomerId("C-1".to_string())), "test").await;

        assert_eq!(resolved.outcome, IdentityOutcome::Verified(PhoneMatch::Suffix));
    }

    #[tokio::test]
    async fn duplicate_exact_matches_fail_closed() {
        let resolver = resolver_with(vec![
            customer("C-1", None, Some("573000000001")),
            customer("C-2", Some("+57 300 000 0001"), None),
        ])
        .await;

        let resolved = resolver.resolve("573000000001", None, "test").await;

        assert!(!resolved.found());
        assert_eq!(resolved.outcome, IdentityOutcome::Ambiguous);
    }

    #[tokio::test]
    async fn several_suffix_only_matches_fail_closed() {
        let resolver = resolver_with(vec![
            customer("C-1", None, Some("3000000001")),
            customer("C-2", Some("0000001"), None),
        ])
        .await;

        let resolved = resolver.resolve("573000000001", None, "test").await;

        assert_eq!(resolved.outcome, IdentityOutcome::Ambiguous);
    }

    #[tokio::test]
    async fn unknown_or_short_numbers_are_not_found() {
        let resolver = resolver_with(vec![customer("C-1", None, Some("573000000001"))]).await;

        assert_eq!(
            resolver.resolve("573001112233", None, "test").await.outcome,
            IdentityOutcome::NotFound
        );
        assert_eq!(resolver.resolve("12345", None, "test").await.outcome, IdentityOutcome::NotFound);
    }

    #[tokio::test]
    async fn lookup_errors_resolve_to_not_found() {
        let resolver = IdentityResolver::new(Arc::new(FailingCustomers));

        let by_phone = resolver.resolve("573000000001", None, "test").await;
        let by_id =
            resolver.resolve("573000000001", Some(&CustomerId("C-1".to_string())), "test").await;

        assert!(!by_phone.found());
        assert_eq!(by_phone.outcome, IdentityOutcome::LookupFailed);
        assert_eq!(by_id.outcome, IdentityOutcome::LookupFailed);
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use courier_core::domain::context::CustomerContext;
use courier_core::domain::customer::Customer;
use courier_core::domain::package::{Package, PackageId, PackagePayment, PackageRecord, Payment};
use courier_db::repositories::{PackageRepository, RepositoryError};

/// Builds the per-request [`CustomerContext`] for one verified customer.
pub struct CustomerContextAggregator {
    packages: Arc<dyn PackageRepository>,
}

impl CustomerContextAggregator {
    pub fn new(packages: Arc<dyn PackageRepository>) -> Self {
        Self { packages }
    }

    pub async fn build(
        &self,
        customer: &Customer,
        correlation_id: &str,
    ) -> Result<CustomerContext, RepositoryError> {
        let records = self
            .packages
            .list_for_customer(&customer.id)
            .await?
            .into_iter()
            .filter(|record| {
                let owned = record.customer_id == customer.id;
                if !owned {
                    warn!(
                        event_name = "assistant.context.foreign_package_dropped",
                        correlation_id,
                        tracking_number = %record.tracking_number,
                        "package store returned a package owned by someone else"
                    );
                }
                owned
            })
            .collect::<Vec<_>>();

        let mut total_freight_by_currency = BTreeMap::new();
        for record in &records {
            *total_freight_by_currency.entry(record.currency).or_insert(Decimal::ZERO) +=
                record.freight;
        }

        let pending_delivery = records
            .iter()
            .filter(|record| record.status.is_pending_delivery())
            .map(Package::from)
            .collect::<Vec<_>>();

        let eligible = records
            .iter()
            .filter(|record| {
                record.status.is_payment_eligible() && record.amount_to_collect > Decimal::ZERO
            })
            .collect::<Vec<_>>();

        let payments = if eligible.is_empty() {
            Vec::new()
        } else {
            let ids = eligible.iter().map(|record| record.id.clone()).collect::<Vec<PackageId>>();
            self.packages.payments_for_packages(&ids).await?
        };

        let mut pending_payment = Vec::new();
        let mut pending_by_currency = BTreeMap::new();
        for record in eligible {
            let Some(balance) = package_balance(record, &payments, correlation_id) else {
                continue;
            };
            *pending_by_currency.entry(balance.currency).or_insert(Decimal::ZERO) +=
                balance.pending_amount;
            pending_payment.push(balance);
        }

        Ok(CustomerContext {
            found: true,
            customer_id: Some(customer.id.clone()),
            first_name: Some(customer.first_name.trim().to_string())
                .filter(|name| !name.is_empty()),
            package_count: records.len(),
            pending_delivery,
            pending_payment,
            total_freight_by_currency,
            pending_by_currency,
            facts_unavailable: false,
        })
    }
}

/// Remaining balance for one package, or `None` when nothing is owed.
///
/// Every stored payment row counts. Payments recorded in another currency
/// are skipped because there is no exchange rate to apply.
fn package_balance(
    record: &PackageRecord,
    payments: &[Payment],
    correlation_id: &str,
) -> Option<PackagePayment> {
    let mut amount_paid = Decimal::ZERO;
    for payment in payments.iter().filter(|payment| payment.package_id == record.id) {
        if payment.currency != record.currency {
            warn!(
                event_name = "assistant.context.payment_currency_mismatch",
                correlation_id,
                tracking_number = %record.tracking_number,
                package_currency = record.currency.code(),
                payment_currency = payment.currency.code(),
                "payment ignored for balance"
            );
            continue;
        }
        amount_paid += payment.amount;
    }

    let pending_amount = record.amount_to_collect - amount_paid;
    if pending_amount < Decimal::ZERO {
        warn!(
            event_name = "assistant.context.overpaid_package",
            correlation_id,
            tracking_number = %record.tracking_number,
            overpaid_by = %(-pending_amount),
            "package is overpaid"
        );
    }
    if pending_amount <= Decimal::ZERO {
        return None;
    }

    Some(PackagePayment {
        tracking_number: record.tracking_number.clone(),
        status: record.status,
        amount_to_collect: record.amount_to_collect,
        amount_paid,
        pending_amount,
        currency: record.currency,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use courier_core::domain::customer::{Customer, CustomerId};
    use courier_core::domain::package::{PackageId, PackageRecord, PackageStatus, Payment};
    use courier_core::money::Currency;
    use courier_db::repositories::{InMemoryPackageRepository, PackageRepository};

    use super::CustomerContextAggregator;

    fn customer(id: &str) -> Customer {
        Customer {
            id: CustomerId(id.to_string()),
            first_name: "Ana".to_string(),
            last_name: None,
            phone: None,
            whatsapp: Some("573000000001".to_string()),
        }
    }

    fn package(
        id: &str,
        owner: &str,
        status: PackageStatus,
        currency: Currency,
        freight: i64,
        collect: i64,
    ) -> PackageRecord {
        PackageRecord {
            id: PackageId(id.to_string()),
            customer_id: CustomerId(owner.to_string()),
            tracking_number: format!("EO-2025-{id}"),
            status,
            origin: "Barranquilla".to_string(),
            destination: "Curazao".to_string(),
            description: "Caja".to_string(),
            weight_kg: None,
            freight: Decimal::new(freight, 0),
            currency,
            amount_to_collect: Decimal::new(collect, 0),
            trip: None,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).single().expect("timestamp"),
        }
    }

    fn payment(id: &str, package_id: &str, amount: i64, currency: Currency) -> Payment {
        Payment {
            id: id.to_string(),
            package_id: PackageId(package_id.to_string()),
            amount: Decimal::new(amount, 0),
            currency,
            paid_at: Utc.with_ymd_and_hms(2026, 10, 2, 12, 0, 0).single().expect("timestamp"),
        }
    }

    #[tokio::test]
    async fn splits_packages_and_computes_balances() {
        let repo = InMemoryPackageRepository::default();
        for record in [
            package("0001", "C-1", PackageStatus::AtDestination, Currency::Cop, 150_000, 150_000),
            package("0002", "C-1", PackageStatus::Delivered, Currency::Usd, 25, 25),
            package("0003", "C-1", PackageStatus::InTransit, Currency::Usd, 30, 30),
            package("0004", "C-1", PackageStatus::Delivered, Currency::Cop, 40_000, 40_000),
            package("0099", "C-2", PackageStatus::AtDestination, Currency::Cop, 99_000, 99_000),
        ] {
            repo.save(record).await.expect("save package");
        }
        repo.save_payment(payment("P-1", "0002", 10, Currency::Usd)).await.expect("payment");
        repo.save_payment(payment("P-2", "0004", 20_000, Currency::Cop)).await.expect("payment");
        repo.save_payment(payment("P-3", "0004", 20_000, Currency::Cop)).await.expect("payment");

        let context = CustomerContextAggregator::new(Arc::new(repo))
            .build(&customer("C-1"), "test")
            .await
            .expect("build context");

        assert!(context.found);
        assert_eq!(context.package_count, 4);
        let pending_delivery = context
            .pending_delivery
            .iter()
            .map(|package| package.tracking_number.as_str())
            .collect::<Vec<_>>();
        assert_eq!(pending_delivery.len(), 2);
        assert!(pending_delivery.contains(&"EO-2025-0001"));
        assert!(pending_delivery.contains(&"EO-2025-0003"));

        let pending_payment = context
            .pending_payment
            .iter()
            .map(|payment| (payment.tracking_number.as_str(), payment.pending_amount))
            .collect::<Vec<_>>();
        assert_eq!(pending_payment.len(), 2);
        assert!(pending_payment.contains(&("EO-2025-0001", Decimal::new(150_000, 0))));
        assert!(pending_payment.contains(&("EO-2025-0002", Decimal::new(15, 0))));
        assert!(context.pending_payment.iter().all(|payment| payment.pending_amount > Decimal::ZERO));

        assert_eq!(context.pending_by_currency.get(&Currency::Cop), Some(&Decimal::new(150_000, 0)));
        assert_eq!(context.pending_by_currency.get(&Currency::Usd), Some(&Decimal::new(15, 0)));
        assert_eq!(
            context.total_freight_by_currency.get(&Currency::Cop),
            Some(&Decimal::new(190_000, 0))
        );
        assert_eq!(context.total_freight_by_currency.get(&Currency::Usd), Some(&Decimal::new(55, 0)));
    }

    #[tokio::test]
    async fn overpaid_and_foreign_currency_payments_are_handled() {
        let repo = InMemoryPackageRepository::default();
        repo.save(package("0001", "C-1", PackageStatus::Delivered, Currency::Usd, 20, 20))
            .await
            .expect("save");
        repo.save(package("0002", "C-1", PackageStatus::Delivered, Currency::Usd, 20, 20))
            .await
            .expect("save");
        repo.save_payment(payment("P-1", "0001", 15, Currency::Usd)).await.expect("payment");
        repo.save_payment(payment("P-2", "0001", 15, Currency::Usd)).await.expect("payment");
        repo.save_payment(payment("P-3", "0002", 20, Currency::Ang)).await.expect("payment");

        let context = CustomerContextAggregator::new(Arc::new(repo))
            .build(&customer("C-1"), "test")
            .await
            .expect("build context");

        assert_eq!(context.pending_payment.len(), 1);
        assert_eq!(context.pending_payment[0].tracking_number, "EO-2025-0002");
        assert_eq!(context.pending_payment[0].amount_paid, Decimal::ZERO);
        assert_eq!(context.pending_by_currency.get(&Currency::Usd), Some(&Decimal::new(20, 0)));
    }

    #[tokio::test]
    async fn customer_without_packages_gets_an_empty_context() {
        let context = CustomerContextAggregator::new(Arc::new(InMemoryPackageRepository::default()))
            .build(&customer("C-1"), "test")
            .await
            .expect("build context");

        assert!(context.found);
        assert_eq!(context.first_name.as_deref(), Some("Ana"));
        assert_eq!(context.package_count, 0);
        assert!(context.pending_delivery.is_empty());
        assert!(context.pending_payment.is_empty());
        assert!(context.total_freight_by_currency.is_empty());
        assert!(!context.has_pending_balance());
    }
}

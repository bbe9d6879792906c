use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use crate::pipeline::domain::{
    Actor, EnrollmentLink, HistoryEntry, Lead, LeadStatus, LinkToken, Money, NewLead,
    PaymentMethod, PaymentMethodId, Role, SellerId, UserId,
};
use crate::pipeline::memory::MemoryStore;
use crate::pipeline::policy::{LimitCatalogue, SellerLimits, ValueBounds};
use crate::pipeline::service::{
    ConversionNotice, ConversionNotifier, NotifyError, PipelineConfig, PipelineService,
};
use crate::pipeline::store::PipelineStore;

pub(super) fn seller() -> Actor {
    Actor {
        id: UserId("ana".to_string()),
        role: Role::Seller,
    }
}

pub(super) fn admin() -> Actor {
    Actor {
        id: UserId("root".to_string()),
        role: Role::Admin,
    }
}

pub(super) fn seller_id() -> SellerId {
    SellerId("seller-ana".to_string())
}

pub(super) fn credit_card() -> PaymentMethod {
    PaymentMethod {
        id: PaymentMethodId("pm-credit-card".to_string()),
        name: "Credit card".to_string(),
        fee_percentage: 2.99,
        max_installments: 12,
        active: true,
        visible: true,
    }
}

pub(super) fn suspended_method() -> PaymentMethod {
    PaymentMethod {
        id: PaymentMethodId("pm-suspended".to_string()),
        name: "Suspended slip".to_string(),
        fee_percentage: 1.99,
        max_installments: 1,
        active: false,
        visible: false,
    }
}

pub(super) fn catalogue() -> LimitCatalogue {
    LimitCatalogue::default().with_seller(
        SellerLimits::new(seller_id())
            .with_global(ValueBounds::between(
                Money::from_cents(29_990),
                Money::from_cents(199_990),
            ))
            .with_category(
                "postgraduate",
                ValueBounds::between(Money::from_cents(59_990), Money::from_cents(129_990)),
            ),
    )
}

pub(super) fn intake() -> NewLead {
    NewLead {
        name: "Maria Silva".to_string(),
        email: Some("maria.silva@example.com".to_string()),
        phone: Some("+55 11 99999-0001".to_string()),
        seller_id: Some(seller_id()),
        course: Some("MBA in Data Science".to_string()),
        category: Some("postgraduate".to_string()),
        quoted_price: Some(Money::from_cents(99_990)),
    }
}

pub(super) fn unpriced_intake() -> NewLead {
    NewLead {
        quoted_price: None,
        ..intake()
    }
}

pub(super) fn build_service() -> (
    PipelineService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::default());
    store
        .upsert_payment_method(credit_card())
        .expect("seed payment method");
    store
        .upsert_payment_method(suspended_method())
        .expect("seed payment method");

    let notifier = Arc::new(MemoryNotifier::default());
    let service = PipelineService::new(
        store.clone(),
        notifier.clone(),
        catalogue(),
        PipelineConfig::default(),
    );
    (service, store, notifier)
}

pub(super) fn registered_lead(
    service: &PipelineService<MemoryStore, MemoryNotifier>,
) -> Lead {
    service.create_lead(intake(), &seller()).expect("lead registers")
}

pub(super) fn lead_at_negociating(
    service: &PipelineService<MemoryStore, MemoryNotifier>,
) -> Lead {
    let lead = registered_lead(service);
    service
        .change_status(&lead.id, LeadStatus::Contacted, &seller(), None)
        .expect("advance to contacted");
    service
        .change_status(&lead.id, LeadStatus::Negociating, &seller(), None)
        .expect("advance to negociating")
}

/// Plant an already-expired link for the lead, bypassing the issuer.
pub(super) fn plant_expired_link(store: &MemoryStore, lead: &Lead) -> LinkToken {
    let issued_at = Utc::now() - Duration::days(10);
    let token = LinkToken("expired-token-expired-token-1234".to_string());
    let link = EnrollmentLink {
        token: token.clone(),
        lead_id: lead.id.clone(),
        seller_id: seller_id(),
        issued_at,
        expires_at: issued_at + Duration::days(7),
        used: false,
        used_at: None,
    };
    store
        .upsert_link(
            link,
            HistoryEntry {
                lead_id: lead.id.clone(),
                action: "enrollment link issued".to_string(),
                from: None,
                to: None,
                actor_id: seller().id,
                recorded_at: issued_at,
            },
        )
        .expect("plant link");
    token
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<ConversionNotice>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<ConversionNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ConversionNotifier for MemoryNotifier {
    fn publish(&self, notice: ConversionNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

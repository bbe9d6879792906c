use super::common::*;
use crate::pipeline::domain::{LeadId, LeadStatus};
use crate::pipeline::service::PipelineError;
use crate::pipeline::store::PipelineStore;
use crate::pipeline::transition::TransitionError;

#[test]
fn advancing_commits_status_and_audit_entry_together() {
    let (service, store, _) = build_service();
    let lead = registered_lead(&service);

    let updated = service
        .change_status(&lead.id, LeadStatus::Contacted, &seller(), None)
        .expect("advance succeeds");

    assert_eq!(updated.status, LeadStatus::Contacted);
    assert_eq!(updated.version, lead.version + 1);

    let history = store.history_for(&lead.id).expect("history readable");
    assert_eq!(history.len(), 2, "intake entry plus the transition entry");
    let entry = history.last().expect("transition entry present");
    assert_eq!(entry.from, Some(LeadStatus::Pending));
    assert_eq!(entry.to, Some(LeadStatus::Contacted));
    assert_eq!(entry.actor_id, seller().id);
}

#[test]
fn skipping_forward_stages_is_allowed() {
    let (service, _, _) = build_service();
    let lead = registered_lead(&service);

    let updated = service
        .change_status(&lead.id, LeadStatus::ConfirmPayment, &seller(), None)
        .expect("skip succeeds");
    assert_eq!(updated.status, LeadStatus::ConfirmPayment);
}

#[test]
fn backward_moves_are_rejected_for_sellers() {
    let (service, _, _) = build_service();
    let lead = lead_at_negociating(&service);

    match service.change_status(&lead.id, LeadStatus::Contacted, &seller(), None) {
        Err(PipelineError::Transition(TransitionError::BackwardMove { .. })) => {}
        other => panic!("expected backward-move rejection, got {other:?}"),
    }
}

#[test]
fn admins_may_correct_status_backward() {
    let (service, store, _) = build_service();
    let lead = lead_at_negociating(&service);

    let updated = service
        .change_status(&lead.id, LeadStatus::Contacted, &admin(), None)
        .expect("manual correction succeeds");
    assert_eq!(updated.status, LeadStatus::Contacted);

    let history = store.history_for(&lead.id).expect("history readable");
    let entry = history.last().expect("correction entry present");
    assert!(entry.action.contains("manual status correction"));
}

#[test]
fn bare_flip_to_converted_is_rejected() {
    let (service, _, _) = build_service();
    let lead = lead_at_negociating(&service);

    // Conversion must travel through the settlement processor with payment
    // data, even for privileged roles.
    for actor in [seller(), admin()] {
        match service.change_status(&lead.id, LeadStatus::Converted, &actor, None) {
            Err(PipelineError::Transition(TransitionError::PaymentDataRequired)) => {}
            other => panic!("expected payment-data rejection, got {other:?}"),
        }
    }
}

#[test]
fn loss_requires_a_reason() {
    let (service, _, _) = build_service();
    let lead = registered_lead(&service);

    match service.change_status(&lead.id, LeadStatus::Lost, &seller(), None) {
        Err(PipelineError::Transition(TransitionError::MissingLossReason)) => {}
        other => panic!("expected missing-reason rejection, got {other:?}"),
    }
}

#[test]
fn loss_records_the_funnel_prefix() {
    let (service, _, _) = build_service();
    let lead = lead_at_negociating(&service);

    let lost = service
        .change_status(&lead.id, LeadStatus::Lost, &seller(), Some("chose a competitor"))
        .expect("loss applies");

    assert_eq!(lost.status, LeadStatus::Lost);
    assert_eq!(lost.loss_reason.as_deref(), Some("chose a competitor"));
    assert!(lost.lost_at.is_some());
    assert_eq!(
        lost.stages_before_loss,
        vec![
            LeadStatus::Pending,
            LeadStatus::Contacted,
            LeadStatus::Negociating
        ]
    );
}

#[test]
fn remarking_lost_overwrites_the_reason() {
    let (service, _, _) = build_service();
    let lead = lead_at_negociating(&service);

    let first = service
        .change_status(&lead.id, LeadStatus::Lost, &seller(), Some("no budget"))
        .expect("first loss applies");
    let second = service
        .change_status(&lead.id, LeadStatus::Lost, &seller(), Some("unreachable"))
        .expect("re-loss applies");

    assert_eq!(second.loss_reason.as_deref(), Some("unreachable"));
    assert_eq!(second.stages_before_loss, first.stages_before_loss);
}

#[test]
fn reopening_a_lost_lead_clears_the_loss_stamp() {
    let (service, _, _) = build_service();
    let lead = lead_at_negociating(&service);

    service
        .change_status(&lead.id, LeadStatus::Lost, &seller(), Some("no budget"))
        .expect("loss applies");
    let reopened = service
        .change_status(&lead.id, LeadStatus::Negociating, &admin(), None)
        .expect("admin reopens");

    assert_eq!(reopened.status, LeadStatus::Negociating);
    assert!(reopened.lost_at.is_none());
    assert!(reopened.loss_reason.is_none());
    assert!(reopened.stages_before_loss.is_empty());
}

#[test]
fn unknown_lead_is_not_found() {
    let (service, _, _) = build_service();

    match service.change_status(
        &LeadId("lead-missing".to_string()),
        LeadStatus::Contacted,
        &seller(),
        None,
    ) {
        Err(PipelineError::NotFound("lead")) => {}
        other => panic!("expected not-found, got {other:?}"),
    }
}

#[test]
fn notes_land_in_the_audit_trail() {
    let (service, _, _) = build_service();
    let lead = registered_lead(&service);

    service
        .append_note(&lead.id, "asked for the evening class", &seller())
        .expect("note appends");

    let history = service.history(&lead.id).expect("history readable");
    let note = history.last().expect("note entry present");
    assert_eq!(note.action, "note: asked for the evening class");
    assert_eq!(note.from, None);
    assert_eq!(note.to, None);
}

#[test]
fn empty_notes_are_rejected() {
    let (service, _, _) = build_service();
    let lead = registered_lead(&service);

    match service.append_note(&lead.id, "   ", &seller()) {
        Err(PipelineError::Validation(_)) => {}
        other => panic!("expected validation rejection, got {other:?}"),
    }
}

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    EnrollmentModality, Lead, LeadId, Money, PaymentMethod, PaymentMethodId,
};

/// Gross/fee/net split for a lead payment. Always satisfies
/// `amount = fee_amount + net_amount` exactly, since all three are cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub amount: Money,
    pub fee_amount: Money,
    pub net_amount: Money,
}

// Fee rates are carried as thousandths of a percent, so a percentage like
// 1.005 becomes the exact integer 1005.
const RATE_SCALE: i64 = 100_000;

/// Compute the payment-method fee on a gross amount, rounding the fee to
/// cents half away from zero; the net side absorbs the remainder.
///
/// The configured percentage is snapped to an integer rate once, and the
/// cent rounding happens in integer arithmetic, so half-cent boundaries
/// round the way the rule says instead of drifting on binary-float error.
pub fn split_fee(amount: Money, fee_percentage: f64) -> FeeBreakdown {
    let rate = (fee_percentage * 1_000.0).round() as i64;
    let numerator = amount.cents() * rate;
    let half = RATE_SCALE / 2;
    let fee_cents = if numerator >= 0 {
        (numerator + half) / RATE_SCALE
    } else {
        (numerator - half) / RATE_SCALE
    };
    let fee_amount = Money::from_cents(fee_cents);
    FeeBreakdown {
        amount,
        fee_amount,
        net_amount: amount - fee_amount,
    }
}

/// Everything the store needs to apply a conversion as one unit of work:
/// lead update, enrollment creation, ledger entry, and audit row commit or
/// roll back together.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionDraft {
    pub lead_id: LeadId,
    pub expected_version: u64,
    pub payment_method_id: PaymentMethodId,
    pub installments: u8,
    pub fees: FeeBreakdown,
    pub converted_at: DateTime<Utc>,
    pub modality: EnrollmentModality,
    pub start_date: NaiveDate,
    pub description: String,
}

/// Rejection raised while assembling a conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("payment method '{0}' is not accepting payments")]
    InactiveMethod(String),
    #[error("installments must be between 1 and {cap}, got {requested}")]
    InstallmentsOutOfRange { cap: u8, requested: u8 },
}

/// Assemble the settlement draft for a lead about to convert.
///
/// The committed amount defaults to the lead's quoted price, falling back to
/// the configured default when no price was ever quoted.
pub fn draft_conversion(
    lead: &Lead,
    method: &PaymentMethod,
    installments: u8,
    default_amount: Money,
    now: DateTime<Utc>,
) -> Result<ConversionDraft, SettlementError> {
    if !method.active {
        return Err(SettlementError::InactiveMethod(method.name.clone()));
    }
    if installments == 0 || installments > method.max_installments {
        return Err(SettlementError::InstallmentsOutOfRange {
            cap: method.max_installments,
            requested: installments,
        });
    }

    let amount = lead.quoted_price.unwrap_or(default_amount);
    let fees = split_fee(amount, method.fee_percentage);

    Ok(ConversionDraft {
        lead_id: lead.id.clone(),
        expected_version: lead.version,
        payment_method_id: method.id.clone(),
        installments,
        fees,
        converted_at: now,
        modality: EnrollmentModality::Online,
        start_date: now.date_naive(),
        description: format!("enrollment payment for lead {}", lead.id.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_split_matches_the_published_scenario() {
        // 999.90 at 2.99% -> fee 29.90, net 970.00.
        let fees = split_fee(Money::from_cents(99_990), 2.99);
        assert_eq!(fees.fee_amount, Money::from_cents(2_990));
        assert_eq!(fees.net_amount, Money::from_cents(97_000));
        assert_eq!(fees.amount, fees.fee_amount + fees.net_amount);
    }

    #[test]
    fn fee_split_is_exact_for_zero_percent() {
        let fees = split_fee(Money::from_cents(50_000), 0.0);
        assert_eq!(fees.fee_amount, Money::from_cents(0));
        assert_eq!(fees.net_amount, Money::from_cents(50_000));
    }

    #[test]
    fn fee_rounds_half_away_from_zero() {
        // 100.00 at 1.005% -> 100.5 cents -> 101.
        let fees = split_fee(Money::from_cents(10_000), 1.005);
        assert_eq!(fees.fee_amount, Money::from_cents(101));
        assert_eq!(fees.amount, fees.fee_amount + fees.net_amount);

        // 1.00 at 0.5% -> 0.5 cents -> 1.
        let fees = split_fee(Money::from_cents(100), 0.5);
        assert_eq!(fees.fee_amount, Money::from_cents(1));
        assert_eq!(fees.net_amount, Money::from_cents(99));
    }

    #[test]
    fn sub_half_fractions_round_down() {
        // 33.33 at 1% -> 33.33 cents -> 33.
        let fees = split_fee(Money::from_cents(3_333), 1.0);
        assert_eq!(fees.fee_amount, Money::from_cents(33));

        // 1.00 at 0.4% -> 0.4 cents -> 0; the net side absorbs it all.
        let fees = split_fee(Money::from_cents(100), 0.4);
        assert_eq!(fees.fee_amount, Money::from_cents(0));
        assert_eq!(fees.net_amount, Money::from_cents(100));
    }
}

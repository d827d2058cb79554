//! Balance reconciliation.
//!
//! Cross-checks the ending balance computed from the transaction table
//! against the one printed on the statement:
//!
//! ```text
//! computed = opening + Σdebit − Σcredit − Σfee − Σvat
//! ```

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::amount::format_amount;
use crate::models::statement::Transaction;

/// Largest difference, in currency units, accepted as rounding noise.
pub const TOLERANCE: Decimal = Decimal::ONE;

/// Column totals and the reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub total_fee: Decimal,
    pub total_vat: Decimal,
    pub computed_ending: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stated_ending: Option<Decimal>,
    /// Warning message when the balances disagree beyond [`TOLERANCE`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,
}

impl Reconciliation {
    /// Signed `computed - stated`, when a stated balance was provided.
    pub fn difference(&self) -> Option<Decimal> {
        stated_balance(self.stated_ending).map(|stated| self.computed_ending - stated)
    }

    pub fn is_balanced(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Zero means the statement did not print an ending balance.
fn stated_balance(stated: Option<Decimal>) -> Option<Decimal> {
    stated.filter(|b| !b.is_zero())
}

/// Compute totals and check the stated ending balance.
pub fn reconcile(
    opening_balance: Option<Decimal>,
    transactions: &[Transaction],
    stated_ending_balance: Option<Decimal>,
) -> Reconciliation {
    let total_debit: Decimal = transactions.iter().map(|t| t.debit).sum();
    let total_credit: Decimal = transactions.iter().map(|t| t.credit).sum();
    let total_fee: Decimal = transactions.iter().map(Transaction::fee_or_zero).sum();
    let total_vat: Decimal = transactions.iter().map(Transaction::vat_or_zero).sum();

    let computed_ending =
        opening_balance.unwrap_or_default() + total_debit - total_credit - total_fee - total_vat;

    let mismatch = stated_balance(stated_ending_balance).and_then(|stated| {
        let difference = computed_ending - stated;
        (difference.abs() > TOLERANCE).then(|| {
            format!(
                "Computed ending balance {} does not match statement ending balance {} (difference {})",
                format_amount(computed_ending),
                format_amount(stated),
                format_amount(difference),
            )
        })
    });

    Reconciliation {
        total_debit,
        total_credit,
        total_fee,
        total_vat,
        computed_ending,
        stated_ending: stated_ending_balance,
        mismatch,
    }
}

/// Warning message when the computed and stated ending balances disagree.
///
/// Returns `None` when no ending balance was stated (absent or zero) or the
/// difference is within [`TOLERANCE`].
pub fn calculate_mismatch(
    opening_balance: Option<Decimal>,
    transactions: &[Transaction],
    stated_ending_balance: Option<Decimal>,
) -> Option<String> {
    reconcile(opening_balance, transactions, stated_ending_balance).mismatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn tx(debit: i64, credit: i64, fee: Option<&str>, vat: Option<&str>) -> Transaction {
        Transaction {
            debit: Decimal::from(debit),
            credit: Decimal::from(credit),
            fee: fee.map(|f| Decimal::from_str(f).unwrap()),
            vat: vat.map(|v| Decimal::from_str(v).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_balanced_statement() {
        let txs = vec![tx(500, 0, Some("0"), Some("0"))];
        assert_eq!(
            calculate_mismatch(Some(Decimal::from(1000)), &txs, Some(Decimal::from(1500))),
            None
        );
    }

    #[test]
    fn test_mismatch_reports_values_and_difference() {
        let txs = vec![tx(500, 0, Some("0"), Some("0"))];
        let warning =
            calculate_mismatch(Some(Decimal::from(1000)), &txs, Some(Decimal::from(1400))).unwrap();

        assert!(warning.contains("1,500.00"), "{}", warning);
        assert!(warning.contains("1,400.00"), "{}", warning);
        assert!(warning.contains("difference 100.00"), "{}", warning);
    }

    #[test]
    fn test_negative_difference_is_signed() {
        let txs = vec![tx(0, 200, None, None)];
        let result = reconcile(Some(Decimal::from(1000)), &txs, Some(Decimal::from(900)));

        assert_eq!(result.computed_ending, Decimal::from(800));
        assert_eq!(result.difference(), Some(Decimal::from(-100)));
        assert!(result.mismatch.unwrap().contains("difference -100.00"));
    }

    #[test]
    fn test_absent_or_zero_stated_balance_skips_check() {
        let txs = vec![tx(500, 0, None, None)];
        assert_eq!(calculate_mismatch(Some(Decimal::from(1000)), &txs, None), None);
        assert_eq!(
            calculate_mismatch(Some(Decimal::from(1000)), &txs, Some(Decimal::ZERO)),
            None
        );
    }

    #[test]
    fn test_tolerance_boundary() {
        let txs = vec![tx(500, 0, None, None)];
        // Off by exactly one unit: accepted.
        assert_eq!(calculate_mismatch(None, &txs, Some(Decimal::from(501))), None);
        // Off by slightly more: flagged.
        assert!(calculate_mismatch(None, &txs, Some(Decimal::from_str("501.01").unwrap())).is_some());
    }

    #[test]
    fn test_fees_and_vat_reduce_balance() {
        let txs = vec![
            tx(1000, 0, Some("10"), Some("1")),
            tx(0, 300, None, Some("0.5")),
        ];
        let result = reconcile(Some(Decimal::from(100)), &txs, Some(Decimal::from_str("788.5").unwrap()));

        assert_eq!(result.total_fee, Decimal::from(10));
        assert_eq!(result.total_vat, Decimal::from_str("1.5").unwrap());
        assert_eq!(result.computed_ending, Decimal::from_str("788.5").unwrap());
        assert!(result.is_balanced());
    }

    #[test]
    fn test_missing_opening_balance_counts_as_zero() {
        let txs = vec![tx(50, 0, None, None)];
        assert!(calculate_mismatch(None, &txs, Some(Decimal::from(1000))).is_some());
        assert_eq!(reconcile(None, &txs, None).computed_ending, Decimal::from(50));
    }
}

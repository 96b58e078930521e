use crate::models::{ChurnRisk, PatientSegment};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean days between consecutive visits, given visit dates sorted ascending
/// as day offsets. Fewer than two visits yields zero.
pub fn avg_days_between(sorted_days: &[i64]) -> f64 {
    if sorted_days.len() < 2 {
        return 0.0;
    }
    let gaps: Vec<i64> = sorted_days.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.iter().sum::<i64>() as f64 / gaps.len() as f64
}

/// Risk of the patient not coming back. A patient overdue by more than twice
/// their usual cadence is high risk; 1.5x is medium. Patients with under
/// three visits have not built a habit yet.
pub fn churn_risk(visits: usize, avg_days: f64, days_since_last: Option<i64>) -> ChurnRisk {
    let Some(days_since_last) = days_since_last else {
        return ChurnRisk::High;
    };

    if avg_days > 0.0 {
        let ratio = days_since_last as f64 / avg_days;
        if ratio > 2.0 {
            return ChurnRisk::High;
        }
        if ratio > 1.5 {
            return ChurnRisk::Medium;
        }
    }

    if visits < 3 {
        return ChurnRisk::Medium;
    }

    ChurnRisk::Low
}

/// Projects spend over the next twelve months from the observed cadence and
/// mean ticket.
pub fn predict_ltv_12m(current_ltv: f64, visits: usize, avg_days: f64) -> f64 {
    if visits == 0 || avg_days == 0.0 {
        return 0.0;
    }

    let expected_visits = 365.0 / avg_days;
    let avg_per_visit = current_ltv / visits as f64;
    round2(expected_visits * avg_per_visit)
}

pub fn classify_segment(ltv: f64, visits: usize, avg_days: f64) -> PatientSegment {
    let value_category = if ltv >= 2000.0 {
        "high"
    } else if ltv >= 500.0 {
        "medium"
    } else {
        "low"
    };

    let frequency = if avg_days > 0.0 && avg_days <= 90.0 {
        "frequent"
    } else if avg_days > 0.0 && avg_days <= 180.0 {
        "regular"
    } else {
        "occasional"
    };

    let loyalty_score = (visits as f64 * 10.0 + ltv / 50.0).min(100.0);

    let avg_ticket = if visits > 0 { ltv / visits as f64 } else { 0.0 };
    let price_sensitivity = if avg_ticket >= 200.0 {
        "low"
    } else if avg_ticket >= 80.0 {
        "medium"
    } else {
        "high"
    };

    PatientSegment {
        value_category: value_category.to_string(),
        frequency: frequency.to_string(),
        loyalty_score: round2(loyalty_score),
        price_sensitivity: price_sensitivity.to_string(),
    }
}

pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round2(part / whole * 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_visits_is_high_risk() {
        assert_eq!(churn_risk(0, 0.0, None), ChurnRisk::High);
    }

    #[test]
    fn overdue_patient_escalates_risk() {
        // Usual cadence 60 days
        assert_eq!(churn_risk(5, 60.0, Some(50)), ChurnRisk::Low);
        assert_eq!(churn_risk(5, 60.0, Some(100)), ChurnRisk::Medium);
        assert_eq!(churn_risk(5, 60.0, Some(130)), ChurnRisk::High);
    }

    #[test]
    fn few_visits_without_overdue_is_medium() {
        assert_eq!(churn_risk(2, 60.0, Some(30)), ChurnRisk::Medium);
    }

    #[test]
    fn ltv_projection_scales_with_cadence() {
        // 4 visits worth 400 total, one visit every 73 days => 5 visits/year
        let predicted = predict_ltv_12m(400.0, 4, 73.0);
        assert_eq!(predicted, 500.0);
    }

    #[test]
    fn ltv_projection_is_zero_without_history() {
        assert_eq!(predict_ltv_12m(0.0, 0, 0.0), 0.0);
        assert_eq!(predict_ltv_12m(100.0, 2, 0.0), 0.0);
    }

    #[test]
    fn classifies_high_value_frequent_patient() {
        let segment = classify_segment(2400.0, 8, 45.0);
        assert_eq!(segment.value_category, "high");
        assert_eq!(segment.frequency, "frequent");
        assert_eq!(segment.loyalty_score, 100.0);
        assert_eq!(segment.price_sensitivity, "low");
    }

    #[test]
    fn classifies_low_value_occasional_patient() {
        let segment = classify_segment(120.0, 2, 200.0);
        assert_eq!(segment.value_category, "low");
        assert_eq!(segment.frequency, "occasional");
        assert_eq!(segment.price_sensitivity, "high");
    }

    #[test]
    fn averages_gaps_between_visits() {
        assert_eq!(avg_days_between(&[0, 30, 90]), 45.0);
        assert_eq!(avg_days_between(&[10]), 0.0);
    }

    #[test]
    fn percentage_guards_division_by_zero() {
        assert_eq!(percentage(1.0, 0.0), 0.0);
        assert_eq!(percentage(25.0, 50.0), 50.0);
    }
}

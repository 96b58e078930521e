use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::AnalyticsError;
use crate::services::metrics;

const INVOICES: &str = "facturas";
const APPOINTMENTS: &str = "appointments";
const PATIENTS: &str = "patients";

fn billable_filter() -> Value {
    json!({ "$in": ["issued", "paid"] })
}

pub struct AnalyticsService {
    store: DocumentStore,
}

impl AnalyticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn db_err(e: anyhow::Error) -> AnalyticsError {
        AnalyticsError::DatabaseError(e.to_string())
    }

    fn period(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, default_days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = to.unwrap_or_else(Utc::now);
        let start = from.unwrap_or(end - Duration::days(default_days));
        (start, end)
    }

    /// Revenue earned in a date range, straight from a `$group` pipeline.
    async fn revenue_in_period(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<f64, AnalyticsError> {
        let result = self
            .store
            .aggregate(
                INVOICES,
                json!([
                    { "$match": {
                        "issue_date": { "$gte": start, "$lte": end },
                        "status": billable_filter()
                    } },
                    { "$group": { "_id": Value::Null, "total": { "$sum": "$total" } } }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(result
            .first()
            .and_then(|doc| doc.get("total"))
            .and_then(|t| t.as_f64())
            .unwrap_or(0.0))
    }

    async fn monthly_revenue_pipeline(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<Value>, AnalyticsError> {
        let rows = self
            .store
            .aggregate(
                INVOICES,
                json!([
                    { "$match": { "issue_date": { "$gte": start, "$lte": end } } },
                    { "$group": {
                        "_id": {
                            "year": { "$year": { "$toDate": "$issue_date" } },
                            "month": { "$month": { "$toDate": "$issue_date" } }
                        },
                        "revenue": { "$sum": "$total" },
                        "invoices": { "$sum": 1 }
                    } },
                    { "$sort": { "_id.year": 1, "_id.month": 1 } }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let year = row["_id"]["year"].as_i64().unwrap_or(0);
                let month = row["_id"]["month"].as_i64().unwrap_or(0);
                json!({
                    "month": format!("{}-{:02}", year, month),
                    "revenue": metrics::round2(row["revenue"].as_f64().unwrap_or(0.0)),
                    "invoices": row["invoices"].as_i64().unwrap_or(0)
                })
            })
            .collect())
    }

    pub async fn overview(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, AnalyticsError> {
        let (start, end) = Self::period(from, to, 30);
        debug!("Computing analytics overview for {} to {}", start, end);

        let total_patients = self
            .store
            .count(PATIENTS, json!({}))
            .await
            .map_err(Self::db_err)?;
        let invoices_in_period = self
            .store
            .count(INVOICES, json!({ "issue_date": { "$gte": start, "$lte": end } }))
            .await
            .map_err(Self::db_err)?;
        let revenue = self.revenue_in_period(&start, &end).await?;

        let funnel = self.conversion_funnel(Some(start), Some(end)).await?;
        let conversion_rate = funnel["overall_conversion_rate"].as_f64().unwrap_or(0.0);

        // Top five treatments by billed revenue
        let top_treatments = self
            .store
            .aggregate(
                INVOICES,
                json!([
                    { "$match": {
                        "issue_date": { "$gte": start, "$lte": end },
                        "status": billable_filter()
                    } },
                    { "$unwind": "$lines" },
                    { "$group": {
                        "_id": "$lines.concept",
                        "count": { "$sum": 1 },
                        "revenue": { "$sum": "$lines.line_total" }
                    } },
                    { "$sort": { "revenue": -1 } },
                    { "$limit": 5 }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let monthly_trend = self.monthly_revenue_pipeline(&start, &end).await?;

        Ok(json!({
            "period": { "from": start, "to": end },
            "kpis": {
                "total_patients": total_patients,
                "invoices_issued": invoices_in_period,
                "total_revenue": metrics::round2(revenue),
                "mean_ticket": if invoices_in_period > 0 {
                    metrics::round2(revenue / invoices_in_period as f64)
                } else {
                    0.0
                },
                "conversion_rate": conversion_rate
            },
            "top_treatments": top_treatments
                .into_iter()
                .map(|t| json!({
                    "treatment": t["_id"],
                    "count": t["count"],
                    "revenue": metrics::round2(t["revenue"].as_f64().unwrap_or(0.0))
                }))
                .collect::<Vec<Value>>(),
            "monthly_trend": monthly_trend
        }))
    }

    /// Per-patient analytics: LTV over billed invoices, visit cadence, churn
    /// risk, segment and projected spend.
    pub async fn patient_analytics(&self, patient_id: &str) -> Result<Value, AnalyticsError> {
        let id = Uuid::parse_str(patient_id).map_err(|_| AnalyticsError::InvalidId)?;

        let patient = self
            .store
            .find_one(PATIENTS, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(AnalyticsError::PatientNotFound)?;
        let patient_name = patient
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();

        let appointments = self
            .store
            .find(
                APPOINTMENTS,
                json!({ "patient_id": patient_id }),
                Some(json!({ "date": 1 })),
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;
        let total_visits = appointments.len();

        let visit_days: Vec<i64> = appointments
            .iter()
            .filter_map(|a| a.get("date"))
            .filter_map(|d| d.as_str())
            .filter_map(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc).timestamp() / 86_400)
            .collect();
        let avg_days = metrics::avg_days_between(&visit_days);
        let days_since_last = visit_days
            .last()
            .map(|last| Utc::now().timestamp() / 86_400 - last);

        // Invoices are linked to patients by receiver name
        let invoices = self
            .store
            .find(
                INVOICES,
                json!({
                    "receiver.full_name": patient_name,
                    "status": billable_filter()
                }),
                Some(json!({ "issue_date": -1 })),
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;

        let ltv: f64 = invoices
            .iter()
            .filter_map(|f| f.get("total"))
            .filter_map(|t| t.as_f64())
            .sum();

        let churn = metrics::churn_risk(total_visits, avg_days, days_since_last);
        let segment = metrics::classify_segment(ltv, total_visits, avg_days);

        let invoice_history: Vec<Value> = invoices
            .iter()
            .take(10)
            .map(|f| {
                json!({
                    "issue_date": f.get("issue_date"),
                    "total": f.get("total"),
                    "status": f.get("status")
                })
            })
            .collect();

        Ok(json!({
            "patient_id": patient_id,
            "name": patient_name,
            "lifetime_value": metrics::round2(ltv),
            "churn_risk": churn,
            "segment": segment,
            "total_visits": total_visits,
            "avg_days_between_visits": metrics::round2(avg_days),
            "predicted_ltv_12m": metrics::predict_ltv_12m(ltv, total_visits, avg_days),
            "total_invoices": invoices.len(),
            "invoice_history": invoice_history
        }))
    }

    /// Ranking of patients by billed spend, grouped by receiver name and
    /// enriched from the patient records.
    pub async fn ltv_ranking(&self, limit: i64) -> Result<Value, AnalyticsError> {
        let limit = limit.clamp(1, 100);

        let rows = self
            .store
            .aggregate(
                INVOICES,
                json!([
                    { "$match": { "status": billable_filter() } },
                    { "$group": {
                        "_id": "$receiver.full_name",
                        "total_spent": { "$sum": "$total" },
                        "invoice_count": { "$sum": 1 }
                    } },
                    { "$sort": { "total_spent": -1 } },
                    { "$limit": limit }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let mut ranking = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row["_id"].as_str().unwrap_or_default().to_string();
            let patient = self
                .store
                .find_one(PATIENTS, json!({ "name": name }))
                .await
                .map_err(Self::db_err)?;

            if let Some(patient) = patient {
                ranking.push(json!({
                    "patient_id": patient.get("_id"),
                    "name": name,
                    "email": patient.get("email"),
                    "phone": patient.get("phone"),
                    "lifetime_value": metrics::round2(row["total_spent"].as_f64().unwrap_or(0.0)),
                    "invoice_count": row["invoice_count"]
                }));
            }
        }

        Ok(json!({ "ranking": ranking }))
    }

    /// Funnel over a period: inquiries, scheduled and completed
    /// appointments, and billed invoices.
    pub async fn conversion_funnel(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, AnalyticsError> {
        let (start, end) = Self::period(from, to, 30);

        let scheduled = self
            .store
            .count(
                APPOINTMENTS,
                json!({ "date": { "$gte": start, "$lte": end } }),
            )
            .await
            .map_err(Self::db_err)?;
        let completed = self
            .store
            .count(
                APPOINTMENTS,
                json!({
                    "date": { "$gte": start, "$lte": end },
                    "status": "completed"
                }),
            )
            .await
            .map_err(Self::db_err)?;
        let billed = self
            .store
            .count(
                INVOICES,
                json!({
                    "issue_date": { "$gte": start, "$lte": end },
                    "status": billable_filter()
                }),
            )
            .await
            .map_err(Self::db_err)?;

        // Inbound conversations are the closest recorded proxy for inquiries.
        let inquiries = self
            .store
            .count(
                "conversations",
                json!({ "created_at": { "$gte": start, "$lte": end } }),
            )
            .await
            .map_err(Self::db_err)?
            .max(scheduled);

        Ok(json!({
            "period": { "from": start, "to": end },
            "inquiries": inquiries,
            "scheduled_appointments": scheduled,
            "completed_appointments": completed,
            "billed_invoices": billed,
            "inquiry_to_appointment_rate": metrics::percentage(scheduled as f64, inquiries as f64),
            "appointment_to_completion_rate": metrics::percentage(completed as f64, scheduled as f64),
            "completion_to_billing_rate": metrics::percentage(billed as f64, completed as f64),
            "overall_conversion_rate": metrics::percentage(billed as f64, inquiries as f64)
        }))
    }

    /// ROI per treatment concept. Costs are modelled as fixed shares of
    /// revenue: 15% materials, 25% practitioner time, 10% overhead.
    pub async fn treatment_roi(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, AnalyticsError> {
        let (start, end) = Self::period(from, to, 90);

        let rows = self
            .store
            .aggregate(
                INVOICES,
                json!([
                    { "$match": {
                        "issue_date": { "$gte": start, "$lte": end },
                        "status": billable_filter()
                    } },
                    { "$unwind": "$lines" },
                    { "$group": {
                        "_id": "$lines.concept",
                        "revenue": { "$sum": "$lines.line_total" },
                        "count": { "$sum": 1 }
                    } },
                    { "$sort": { "revenue": -1 } }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let roi: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let revenue = row["revenue"].as_f64().unwrap_or(0.0);
                let count = row["count"].as_i64().unwrap_or(0);

                let materials = revenue * 0.15;
                let practitioner_time = revenue * 0.25;
                let overhead = revenue * 0.10;
                let total_costs = materials + practitioner_time + overhead;
                let gross_profit = revenue - total_costs;

                json!({
                    "treatment": row["_id"],
                    "total_revenue": metrics::round2(revenue),
                    "treatment_count": count,
                    "avg_revenue": if count > 0 { metrics::round2(revenue / count as f64) } else { 0.0 },
                    "costs": {
                        "materials": metrics::round2(materials),
                        "practitioner_time": metrics::round2(practitioner_time),
                        "overhead": metrics::round2(overhead)
                    },
                    "total_costs": metrics::round2(total_costs),
                    "gross_profit": metrics::round2(gross_profit),
                    "profit_margin_pct": metrics::percentage(gross_profit, revenue),
                    "roi_pct": metrics::percentage(gross_profit, total_costs)
                })
            })
            .collect();

        Ok(json!({ "period": { "from": start, "to": end }, "treatments": roi }))
    }

    /// Performance per doctor: appointment volume, completion rate, and
    /// revenue attributed through invoices linked to their appointments.
    pub async fn doctor_performance(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, AnalyticsError> {
        let (start, end) = Self::period(from, to, 30);

        let appointments = self
            .store
            .find(
                APPOINTMENTS,
                json!({ "date": { "$gte": start, "$lte": end } }),
                None,
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;

        let invoices = self
            .store
            .find(
                INVOICES,
                json!({
                    "issue_date": { "$gte": start, "$lte": end },
                    "status": billable_filter(),
                    "appointment_id": { "$ne": Value::Null }
                }),
                None,
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;

        let mut by_doctor: std::collections::HashMap<String, (i64, i64, f64)> =
            std::collections::HashMap::new();

        let mut appointment_doctor: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();

        for appt in &appointments {
            let doctor = appt
                .get("doctor")
                .and_then(|d| d.as_str())
                .unwrap_or("unknown")
                .to_string();
            let entry = by_doctor.entry(doctor.clone()).or_insert((0, 0, 0.0));
            entry.0 += 1;
            if appt.get("status").and_then(|s| s.as_str()) == Some("completed") {
                entry.1 += 1;
            }
            if let Some(id) = appt.get("_id").and_then(|i| i.as_str()) {
                appointment_doctor.insert(id.to_string(), doctor);
            }
        }

        for invoice in &invoices {
            let Some(appt_id) = invoice.get("appointment_id").and_then(|i| i.as_str()) else {
                continue;
            };
            if let Some(doctor) = appointment_doctor.get(appt_id) {
                if let Some(entry) = by_doctor.get_mut(doctor) {
                    entry.2 += invoice.get("total").and_then(|t| t.as_f64()).unwrap_or(0.0);
                }
            }
        }

        let mut performance: Vec<Value> = by_doctor
            .into_iter()
            .map(|(doctor, (total, completed, revenue))| {
                json!({
                    "doctor": doctor,
                    "total_appointments": total,
                    "completed_appointments": completed,
                    "completion_rate": metrics::percentage(completed as f64, total as f64),
                    "attributed_revenue": metrics::round2(revenue)
                })
            })
            .collect();
        performance.sort_by(|a, b| {
            let ra = a["attributed_revenue"].as_f64().unwrap_or(0.0);
            let rb = b["attributed_revenue"].as_f64().unwrap_or(0.0);
            rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(json!({ "period": { "from": start, "to": end }, "doctors": performance }))
    }

    /// Twelve month revenue series plus year-over-year growth.
    pub async fn trends(&self) -> Result<Value, AnalyticsError> {
        let end = Utc::now();
        let start = end - Duration::days(365);

        let series = self.monthly_revenue_pipeline(&start, &end).await?;

        let growth_rate = if series.len() >= 2 {
            let first = series[0]["revenue"].as_f64().unwrap_or(0.0);
            let last = series[series.len() - 1]["revenue"].as_f64().unwrap_or(0.0);
            if first > 0.0 {
                metrics::round2((last - first) / first * 100.0)
            } else {
                0.0
            }
        } else {
            0.0
        };

        Ok(json!({
            "trends": series,
            "annual_growth_rate": growth_rate
        }))
    }

    /// Today's live counters.
    pub async fn realtime(&self) -> Result<Value, AnalyticsError> {
        let now = Utc::now();
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);

        let appointments_today = self
            .store
            .count(APPOINTMENTS, json!({ "date": { "$gte": today_start } }))
            .await
            .map_err(Self::db_err)?;

        let revenue_today = self.revenue_in_period(&today_start, &now).await?;

        let week_start =
            today_start - Duration::days(now.date_naive().weekday().num_days_from_monday() as i64);
        let new_patients_week = self
            .store
            .count(PATIENTS, json!({ "created_at": { "$gte": week_start } }))
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "timestamp": now,
            "metrics": {
                "appointments_today": appointments_today,
                "revenue_today": metrics::round2(revenue_today),
                "new_patients_this_week": new_patients_week
            }
        }))
    }
}

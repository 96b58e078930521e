use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    validate_appointment_fields, Appointment, AppointmentError, AppointmentListQuery,
    AppointmentStats, CreateAppointmentRequest, UpdateAppointmentRequest,
};

const COLLECTION: &str = "appointments";

pub struct AppointmentService {
    store: DocumentStore,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(appointment_id: &str) -> Result<Uuid, AppointmentError> {
        Uuid::parse_str(appointment_id).map_err(|_| AppointmentError::InvalidId)
    }

    pub async fn list_appointments(
        &self,
        query: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);

        let mut filter = serde_json::Map::new();
        if let Some(doctor) = query.doctor {
            filter.insert("doctor".to_string(), json!(doctor));
        }
        if let Some(status) = query.status {
            filter.insert("status".to_string(), json!(status));
        }
        if query.date_from.is_some() || query.date_to.is_some() {
            let mut range = serde_json::Map::new();
            if let Some(from) = query.date_from {
                range.insert("$gte".to_string(), json!(from));
            }
            if let Some(to) = query.date_to {
                range.insert("$lte".to_string(), json!(to));
            }
            filter.insert("date".to_string(), Value::Object(range));
        }

        let documents = self
            .store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "date": 1 })),
                Some(skip),
                Some(limit),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc)
                    .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn get_stats(&self) -> Result<AppointmentStats, AppointmentError> {
        let today_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        let db_err = |e: anyhow::Error| AppointmentError::DatabaseError(e.to_string());

        let total = self.store.count(COLLECTION, json!({})).await.map_err(db_err)?;
        let today = self
            .store
            .count(COLLECTION, json!({ "date": { "$gte": today_start } }))
            .await
            .map_err(db_err)?;
        let completed = self
            .store
            .count(COLLECTION, json!({ "status": "completed" }))
            .await
            .map_err(db_err)?;
        let scheduled = self
            .store
            .count(COLLECTION, json!({ "status": "scheduled" }))
            .await
            .map_err(db_err)?;
        let cancelled = self
            .store
            .count(COLLECTION, json!({ "status": "cancelled" }))
            .await
            .map_err(db_err)?;

        Ok(AppointmentStats {
            total,
            today,
            completed,
            scheduled,
            cancelled,
        })
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Appointment, AppointmentError> {
        let id = Self::parse_id(appointment_id)?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::NotFound)?;

        serde_json::from_value(document)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_appointment_fields(
            Some(&request.title),
            Some(&request.hora),
            Some(request.duration_minutes),
        )?;

        let patient_id = Uuid::parse_str(&request.patient_id)
            .map_err(|_| AppointmentError::InvalidPatientId)?;

        let patient = self
            .store
            .find_one("patients", json!({ "_id": patient_id }))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        if patient.is_none() {
            return Err(AppointmentError::PatientNotFound);
        }

        debug!("Creating appointment '{}' for patient {}", request.title, request.patient_id);

        let id = Uuid::new_v4();
        let document = json!({
            "_id": id,
            "patient_id": request.patient_id,
            "title": request.title,
            "date": request.date,
            "hora": request.hora,
            "duration_minutes": request.duration_minutes,
            "status": request.status,
            "doctor": request.doctor,
            "treatment_type": request.treatment_type,
            "reminder_enabled": request.reminder_enabled,
            "created_at": Utc::now()
        });

        self.store
            .insert_one(COLLECTION, document)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        self.get_appointment(&id.to_string()).await
    }

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let id = Self::parse_id(appointment_id)?;

        validate_appointment_fields(
            request.title.as_deref(),
            request.hora.as_deref(),
            request.duration_minutes,
        )?;

        let mut update_data = serde_json::Map::new();
        if let Some(patient_id) = request.patient_id {
            update_data.insert("patient_id".to_string(), json!(patient_id));
        }
        if let Some(title) = request.title {
            update_data.insert("title".to_string(), json!(title));
        }
        if let Some(date) = request.date {
            update_data.insert("date".to_string(), json!(date));
        }
        if let Some(hora) = request.hora {
            update_data.insert("hora".to_string(), json!(hora));
        }
        if let Some(minutes) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(minutes));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(doctor) = request.doctor {
            update_data.insert("doctor".to_string(), json!(doctor));
        }
        if let Some(treatment_type) = request.treatment_type {
            update_data.insert("treatment_type".to_string(), json!(treatment_type));
        }
        if let Some(reminder_enabled) = request.reminder_enabled {
            update_data.insert("reminder_enabled".to_string(), json!(reminder_enabled));
        }

        if update_data.is_empty() {
            return Err(AppointmentError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        let matched = self
            .store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if matched == 0 {
            return Err(AppointmentError::NotFound);
        }

        self.get_appointment(appointment_id).await
    }

    pub async fn delete_appointment(&self, appointment_id: &str) -> Result<(), AppointmentError> {
        let id = Self::parse_id(appointment_id)?;

        let deleted = self
            .store
            .delete_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if deleted == 0 {
            return Err(AppointmentError::NotFound);
        }

        Ok(())
    }
}

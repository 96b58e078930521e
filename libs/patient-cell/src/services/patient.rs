use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    validate_patient_fields, CreatePatientRequest, Patient, PatientError, PatientListQuery,
    UpdatePatientRequest,
};

const COLLECTION: &str = "patients";

pub struct PatientService {
    store: DocumentStore,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(patient_id: &str) -> Result<Uuid, PatientError> {
        Uuid::parse_str(patient_id).map_err(|_| PatientError::InvalidId)
    }

    pub async fn list_patients(&self, query: PatientListQuery) -> Result<Vec<Patient>, PatientError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);

        let filter = match query.search {
            Some(ref term) if !term.is_empty() => json!({
                "$or": [
                    { "name": { "$regex": term, "$options": "i" } },
                    { "phone": { "$regex": term, "$options": "i" } },
                    { "email": { "$regex": term, "$options": "i" } }
                ]
            }),
            _ => json!({}),
        };

        let documents = self
            .store
            .find(COLLECTION, filter, None, Some(skip), Some(limit))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| PatientError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient, PatientError> {
        let id = Self::parse_id(patient_id)?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)?;

        serde_json::from_value(document).map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        validate_patient_fields(
            Some(&request.name),
            Some(&request.phone),
            request.email.as_deref(),
        )?;

        debug!("Creating patient: {}", request.name);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let document = json!({
            "_id": id,
            "name": request.name,
            "phone": request.phone,
            "email": request.email,
            "notes": request.notes,
            "whatsapp_registered": request.whatsapp_registered,
            "created_at": now,
            "updated_at": now
        });

        self.store
            .insert_one(COLLECTION, document)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        self.get_patient(&id.to_string()).await
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let id = Self::parse_id(patient_id)?;

        validate_patient_fields(
            request.name.as_deref(),
            request.phone.as_deref(),
            request.email.as_deref(),
        )?;

        let mut update_data = serde_json::Map::new();
        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(whatsapp_registered) = request.whatsapp_registered {
            update_data.insert("whatsapp_registered".to_string(), json!(whatsapp_registered));
        }

        if update_data.is_empty() {
            return Err(PatientError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let matched = self
            .store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if matched == 0 {
            return Err(PatientError::NotFound);
        }

        self.get_patient(patient_id).await
    }

    pub async fn delete_patient(&self, patient_id: &str) -> Result<(), PatientError> {
        let id = Self::parse_id(patient_id)?;

        let deleted = self
            .store
            .delete_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if deleted == 0 {
            return Err(PatientError::NotFound);
        }

        Ok(())
    }

    /// Patient record together with their appointments, newest first.
    pub async fn get_patient_history(&self, patient_id: &str) -> Result<Value, PatientError> {
        let patient = self.get_patient(patient_id).await?;

        let appointments = self
            .store
            .find(
                "appointments",
                json!({ "patient_id": patient_id }),
                Some(json!({ "date": -1 })),
                None,
                None,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        Ok(json!({
            "patient": patient,
            "appointments": appointments
        }))
    }
}

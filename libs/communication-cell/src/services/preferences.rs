use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    BulkPreferenceUpdate, CommunicationError, PatientPreferences, PreferencesRequest,
};

const COLLECTION: &str = "patient_communication_preferences";
const PATIENTS: &str = "patients";

pub struct PreferencesService {
    store: DocumentStore,
}

impl PreferencesService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    async fn assert_patient_exists(&self, patient_id: &str) -> Result<(), CommunicationError> {
        let id = Uuid::parse_str(patient_id).map_err(|_| CommunicationError::InvalidId)?;
        self.store
            .find_one(PATIENTS, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(CommunicationError::PatientNotFound)?;
        Ok(())
    }

    /// Stored preferences, or the defaults when the patient never saved any.
    pub async fn get(&self, patient_id: &str) -> Result<PatientPreferences, CommunicationError> {
        self.assert_patient_exists(patient_id).await?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "patient_id": patient_id }))
            .await
            .map_err(Self::db_err)?;

        match document {
            Some(doc) => serde_json::from_value(doc).map_err(|e| Self::db_err(e.into())),
            None => Ok(PatientPreferences::defaults(patient_id)),
        }
    }

    pub async fn upsert(
        &self,
        patient_id: &str,
        request: PreferencesRequest,
    ) -> Result<PatientPreferences, CommunicationError> {
        self.assert_patient_exists(patient_id).await?;
        self.write(patient_id, request).await?;
        self.get(patient_id).await
    }

    async fn write(
        &self,
        patient_id: &str,
        request: PreferencesRequest,
    ) -> Result<(), CommunicationError> {
        self.store
            .upsert_one(
                COLLECTION,
                json!({ "patient_id": patient_id }),
                json!({ "$set": {
                    "patient_id": patient_id,
                    "preferred_channels": request.preferred_channels,
                    "communication_types": request.communication_types,
                    "frequency_limits": request.frequency_limits,
                    "language_preference": request.language_preference,
                    "updated_at": Utc::now(),
                    "updated_by": request.updated_by.unwrap_or_else(|| "system".to_string())
                } }),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Bulk upsert. Entries for unknown patients are skipped, not failed.
    pub async fn bulk_update(
        &self,
        updates: Vec<BulkPreferenceUpdate>,
    ) -> Result<Value, CommunicationError> {
        let total = updates.len();
        let mut updated = 0usize;

        for update in updates {
            if self.assert_patient_exists(&update.patient_id).await.is_err() {
                continue;
            }
            self.write(&update.patient_id, update.preferences).await?;
            updated += 1;
        }

        Ok(json!({
            "success": true,
            "updated_count": updated,
            "total": total
        }))
    }
}

#![forbid(unsafe_code)]

use super::ResourceManager;
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::PolicyStore;
use crate::store::{insert_profile_tx, profile_by_subject, update_profile_data_tx};
use crate::types::Profile;
use cms_core::ids::SubjectId;

const MAX_EMAIL_LEN: usize = 254;

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// Registers a profile. The email cannot change afterwards.
    pub fn create_profile(
        &mut self,
        subject: SubjectId,
        email: &str,
        data: serde_json::Value,
    ) -> Result<Profile, StoreError> {
        let email = normalize_email(email)?;
        let data_json = profile_data_json(&data)?;

        let tx = self.store.write_tx()?;
        insert_profile_tx(&tx, subject, &email, &data_json)?;
        tx.commit()?;
        tracing::info!(subject = %subject, "profile created");

        Ok(Profile {
            subject,
            email,
            data,
        })
    }

    pub fn get_profile(&self, subject: SubjectId) -> Result<Profile, StoreError> {
        let (email, data_json) =
            profile_by_subject(self.store.conn(), subject)?.ok_or(StoreError::NotFound)?;
        Ok(Profile {
            subject,
            email,
            data: serde_json::from_str(&data_json)?,
        })
    }

    /// Replaces the profile data wholesale.
    pub fn update_profile(
        &mut self,
        subject: SubjectId,
        data: serde_json::Value,
    ) -> Result<Profile, StoreError> {
        let data_json = profile_data_json(&data)?;

        let tx = self.store.write_tx()?;
        if update_profile_data_tx(&tx, subject, &data_json)? == 0 {
            return Err(StoreError::NotFound);
        }
        let (email, _) = profile_by_subject(&tx, subject)?.ok_or(StoreError::NotFound)?;
        tx.commit()?;
        tracing::info!(subject = %subject, "profile updated");

        Ok(Profile {
            subject,
            email,
            data,
        })
    }
}

fn profile_data_json(data: &serde_json::Value) -> Result<String, StoreError> {
    if !data.is_object() {
        return Err(StoreError::InvalidInput("profile data must be a JSON object"));
    }
    Ok(serde_json::to_string(data)?)
}

fn normalize_email(raw: &str) -> Result<String, StoreError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(StoreError::InvalidInput("email must not be empty"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(StoreError::InvalidInput("email is too long"));
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::InvalidInput("email must not contain whitespace"));
    }
    match email.split_once('@') {
        Some((local, host)) if !local.is_empty() && !host.is_empty() && !host.contains('@') => {
            Ok(email.to_string())
        }
        _ => Err(StoreError::InvalidInput("email must look like local@host")),
    }
}

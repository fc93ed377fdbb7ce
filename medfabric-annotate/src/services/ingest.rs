//! Corpus ingestion: patients, image sets and their slices
//!
//! Each entity goes through the same validated operation whether it arrives
//! one at a time or from a JSON manifest. Manifest ingestion runs all of them
//! on the caller's transaction so a bad entry leaves nothing behind.

use medfabric_common::db::models::{Gender, Image, ImageSet, Patient};
use medfabric_common::{Error, ImageError, ImageSetError, PatientError, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::db::{image_sets, images, patients};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestManifest {
    #[serde(default)]
    pub patients: Vec<PatientEntry>,
    #[serde(default)]
    pub image_sets: Vec<ImageSetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientEntry {
    pub patient_id: String,
    pub category: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSetEntry {
    pub image_set_id: String,
    pub num_images: i64,
    pub patient_id: Option<String>,
    pub folder_path: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageEntry {
    pub image_id: String,
    pub slice_index: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub patients: usize,
    pub image_sets: usize,
    pub images: usize,
}

impl IngestManifest {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::InvalidInput(format!("Malformed ingest manifest: {}", e)))
    }
}

pub async fn add_patient(conn: &mut SqliteConnection, patient: Patient) -> Result<Patient> {
    if patient.patient_id.trim().is_empty() {
        return Err(PatientError::Invalid("patient id must not be empty".to_string()).into());
    }
    if patient.age.is_some_and(|age| age < 0) {
        return Err(PatientError::Invalid(format!("negative age for {}", patient.patient_id)).into());
    }
    if patients::exists(conn, &patient.patient_id).await? {
        return Err(PatientError::AlreadyExists(patient.patient_id).into());
    }

    patients::insert_patient(conn, &patient).await?;
    tracing::debug!(patient_id = %patient.patient_id, "Patient added");
    Ok(patient)
}

pub async fn add_image_set(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    num_images: i64,
    folder_path: Option<&str>,
    patient_id: Option<&str>,
    description: Option<&str>,
) -> Result<ImageSet> {
    if image_set_id.trim().is_empty() {
        return Err(ImageSetError::Invalid("image set id must not be empty".to_string()).into());
    }
    if num_images <= 0 {
        return Err(ImageSetError::Invalid(format!(
            "{} must contain at least one image",
            image_set_id
        ))
        .into());
    }
    if image_sets::exists(conn, image_set_id).await? {
        return Err(ImageSetError::AlreadyExists(image_set_id.to_string()).into());
    }
    if let Some(patient_id) = patient_id {
        if !patients::exists(conn, patient_id).await? {
            return Err(PatientError::NotFound(patient_id.to_string()).into());
        }
    }

    let description = description.filter(|d| !d.trim().is_empty());
    let set_index = image_sets::insert_image_set(
        conn,
        image_set_id,
        patient_id,
        num_images,
        folder_path,
        description,
    )
    .await?;

    tracing::debug!(image_set_id, set_index, num_images, "Image set added");
    Ok(ImageSet {
        set_index,
        image_set_id: image_set_id.to_string(),
        patient_id: patient_id.map(str::to_string),
        num_images,
        folder_path: folder_path.map(str::to_string),
        conflicted: false,
        description: description.map(str::to_string),
    })
}

pub async fn add_image(
    conn: &mut SqliteConnection,
    image_id: &str,
    image_set_id: &str,
    slice_index: i64,
) -> Result<Image> {
    if image_id.trim().is_empty() {
        return Err(ImageError::Invalid("image id must not be empty".to_string()).into());
    }
    let Some(image_set) = image_sets::find_image_set(conn, image_set_id).await? else {
        return Err(ImageSetError::NotFound(image_set_id.to_string()).into());
    };
    if !(0..image_set.num_images).contains(&slice_index) {
        return Err(ImageError::Invalid(format!(
            "slice {} is outside 0..{} for {}",
            slice_index, image_set.num_images, image_set_id
        ))
        .into());
    }
    if images::find_image(conn, image_id).await?.is_some() {
        return Err(ImageError::AlreadyExists(image_id.to_string()).into());
    }
    if images::exists_at_slice(conn, image_set_id, slice_index).await? {
        return Err(ImageError::AlreadyExists(format!(
            "{} already has slice {}",
            image_set_id, slice_index
        ))
        .into());
    }

    let image = Image {
        image_id: image_id.to_string(),
        image_set_id: image_set_id.to_string(),
        slice_index,
    };
    images::insert_image(conn, &image).await?;
    Ok(image)
}

/// Apply a whole manifest on `conn`; patients first, then sets with their images
pub async fn ingest_manifest(
    conn: &mut SqliteConnection,
    manifest: &IngestManifest,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for entry in &manifest.patients {
        add_patient(
            conn,
            Patient {
                patient_id: entry.patient_id.clone(),
                category: entry.category.clone(),
                age: entry.age,
                gender: entry.gender,
            },
        )
        .await?;
        summary.patients += 1;
    }

    for entry in &manifest.image_sets {
        add_image_set(
            conn,
            &entry.image_set_id,
            entry.num_images,
            entry.folder_path.as_deref(),
            entry.patient_id.as_deref(),
            entry.description.as_deref(),
        )
        .await?;
        summary.image_sets += 1;

        for image in &entry.images {
            add_image(conn, &image.image_id, &entry.image_set_id, image.slice_index).await?;
            summary.images += 1;
        }
    }

    tracing::info!(
        patients = summary.patients,
        image_sets = summary.image_sets,
        images = summary.images,
        "Manifest ingested"
    );
    Ok(summary)
}

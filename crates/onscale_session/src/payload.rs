//! Turning a simulation description or a solver input file into an upload bundle.
//!
//! Building happens in two steps. [`PayloadBuilder::prepare`] reads and serializes
//! everything up front, so a broken payload fails before any job exists. Only once the
//! platform has issued a job id does [`PreparedPayload::finalize`] name the files and
//! produce the [`UploadBundle`].

use bytes::Bytes;
use onscale_core::constants::files::METADATA_FILE_NAME;
use onscale_core::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OnscaleError, Result};

/// How an auxiliary file is listed in the simulation metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Geometry,
    Material,
    Other,
}

impl FileRole {
    pub fn classify(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "step" | "stp" | "iges" | "igs" | "stl" | "brep" | "bincad" => FileRole::Geometry,
            "prjmat" | "matdb" | "jfp" => FileRole::Material,
            _ => FileRole::Other,
        }
    }
}

/// One file of a bundle with its SHA-256 digest.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleFile {
    pub name: String,
    pub data: Bytes,
    pub sha256: String,
}

impl BundleFile {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        let sha256 = hex::encode(Sha256::digest(&data));
        Self {
            name: name.into(),
            data,
            sha256,
        }
    }
}

/// Everything uploaded for one submission: the main input, its auxiliary files and the
/// generated metadata file.
#[derive(Debug, Clone)]
pub struct UploadBundle {
    primary: BundleFile,
    auxiliary: Vec<(FileRole, BundleFile)>,
    metadata: BundleFile,
    operation: Operation,
}

impl UploadBundle {
    pub fn primary(&self) -> &BundleFile {
        &self.primary
    }

    pub fn auxiliary(&self) -> impl Iterator<Item = (FileRole, &BundleFile)> {
        self.auxiliary.iter().map(|(role, f)| (*role, f))
    }

    pub fn metadata(&self) -> &BundleFile {
        &self.metadata
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn main_file(&self) -> &str {
        &self.primary.name
    }

    /// Upload order: primary, auxiliary files, metadata.
    pub fn files(&self) -> impl Iterator<Item = &BundleFile> {
        std::iter::once(&self.primary)
            .chain(self.auxiliary.iter().map(|(_, f)| f))
            .chain(std::iter::once(&self.metadata))
    }

    pub fn len(&self) -> usize {
        self.auxiliary.len() + 2
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationMetadata<'a> {
    main_file: &'a str,
    operation: Operation,
    geometry: BTreeMap<&'a str, &'a str>,
    materials: BTreeMap<&'a str, &'a str>,
    other: BTreeMap<&'a str, &'a str>,
    linked_job_files: BTreeMap<String, String>,
}

/// A payload whose files have all been read, waiting for a job id.
#[derive(Debug, Clone)]
pub struct PreparedPayload {
    main: Bytes,
    extension: String,
    name: String,
    operation: Operation,
    auxiliary: Vec<(FileRole, BundleFile)>,
    linked: Vec<LinkedFile>,
}

impl PreparedPayload {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Base for the generated job name: the input file stem or the description's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn linked_files(&self) -> &[LinkedFile] {
        &self.linked
    }

    pub fn auxiliary_names(&self) -> Vec<&str> {
        self.auxiliary.iter().map(|(_, f)| f.name.as_str()).collect()
    }

    /// Names the primary file after the job and generates the metadata file.
    pub fn finalize(&self, job_id: &JobId) -> Result<UploadBundle> {
        let primary = BundleFile::new(format!("{job_id}.{}", self.extension), self.main.clone());

        let mut metadata = SimulationMetadata {
            main_file: &primary.name,
            operation: self.operation,
            geometry: BTreeMap::new(),
            materials: BTreeMap::new(),
            other: BTreeMap::new(),
            linked_job_files: self
                .linked
                .iter()
                .map(|l| (l.alias.clone(), l.metadata_path()))
                .collect(),
        };
        for (role, file) in &self.auxiliary {
            let section = match role {
                FileRole::Geometry => &mut metadata.geometry,
                FileRole::Material => &mut metadata.materials,
                FileRole::Other => &mut metadata.other,
            };
            section.insert(&file.name, &file.sha256);
        }

        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| OnscaleError::Validation(format!("simulation metadata: {e}")))?;
        let metadata = BundleFile::new(METADATA_FILE_NAME, Bytes::from(json));

        Ok(UploadBundle {
            primary,
            auxiliary: self.auxiliary.clone(),
            metadata,
            operation: self.operation,
        })
    }
}

enum Source {
    Description(Box<dyn SimulationDescription>),
    InputFile(PathBuf),
}

/// Collects what goes into a submission.
pub struct PayloadBuilder {
    source: Source,
    files: Vec<PathBuf>,
    linked: Vec<LinkedFile>,
    operation: Option<Operation>,
}

impl PayloadBuilder {
    pub fn from_description(description: impl SimulationDescription + 'static) -> Self {
        Self::with_source(Source::Description(Box::new(description)))
    }

    /// A solver input file uploaded verbatim. Its extension decides the default operation.
    pub fn from_input_file(path: impl Into<PathBuf>) -> Self {
        Self::with_source(Source::InputFile(path.into()))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            files: Vec::new(),
            linked: Vec::new(),
            operation: None,
        }
    }

    /// Adds an auxiliary geometry, material or other file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn with_files<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.files.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_linked_file(mut self, linked: LinkedFile) -> Self {
        self.linked.push(linked);
        self
    }

    /// Overrides the operation the input implies.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Reads every file and serializes the description.
    pub async fn prepare(self) -> Result<PreparedPayload> {
        let PayloadBuilder {
            source,
            mut files,
            mut linked,
            operation,
        } = self;

        let (main, extension, name, operation) = match source {
            Source::Description(description) => {
                let main = description
                    .serialize()
                    .map_err(|e| OnscaleError::Validation(e.to_string()))?;
                files.extend(description.auxiliary_files());
                linked.extend(description.linked_files());
                (
                    main,
                    description.input_extension().trim_start_matches('.').to_string(),
                    description.name(),
                    operation.unwrap_or_else(|| description.operation()),
                )
            }
            Source::InputFile(path) => {
                let operation = operation
                    .or_else(|| Operation::from_input_file(&path))
                    .ok_or_else(|| {
                        OnscaleError::Validation(format!(
                            "cannot infer an operation for {}",
                            path.display()
                        ))
                    })?;
                let main = tokio::fs::read(&path).await.map_err(|e| {
                    OnscaleError::Validation(format!(
                        "cannot read input file {}: {e}",
                        path.display()
                    ))
                })?;
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| operation.input_extension().to_string());
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("simulation")
                    .to_string();
                (Bytes::from(main), extension, name, operation)
            }
        };

        let mut seen = HashSet::from([METADATA_FILE_NAME.to_string()]);
        let mut auxiliary = Vec::with_capacity(files.len());
        for path in files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    OnscaleError::Validation(format!("bad file name {}", path.display()))
                })?
                .to_string();
            if !seen.insert(file_name.clone()) {
                return Err(OnscaleError::Validation(format!(
                    "more than one file named {file_name}"
                )));
            }
            let data = tokio::fs::read(&path).await.map_err(|e| {
                OnscaleError::Validation(format!(
                    "cannot read auxiliary file {}: {e}",
                    path.display()
                ))
            })?;
            let role = FileRole::classify(&file_name);
            debug!(file = %file_name, ?role, "bundled auxiliary file");
            auxiliary.push((role, BundleFile::new(file_name, Bytes::from(data))));
        }

        Ok(PreparedPayload {
            main,
            extension,
            name,
            operation,
            auxiliary,
            linked,
        })
    }
}

/// A description that is a serde value written out as JSON solver input.
pub struct JsonDescription<T> {
    name: String,
    value: T,
    operation: Operation,
    files: Vec<PathBuf>,
}

impl<T: Serialize + Send + Sync> JsonDescription<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
            operation: Operation::ReflexMpi,
            files: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }
}

impl<T: Serialize + Send + Sync> SimulationDescription for JsonDescription<T> {
    fn serialize(&self) -> std::result::Result<Bytes, DescriptionError> {
        Ok(Bytes::from(serde_json::to_vec(&self.value)?))
    }

    fn input_extension(&self) -> &str {
        "json"
    }

    fn operation(&self) -> Operation {
        self.operation
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn auxiliary_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }
}

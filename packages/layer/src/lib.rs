#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` layer loading.
//!
//! Turns a `FeatureCollection` into a [`Layer`]: the field list is the
//! union of all property keys in first-seen order, each column's type is
//! inferred from its values ([`infer`]), and geometries are converted to
//! [`geo::Geometry`].

pub mod infer;

use std::path::Path;

use carto_import_models::{Feature, Field, Layer};
use geojson::GeoJson;
use serde_json::Map;

use crate::infer::{ColumnType, to_attribute};

/// Errors that can occur while loading a layer.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The file could not be read.
    #[error("Could not read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The input is not valid `GeoJSON`.
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The input is a bare geometry rather than features.
    #[error("Expected a FeatureCollection or Feature, found a bare geometry")]
    NotAFeatureCollection,

    /// A feature geometry could not be converted.
    #[error("Feature {feature} has an unsupported geometry: {source}")]
    Geometry {
        /// Zero-based feature index.
        feature: usize,
        /// Underlying error.
        source: geojson::Error,
    },
}

/// Reads and parses a `GeoJSON` file.
///
/// # Errors
///
/// * If the file cannot be read
/// * See [`parse_geojson`]
pub fn load_geojson(path: &Path) -> Result<Layer, LayerError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LayerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let layer = parse_geojson(&contents)?;
    log::info!(
        "Loaded {} features with {} fields from {}",
        layer.len(),
        layer.fields().len(),
        path.display()
    );
    Ok(layer)
}

/// Parses `GeoJSON` text into a layer.
///
/// A lone `Feature` is treated as a collection of one.
///
/// # Errors
///
/// * If the text is not valid `GeoJSON`
/// * If it holds a bare geometry
/// * If a geometry cannot be represented as [`geo::Geometry`]
pub fn parse_geojson(input: &str) -> Result<Layer, LayerError> {
    let features = match input.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(LayerError::NotAFeatureCollection),
    };
    from_features(features)
}

/// Builds a layer from parsed `GeoJSON` features.
///
/// # Errors
///
/// * If a geometry cannot be represented as [`geo::Geometry`]
pub fn from_features(features: Vec<geojson::Feature>) -> Result<Layer, LayerError> {
    let empty = Map::new();
    let mut columns: Vec<(String, ColumnType)> = Vec::new();

    for feature in &features {
        for (key, value) in feature.properties.as_ref().unwrap_or(&empty) {
            let index = columns
                .iter()
                .position(|(name, _)| name == key)
                .unwrap_or_else(|| {
                    columns.push((key.clone(), ColumnType::default()));
                    columns.len() - 1
                });
            columns[index].1.observe(value);
        }
    }

    let fields: Vec<Field> = columns
        .into_iter()
        .map(|(name, column)| Field::new(name, column.resolve()))
        .collect();
    log::debug!(
        "Inferred fields: {}",
        fields
            .iter()
            .map(|field| format!("{}: {}", field.name, field.semantic_type))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let features = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let properties = feature.properties.as_ref().unwrap_or(&empty);
            let attributes = fields
                .iter()
                .map(|field| to_attribute(properties.get(&field.name), field.semantic_type))
                .collect();
            let geometry = feature
                .geometry
                .map(geo::Geometry::<f64>::try_from)
                .transpose()
                .map_err(|source| LayerError::Geometry {
                    feature: index,
                    source,
                })?;
            Ok(Feature::new(attributes, geometry))
        })
        .collect::<Result<Vec<_>, LayerError>>()?;

    Ok(Layer::new(fields, features))
}

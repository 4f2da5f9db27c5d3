use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::Config;
use crate::fetchers::Weather;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model artifact unavailable")]
    ModelUnavailable,
    #[error("weather data unavailable")]
    WeatherUnavailable,
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("expected {expected} features, got {got}")]
    BadInput { expected: usize, got: usize },
    #[error("failed to load model: {0}")]
    Load(String),
}

/// One node of an exported decision tree. Splits follow the usual convention:
/// `features[feature] <= threshold` goes left.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        label: String,
    },
}

/// A pre-trained tabular classifier, exported to JSON from the training
/// pipeline. Loaded once at startup; the artifact is an external collaborator
/// and may legitimately be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct TabularModel {
    pub name: String,
    pub n_features: usize,
    tree: Node,
    #[serde(default)]
    pub soil_types: Vec<String>,
    #[serde(default)]
    pub crop_types: Vec<String>,
}

impl TabularModel {
    pub fn from_json(raw: &str) -> Result<Self, InferenceError> {
        serde_json::from_str(raw).map_err(|e| InferenceError::Load(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            InferenceError::Load(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn predict(&self, features: &[f64]) -> Result<String, InferenceError> {
        if features.len() != self.n_features {
            return Err(InferenceError::BadInput {
                expected: self.n_features,
                got: features.len(),
            });
        }

        let mut node = &self.tree;
        loop {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
                Node::Leaf { label } => return Ok(label.clone()),
            }
        }
    }
}

/// Maps categorical strings to the integer codes the model was trained
/// against: sorted distinct values, index = code. Built once at load, never
/// refit per request. Unseen values are a typed rejection.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(values: &[String]) -> Self {
        let mut classes: Vec<String> = values.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn encode(&self, value: &str) -> Result<f64, InferenceError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|idx| idx as f64)
            .map_err(|_| InferenceError::UnknownCategory(value.to_string()))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Fertilizer model plus the categorical encoders derived from its artifact.
#[derive(Debug, Clone)]
pub struct FertilizerModel {
    model: TabularModel,
    soil_encoder: LabelEncoder,
    crop_encoder: LabelEncoder,
}

impl FertilizerModel {
    pub fn new(model: TabularModel) -> Result<Self, InferenceError> {
        if model.soil_types.is_empty() || model.crop_types.is_empty() {
            return Err(InferenceError::Load(
                "fertilizer artifact is missing its category vocabularies".to_string(),
            ));
        }
        let soil_encoder = LabelEncoder::fit(&model.soil_types);
        let crop_encoder = LabelEncoder::fit(&model.crop_types);
        Ok(Self {
            model,
            soil_encoder,
            crop_encoder,
        })
    }
}

/// Model handles for the two recommenders. Either slot may be `None` when its
/// artifact failed to load; predictions then fail, startup does not.
#[derive(Default)]
pub struct Models {
    pub crop: Option<TabularModel>,
    pub fertilizer: Option<FertilizerModel>,
}

impl Models {
    pub fn load(config: &Config) -> Self {
        let crop = match TabularModel::load(&config.crop_model_path) {
            Ok(model) => Some(model),
            Err(e) => {
                log::error!("Failed to load crop recommendation model: {e}");
                None
            }
        };

        let fertilizer = match TabularModel::load(&config.fertilizer_model_path)
            .and_then(FertilizerModel::new)
        {
            Ok(model) => Some(model),
            Err(e) => {
                log::error!("Failed to load fertilizer model: {e}");
                None
            }
        };

        Models { crop, fertilizer }
    }

    /// Crop recommendation from soil nutrients, weather and rainfall.
    /// Feature order is fixed by the training pipeline.
    pub fn recommend_crop(
        &self,
        nitrogen: f64,
        phosphorus: f64,
        potassium: f64,
        weather: Option<&Weather>,
        ph: f64,
        rainfall: f64,
    ) -> Result<String, InferenceError> {
        let model = self.crop.as_ref().ok_or(InferenceError::ModelUnavailable)?;
        let weather = weather.ok_or(InferenceError::WeatherUnavailable)?;
        model.predict(&[
            nitrogen,
            phosphorus,
            potassium,
            weather.temp_c,
            weather.humidity,
            ph,
            rainfall,
        ])
    }

    /// Fertilizer recommendation; soil and crop types are encoded through the
    /// vocabularies the model shipped with.
    #[allow(clippy::too_many_arguments)]
    pub fn recommend_fertilizer(
        &self,
        nitrogen: f64,
        phosphorus: f64,
        potassium: f64,
        weather: Option<&Weather>,
        moisture: f64,
        soil_type: &str,
        crop: &str,
    ) -> Result<String, InferenceError> {
        let model = self
            .fertilizer
            .as_ref()
            .ok_or(InferenceError::ModelUnavailable)?;
        let weather = weather.ok_or(InferenceError::WeatherUnavailable)?;
        let soil_code = model.soil_encoder.encode(soil_type)?;
        let crop_code = model.crop_encoder.encode(crop)?;
        model.model.predict(&[
            weather.temp_c,
            weather.humidity,
            moisture,
            soil_code,
            crop_code,
            nitrogen,
            potassium,
            phosphorus,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_weather() -> Weather {
        Weather {
            condition: "Clear".to_string(),
            temp_c: 25.0,
            humidity: 80.0,
            wind_kph: 5.0,
            pressure_mb: 1010.0,
        }
    }

    /// Rainfall above 100 mm picks rice, otherwise nitrogen decides between
    /// maize and chickpea. Feature order: n, p, k, temp, humidity, ph, rain.
    fn crop_model() -> TabularModel {
        TabularModel::from_json(
            r#"{
                "name": "crop_recommend",
                "n_features": 7,
                "tree": {
                    "kind": "split", "feature": 6, "threshold": 100.0,
                    "left": {
                        "kind": "split", "feature": 0, "threshold": 50.0,
                        "left": {"kind": "leaf", "label": "chickpea"},
                        "right": {"kind": "leaf", "label": "maize"}
                    },
                    "right": {"kind": "leaf", "label": "rice"}
                }
            }"#,
        )
        .expect("artifact should parse")
    }

    fn fertilizer_model() -> FertilizerModel {
        let model = TabularModel::from_json(
            r#"{
                "name": "fertilizer",
                "n_features": 8,
                "tree": {
                    "kind": "split", "feature": 5, "threshold": 20.0,
                    "left": {"kind": "leaf", "label": "Urea"},
                    "right": {"kind": "leaf", "label": "DAP"}
                },
                "soil_types": ["Sandy", "Loamy", "Black", "Red", "Clayey"],
                "crop_types": ["Maize", "Sugarcane", "Cotton", "Paddy", "Wheat"]
            }"#,
        )
        .expect("artifact should parse");
        FertilizerModel::new(model).expect("vocabularies are present")
    }

    #[test]
    fn test_label_encoder_codes_are_sorted_distinct() {
        let encoder = LabelEncoder::fit(&strings(&["Sandy", "Loamy", "Black", "Loamy"]));

        assert_eq!(encoder.classes(), &strings(&["Black", "Loamy", "Sandy"]));
        assert_eq!(encoder.encode("Black").unwrap(), 0.0);
        assert_eq!(encoder.encode("Loamy").unwrap(), 1.0);
        assert_eq!(encoder.encode("Sandy").unwrap(), 2.0);
    }

    #[test]
    fn test_label_encoder_rejects_unseen_value() {
        let encoder = LabelEncoder::fit(&strings(&["Sandy", "Loamy"]));
        let err = encoder.encode("Peaty").unwrap_err();
        assert!(matches!(err, InferenceError::UnknownCategory(v) if v == "Peaty"));
    }

    #[test]
    fn test_tree_walk_reaches_the_right_leaf() {
        let model = crop_model();

        // High rainfall goes right regardless of nutrients.
        let label = model
            .predict(&[90.0, 40.0, 40.0, 25.0, 80.0, 6.5, 200.0])
            .unwrap();
        assert_eq!(label, "rice");

        // Low rainfall, low nitrogen.
        let label = model
            .predict(&[30.0, 40.0, 40.0, 25.0, 80.0, 6.5, 50.0])
            .unwrap();
        assert_eq!(label, "chickpea");
    }

    #[test]
    fn test_feature_count_mismatch_is_rejected() {
        let model = crop_model();
        let err = model.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::BadInput {
                expected: 7,
                got: 2
            }
        ));
    }

    #[test]
    fn test_recommend_crop_without_model_fails() {
        let models = Models::default();
        let weather = sample_weather();
        let err = models
            .recommend_crop(90.0, 40.0, 40.0, Some(&weather), 6.5, 200.0)
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable));
    }

    #[test]
    fn test_recommend_crop_without_weather_fails() {
        let models = Models {
            crop: Some(crop_model()),
            fertilizer: None,
        };
        let err = models
            .recommend_crop(90.0, 40.0, 40.0, None, 6.5, 200.0)
            .unwrap_err();
        assert!(matches!(err, InferenceError::WeatherUnavailable));
    }

    #[test]
    fn test_recommend_fertilizer_end_to_end() {
        let models = Models {
            crop: None,
            fertilizer: Some(fertilizer_model()),
        };
        let weather = sample_weather();

        let label = models
            .recommend_fertilizer(12.0, 10.0, 15.0, Some(&weather), 30.0, "Loamy", "Maize")
            .unwrap();
        assert_eq!(label, "Urea");

        let label = models
            .recommend_fertilizer(40.0, 10.0, 15.0, Some(&weather), 30.0, "Loamy", "Maize")
            .unwrap();
        assert_eq!(label, "DAP");
    }

    #[test]
    fn test_recommend_fertilizer_rejects_unknown_crop() {
        let models = Models {
            crop: None,
            fertilizer: Some(fertilizer_model()),
        };
        let weather = sample_weather();

        let err = models
            .recommend_fertilizer(12.0, 10.0, 15.0, Some(&weather), 30.0, "Loamy", "Quinoa")
            .unwrap_err();
        assert!(matches!(err, InferenceError::UnknownCategory(_)));
    }

    #[test]
    fn test_fertilizer_artifact_without_vocabularies_is_a_load_error() {
        let model = TabularModel::from_json(
            r#"{
                "name": "fertilizer",
                "n_features": 8,
                "tree": {"kind": "leaf", "label": "Urea"}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            FertilizerModel::new(model),
            Err(InferenceError::Load(_))
        ));
    }

    #[test]
    fn test_missing_artifact_path_is_a_load_error() {
        let err = TabularModel::load(Path::new("model_code/does_not_exist.json")).unwrap_err();
        assert!(matches!(err, InferenceError::Load(_)));
    }
}

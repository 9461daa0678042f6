use super::error::EngineError;
use crate::core::surrogate::{DenseNetwork, StandardScaler, SurrogateModel};
use nalgebra::DVector;

/// Forward transform applied to a feature vector before the regressor sees it.
pub trait FeatureScaler: Send + Sync {
    fn input_dim(&self) -> usize;
    fn scale_features(&self, features: &DVector<f64>) -> DVector<f64>;
}

/// Maps a scaled feature vector to one scaled prediction.
pub trait Regressor: Send + Sync {
    fn input_dim(&self) -> usize;
    fn predict(&self, features: &DVector<f64>) -> f64;
}

/// Inverse transform taking a scaled prediction back to physical units.
pub trait TargetScaler: Send + Sync {
    fn unscale_target(&self, value: f64) -> f64;
}

impl FeatureScaler for StandardScaler {
    fn input_dim(&self) -> usize {
        self.dim()
    }

    fn scale_features(&self, features: &DVector<f64>) -> DVector<f64> {
        self.transform(features)
    }
}

impl TargetScaler for StandardScaler {
    fn unscale_target(&self, value: f64) -> f64 {
        self.inverse_transform(&DVector::from_element(self.dim(), value))[0]
    }
}

impl Regressor for DenseNetwork {
    fn input_dim(&self) -> usize {
        DenseNetwork::input_dim(self)
    }

    fn predict(&self, features: &DVector<f64>) -> f64 {
        self.forward(features)[0]
    }
}

/// Runs feature vectors through scaler, regressor and inverse scaler.
///
/// The three collaborators are opaque; the driver only checks that the
/// feature length matches what the scaler and regressor accept.
pub struct InferenceDriver<'m> {
    x_scaler: &'m dyn FeatureScaler,
    regressor: &'m dyn Regressor,
    y_scaler: &'m dyn TargetScaler,
}

impl<'m> InferenceDriver<'m> {
    pub fn new(
        x_scaler: &'m dyn FeatureScaler,
        regressor: &'m dyn Regressor,
        y_scaler: &'m dyn TargetScaler,
    ) -> Result<Self, EngineError> {
        if x_scaler.input_dim() != regressor.input_dim() {
            return Err(EngineError::Configuration(format!(
                "input scaler expects {} features, regressor expects {}",
                x_scaler.input_dim(),
                regressor.input_dim()
            )));
        }
        Ok(Self {
            x_scaler,
            regressor,
            y_scaler,
        })
    }

    pub fn from_surrogate(model: &'m SurrogateModel) -> Result<Self, EngineError> {
        if model.network.output_dim() != 1 {
            return Err(EngineError::Configuration(format!(
                "surrogate model must produce one value, it produces {}",
                model.network.output_dim()
            )));
        }
        Self::new(&model.x_scaler, &model.network, &model.y_scaler)
    }

    pub fn input_dim(&self) -> usize {
        self.regressor.input_dim()
    }

    /// Fails unless feature vectors of length `len` fit the model input.
    pub fn check_input_len(&self, len: usize, resolution: &str) -> Result<(), EngineError> {
        if len != self.input_dim() {
            return Err(EngineError::Configuration(format!(
                "resolution '{}' yields {} features but the model expects {}",
                resolution,
                len,
                self.input_dim()
            )));
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, EngineError> {
        if features.len() != self.input_dim() {
            return Err(EngineError::Configuration(format!(
                "feature vector has {} entries, the model expects {}",
                features.len(),
                self.input_dim()
            )));
        }
        let x = DVector::from_column_slice(features);
        let scaled = self.x_scaler.scale_features(&x);
        Ok(self.y_scaler.unscale_target(self.regressor.predict(&scaled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::surrogate::{Activation, DenseLayer};

    fn linear_model() -> SurrogateModel {
        // y = x0 + 2 x1 on scaled inputs
        let layer = DenseLayer::new(&[vec![1.0], vec![2.0]], vec![0.0], Activation::Linear).unwrap();
        SurrogateModel::new(
            StandardScaler::new(vec![1.0, 1.0], vec![1.0, 2.0]).unwrap(),
            DenseNetwork::new(vec![layer]).unwrap(),
            StandardScaler::new(vec![-3.0], vec![10.0]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn predict_applies_scaler_model_and_inverse_scaler() {
        let model = linear_model();
        let driver = InferenceDriver::from_surrogate(&model).unwrap();
        // scaled = (2, 2); raw = 2 + 4 = 6; unscaled = 6 * 10 - 3
        let y = driver.predict(&[3.0, 5.0]).unwrap();
        assert!((y - 57.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_feature_length_is_a_configuration_error() {
        let model = linear_model();
        let driver = InferenceDriver::from_surrogate(&model).unwrap();
        assert!(matches!(
            driver.predict(&[1.0]),
            Err(EngineError::Configuration(_))
        ));
        assert!(driver.check_input_len(2, "AA").is_ok());
        assert!(matches!(
            driver.check_input_len(4, "AA"),
            Err(EngineError::Configuration(_))
        ));
    }

    struct Constant;

    impl Regressor for Constant {
        fn input_dim(&self) -> usize {
            3
        }

        fn predict(&self, _features: &DVector<f64>) -> f64 {
            1.0
        }
    }

    #[test]
    fn mismatched_collaborators_are_rejected() {
        let x = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let y = StandardScaler::new(vec![0.0], vec![1.0]).unwrap();
        assert!(InferenceDriver::new(&x, &Constant, &y).is_err());
    }
}

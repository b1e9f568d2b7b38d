use crate::{register_root, Tensor};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{any::Any, path::Path};
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};

/// On-disk form: the values and, when present, the gradient. History is
/// not kept.
#[derive(Serialize, Deserialize)]
struct SavedTensor {
    data: NdArray,
    grad: Option<NdArray>,
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.try_to_array().map_err(serde::ser::Error::custom)?;
        let grad = match self.grad() {
            Some(grad) => Some(grad.try_to_array().map_err(serde::ser::Error::custom)?),
            None => None,
        };
        SavedTensor { data, grad }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let saved = SavedTensor::deserialize(deserializer)?;
        let tensor = register_root(saved.data, false);
        if let Some(grad) = saved.grad {
            tensor
                .try_backward_with(&grad)
                .map_err(|e| de::Error::custom(format!("Failed to restore gradient: {}", e)))?;
        }
        Ok(tensor)
    }
}

impl Tensor {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let config = bincode::config::legacy();
        bincode::serde::encode_to_vec(self, config)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize tensor: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::legacy();
        bincode::serde::decode_from_slice(bytes, config)
            .map(|(value, _)| value)
            .map_err(|e| Error::DeserializationError(format!("Failed to deserialize tensor: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize tensor to JSON: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::DeserializationError(format!("Failed to deserialize tensor from JSON: {}", e)))
    }
}

/// Writes a tensor's values and gradient to `path`.
///
/// Anything other than a [`Tensor`] is rejected with a type error.
pub fn save<T: Any>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let tensor = (value as &dyn Any).downcast_ref::<Tensor>().ok_or_else(|| Error::TypeMismatch {
        expected: "Tensor".to_string(),
        got: std::any::type_name::<T>().to_string(),
    })?;
    std::fs::write(path, tensor.to_bytes()?)?;
    Ok(())
}

/// Reads a tensor written by [`save`] as a fresh leaf, gradient restored.
pub fn load(path: impl AsRef<Path>) -> Result<Tensor> {
    let bytes = std::fs::read(path)?;
    Tensor::from_bytes(&bytes)
}

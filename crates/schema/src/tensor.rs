use ndarray::{Array4, ArrayView4};

pub const INPUT_WIDTH: usize = 128;
pub const INPUT_HEIGHT: usize = 128;
pub const INPUT_CHANNELS: usize = 3;

/// NHWC layout expected by the classifier model.
pub const TENSOR_SHAPE: [usize; 4] = [1, INPUT_HEIGHT, INPUT_WIDTH, INPUT_CHANNELS];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorShapeError {
    #[error("tensor has {actual} elements, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("tensor shape {actual:?} does not match {expected:?}")]
    Shape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
}

/// Model input: one 128x128 RGB image, `u8` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer {
    data: Array4<u8>,
}

impl TensorBuffer {
    /// Build from packed RGB bytes in row-major order.
    pub fn from_rgb(pixels: Vec<u8>) -> Result<Self, TensorShapeError> {
        let expected = TENSOR_SHAPE.iter().product();
        let actual = pixels.len();

        let data = Array4::from_shape_vec(TENSOR_SHAPE, pixels)
            .map_err(|_| TensorShapeError::Length { expected, actual })?;

        Ok(Self { data })
    }

    pub fn from_array(data: Array4<u8>) -> Result<Self, TensorShapeError> {
        let tensor = Self { data };
        tensor.validate()?;
        Ok(tensor)
    }

    /// Check the shape invariant. Called again right before invocation.
    pub fn validate(&self) -> Result<(), TensorShapeError> {
        if self.data.shape() != TENSOR_SHAPE {
            return Err(TensorShapeError::Shape {
                expected: TENSOR_SHAPE,
                actual: self.data.shape().to_vec(),
            });
        }
        Ok(())
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, u8> {
        self.data.view()
    }

    /// Channel value at `(y, x, channel)`.
    pub fn pixel(&self, y: usize, x: usize, channel: usize) -> u8 {
        self.data[[0, y, x, channel]]
    }

    /// Same layout scaled to `[0, 1]`, for float-input models.
    pub fn to_unit_f32(&self) -> Array4<f32> {
        self.data.mapv(|v| v as f32 / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_accepts_exact_length() {
        let tensor = TensorBuffer::from_rgb(vec![7u8; 128 * 128 * 3]).unwrap();
        assert_eq!(tensor.shape(), &TENSOR_SHAPE);
        assert!(tensor.validate().is_ok());
        assert_eq!(tensor.pixel(127, 127, 2), 7);
    }

    #[test]
    fn from_rgb_rejects_wrong_length() {
        let err = TensorBuffer::from_rgb(vec![0u8; 64 * 64 * 3]).unwrap_err();
        assert_eq!(
            err,
            TensorShapeError::Length {
                expected: 49_152,
                actual: 12_288
            }
        );
    }

    #[test]
    fn from_array_rejects_wrong_shape() {
        let err = TensorBuffer::from_array(Array4::zeros((1, 3, 128, 128))).unwrap_err();
        assert!(matches!(err, TensorShapeError::Shape { .. }));
    }

    #[test]
    fn unit_f32_scales_channel_values() {
        let mut pixels = vec![0u8; 128 * 128 * 3];
        pixels[0] = 255;
        pixels[1] = 51;
        let tensor = TensorBuffer::from_rgb(pixels).unwrap();
        let unit = tensor.to_unit_f32();

        assert_eq!(unit[[0, 0, 0, 0]], 1.0);
        assert!((unit[[0, 0, 0, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(unit[[0, 0, 0, 2]], 0.0);
    }
}

//! Errors produced while decoding detector output.

use thiserror::Error;

/// An error that aborts decoding of a raw output tensor.
///
/// Decoding is pure computation, so none of these are transient. An image in which nothing clears
/// the confidence threshold is *not* an error; it decodes to an empty summary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The tensor has no candidates, rows with fewer than 5 columns, or an unsupported batch size.
    #[error("malformed output tensor: {0}")]
    MalformedTensor(String),

    /// A candidate's class has no entry in the label table.
    ///
    /// This means the label table does not belong to the model that produced the tensor.
    #[error("class id {class_id} has no label (label table has {num_labels} entries)")]
    UnknownClassId { class_id: usize, num_labels: usize },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::MalformedTensor(msg.into())
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

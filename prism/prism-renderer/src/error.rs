//! Error types for renderer construction, geometry upload, submissions and lights.

use render_api::MeshError;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
    #[error("a renderer is already configured in this process")]
    AlreadyConfigured,
    #[error("frame resources: {0}")]
    FrameResources(String),
    #[error("forward program '{0}' failed to build: {1}")]
    Program(String, String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    #[error("mesh is not ready: {0}")]
    NotReady(#[from] MeshError),
    #[error("texture '{0}' has {1} bytes, expected {2}")]
    TextureSize(String, usize, usize),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SubmitError {
    #[error("record '{0}' has zero indices")]
    ZeroIndexCount(String),
    #[error("record '{0}' has inverted bounds")]
    InvalidBounds(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LightError {
    #[error("Cannot have more than 1 directional light.")]
    DirectionalAlreadyRegistered,
    #[error("Cannot have more than {0} point lights.")]
    TooManyPointLights(usize),
    #[error("Cannot have more than {0} spot lights.")]
    TooManySpotLights(usize),
}

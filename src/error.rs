use thiserror::Error;

/// The error kind of the hala-meshlet crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaErrorKind {
  /// Missing or invalid setup, the pipeline skips the frame and retries later.
  Configuration,
  /// The meshlet builder rejected the mesh or the options.
  Build,
  /// A device allocation did not fit into the memory budget.
  ResourceExhausted,
  /// A device side failure (out of range access, bad command).
  Device,
  /// File or serialization failure.
  Io,
}

/// The error type of the hala-meshlet crate.
#[derive(Error, Debug)]
pub struct HalaRendererError {
  kind: HalaErrorKind,
  msg: String,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The implementation of the error type of the hala-meshlet crate.
impl HalaRendererError {
  /// Create a new device error.
  /// param msg: The message of the error.
  /// param source: The source of the error.
  /// return: The error.
  pub fn new(msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self::with_kind(HalaErrorKind::Device, msg, source)
  }

  /// Create a new error with the given kind.
  /// param kind: The kind of the error.
  /// param msg: The message of the error.
  /// param source: The source of the error.
  /// return: The error.
  pub fn with_kind(kind: HalaErrorKind, msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      kind,
      msg: msg.to_string(),
      source,
    }
  }

  pub fn configuration(msg: &str) -> Self {
    Self::with_kind(HalaErrorKind::Configuration, msg, None)
  }

  pub fn build(msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self::with_kind(HalaErrorKind::Build, msg, source)
  }

  pub fn resource_exhausted(msg: &str) -> Self {
    Self::with_kind(HalaErrorKind::ResourceExhausted, msg, None)
  }

  pub fn io(msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self::with_kind(HalaErrorKind::Io, msg, source)
  }

  pub fn message(&self) -> &str {
    &self.msg
  }

  pub fn kind(&self) -> HalaErrorKind {
    self.kind
  }

  pub fn is_configuration(&self) -> bool {
    self.kind == HalaErrorKind::Configuration
  }
}

/// The implementation Display trait for the error type of the hala-meshlet crate.
impl std::fmt::Display for HalaRendererError {
  /// Format the error.
  /// param f: The formatter.
  /// return: The result.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.msg)
  }
}
